//! Typed failures surfaced by the build pipeline.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Fatal build failures.
///
/// Everything here aborts the pipeline. Degradations that merely warn
/// (an unresolved classpath, a cleanup hiccup) never appear as variants;
/// they go through `tracing` or the clean report instead.
#[derive(Debug, Error)]
pub enum Error {
    /// A required source artifact could not be read before the build started.
    #[error("missing prerequisite {}: {source}", path.display())]
    MissingPrerequisite {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The configured framework cannot host the built package.
    ///
    /// Raised before any scratch state is created.
    #[error("unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// An external compiler or archiver exited with a nonzero status.
    ///
    /// Carries the exact command line so the caller can reproduce the step.
    #[error("external command failed with status {status:?}: {command}")]
    CommandFailed {
        command: String,
        status: Option<i32>,
    },

    /// Anything else bubbling up from plumbing code.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
