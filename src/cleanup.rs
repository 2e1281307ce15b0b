//! Best-effort removal of generated artifacts.
//!
//! Cleanup never fails the overall command: every deletion error is
//! captured in the returned report instead of propagating, so later
//! paths are still attempted and tests can inspect what went wrong
//! without the failures affecting control flow.

use std::path::PathBuf;

use walkdir::WalkDir;

use crate::layout::Layout;
use crate::util::fs::{display_relative, remove_path};
use crate::util::ProcessBuilder;

/// One swallowed cleanup failure.
#[derive(Debug)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub message: String,
}

/// What `clean` did, including everything it tolerated.
#[derive(Debug, Default)]
pub struct CleanReport {
    /// Paths that existed and were removed.
    pub removed: Vec<PathBuf>,

    /// Paths in the garbage list that were already absent.
    pub absent: Vec<PathBuf>,

    /// Failures that were swallowed, kept inspectable.
    pub failures: Vec<CleanupFailure>,
}

impl CleanReport {
    pub fn has_failures(&self) -> bool {
        !self.failures.is_empty()
    }
}

/// Remove all generated paths and run per-directory clean recipes in the
/// demo trees. Never fails; see [`CleanReport`].
pub fn clean(layout: &Layout) -> CleanReport {
    let mut report = CleanReport::default();

    for path in layout.garbage() {
        if !path.exists() && path.symlink_metadata().is_err() {
            report.absent.push(path);
            continue;
        }
        tracing::info!(
            "removing {}",
            display_relative(layout.root(), &path).display()
        );
        match remove_path(&path) {
            Ok(()) => report.removed.push(path),
            Err(err) => {
                tracing::warn!("failed to remove {}: {err}", path.display());
                report.failures.push(CleanupFailure {
                    path,
                    message: err.to_string(),
                });
            }
        }
    }

    clean_demo_trees(layout, &mut report);
    report
}

/// Invoke `make clean` in every demo directory carrying a Makefile.
///
/// A missing `make` or a nonzero exit is recorded, never escalated.
fn clean_demo_trees(layout: &Layout, report: &mut CleanReport) {
    let demos = layout.demos_dir();
    if !demos.is_dir() {
        return;
    }

    for entry in WalkDir::new(&demos).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_dir() || !entry.path().join("Makefile").is_file() {
            continue;
        }
        let dir = entry.path();
        tracing::info!(
            "cleaning demo tree {}",
            display_relative(layout.root(), dir).display()
        );

        let cmd = ProcessBuilder::new("make").arg("-C").arg(dir).arg("clean");
        match cmd.status() {
            Ok(status) if status.success() => {}
            Ok(status) => report.failures.push(CleanupFailure {
                path: dir.to_path_buf(),
                message: format!(
                    "`{}` exited with status {:?}",
                    cmd.display_command(),
                    status.code()
                ),
            }),
            Err(err) => report.failures.push(CleanupFailure {
                path: dir.to_path_buf(),
                message: err.to_string(),
            }),
        }
    }
}
