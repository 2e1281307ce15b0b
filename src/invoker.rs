//! External toolchain invocation seam.
//!
//! The component pipeline never builds command lines inline: it goes
//! through [`ToolInvoker`], so tests can substitute a double that
//! simulates compiler and archiver failures deterministically.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::util::ProcessBuilder;

/// Outcome of one external tool run: the exact command that ran and how
/// it exited.
#[derive(Debug, Clone)]
pub struct ToolStatus {
    pub command: String,
    pub code: Option<i32>,
    pub success: bool,
}

impl ToolStatus {
    pub fn from_exit(command: String, status: std::process::ExitStatus) -> Self {
        ToolStatus {
            command,
            code: status.code(),
            success: status.success(),
        }
    }
}

/// Compiler/archiver pair for the secondary-language component.
///
/// Implementations report nonzero exits through [`ToolStatus`] rather
/// than erroring; an `Err` means the tool could not be run at all.
pub trait ToolInvoker {
    /// Compile `sources` into `out_dir`, searching `classpath` for
    /// dependencies.
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: Option<&str>,
        out_dir: &Path,
    ) -> Result<ToolStatus>;

    /// Package the whole tree under `root_dir` into `archive_path`.
    fn archive(&self, root_dir: &Path, archive_path: &Path) -> Result<ToolStatus>;
}

/// JDK-backed invoker driving `javac` and `jar`.
///
/// Tools are resolved lazily, on first use: constructing the invoker
/// must stay cheap so precondition checks can reject a build before any
/// toolchain lookup happens.
#[derive(Debug)]
pub struct JdkInvoker {
    java_home: PathBuf,
}

impl JdkInvoker {
    pub fn new(java_home: impl Into<PathBuf>) -> Self {
        JdkInvoker {
            java_home: java_home.into(),
        }
    }
}

fn find_tool(java_home: &Path, name: &str) -> Result<PathBuf> {
    let candidate = java_home.join("bin").join(name);
    if candidate.is_file() {
        return Ok(candidate);
    }
    which::which(name).with_context(|| {
        format!(
            "`{name}` not found under {} or on PATH",
            java_home.join("bin").display()
        )
    })
}

impl ToolInvoker for JdkInvoker {
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: Option<&str>,
        out_dir: &Path,
    ) -> Result<ToolStatus> {
        let javac = find_tool(&self.java_home, "javac")?;
        let mut cmd = ProcessBuilder::new(javac);
        if let Some(cp) = classpath {
            cmd = cmd.arg("-classpath").arg(cp);
        }
        cmd = cmd.arg("-d").arg(out_dir).args(sources);

        let status = cmd.status()?;
        Ok(ToolStatus::from_exit(cmd.display_command(), status))
    }

    fn archive(&self, root_dir: &Path, archive_path: &Path) -> Result<ToolStatus> {
        let jar = find_tool(&self.java_home, "jar")?;
        let cmd = ProcessBuilder::new(jar)
            .arg("-cf")
            .arg(archive_path)
            .arg("-C")
            .arg(root_dir)
            .arg(".");

        let status = cmd.status()?;
        Ok(ToolStatus::from_exit(cmd.display_command(), status))
    }
}
