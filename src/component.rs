//! Discovery and build pipeline for the JVM pipes component.
//!
//! A [`ComponentSpec`] is a static description of one build unit,
//! produced by directory discovery at orchestrator start and read-only
//! afterwards. [`ComponentBuilder`] drives the compile → stage →
//! package pipeline for each spec through a [`ToolInvoker`].

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::invoker::ToolInvoker;
use crate::layout::{Layout, PIPES_NAMESPACE};
use crate::util::fs::{copy_file, ensure_dir};

/// Platform separator for classpath lists.
const CLASSPATH_SEP: &str = if cfg!(windows) { ";" } else { ":" };

/// Subdirectory of the scratch dir receiving compiled classes.
const CLASS_SUBDIR: &str = "classes";

/// Static description of one pipes build unit.
#[derive(Debug, Clone, Serialize)]
pub struct ComponentSpec {
    /// Basename of the produced archive.
    pub archive_name: String,

    /// Declared classpath entries, searched before staged dependencies.
    /// May be empty, in which case compilation proceeds with a warning.
    pub classpath_entries: Vec<String>,

    /// Ordered compilation units. Order only affects diagnostics; the
    /// compiler accepts the units in any order.
    pub source_files: Vec<PathBuf>,

    /// Dependency archives staged next to the component archive.
    pub dependency_archives: Vec<PathBuf>,

    /// Property files embedded into the archive at a relative
    /// destination inside the class tree.
    pub embedded_properties: Vec<(PathBuf, PathBuf)>,
}

/// Discover the pipes component in the project tree.
///
/// Pure directory discovery; re-run fresh on every invocation, never
/// cached across processes.
pub fn discover(
    layout: &Layout,
    archive_name: &str,
    classpath: Option<&str>,
) -> Result<Vec<ComponentSpec>> {
    let mut source_files = glob_files(&layout.pipes_src_dir().join("*.java"))?;
    source_files.push(layout.extra_jvm_source());

    let dependency_archives = glob_files(&layout.jvm_lib_dir().join("*.jar"))?;

    let properties_dest = Path::new(PIPES_NAMESPACE)
        .join(layout.properties_file().file_name().expect("properties basename"));

    Ok(vec![ComponentSpec {
        archive_name: archive_name.to_string(),
        classpath_entries: classpath.map(str::to_string).into_iter().collect(),
        source_files,
        dependency_archives,
        embedded_properties: vec![(properties_dest, layout.properties_file())],
    }])
}

fn glob_files(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern_str)
        .with_context(|| format!("invalid glob pattern: {pattern_str}"))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Drives the compile → stage-properties → package pipeline.
pub struct ComponentBuilder<'a> {
    invoker: &'a dyn ToolInvoker,
}

impl<'a> ComponentBuilder<'a> {
    pub fn new(invoker: &'a dyn ToolInvoker) -> Self {
        ComponentBuilder { invoker }
    }

    /// Build one component into `output_dir`.
    ///
    /// A nonzero exit from the compiler or the archiver is fatal and
    /// carries the exact failing command; no archive is produced when
    /// compilation fails. There are no retries.
    pub fn build(
        &self,
        spec: &ComponentSpec,
        scratch_dir: &Path,
        output_dir: &Path,
    ) -> Result<()> {
        let package_dir = output_dir.join(crate::layout::PACKAGE_NAME);
        ensure_dir(&package_dir)?;

        let classpath = self.stage_dependencies(spec, &package_dir)?;

        let class_dir = scratch_dir.join(CLASS_SUBDIR);
        ensure_dir(&class_dir)?;

        tracing::info!("compiling {} component sources", spec.source_files.len());
        let status =
            self.invoker
                .compile(&spec.source_files, classpath.as_deref(), &class_dir)?;
        if !status.success {
            return Err(Error::CommandFailed {
                command: status.command,
                status: status.code,
            });
        }

        for (dest, source) in &spec.embedded_properties {
            tracing::debug!("embedding {}", dest.display());
            copy_file(source, &class_dir.join(dest))?;
        }

        let archive_path = package_dir.join(&spec.archive_name);
        tracing::info!("packaging {}", archive_path.display());
        let status = self.invoker.archive(&class_dir, &archive_path)?;
        if !status.success {
            return Err(Error::CommandFailed {
                command: status.command,
                status: status.code,
            });
        }

        Ok(())
    }

    /// Stage dependency archives next to the component archive and
    /// compute the classpath: declared entries first, staged paths after,
    /// in their original order.
    fn stage_dependencies(
        &self,
        spec: &ComponentSpec,
        package_dir: &Path,
    ) -> Result<Option<String>> {
        if spec.classpath_entries.is_empty() {
            tracing::warn!("could not determine a classpath, component compilation may fail");
            return Ok(None);
        }

        let mut entries = spec.classpath_entries.clone();
        for src in &spec.dependency_archives {
            let dest = package_dir.join(src.file_name().expect("archive basename"));
            copy_file(src, &dest)?;
            entries.push(dest.to_string_lossy().into_owned());
        }
        Ok(Some(entries.join(CLASSPATH_SEP)))
    }
}
