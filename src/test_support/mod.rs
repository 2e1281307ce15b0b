//! Test doubles for gantry unit tests.
//!
//! Only compiled for tests. Provides recording fakes for the external
//! toolchain seams so pipelines can be exercised without a JDK or a C
//! compiler.

use std::cell::RefCell;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;
use crate::extension::{ExtensionCompiler, ExtensionDescriptor};
use crate::invoker::{ToolInvoker, ToolStatus};

/// Recording double for the component compiler/archiver.
pub struct RecordingInvoker {
    pub compile_ok: bool,
    pub archive_ok: bool,
    pub compile_classpaths: RefCell<Vec<Option<String>>>,
    pub compile_sources: RefCell<Vec<Vec<PathBuf>>>,
    pub archived: RefCell<Vec<PathBuf>>,
}

impl RecordingInvoker {
    pub fn ok() -> Self {
        RecordingInvoker {
            compile_ok: true,
            archive_ok: true,
            compile_classpaths: RefCell::new(Vec::new()),
            compile_sources: RefCell::new(Vec::new()),
            archived: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_compiler() -> Self {
        RecordingInvoker {
            compile_ok: false,
            ..RecordingInvoker::ok()
        }
    }

    pub fn failing_archiver() -> Self {
        RecordingInvoker {
            archive_ok: false,
            ..RecordingInvoker::ok()
        }
    }
}

impl ToolInvoker for RecordingInvoker {
    fn compile(
        &self,
        sources: &[PathBuf],
        classpath: Option<&str>,
        _out_dir: &Path,
    ) -> anyhow::Result<ToolStatus> {
        self.compile_classpaths
            .borrow_mut()
            .push(classpath.map(str::to_string));
        self.compile_sources.borrow_mut().push(sources.to_vec());
        Ok(ToolStatus {
            command: format!("javac <{} sources>", sources.len()),
            code: Some(if self.compile_ok { 0 } else { 1 }),
            success: self.compile_ok,
        })
    }

    fn archive(&self, _root_dir: &Path, archive_path: &Path) -> anyhow::Result<ToolStatus> {
        self.archived.borrow_mut().push(archive_path.to_path_buf());
        if self.archive_ok {
            fs::write(archive_path, b"jar").expect("write fake archive");
        }
        Ok(ToolStatus {
            command: format!("jar -cf {}", archive_path.display()),
            code: Some(if self.archive_ok { 0 } else { 1 }),
            success: self.archive_ok,
        })
    }
}

/// Extension compiler double that records the modules it was handed.
#[derive(Default)]
pub struct RecordingExtensionCompiler {
    pub compiled: RefCell<Vec<String>>,
}

impl ExtensionCompiler for RecordingExtensionCompiler {
    fn compile(&self, descriptors: &[ExtensionDescriptor], _out_dir: &Path) -> Result<()> {
        self.compiled
            .borrow_mut()
            .extend(descriptors.iter().map(|d| d.module_name.clone()));
        Ok(())
    }
}
