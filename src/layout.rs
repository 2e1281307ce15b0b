//! Project tree conventions for a bridge package.
//!
//! All paths the orchestrator reads or writes hang off a single project
//! root. The conventions are fixed: the orchestrator is bespoke to the
//! bridge package layout, not a general-purpose build tool.

use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

/// Name of the runtime package directory inside the project and inside
/// the build output.
pub const PACKAGE_NAME: &str = "bridge";

/// Basename of the key/value property source at the project root.
pub const PROPERTIES_BASENAME: &str = "bridge.properties";

/// JVM package namespace of the pipes component, as a relative path.
pub const PIPES_NAMESPACE: &str = "io/gantry/pipes";

/// Optional cache file holding a source-control revision, consulted before
/// asking the repository itself.
pub const REVISION_CACHE: &str = ".revision";

/// Fixed locations within a bridge project tree.
#[derive(Debug, Clone)]
pub struct Layout {
    root: PathBuf,
}

impl Layout {
    /// Create a layout rooted at `root`.
    ///
    /// The directory must look like a bridge project: the version file and
    /// the property source must both be present.
    pub fn discover(root: impl Into<PathBuf>) -> Result<Self> {
        let layout = Layout::at(root);
        if !layout.version_file().is_file() || !layout.properties_file().is_file() {
            bail!(
                "{} does not look like a bridge project (expected VERSION and {})",
                layout.root.display(),
                PROPERTIES_BASENAME
            );
        }
        Ok(layout)
    }

    /// Create a layout rooted at `root` without checking the tree.
    pub fn at(root: impl Into<PathBuf>) -> Self {
        Layout { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Literal version string, one line.
    pub fn version_file(&self) -> PathBuf {
        self.root.join("VERSION")
    }

    /// Key/value property source at the project root.
    pub fn properties_file(&self) -> PathBuf {
        self.root.join(PROPERTIES_BASENAME)
    }

    /// Cached source-control revision, if the tree was exported without one.
    pub fn revision_cache(&self) -> PathBuf {
        self.root.join(REVISION_CACHE)
    }

    /// Runtime package directory in the source tree.
    pub fn package_dir(&self) -> PathBuf {
        self.root.join(PACKAGE_NAME)
    }

    /// Generated version artifact.
    pub fn version_artifact(&self) -> PathBuf {
        self.package_dir().join("version.py")
    }

    /// Generated configuration artifact.
    pub fn config_artifact(&self) -> PathBuf {
        self.package_dir().join("config.py")
    }

    /// Copy of the property source shipped inside the runtime package.
    pub fn packaged_properties(&self) -> PathBuf {
        self.package_dir().join(PROPERTIES_BASENAME)
    }

    /// Sources of the codec extension module.
    pub fn codec_src_dir(&self) -> PathBuf {
        self.root.join("src/codec")
    }

    /// Sources of the filesystem-bridge extension module.
    pub fn fsbridge_src_dir(&self) -> PathBuf {
        self.root.join("src/fsbridge")
    }

    /// Generated feature-probe header for the filesystem bridge.
    pub fn fsbridge_config_header(&self) -> PathBuf {
        self.fsbridge_src_dir().join("config.h")
    }

    /// JVM sources of the pipes component.
    pub fn pipes_src_dir(&self) -> PathBuf {
        self.root.join("src/jvm").join(PIPES_NAMESPACE)
    }

    /// Extra JVM source compiled into the pipes component but living
    /// outside its package directory.
    pub fn extra_jvm_source(&self) -> PathBuf {
        self.root.join("src/jvm/io/gantry/PlainTextOutput.java")
    }

    /// Dependency archives staged next to the component archive.
    pub fn jvm_lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// Scratch directory, owned by the orchestrator for one build.
    pub fn scratch_dir(&self) -> PathBuf {
        self.root.join("build/tmp")
    }

    /// Build output directory; the packaged tree mirrors the runtime
    /// package under it.
    pub fn output_dir(&self) -> PathBuf {
        self.root.join("build/lib")
    }

    /// Auxiliary example trees with their own build recipes.
    pub fn demos_dir(&self) -> PathBuf {
        self.root.join("demos")
    }

    /// Fixed list of generated paths the `clean` command removes.
    pub fn garbage(&self) -> Vec<PathBuf> {
        vec![
            self.root.join("build"),
            self.root.join("dist"),
            self.config_artifact(),
            self.version_artifact(),
            self.packaged_properties(),
            self.demos_dir().join("avro/jvm/target"),
            self.demos_dir().join("avro/jvm/project/target"),
            self.demos_dir().join("avro/py/roundtrip"),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_discover_requires_project_markers() {
        let tmp = TempDir::new().unwrap();
        assert!(Layout::discover(tmp.path()).is_err());

        fs::write(tmp.path().join("VERSION"), "1.0.0\n").unwrap();
        fs::write(tmp.path().join(PROPERTIES_BASENAME), "k=v\n").unwrap();
        let layout = Layout::discover(tmp.path()).unwrap();

        assert_eq!(layout.version_artifact(), tmp.path().join("bridge/version.py"));
        assert_eq!(
            layout.packaged_properties(),
            tmp.path().join("bridge").join(PROPERTIES_BASENAME)
        );
    }
}
