//! Injected toolchain configuration and the resolved build context.
//!
//! Discovery of JDK and framework install locations is not this crate's
//! job: locations arrive pre-resolved through configuration files and
//! environment variables, and are only validated when a build actually
//! runs. `gantry plan` and `gantry clean` never touch this module.
//!
//! Configuration is layered like the rest of the gantry config surface:
//! global (`~/.config/gantry/toolchain.toml`), then project
//! (`.gantry/toolchain.toml`), then environment variables, later layers
//! winning field by field.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::layout::Layout;
use crate::util::fs::read_to_string;

/// Oldest framework major version the pipes component supports.
pub const MIN_FRAMEWORK_MAJOR: u32 = 2;

/// Default name of the packaged component archive.
pub const DEFAULT_ARCHIVE_NAME: &str = "gantry-pipes.jar";

/// On-disk toolchain configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolchainConfig {
    pub java: JavaSettings,
    pub framework: FrameworkSettings,
}

/// JDK settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct JavaSettings {
    /// JDK install root (`JAVA_HOME`).
    pub home: Option<PathBuf>,

    /// Directory holding the JVM runtime library. Defaults to
    /// `<home>/lib/server`.
    pub jvm_lib_dir: Option<PathBuf>,

    /// Basename of the JVM runtime library. Defaults to `jvm`.
    pub jvm_lib_name: Option<String>,
}

/// Host framework settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FrameworkSettings {
    /// Framework install root.
    pub home: Option<PathBuf>,

    /// Framework version string, e.g. `3.3.6` or `2.10.1-vendor-2`.
    pub version: Option<String>,

    /// Whether the framework runs in standalone (single-process) mode.
    pub standalone: bool,

    /// Pre-computed compile classpath for the pipes component.
    pub classpath: Option<String>,

    /// Name of the packaged component archive.
    pub archive_name: Option<String>,

    /// Extra platform libraries linked into the filesystem bridge.
    pub libraries: Vec<String>,

    /// Preprocessor defines for the filesystem bridge, `NAME` or
    /// `NAME=VALUE`.
    pub defines: Vec<String>,
}

impl ToolchainConfig {
    /// Load a config file. A missing file is an empty config.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Ok(ToolchainConfig::default());
        }
        let contents = read_to_string(path)?;
        toml::from_str(&contents)
            .with_context(|| format!("invalid toolchain config: {}", path.display()))
    }

    /// Overlay `other` on top of `self`, field by field.
    fn merge(mut self, other: ToolchainConfig) -> Self {
        let ToolchainConfig { java, framework } = other;
        if java.home.is_some() {
            self.java.home = java.home;
        }
        if java.jvm_lib_dir.is_some() {
            self.java.jvm_lib_dir = java.jvm_lib_dir;
        }
        if java.jvm_lib_name.is_some() {
            self.java.jvm_lib_name = java.jvm_lib_name;
        }
        if framework.home.is_some() {
            self.framework.home = framework.home;
        }
        if framework.version.is_some() {
            self.framework.version = framework.version;
        }
        if framework.standalone {
            self.framework.standalone = true;
        }
        if framework.classpath.is_some() {
            self.framework.classpath = framework.classpath;
        }
        if framework.archive_name.is_some() {
            self.framework.archive_name = framework.archive_name;
        }
        if !framework.libraries.is_empty() {
            self.framework.libraries = framework.libraries;
        }
        if !framework.defines.is_empty() {
            self.framework.defines = framework.defines;
        }
        self
    }

    /// Apply environment variable overrides.
    fn with_env(mut self) -> Self {
        if let Ok(home) = std::env::var("JAVA_HOME") {
            self.java.home = Some(PathBuf::from(home));
        }
        if let Ok(home) = std::env::var("GANTRY_FRAMEWORK_HOME") {
            self.framework.home = Some(PathBuf::from(home));
        }
        if let Ok(version) = std::env::var("GANTRY_FRAMEWORK_VERSION") {
            self.framework.version = Some(version);
        }
        self
    }
}

/// Path of the global toolchain config, if a config dir exists.
pub fn global_config_path() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", "gantry")
        .map(|dirs| dirs.config_dir().join("toolchain.toml"))
}

/// Path of the project toolchain config.
pub fn project_config_path(layout: &Layout) -> PathBuf {
    layout.root().join(".gantry/toolchain.toml")
}

/// Framework version information with a comparable numeric tuple.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionInfo {
    raw: String,
    tuple: Vec<u32>,
    standalone: bool,
}

static VERSION_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)*)").expect("version regex"));

impl VersionInfo {
    /// Parse a version string such as `3.3.6` or `2.10.1-vendor-2`.
    ///
    /// Only the leading dotted numeric prefix participates in ordering;
    /// vendor suffixes are kept in the raw string for display.
    pub fn parse(raw: &str, standalone: bool) -> Result<Self> {
        let raw = raw.trim();
        let m = VERSION_PREFIX
            .find(raw)
            .with_context(|| format!("unparseable framework version: {raw:?}"))?;
        let tuple = m
            .as_str()
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(VersionInfo {
            raw: raw.to_string(),
            tuple,
            standalone,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn major(&self) -> u32 {
        self.tuple.first().copied().unwrap_or(0)
    }

    pub fn tuple(&self) -> &[u32] {
        &self.tuple
    }

    /// True when the framework runs in standalone (single-process) mode,
    /// which the pipes component cannot host.
    pub fn is_standalone(&self) -> bool {
        self.standalone
    }
}

/// Fully resolved toolchain locations for one build.
///
/// Read-only for the lifetime of the build: nothing mutates these paths
/// after resolution.
#[derive(Debug, Clone)]
pub struct BuildContext {
    pub java_home: PathBuf,
    pub jvm_lib_dir: PathBuf,
    pub jvm_lib_name: String,
    pub framework_home: PathBuf,
    pub framework_version: VersionInfo,
    pub classpath: Option<String>,
    pub archive_name: String,
    pub libraries: Vec<String>,
    pub defines: Vec<(String, Option<String>)>,
}

impl BuildContext {
    /// Resolve a context from layered configuration.
    ///
    /// This is the validating half of the two-phase contract: anything
    /// that only inspects the project must not call it.
    pub fn resolve(config: &ToolchainConfig) -> Result<Self> {
        let java_home = config
            .java
            .home
            .clone()
            .context("java.home is not configured (set JAVA_HOME or .gantry/toolchain.toml)")?;
        let framework_home = config.framework.home.clone().context(
            "framework.home is not configured (set GANTRY_FRAMEWORK_HOME or .gantry/toolchain.toml)",
        )?;
        let version_raw = config
            .framework
            .version
            .clone()
            .context("framework.version is not configured")?;
        let framework_version = VersionInfo::parse(&version_raw, config.framework.standalone)?;

        let jvm_lib_dir = config
            .java
            .jvm_lib_dir
            .clone()
            .unwrap_or_else(|| java_home.join("lib/server"));
        let jvm_lib_name = config
            .java
            .jvm_lib_name
            .clone()
            .unwrap_or_else(|| "jvm".to_string());
        let archive_name = config
            .framework
            .archive_name
            .clone()
            .unwrap_or_else(|| DEFAULT_ARCHIVE_NAME.to_string());

        let mut libraries = config.framework.libraries.clone();
        if !libraries.iter().any(|l| l == &jvm_lib_name) {
            libraries.push(jvm_lib_name.clone());
        }

        let defines = config
            .framework
            .defines
            .iter()
            .map(|d| parse_define(d))
            .collect();

        Ok(BuildContext {
            java_home,
            jvm_lib_dir,
            jvm_lib_name,
            framework_home,
            framework_version,
            classpath: config.framework.classpath.clone(),
            archive_name,
            libraries,
            defines,
        })
    }

    /// Load and resolve the context for a project: global config, project
    /// config, then environment overrides.
    pub fn for_project(layout: &Layout) -> Result<Self> {
        let mut config = match global_config_path() {
            Some(path) => ToolchainConfig::load(&path)?,
            None => ToolchainConfig::default(),
        };
        config = config.merge(ToolchainConfig::load(&project_config_path(layout))?);
        BuildContext::resolve(&config.with_env())
    }

    /// JNI include directories under the JDK root.
    pub fn jvm_include_dirs(&self) -> Vec<PathBuf> {
        let include = self.java_home.join("include");
        let platform = include.join(platform_include_subdir());
        vec![include, platform]
    }

    /// Directories searched for the JVM runtime library at link time.
    pub fn jvm_library_dirs(&self) -> Vec<PathBuf> {
        vec![self.java_home.join("Libraries"), self.jvm_lib_dir.clone()]
    }
}

/// Split a `NAME` or `NAME=VALUE` define into its parts.
fn parse_define(spec: &str) -> (String, Option<String>) {
    match spec.split_once('=') {
        Some((name, value)) => (name.to_string(), Some(value.to_string())),
        None => (spec.to_string(), None),
    }
}

fn platform_include_subdir() -> &'static str {
    if cfg!(target_os = "macos") {
        "darwin"
    } else if cfg!(target_os = "windows") {
        "win32"
    } else {
        "linux"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn context_from(config: ToolchainConfig) -> BuildContext {
        BuildContext::resolve(&config).unwrap()
    }

    fn minimal_config() -> ToolchainConfig {
        ToolchainConfig {
            java: JavaSettings {
                home: Some(PathBuf::from("/opt/jdk")),
                ..Default::default()
            },
            framework: FrameworkSettings {
                home: Some(PathBuf::from("/opt/framework")),
                version: Some("3.3.6".to_string()),
                ..Default::default()
            },
        }
    }

    #[test]
    fn test_version_tuple_parsing() {
        let v = VersionInfo::parse("3.3.6", false).unwrap();
        assert_eq!(v.tuple(), &[3, 3, 6]);
        assert_eq!(v.major(), 3);

        let v = VersionInfo::parse("2.10.1-vendor-2", false).unwrap();
        assert_eq!(v.tuple(), &[2, 10, 1]);
        assert_eq!(v.raw(), "2.10.1-vendor-2");

        assert!(VersionInfo::parse("snapshot", false).is_err());
    }

    #[test]
    fn test_resolve_fills_defaults() {
        let ctx = context_from(minimal_config());

        assert_eq!(ctx.jvm_lib_dir, PathBuf::from("/opt/jdk/lib/server"));
        assert_eq!(ctx.jvm_lib_name, "jvm");
        assert_eq!(ctx.archive_name, DEFAULT_ARCHIVE_NAME);
        // The JVM runtime library is always linked
        assert_eq!(ctx.libraries, vec!["jvm".to_string()]);
        assert!(!ctx.framework_version.is_standalone());
    }

    #[test]
    fn test_resolve_requires_java_home() {
        let mut config = minimal_config();
        config.java.home = None;
        let err = BuildContext::resolve(&config).unwrap_err();
        assert!(err.to_string().contains("java.home"));
    }

    #[test]
    fn test_defines_parse_optional_values() {
        let mut config = minimal_config();
        config.framework.defines =
            vec!["HAS_FRAMEWORK".to_string(), "BRIDGE_API=2".to_string()];
        let ctx = context_from(config);

        assert_eq!(
            ctx.defines,
            vec![
                ("HAS_FRAMEWORK".to_string(), None),
                ("BRIDGE_API".to_string(), Some("2".to_string())),
            ]
        );
    }

    #[test]
    fn test_project_config_overrides_global() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("toolchain.toml");
        fs::write(
            &path,
            r#"
[java]
home = "/opt/project-jdk"

[framework]
version = "2.7"
standalone = true
"#,
        )
        .unwrap();

        let global = minimal_config();
        let project = ToolchainConfig::load(&path).unwrap();
        let merged = global.merge(project);

        assert_eq!(merged.java.home, Some(PathBuf::from("/opt/project-jdk")));
        assert_eq!(merged.framework.version, Some("2.7".to_string()));
        assert_eq!(
            merged.framework.home,
            Some(PathBuf::from("/opt/framework"))
        );
        assert!(merged.framework.standalone);
    }

    #[test]
    fn test_missing_config_file_is_empty() {
        let tmp = TempDir::new().unwrap();
        let config = ToolchainConfig::load(&tmp.path().join("nope.toml")).unwrap();
        assert!(config.java.home.is_none());
    }
}
