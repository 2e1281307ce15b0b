//! Descriptors for the native extension modules.
//!
//! Each builder is a pure function of static inputs plus the resolved
//! toolchain context, returning an immutable [`ExtensionDescriptor`].
//! The descriptors are consumed by an [`ExtensionCompiler`], which is a
//! black box to the orchestrator: it either installs the modules into
//! the output directory or fails the build.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Serialize;

use crate::error::{Error, Result};
use crate::layout::Layout;
use crate::toolchain::BuildContext;
use crate::util::fs::{ensure_dir, write_atomic};
use crate::util::ProcessBuilder;

/// Compile flag silencing string-literal conversion warnings in the
/// older extension sources.
const WRITE_STRINGS_COMPAT: &str = "-Wno-write-strings";

/// Immutable description of one native compiled module.
#[derive(Debug, Clone, Serialize)]
pub struct ExtensionDescriptor {
    pub module_name: String,
    pub sources: Vec<PathBuf>,
    pub include_dirs: Vec<PathBuf>,
    pub libraries: Vec<String>,
    pub library_dirs: Vec<PathBuf>,
    pub define_macros: Vec<(String, Option<String>)>,
    pub undef_macros: Vec<String>,
    pub compile_flags: Vec<String>,
    pub link_flags: Vec<String>,
}

/// Build the descriptor for the serialization codec module.
///
/// Sources are a fixed list; assertions stay enabled in the codec even
/// in optimized builds, so `NDEBUG` is explicitly undefined.
pub fn codec_descriptor(layout: &Layout) -> ExtensionDescriptor {
    let src_dir = layout.codec_src_dir();
    let sources = [
        "codecmodule.cc",
        "flow.cc",
        "command.cc",
        "serialization.cc",
        "serial_utils.cc",
        "string_utils.cc",
    ]
    .iter()
    .map(|name| src_dir.join(name))
    .collect();

    ExtensionDescriptor {
        module_name: "codec".to_string(),
        sources,
        include_dirs: Vec::new(),
        libraries: Vec::new(),
        library_dirs: Vec::new(),
        define_macros: Vec::new(),
        undef_macros: vec!["NDEBUG".to_string()],
        compile_flags: vec![WRITE_STRINGS_COMPAT.to_string(), "-O3".to_string()],
        link_flags: Vec::new(),
    }
}

/// Build the descriptor for the filesystem-bridge module.
///
/// Everything toolchain-shaped comes from the context: JNI include
/// directories, the JVM runtime library and its search paths, plus the
/// framework-supplied libraries and defines.
pub fn fsbridge_descriptor(layout: &Layout, ctx: &BuildContext) -> Result<ExtensionDescriptor> {
    let src_dir = layout.fsbridge_src_dir();
    let mut sources = Vec::new();
    for pattern in [
        src_dir.join("*.c"),
        src_dir.join("posix/*.c"),
        src_dir.join("ext/*.cc"),
    ] {
        sources.extend(glob_sources(&pattern)?);
    }

    let mut include_dirs = ctx.jvm_include_dirs();
    include_dirs.push(src_dir.clone());
    include_dirs.push(src_dir.join("posix"));

    Ok(ExtensionDescriptor {
        module_name: "fsbridge".to_string(),
        sources,
        include_dirs,
        libraries: ctx.libraries.clone(),
        library_dirs: ctx.jvm_library_dirs(),
        define_macros: ctx.defines.clone(),
        undef_macros: Vec::new(),
        compile_flags: vec![WRITE_STRINGS_COMPAT.to_string()],
        link_flags: vec![format!("-Wl,-rpath,{}", ctx.jvm_lib_dir.display())],
    })
}

fn glob_sources(pattern: &Path) -> Result<Vec<PathBuf>> {
    let pattern_str = pattern.to_string_lossy();
    let mut files: Vec<PathBuf> = glob::glob(&pattern_str)
        .with_context(|| format!("invalid glob pattern: {pattern_str}"))?
        .filter_map(|entry| entry.ok())
        .filter(|path| path.is_file())
        .collect();
    files.sort();
    Ok(files)
}

/// Write the feature-probe header consumed by the filesystem-bridge
/// sources.
///
/// The fast thread-local-storage path has no portable detection, so the
/// feature is left disabled until one exists. Keep it off.
pub fn write_feature_header(layout: &Layout) -> Result<()> {
    let header = layout.fsbridge_config_header();
    let contents = "\
#ifndef GANTRY_FSBRIDGE_CONFIG_H
#define GANTRY_FSBRIDGE_CONFIG_H

/* HAVE_FAST_TLS is left undefined: no portable probe exists. */

#endif
";
    write_atomic(&header, contents)?;
    Ok(())
}

/// Build both descriptors, writing the feature header first.
///
/// Order matters only for diagnostics: the codec is reported before the
/// filesystem bridge, matching the build log order.
pub fn describe_extensions(
    layout: &Layout,
    ctx: &BuildContext,
) -> Result<Vec<ExtensionDescriptor>> {
    write_feature_header(layout)?;
    Ok(vec![codec_descriptor(layout), fsbridge_descriptor(layout, ctx)?])
}

/// Native-compiler collaborator: consumes descriptors, installs modules
/// into the output directory, fails the build on any compile/link error.
pub trait ExtensionCompiler {
    fn compile(&self, descriptors: &[ExtensionDescriptor], out_dir: &Path) -> Result<()>;
}

/// System C/C++ compiler driver producing one shared object per module.
///
/// The driver is located lazily, at compile time, so constructing the
/// collaborator never fails: a build rejected by preconditions must not
/// require a compiler to be present.
#[derive(Debug, Default)]
pub struct SystemCompiler;

impl SystemCompiler {
    pub fn new() -> Self {
        SystemCompiler
    }
}

/// Locate a C++ driver: `CXX`, then the usual names on `PATH`.
fn find_cxx() -> anyhow::Result<PathBuf> {
    if let Ok(cxx) = std::env::var("CXX") {
        if let Ok(path) = which::which(&cxx) {
            return Ok(path);
        }
    }
    for candidate in ["c++", "g++", "clang++"] {
        if let Ok(path) = which::which(candidate) {
            return Ok(path);
        }
    }
    anyhow::bail!("no C++ compiler found; set CXX or install one")
}

impl ExtensionCompiler for SystemCompiler {
    fn compile(&self, descriptors: &[ExtensionDescriptor], out_dir: &Path) -> Result<()> {
        let cxx = find_cxx()?;
        let module_dir = out_dir.join(crate::layout::PACKAGE_NAME);
        ensure_dir(&module_dir)?;

        for desc in descriptors {
            let output = module_dir.join(format!("{}.so", desc.module_name));
            tracing::info!("compiling extension module {}", desc.module_name);

            let mut cmd = ProcessBuilder::new(&cxx)
                .args(["-shared", "-fPIC"])
                .args(&desc.compile_flags);
            for dir in &desc.include_dirs {
                cmd = cmd.arg("-I").arg(dir);
            }
            for (name, value) in &desc.define_macros {
                match value {
                    Some(v) => cmd = cmd.arg(format!("-D{name}={v}")),
                    None => cmd = cmd.arg(format!("-D{name}")),
                }
            }
            for name in &desc.undef_macros {
                cmd = cmd.arg(format!("-U{name}"));
            }
            cmd = cmd.args(&desc.sources);
            for dir in &desc.library_dirs {
                cmd = cmd.arg("-L").arg(dir);
            }
            for lib in &desc.libraries {
                cmd = cmd.arg(format!("-l{lib}"));
            }
            cmd = cmd.args(&desc.link_flags).arg("-o").arg(&output);

            let status = cmd.status()?;
            if !status.success() {
                return Err(Error::CommandFailed {
                    command: cmd.display_command(),
                    status: status.code(),
                });
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::{FrameworkSettings, JavaSettings, ToolchainConfig};
    use std::fs;
    use tempfile::TempDir;

    fn test_context() -> BuildContext {
        BuildContext::resolve(&ToolchainConfig {
            java: JavaSettings {
                home: Some(PathBuf::from("/opt/jdk")),
                ..Default::default()
            },
            framework: FrameworkSettings {
                home: Some(PathBuf::from("/opt/framework")),
                version: Some("3.3.6".to_string()),
                defines: vec!["HAS_FRAMEWORK".to_string()],
                ..Default::default()
            },
        })
        .unwrap()
    }

    #[test]
    fn test_codec_descriptor_keeps_assertions_on() {
        let layout = Layout::at("/project");
        let desc = codec_descriptor(&layout);

        assert_eq!(desc.module_name, "codec");
        assert_eq!(desc.sources.len(), 6);
        assert_eq!(desc.sources[0], PathBuf::from("/project/src/codec/codecmodule.cc"));
        assert!(desc.compile_flags.contains(&"-O3".to_string()));
        assert!(desc.compile_flags.contains(&WRITE_STRINGS_COMPAT.to_string()));
        assert_eq!(desc.undef_macros, vec!["NDEBUG".to_string()]);
    }

    #[test]
    fn test_fsbridge_descriptor_derives_from_context() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::at(tmp.path());
        let src = layout.fsbridge_src_dir();
        fs::create_dir_all(src.join("posix")).unwrap();
        fs::write(src.join("b_fs.c"), "").unwrap();
        fs::write(src.join("a_fs.c"), "").unwrap();
        fs::write(src.join("posix/mutex.c"), "").unwrap();

        let ctx = test_context();
        let desc = fsbridge_descriptor(&layout, &ctx).unwrap();

        // Globbed sources are sorted within each pattern
        assert_eq!(
            desc.sources,
            vec![
                src.join("a_fs.c"),
                src.join("b_fs.c"),
                src.join("posix/mutex.c"),
            ]
        );
        assert!(desc.include_dirs.contains(&PathBuf::from("/opt/jdk/include")));
        assert!(desc.include_dirs.contains(&src));
        assert_eq!(desc.libraries, vec!["jvm".to_string()]);
        assert!(desc
            .link_flags
            .iter()
            .any(|f| f.starts_with("-Wl,-rpath,") && f.contains("lib/server")));
        assert_eq!(
            desc.define_macros,
            vec![("HAS_FRAMEWORK".to_string(), None)]
        );
    }

    #[test]
    fn test_feature_header_leaves_flag_off() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::at(tmp.path());

        write_feature_header(&layout).unwrap();
        let contents = fs::read_to_string(layout.fsbridge_config_header()).unwrap();

        assert!(contents.contains("#ifndef GANTRY_FSBRIDGE_CONFIG_H"));
        assert!(!contents.contains("#define HAVE_FAST_TLS"));
    }

    #[test]
    fn test_describe_extensions_orders_codec_first() {
        let tmp = TempDir::new().unwrap();
        let layout = Layout::at(tmp.path());

        let descriptors = describe_extensions(&layout, &test_context()).unwrap();
        let names: Vec<&str> = descriptors.iter().map(|d| d.module_name.as_str()).collect();
        assert_eq!(names, vec!["codec", "fsbridge"]);
        assert!(layout.fsbridge_config_header().is_file());
    }
}
