//! Top-level sequential build pipeline.
//!
//! The orchestrator is the only component with authority to sequence the
//! others. The pipeline is strictly sequential: preconditions, artifact
//! generation, extension descriptors, extension build, scratch creation,
//! component builds, scratch removal. The scratch directory is removed
//! on every exit path out of the component phase, success or failure,
//! with the original failure re-surfaced afterwards.
//!
//! Inspection is split from execution: [`describe`] is cheap and never
//! loads or validates the toolchain, so `gantry plan` stays fast and
//! side-effect-free.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::artifact;
use crate::component::{self, ComponentBuilder, ComponentSpec};
use crate::error::{Error, Result};
use crate::extension::{self, ExtensionCompiler};
use crate::invoker::ToolInvoker;
use crate::layout::Layout;
use crate::toolchain::{BuildContext, DEFAULT_ARCHIVE_NAME, MIN_FRAMEWORK_MAJOR};
use crate::util::fs::{copy_file, ensure_dir, remove_path};

/// Pause before removing the scratch directory.
///
/// On networked filesystems, handles closed by the compiler may still be
/// held in the trees to be deleted; removing immediately makes the
/// removal flaky. Sleeping briefly first is a deliberate workaround; if
/// it is ever replaced, the replacement must retry on busy rather than
/// drop the wait.
const SCRATCH_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Cheap description of what a build would do.
///
/// Produced without loading the toolchain configuration.
#[derive(Debug, Serialize)]
pub struct BuildOutline {
    /// Generated artifact targets.
    pub artifacts: Vec<PathBuf>,

    /// Native extension modules that would be compiled.
    pub extension_modules: Vec<String>,

    /// Discovered component build units.
    pub components: Vec<ComponentSpec>,
}

/// Describe the build without validating the toolchain.
pub fn describe(layout: &Layout) -> Result<BuildOutline> {
    let components = component::discover(layout, DEFAULT_ARCHIVE_NAME, None)?;
    Ok(BuildOutline {
        artifacts: vec![layout.version_artifact(), layout.config_artifact()],
        extension_modules: vec!["codec".to_string(), "fsbridge".to_string()],
        components,
    })
}

/// Sequences the whole build.
pub struct Orchestrator<'a> {
    layout: &'a Layout,
    context: &'a BuildContext,
    extension_compiler: &'a dyn ExtensionCompiler,
    invoker: &'a dyn ToolInvoker,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        layout: &'a Layout,
        context: &'a BuildContext,
        extension_compiler: &'a dyn ExtensionCompiler,
        invoker: &'a dyn ToolInvoker,
    ) -> Self {
        Orchestrator {
            layout,
            context,
            extension_compiler,
            invoker,
        }
    }

    /// Run the build end to end.
    ///
    /// Precondition failures abort before any filesystem mutation.
    /// Failures after scratch creation still remove the scratch
    /// directory before propagating.
    pub fn execute(&self) -> Result<()> {
        self.check_preconditions()?;
        self.generate_artifacts()?;

        let descriptors = extension::describe_extensions(self.layout, self.context)?;
        self.extension_compiler
            .compile(&descriptors, &self.layout.output_dir())?;

        let scratch_dir = self.layout.scratch_dir();
        let output_dir = self.layout.output_dir();
        ensure_dir(&scratch_dir)?;
        ensure_dir(&output_dir)?;

        let result = self.build_components();

        // Unconditional cleanup of the protected region, then re-raise.
        std::thread::sleep(SCRATCH_SETTLE_DELAY);
        if let Err(err) = remove_path(&scratch_dir) {
            tracing::warn!("failed to remove {}: {err}", scratch_dir.display());
        }

        result?;
        tracing::info!("build finished");
        Ok(())
    }

    /// Reject configurations the pipes component cannot run on. Nothing
    /// is created before these checks pass.
    fn check_preconditions(&self) -> Result<()> {
        let version = &self.context.framework_version;
        if version.major() < MIN_FRAMEWORK_MAJOR {
            return Err(Error::UnsupportedPlatform(format!(
                "framework {} is not supported (requires major version {MIN_FRAMEWORK_MAJOR} or later)",
                version.raw()
            )));
        }
        if version.is_standalone() {
            return Err(Error::UnsupportedPlatform(
                "standalone framework mode is not supported".to_string(),
            ));
        }
        Ok(())
    }

    /// Generate the derived artifacts and ship the property source into
    /// the runtime package.
    fn generate_artifacts(&self) -> Result<()> {
        artifact::write_version(self.layout)?;
        artifact::write_config(self.layout)?;
        copy_file(
            &self.layout.properties_file(),
            &self.layout.packaged_properties(),
        )?;
        Ok(())
    }

    fn build_components(&self) -> Result<()> {
        tracing::info!("java home: {}", self.context.java_home.display());
        tracing::info!(
            "framework home: {}, version: {}",
            self.context.framework_home.display(),
            self.context.framework_version.raw()
        );

        let specs = component::discover(
            self.layout,
            &self.context.archive_name,
            self.context.classpath.as_deref(),
        )?;

        let builder = ComponentBuilder::new(self.invoker);
        for spec in &specs {
            builder.build(spec, &self.layout.scratch_dir(), &self.layout.output_dir())?;
        }
        Ok(())
    }
}
