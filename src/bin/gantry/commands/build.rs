//! `gantry build` command

use anyhow::Result;

use crate::cli::BuildArgs;
use gantry::invoker::JdkInvoker;
use gantry::{BuildContext, Layout, Orchestrator, SystemCompiler};

pub fn execute(args: BuildArgs) -> Result<()> {
    let root = match args.project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let layout = Layout::discover(root)?;

    // The validating half of the two-phase contract: only `build`
    // resolves the toolchain.
    let context = BuildContext::for_project(&layout)?;

    let extension_compiler = SystemCompiler::new();
    let invoker = JdkInvoker::new(&context.java_home);

    Orchestrator::new(&layout, &context, &extension_compiler, &invoker).execute()?;

    eprintln!(
        "    Finished bridge package -> {}",
        layout.output_dir().display()
    );
    Ok(())
}
