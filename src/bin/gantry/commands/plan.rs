//! `gantry plan` command
//!
//! The cheap half of the two-phase contract: inspects the project tree
//! and prints what a build would do, without loading or validating the
//! toolchain.

use anyhow::Result;

use crate::cli::PlanArgs;
use gantry::{describe, Layout};

pub fn execute(args: PlanArgs) -> Result<()> {
    let root = match args.project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let layout = Layout::discover(root)?;

    let outline = describe(&layout)?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&outline)?);
        return Ok(());
    }

    println!("artifacts:");
    for artifact in &outline.artifacts {
        println!("  {}", artifact.display());
    }
    println!("extension modules:");
    for module in &outline.extension_modules {
        println!("  {module}");
    }
    for component in &outline.components {
        println!("component {}:", component.archive_name);
        println!("  {} source file(s)", component.source_files.len());
        println!("  {} dependency archive(s)", component.dependency_archives.len());
    }

    Ok(())
}
