//! `gantry clean` command

use anyhow::Result;

use crate::cli::CleanArgs;
use gantry::cleanup;
use gantry::Layout;

pub fn execute(args: CleanArgs) -> Result<()> {
    let root = match args.project_root {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let layout = Layout::at(root);

    let report = cleanup::clean(&layout);

    for path in &report.removed {
        eprintln!("     Removed {}", path.display());
    }
    for failure in &report.failures {
        eprintln!(
            "     warning: {}: {}",
            failure.path.display(),
            failure.message
        );
    }

    // Best effort only: failures were reported above but never fail the
    // command.
    Ok(())
}
