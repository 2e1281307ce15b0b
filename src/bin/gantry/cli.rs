//! CLI definitions using clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;

/// Gantry - build orchestrator for mixed-runtime bridge packages
#[derive(Parser)]
#[command(name = "gantry")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the bridge package end to end
    Build(BuildArgs),

    /// Show what a build would generate, without touching the toolchain
    Plan(PlanArgs),

    /// Remove generated artifacts and clean demo trees
    Clean(CleanArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Args)]
pub struct BuildArgs {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub project_root: Option<PathBuf>,
}

#[derive(Args)]
pub struct PlanArgs {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub project_root: Option<PathBuf>,

    /// Emit the outline as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args)]
pub struct CleanArgs {
    /// Project root (defaults to the current directory)
    #[arg(long)]
    pub project_root: Option<PathBuf>,
}

#[derive(Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: Shell,
}
