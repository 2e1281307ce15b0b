//! Command implementations

pub mod build;
pub mod clean;
pub mod completions;
pub mod plan;
