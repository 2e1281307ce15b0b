//! Gantry - build orchestrator for mixed-runtime bridge packages
//!
//! This crate provides the core library functionality for Gantry:
//! incremental artifact generation, native extension descriptors, and
//! the compile/package pipeline for the JVM pipes component.

pub mod artifact;
pub mod cleanup;
pub mod component;
pub mod error;
pub mod extension;
pub mod invoker;
pub mod layout;
pub mod orchestrator;
pub mod toolchain;
pub mod util;

/// Test doubles for Gantry unit tests.
///
/// This module is only available when compiling with `--cfg test` or
/// running tests. It provides recording fakes for the external
/// toolchain seams.
#[cfg(test)]
pub mod test_support;

pub use component::{ComponentBuilder, ComponentSpec};
pub use error::Error;
pub use extension::{ExtensionCompiler, ExtensionDescriptor, SystemCompiler};
pub use invoker::{JdkInvoker, ToolInvoker};
pub use layout::Layout;
pub use orchestrator::{describe, BuildOutline, Orchestrator};
pub use toolchain::BuildContext;
