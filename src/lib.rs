//! Arbor markup compiler
//!
//! Compiles data-binding-aware `.vhtml` markup into typed control trees,
//! either materialized immediately (interpreted mode) or lowered into
//! builder routines that can be stored and executed later (compiled mode).
//!
//! # Example
//!
//! ```no_run
//! use arbor::{compile_str, metadata::RegistryBuilder, Result};
//!
//! fn main() -> Result<()> {
//!     let registry = RegistryBuilder::new().build();
//!     let view = compile_str(r#"<span>{{value: Title}}</span>"#, &registry)?;
//!     println!("{} controls", view.control_count());
//!     Ok(())
//! }
//! ```

#![doc(html_root_url = "https://docs.rs/arbor")]
#![warn(rust_2018_idioms)]

// Compilation phases
pub mod compiler;
pub mod emit;
pub mod metadata;
pub mod parser;
pub mod resolver;
pub mod tokenizer;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

use tracing::debug;

use crate::compiler::CompileError;
use crate::emit::interpreted::ControlInstance;
use crate::metadata::ControlRegistry;

/// Compiler version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Compiler name
pub const NAME: &str = "Arbor";

/// File extension of markup files
pub const MARKUP_EXTENSION: &str = "vhtml";

/// Compile a markup string and materialize its instance graph in one call.
/// Hosts that serve files and want caching use [`compiler::MarkupCompiler`]
/// instead.
pub fn compile_str(
    source: &str,
    registry: &ControlRegistry,
) -> Result<ControlInstance, CompileError> {
    debug!(bytes = source.len(), "compiling markup string");
    compiler::instantiate_source(source, registry, "<string>")
}
