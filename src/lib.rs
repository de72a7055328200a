//! zapgen - ZAP assembly generation for the Z-machine
//!
//! This library provides the module and routine builders that lay out a
//! story file and write it as ZAP assembler source.
//! The `project` module drives them from a `zapgen.toml` manifest.

pub mod config;
pub mod emit;
pub mod project;

// Re-export commonly used types
pub use config::BuildConfig;
pub use emit::{EmitError, EmitResult, ModuleBuilder, Operand, RoutineBuilder};
