//! Shared types for the stack launcher
//!
//! Contains the identifiers and logging helpers used by every part of the
//! launcher, so log lines from child processes and the stack manager carry
//! the same component tagging.

pub mod errors;
pub mod logging;
pub mod types;

pub use errors::*;
pub use types::*;
