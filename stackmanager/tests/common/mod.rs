//! Common test utilities and infrastructure
//!
//! Shared fixtures, a fake remote side and a builder that assembles a
//! `StackManager` from mocks.
#![allow(dead_code)]

pub mod fixtures;
pub mod helpers;

// Re-export commonly used items for convenience
pub use fixtures::TestFixtures;
pub use helpers::{FakeRemote, ProcessProbe, StackManagerBuilder, TestHelpers};
