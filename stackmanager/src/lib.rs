//! Stack manager library for supervising a local coordinator stack
//!
//! This library keeps a coordinator, a worker monitor and any number of
//! scripted workers running, after making sure the artifacts they need are
//! installed and current. Every outside interaction goes through the traits
//! in [`traits`] so the orchestration logic can be tested against mocks.

pub mod artifacts;
pub mod config;
pub mod content_set;
pub mod controller;
pub mod core;
pub mod error;
pub mod events;
pub mod identity_resolver;
pub mod release_check;
pub mod services;
pub mod stack_manager;
pub mod traits;
pub mod workers;

// Re-export commonly used types
pub use artifacts::{ArtifactVerifier, VerificationOutcome};
pub use config::{ArtifactSpec, DirectoryStatus, InstallKind, RetryPolicy, StackConfig};
pub use controller::StackController;
pub use core::{Artifact, ArtifactState, CoordinatorIdentity, IdentityPhase, Manifest, Platform, ReadinessState, VersionRecord};
pub use error::{StackError, StackResult};
pub use events::{StackCommand, StackEvent};
pub use identity_resolver::IdentityResolver;
pub use release_check::ReleaseCheckPoller;
pub use stack_manager::{StackManager, StackProcesses};
pub use traits::{ArtifactStore, Downloader, HttpClient, ProcessControl};
pub use workers::{WorkerFactory, WorkerRegistry};
