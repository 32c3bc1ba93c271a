//! Core launcher logic
//!
//! Pure decision logic with no I/O: checksum comparison, artifact readiness,
//! release manifest parsing and the coordinator identity state machine.

pub mod checksum;
pub mod identity;
pub mod manifest;
pub mod platform;
pub mod readiness;

pub use identity::{CoordinatorIdentity, IdentityPhase};
pub use manifest::{Manifest, VersionRecord};
pub use platform::Platform;
pub use readiness::{Artifact, ArtifactState, ReadinessState};
