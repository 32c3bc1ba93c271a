//! Readiness of the artifacts the stack needs before it may start

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four on-disk components that gate stack startup
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Artifact {
    RuntimeBundle,
    WorkerExecutable,
    CoordinatorExecutable,
    CoordinatorResources,
}

impl Artifact {
    pub const ALL: [Artifact; 4] = [
        Artifact::RuntimeBundle,
        Artifact::WorkerExecutable,
        Artifact::CoordinatorExecutable,
        Artifact::CoordinatorResources,
    ];
}

impl fmt::Display for Artifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Artifact::RuntimeBundle => "runtime bundle",
            Artifact::WorkerExecutable => "worker executable",
            Artifact::CoordinatorExecutable => "coordinator executable",
            Artifact::CoordinatorResources => "coordinator resources",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ArtifactState {
    #[default]
    Unknown,
    Stale,
    Fresh,
}

/// Per-artifact freshness for one verification pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ReadinessState {
    pub runtime_bundle: ArtifactState,
    pub worker_executable: ArtifactState,
    pub coordinator_executable: ArtifactState,
    pub coordinator_resources: ArtifactState,
}

impl ReadinessState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, artifact: Artifact) -> ArtifactState {
        match artifact {
            Artifact::RuntimeBundle => self.runtime_bundle,
            Artifact::WorkerExecutable => self.worker_executable,
            Artifact::CoordinatorExecutable => self.coordinator_executable,
            Artifact::CoordinatorResources => self.coordinator_resources,
        }
    }

    pub fn set(&mut self, artifact: Artifact, state: ArtifactState) {
        let slot = match artifact {
            Artifact::RuntimeBundle => &mut self.runtime_bundle,
            Artifact::WorkerExecutable => &mut self.worker_executable,
            Artifact::CoordinatorExecutable => &mut self.coordinator_executable,
            Artifact::CoordinatorResources => &mut self.coordinator_resources,
        };
        *slot = state;
    }

    /// Record a verified checksum match or a completed install
    pub fn mark_fresh(&mut self, artifact: Artifact) {
        self.set(artifact, ArtifactState::Fresh);
    }

    pub fn mark_stale(&mut self, artifact: Artifact) {
        self.set(artifact, ArtifactState::Stale);
    }

    pub fn is_fresh(&self, artifact: Artifact) -> bool {
        self.get(artifact) == ArtifactState::Fresh
    }

    /// Take over fresh decisions from `other` without downgrading anything
    pub fn merge_fresh(&mut self, other: &ReadinessState) {
        for artifact in Artifact::ALL {
            if other.is_fresh(artifact) {
                self.mark_fresh(artifact);
            }
        }
    }

    /// True only when every artifact is fresh
    pub fn all_ready(&self) -> bool {
        Artifact::ALL.iter().all(|artifact| self.is_fresh(*artifact))
    }

    /// Artifacts that still need an install, in declaration order
    pub fn pending(&self) -> Vec<Artifact> {
        Artifact::ALL
            .iter()
            .copied()
            .filter(|artifact| !self.is_fresh(*artifact))
            .collect()
    }
}
