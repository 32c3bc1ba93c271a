//! Core shared types and identifiers

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::errors::SharedError;

/// Unique identifier for a scripted worker task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_string(s: &str) -> Result<Self, SharedError> {
        Uuid::parse_str(s.trim())
            .map(Self)
            .map_err(|_| SharedError::InvalidUuid { input: s.to_string() })
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl From<Uuid> for TaskId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

impl FromStr for TaskId {
    type Err = SharedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_string(s)
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Part of the launcher a log line or event originates from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Component {
    /// The launcher itself
    StackManager,
    /// Domain coordinator child process
    Coordinator,
    /// Worker-pool monitor child process
    Monitor,
    /// Scripted worker child process
    Worker(TaskId),
    /// Artifact verification and installation
    Artifacts,
    /// Coordinator identity resolution
    Identity,
    /// Release manifest polling
    ReleaseCheck,
}

impl fmt::Display for Component {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Component::StackManager => write!(f, "stackmanager"),
            Component::Coordinator => write!(f, "coordinator"),
            Component::Monitor => write!(f, "monitor"),
            Component::Worker(task_id) => write!(f, "worker:{task_id}"),
            Component::Artifacts => write!(f, "artifacts"),
            Component::Identity => write!(f, "identity"),
            Component::ReleaseCheck => write!(f, "release-check"),
        }
    }
}
