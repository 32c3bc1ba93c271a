//! Commands into and events out of the stack manager loop

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;

use crate::core::Artifact;
use crate::error::StackResult;
use shared::TaskId;

/// Notifications for whatever presents the stack to the user
#[derive(Debug, Clone, PartialEq)]
pub enum StackEvent {
    StackStateChanged { running: bool },
    /// The worker checksum could not be fetched; verification was abandoned
    NetworkUnavailable,
    DownloadStarted { artifact: Artifact },
    DownloadFinished { artifact: Artifact, success: bool },
    RequirementsReady { checked_at: DateTime<Utc> },
    AddressChanged { address: String },
    IdentityMissing,
    CoordinatorUnreachable,
    UpdateAvailable { version: u64, download_url: String },
    ContentSetInstalled { success: bool },
    IndexPathChanged { success: bool },
    WorkerStarted { task_id: TaskId, process_id: Option<u32> },
    WorkerStopped { task_id: TaskId },
}

/// Requests handled on the stack manager loop
#[derive(Debug)]
pub enum StackCommand {
    StartStack,
    StopStack,
    StartWorker {
        task_id: Option<TaskId>,
        pool: Option<String>,
        reply: oneshot::Sender<StackResult<(TaskId, Option<u32>)>>,
    },
    StopWorker { task_id: TaskId },
    ResolveIdentity,
    InstallContentSet { url: String },
    ChangeIndexPath { path: String },
    /// Re-run artifact verification, e.g. after the network comes back
    Recheck,
    Shutdown,
}
