//! Coordinator, monitor and worker lifecycle as one stack

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::{RetryPolicy, StackConfig};
use crate::error::{StackError, StackResult};
use crate::events::StackEvent;
use crate::identity_resolver::IdentityResolver;
use crate::traits::{HttpClient, ProcessControl};
use crate::workers::WorkerRegistry;
use shared::{component_debug, component_error, component_info, Component, TaskId};

/// Arguments the monitor is launched with
pub fn monitor_args(pool_size: u32) -> Vec<String> {
    vec!["-n".to_string(), pool_size.to_string()]
}

pub struct StackController<S: ProcessControl, H: HttpClient> {
    coordinator: S,
    monitor: S,
    workers: WorkerRegistry<S>,
    identity: Arc<IdentityResolver<H>>,
    events: broadcast::Sender<StackEvent>,
    pool_size: u32,
    stop_timeout: Duration,
    retry: RetryPolicy,
    running: bool,
    identity_task: Option<JoinHandle<()>>,
}

impl<S, H> StackController<S, H>
where
    S: ProcessControl,
    H: HttpClient + 'static,
{
    pub fn new(
        coordinator: S,
        monitor: S,
        workers: WorkerRegistry<S>,
        identity: Arc<IdentityResolver<H>>,
        events: broadcast::Sender<StackEvent>,
        config: &StackConfig,
    ) -> Self {
        Self {
            coordinator,
            monitor,
            workers,
            identity,
            events,
            pool_size: config.monitor_pool_size,
            stop_timeout: config.stop_timeout,
            retry: config.identity_retry,
            running: false,
            identity_task: None,
        }
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn identity(&self) -> &Arc<IdentityResolver<H>> {
        &self.identity
    }

    pub fn workers(&self) -> &WorkerRegistry<S> {
        &self.workers
    }

    /// Start or stop coordinator, monitor and workers, in that order
    ///
    /// Every step is attempted even if an earlier one fails; the first
    /// failure is returned after observers have been told the new state.
    pub async fn toggle(&mut self, start: bool) -> StackResult<()> {
        let result = if start { self.start_all().await } else { self.stop_all().await };

        self.running = start;
        component_info!(
            Component::StackManager,
            "{} Stack {}",
            if start { "▶️" } else { "⏹️" },
            if start { "started" } else { "stopped" }
        );
        let _ = self.events.send(StackEvent::StackStateChanged { running: start });
        result
    }

    async fn start_all(&mut self) -> StackResult<()> {
        let mut first_error: Option<StackError> = None;

        match self.coordinator.start(Vec::new()).await {
            Ok(_) => self.schedule_identity_resolution().await,
            Err(e) => {
                component_error!(Component::Coordinator, "❌ Failed to start: {}", e);
                first_error.get_or_insert(e);
            }
        }

        if let Err(e) = self.monitor.start(monitor_args(self.pool_size)).await {
            component_error!(Component::Monitor, "❌ Failed to start: {}", e);
            first_error.get_or_insert(e);
        }

        let relaunched = self.workers.start_all().await;
        if relaunched > 0 {
            component_debug!(Component::StackManager, "Relaunched {} workers", relaunched);
        }

        first_error.map_or(Ok(()), Err)
    }

    async fn stop_all(&mut self) -> StackResult<()> {
        let mut first_error: Option<StackError> = None;

        if let Err(e) = self.coordinator.stop(self.stop_timeout).await {
            component_error!(Component::Coordinator, "❌ Failed to stop: {}", e);
            first_error.get_or_insert(e);
        }
        if let Err(e) = self.monitor.stop(self.stop_timeout).await {
            component_error!(Component::Monitor, "❌ Failed to stop: {}", e);
            first_error.get_or_insert(e);
        }
        self.workers.stop_all().await;

        first_error.map_or(Ok(()), Err)
    }

    /// Start (with the configured pool size) or stop only the monitor
    pub async fn toggle_monitor(&mut self, start: bool) -> StackResult<()> {
        if start {
            self.monitor.start(monitor_args(self.pool_size)).await.map(|_| ())
        } else {
            self.monitor.stop(self.stop_timeout).await
        }
    }

    pub async fn spawn_worker(&mut self, task_id: TaskId, pool: Option<String>) -> StackResult<Option<u32>> {
        let process_id = self.workers.spawn(task_id, pool).await?;
        let _ = self.events.send(StackEvent::WorkerStarted { task_id, process_id });
        Ok(process_id)
    }

    pub async fn stop_worker(&mut self, task_id: &TaskId) -> StackResult<bool> {
        let removed = self.workers.stop(task_id).await?;
        if removed {
            let _ = self.events.send(StackEvent::WorkerStopped { task_id: *task_id });
        }
        Ok(removed)
    }

    /// Ask the resolver for the coordinator identity unless one is known
    ///
    /// The request runs in the background with bounded retry so a slow
    /// coordinator listener does not fail the first attempt.
    async fn schedule_identity_resolution(&mut self) {
        if self.identity_task.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }
        if !self.identity.needs_resolution().await {
            return;
        }

        let identity = self.identity.clone();
        let retry = self.retry;
        self.identity_task = Some(tokio::spawn(async move {
            if let Err(e) = identity.resolve_with_retry(retry).await {
                component_debug!(Component::Identity, "Identity resolution ended: {}", e);
            }
        }));
    }

    /// Stop everything and forget every worker
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.identity_task.take() {
            task.abort();
        }
        if let Err(e) = self.toggle(false).await {
            component_error!(Component::StackManager, "❌ Error while stopping stack: {}", e);
        }
        self.workers.remove_all().await;
    }
}
