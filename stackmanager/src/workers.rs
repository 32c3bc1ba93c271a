//! Registry of dynamically spawned worker processes
//!
//! Each task identifier maps to at most one supervisor. Bulk operations work
//! on a snapshot of the key set so that an entry removed mid-iteration is
//! simply skipped.

use std::collections::HashMap;
use std::time::Duration;

use crate::error::StackResult;
use crate::traits::ProcessControl;
use shared::{component_debug, component_warn, Component, TaskId};

/// Builds the supervisor for a newly registered task
pub type WorkerFactory<S> = Box<dyn Fn(TaskId) -> S + Send + Sync>;

/// Arguments a scripted worker is launched with
pub fn worker_args(pool: Option<&str>) -> Vec<String> {
    let mut args = vec!["-t".to_string(), "2".to_string()];
    if let Some(pool) = pool.filter(|pool| !pool.is_empty()) {
        args.push("--pool".to_string());
        args.push(pool.to_string());
    }
    args
}

pub struct WorkerTask<S> {
    pub supervisor: S,
    pub pool: Option<String>,
}

pub struct WorkerRegistry<S: ProcessControl> {
    workers: HashMap<TaskId, WorkerTask<S>>,
    factory: WorkerFactory<S>,
    stop_timeout: Duration,
}

impl<S: ProcessControl> WorkerRegistry<S> {
    pub fn new(factory: WorkerFactory<S>, stop_timeout: Duration) -> Self {
        Self {
            workers: HashMap::new(),
            factory,
            stop_timeout,
        }
    }

    /// Start the worker for `task_id`
    ///
    /// A known task is never duplicated: a live worker is left alone and a
    /// dead one is relaunched with its own stored arguments, ignoring `pool`.
    pub async fn spawn(&mut self, task_id: TaskId, pool: Option<String>) -> StackResult<Option<u32>> {
        if let Some(task) = self.workers.get_mut(&task_id) {
            if task.supervisor.is_running() {
                return Ok(task.supervisor.process_id());
            }
            component_debug!(Component::Worker(task_id), "🔁 Relaunching with stored arguments");
            return task.supervisor.restart().await;
        }

        let mut supervisor = (self.factory)(task_id);
        let process_id = supervisor.start(worker_args(pool.as_deref())).await?;
        self.workers.insert(task_id, WorkerTask { supervisor, pool });
        Ok(process_id)
    }

    /// Remove and stop a worker; returns whether it was registered
    pub async fn stop(&mut self, task_id: &TaskId) -> StackResult<bool> {
        let Some(mut task) = self.workers.remove(task_id) else {
            return Ok(false);
        };
        task.supervisor.stop(self.stop_timeout).await?;
        Ok(true)
    }

    /// Stop every worker but keep the entries for a later `start_all`
    pub async fn stop_all(&mut self) {
        for task_id in self.task_ids() {
            if let Some(task) = self.workers.get_mut(&task_id) {
                if let Err(e) = task.supervisor.stop(self.stop_timeout).await {
                    component_warn!(Component::Worker(task_id), "⚠️ Stop failed: {}", e);
                }
            }
        }
    }

    /// Relaunch every registered worker with its stored arguments
    pub async fn start_all(&mut self) -> usize {
        let mut started = 0;
        for task_id in self.task_ids() {
            let Some(task) = self.workers.get_mut(&task_id) else {
                continue;
            };
            if task.supervisor.is_running() {
                continue;
            }
            match task.supervisor.restart().await {
                Ok(_) => started += 1,
                Err(e) => component_warn!(Component::Worker(task_id), "⚠️ Restart failed: {}", e),
            }
        }
        started
    }

    /// Remove and stop every worker
    pub async fn remove_all(&mut self) {
        for task_id in self.task_ids() {
            if let Err(e) = self.stop(&task_id).await {
                component_warn!(Component::Worker(task_id), "⚠️ Stop failed: {}", e);
            }
        }
    }

    pub fn task_ids(&self) -> Vec<TaskId> {
        let mut ids: Vec<TaskId> = self.workers.keys().copied().collect();
        ids.sort();
        ids
    }

    pub fn get(&self, task_id: &TaskId) -> Option<&WorkerTask<S>> {
        self.workers.get(task_id)
    }

    pub fn contains(&self, task_id: &TaskId) -> bool {
        self.workers.contains_key(task_id)
    }

    pub fn len(&self) -> usize {
        self.workers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.workers.is_empty()
    }
}
