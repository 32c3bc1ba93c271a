//! Real process supervision service implementation
//!
//! Owns one named child process: launching it, remembering the arguments it
//! was launched with, and tearing it down with a bounded two-phase stop.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::{Child, Command};
use tokio::sync::broadcast;

use crate::error::{StackError, StackResult};
use crate::services::process_output::{configure_child_stdio, spawn_output_consumers, OutputLine};
use crate::traits::{ProcessControl, ProcessState};
use shared::{component_debug, component_info, component_warn, Component};

const OUTPUT_CAPACITY: usize = 1024;

/// Supervisor for a single child executable
pub struct ProcessSupervisor {
    name: String,
    component: Component,
    program: PathBuf,
    working_dir: Option<PathBuf>,
    log_dir: Option<PathBuf>,
    last_args: Vec<String>,
    child: Option<Child>,
    process_id: Option<u32>,
    state: ProcessState,
    output: broadcast::Sender<OutputLine>,
}

impl ProcessSupervisor {
    pub fn new(name: impl Into<String>, component: Component, program: impl Into<PathBuf>) -> Self {
        let (output, _) = broadcast::channel(OUTPUT_CAPACITY);
        Self {
            name: name.into(),
            component,
            program: program.into(),
            working_dir: None,
            log_dir: None,
            last_args: Vec::new(),
            child: None,
            process_id: None,
            state: ProcessState::NotStarted,
            output,
        }
    }

    /// Configure working directory (fluent API)
    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    /// Append child output to `<dir>/<name>.log` (fluent API)
    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Attach a sink to the child's output
    pub fn subscribe(&self) -> broadcast::Receiver<OutputLine> {
        self.output.subscribe()
    }

    fn spawn_child(&mut self, args: Vec<String>) -> StackResult<Option<u32>> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&args).kill_on_drop(true);
        if let Some(dir) = &self.working_dir {
            cmd.current_dir(dir);
        }
        configure_child_stdio(&mut cmd);

        let mut child = cmd.spawn().map_err(|source| StackError::ProcessSpawn {
            name: self.name.clone(),
            source,
        })?;

        let log_file = self.log_dir.as_ref().map(|dir| dir.join(format!("{}.log", self.name)));
        spawn_output_consumers(&mut child, self.component, &self.name, self.output.clone(), log_file);

        self.process_id = child.id();
        self.child = Some(child);
        self.last_args = args;
        self.state = ProcessState::Running;

        component_info!(
            self.component,
            "🚀 Started {} (PID: {}) with {:?}",
            self.name,
            self.process_id.map(|pid| pid.to_string()).unwrap_or_else(|| "?".to_string()),
            self.last_args
        );
        Ok(self.process_id)
    }

    fn mark_exited(&mut self) {
        self.child = None;
        self.process_id = None;
        if self.state != ProcessState::NotStarted {
            self.state = ProcessState::Stopped;
        }
    }
}

/// Send the graceful stop request
#[cfg(unix)]
fn request_exit(name: &str, child: &mut Child) -> StackResult<()> {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    let Some(pid) = child.id() else {
        return Ok(());
    };
    match signal::kill(Pid::from_raw(pid as i32), Signal::SIGTERM) {
        Ok(()) | Err(nix::errno::Errno::ESRCH) => Ok(()),
        Err(e) => Err(StackError::ProcessSignal {
            name: name.to_string(),
            message: e.to_string(),
        }),
    }
}

/// Without signals the only request we can make is a kill
#[cfg(not(unix))]
fn request_exit(name: &str, child: &mut Child) -> StackResult<()> {
    child.start_kill().map_err(|e| StackError::ProcessSignal {
        name: name.to_string(),
        message: e.to_string(),
    })
}

#[async_trait]
impl ProcessControl for ProcessSupervisor {
    fn name(&self) -> String {
        self.name.clone()
    }

    async fn start(&mut self, args: Vec<String>) -> StackResult<Option<u32>> {
        if self.is_running() {
            component_debug!(self.component, "{} already running, start ignored", self.name);
            return Ok(self.process_id);
        }
        self.spawn_child(args)
    }

    async fn restart(&mut self) -> StackResult<Option<u32>> {
        let args = self.last_args.clone();
        self.start(args).await
    }

    fn terminate(&mut self) -> StackResult<()> {
        let Some(child) = self.child.as_mut() else {
            return Ok(());
        };
        request_exit(&self.name, child)?;
        self.state = ProcessState::Stopping;
        Ok(())
    }

    async fn stop(&mut self, timeout: Duration) -> StackResult<()> {
        if !self.is_running() {
            return Ok(());
        }

        if let Err(e) = self.terminate() {
            component_warn!(self.component, "⚠️ {}; killing {}", e, self.name);
        }

        let name = self.name.clone();
        let component = self.component;
        if let Some(child) = self.child.as_mut() {
            match tokio::time::timeout(timeout, child.wait()).await {
                Ok(Ok(status)) => {
                    component_info!(component, "🛑 Stopped {} ({})", name, status);
                }
                Ok(Err(e)) => {
                    component_warn!(component, "⚠️ Waiting for {} failed: {}", name, e);
                    let _ = child.kill().await;
                }
                Err(_) => {
                    component_warn!(
                        component,
                        "⏱️ {} ignored stop request for {:?}, killing",
                        name,
                        timeout
                    );
                    if let Err(e) = child.kill().await {
                        component_warn!(component, "⚠️ Kill of {} failed: {}", name, e);
                    }
                }
            }
        }

        self.mark_exited();
        Ok(())
    }

    fn is_running(&mut self) -> bool {
        let Some(child) = self.child.as_mut() else {
            return false;
        };
        match child.try_wait() {
            Ok(None) => true,
            Ok(Some(status)) => {
                component_debug!(self.component, "{} exited on its own ({})", self.name, status);
                self.mark_exited();
                false
            }
            Err(_) => false,
        }
    }

    fn process_id(&self) -> Option<u32> {
        self.process_id
    }

    fn last_args(&self) -> Vec<String> {
        self.last_args.clone()
    }

    fn state(&self) -> ProcessState {
        self.state
    }
}
