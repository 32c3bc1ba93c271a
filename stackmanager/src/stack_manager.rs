//! Main stack manager implementation
//!
//! Wires verification, downloads, the stack controller and the release
//! poller together. All orchestration state lives on one loop; network work
//! runs in spawned tasks whose completions come back over channels.

use chrono::Utc;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;

use crate::artifacts::{ArtifactVerifier, VerificationOutcome};
use crate::config::StackConfig;
use crate::content_set::{change_index_path, install_content_set};
use crate::controller::StackController;
use crate::core::{Artifact, ReadinessState};
use crate::error::{StackError, StackResult};
use crate::events::{StackCommand, StackEvent};
use crate::identity_resolver::IdentityResolver;
use crate::release_check::ReleaseCheckPoller;
use crate::traits::{ArtifactStore, Downloader, HttpClient, ProcessControl};
use crate::workers::{WorkerFactory, WorkerRegistry};
use shared::{component_debug, component_error, component_info, component_warn, logging, Component, TaskId};

const EVENT_CAPACITY: usize = 256;
const COMMAND_CAPACITY: usize = 64;

/// The supervised processes handed to the manager
pub struct StackProcesses<S> {
    pub coordinator: S,
    pub monitor: S,
    pub worker_factory: WorkerFactory<S>,
}

/// Outcome of one spawned artifact install
#[derive(Debug)]
struct DownloadCompletion {
    artifact: Artifact,
    result: StackResult<()>,
}

pub struct StackManager<H, F, D, S>
where
    H: HttpClient + 'static,
    F: ArtifactStore + 'static,
    D: Downloader + 'static,
    S: ProcessControl,
{
    config: StackConfig,

    /// Injected services
    http: Arc<H>,
    store: Arc<F>,
    downloader: Arc<D>,

    controller: StackController<S, H>,
    verifier: ArtifactVerifier<H, F>,
    poller: Arc<ReleaseCheckPoller<H>>,
    poller_task: Option<JoinHandle<()>>,

    readiness: ReadinessState,
    in_flight: HashSet<Artifact>,
    autostart: bool,
    update_check: bool,

    events: broadcast::Sender<StackEvent>,
    command_tx: mpsc::Sender<StackCommand>,
    command_rx: mpsc::Receiver<StackCommand>,
    download_tx: mpsc::Sender<DownloadCompletion>,
    download_rx: mpsc::Receiver<DownloadCompletion>,
}

impl<H, F, D, S> StackManager<H, F, D, S>
where
    H: HttpClient + 'static,
    F: ArtifactStore + 'static,
    D: Downloader + 'static,
    S: ProcessControl,
{
    /// Create a manager with injected services
    pub fn new(config: StackConfig, http: Arc<H>, store: Arc<F>, downloader: Arc<D>, processes: StackProcesses<S>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_CAPACITY);
        let (download_tx, download_rx) = mpsc::channel(Artifact::ALL.len());

        let identity = Arc::new(IdentityResolver::new(http.clone(), &config, events.clone()));
        let workers = WorkerRegistry::new(processes.worker_factory, config.stop_timeout);
        let controller = StackController::new(
            processes.coordinator,
            processes.monitor,
            workers,
            identity,
            events.clone(),
            &config,
        );
        let verifier = ArtifactVerifier::new(http.clone(), store.clone(), config.clone());
        let poller = Arc::new(ReleaseCheckPoller::new(http.clone(), &config, events.clone()));

        Self {
            config,
            http,
            store,
            downloader,
            controller,
            verifier,
            poller,
            poller_task: None,
            readiness: ReadinessState::new(),
            in_flight: HashSet::new(),
            autostart: true,
            update_check: true,
            events,
            command_tx,
            command_rx,
            download_tx,
            download_rx,
        }
    }

    /// Start the stack as soon as requirements are ready (fluent API)
    pub fn with_autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Poll the release manifest (fluent API)
    pub fn with_update_check(mut self, update_check: bool) -> Self {
        self.update_check = update_check;
        self
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StackEvent> {
        self.events.subscribe()
    }

    /// Sender for requests into the run loop
    pub fn command_sender(&self) -> mpsc::Sender<StackCommand> {
        self.command_tx.clone()
    }

    pub fn readiness(&self) -> ReadinessState {
        self.readiness
    }

    pub fn controller(&self) -> &StackController<S, H> {
        &self.controller
    }

    pub fn is_running(&self) -> bool {
        self.controller.is_running()
    }

    /// Verify artifacts, kick off any installs and start the release poller
    pub async fn initialize(&mut self) -> StackResult<()> {
        logging::log_startup(Component::StackManager, "stack manager");
        self.verify_and_install().await;

        if self.update_check && self.poller_task.is_none() {
            let period = self.config.version_check_interval;
            self.poller_task = Some(self.poller.clone().spawn(period));
        }
        Ok(())
    }

    /// Run one verification pass and download whatever is not fresh
    ///
    /// Downloads are only issued once every artifact has been decided.
    pub async fn verify_and_install(&mut self) {
        let outcome = self.verifier.verify().await;

        match outcome {
            VerificationOutcome::Offline(state) => {
                // Installs that already completed stay fresh
                self.readiness.merge_fresh(&state);
                component_warn!(
                    Component::StackManager,
                    "📡 No network, requirements will be checked again on request"
                );
                self.emit(StackEvent::NetworkUnavailable);
            }
            VerificationOutcome::Verified(state) if state.all_ready() => {
                self.readiness = state;
                self.on_requirements_ready().await;
            }
            VerificationOutcome::Verified(state) => {
                self.readiness = state;
                for artifact in state.pending() {
                    self.start_download(artifact);
                }
            }
        }
    }

    fn start_download(&mut self, artifact: Artifact) {
        if !self.in_flight.insert(artifact) {
            component_debug!(Component::Artifacts, "{} download already in flight", artifact);
            return;
        }
        self.emit(StackEvent::DownloadStarted { artifact });

        let spec = self.config.artifact(artifact);
        let downloader = self.downloader.clone();
        let completions = self.download_tx.clone();
        tokio::spawn(async move {
            let result = downloader.install(&spec).await;
            let _ = completions.send(DownloadCompletion { artifact, result }).await;
        });
    }

    async fn handle_download_finished(&mut self, completion: DownloadCompletion) {
        let DownloadCompletion { artifact, result } = completion;
        self.in_flight.remove(&artifact);

        let success = match result {
            Ok(()) => {
                self.readiness.mark_fresh(artifact);
                true
            }
            Err(e) => {
                component_error!(Component::Artifacts, "❌ Install of {} failed: {}", artifact, e);
                self.readiness.mark_stale(artifact);
                false
            }
        };
        self.emit(StackEvent::DownloadFinished { artifact, success });

        if success && self.readiness.all_ready() {
            self.on_requirements_ready().await;
        }
    }

    async fn on_requirements_ready(&mut self) {
        let checked_at = Utc::now();
        component_info!(Component::StackManager, "✅ All requirements ready ({})", checked_at.to_rfc3339());
        self.emit(StackEvent::RequirementsReady { checked_at });

        if self.autostart && !self.controller.is_running() {
            if let Err(e) = self.start_stack().await {
                logging::log_error(Component::StackManager, "Stack start", &e);
            }
        }
    }

    /// Start coordinator, monitor and workers; refused until every artifact is fresh
    pub async fn start_stack(&mut self) -> StackResult<()> {
        if !self.readiness.all_ready() {
            let pending = self
                .readiness
                .pending()
                .iter()
                .map(|artifact| artifact.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            return Err(StackError::RequirementsNotReady { pending });
        }
        self.controller.toggle(true).await
    }

    pub async fn stop_stack(&mut self) -> StackResult<()> {
        self.controller.toggle(false).await
    }

    async fn install_content(&mut self, url: &str) {
        let result = install_content_set(&mut self.controller, self.http.as_ref(), self.store.as_ref(), &self.config, url).await;

        match result {
            Ok(index_path) => {
                self.emit(StackEvent::ContentSetInstalled { success: true });
                if let Some(path) = index_path {
                    self.apply_index_path(&path).await;
                }
            }
            Err(e) => {
                component_error!(Component::StackManager, "❌ Content set install failed: {}", e);
                self.emit(StackEvent::ContentSetInstalled { success: false });
            }
        }

        let address = self.controller.identity().address().await;
        self.emit(StackEvent::AddressChanged { address });
    }

    async fn apply_index_path(&mut self, path: &str) {
        match change_index_path(self.http.as_ref(), &self.config, path).await {
            Ok(true) => self.emit(StackEvent::IndexPathChanged { success: true }),
            Ok(false) => {}
            Err(e) => {
                component_warn!(Component::Coordinator, "⚠️ Index path change failed: {}", e);
                self.emit(StackEvent::IndexPathChanged { success: false });
            }
        }
    }

    fn resolve_identity_in_background(&self) {
        let identity = self.controller.identity().clone();
        tokio::spawn(async move {
            if let Err(e) = identity.resolve_now().await {
                component_debug!(Component::Identity, "Identity request ended: {}", e);
            }
        });
    }

    /// Handle one command; returns false once shutdown was requested
    pub async fn handle_command(&mut self, command: StackCommand) -> StackResult<bool> {
        match command {
            StackCommand::StartStack => self.start_stack().await?,
            StackCommand::StopStack => self.stop_stack().await?,
            StackCommand::StartWorker { task_id, pool, reply } => {
                let task_id = task_id.unwrap_or_else(TaskId::new);
                let result = self
                    .controller
                    .spawn_worker(task_id, pool)
                    .await
                    .map(|process_id| (task_id, process_id));
                if reply.send(result).is_err() {
                    component_debug!(Component::Worker(task_id), "Start reply receiver dropped");
                }
            }
            StackCommand::StopWorker { task_id } => {
                self.controller.stop_worker(&task_id).await?;
            }
            StackCommand::ResolveIdentity => self.resolve_identity_in_background(),
            StackCommand::InstallContentSet { url } => self.install_content(&url).await,
            StackCommand::ChangeIndexPath { path } => self.apply_index_path(&path).await,
            StackCommand::Recheck => self.verify_and_install().await,
            StackCommand::Shutdown => return Ok(false),
        }
        Ok(true)
    }

    /// Main event loop
    pub async fn run(&mut self) -> StackResult<()> {
        loop {
            tokio::select! {
                Some(command) = self.command_rx.recv() => {
                    match self.handle_command(command).await {
                        Ok(true) => {}
                        Ok(false) => {
                            component_debug!(Component::StackManager, "🛑 Shutting down stack manager...");
                            self.shutdown().await;
                            break;
                        }
                        Err(e) => {
                            component_error!(Component::StackManager, "❌ Error handling command: {}", e);
                        }
                    }
                },

                Some(completion) = self.download_rx.recv() => {
                    self.handle_download_finished(completion).await;
                },
            }
        }

        Ok(())
    }

    /// Stop the stack and every worker
    pub async fn shutdown(&mut self) {
        if let Some(task) = self.poller_task.take() {
            task.abort();
        }
        self.controller.shutdown().await;
        logging::log_shutdown(Component::StackManager, "all processes stopped");
    }

    fn emit(&self, event: StackEvent) {
        let _ = self.events.send(event);
    }
}
