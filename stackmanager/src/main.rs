//! Main entry point for the stack manager binary
//!
//! Builds the real service implementations, hands them to the stack manager
//! and runs it until Ctrl+C or SIGTERM.

use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;

use shared::{component_debug, component_info, component_warn, logging, Component};
use stackmanager::{
    services::{ProcessSupervisor, RealDownloader, RealFileSystem, RealHttpClient},
    StackCommand, StackConfig, StackEvent, StackManager, StackProcesses, StackResult, WorkerFactory,
};

const DEFAULT_DATA_DIR: &str = "stackmanager-data";

/// Launcher for a local coordinator, monitor and worker stack
#[derive(Parser)]
#[command(name = "stackmanager")]
#[command(about = "Installs, verifies and supervises a local coordinator stack")]
pub struct Args {
    /// Use executables from a local build directory instead of downloading them
    #[arg(short = 'b', long)]
    pub build_directory: Option<PathBuf>,

    /// Directory holding installed artifacts and logs
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Size of the worker pool the monitor keeps
    #[arg(long, default_value = "4")]
    pub pool_size: u32,

    /// Do not start the stack once requirements are ready
    #[arg(long)]
    pub no_autostart: bool,

    /// Do not poll for launcher updates
    #[arg(long)]
    pub no_update_check: bool,
}

#[tokio::main]
async fn main() -> StackResult<()> {
    let args = Args::parse();

    let mut config = StackConfig::new(DEFAULT_DATA_DIR)
        .with_env_overrides()
        .with_build_directory(args.build_directory.clone())
        .with_pool_size(args.pool_size);
    if let Some(dir) = &args.data_dir {
        config.data_dir = dir.clone();
    }
    let directories = config.ensure_directories();

    let log_file = logging::open_last_run_log(&config.logs_dir());
    let log_file_error = log_file.as_ref().err().map(|e| e.to_string());
    logging::init_tracing(&args.log_level, log_file.ok())?;

    logging::log_startup(Component::StackManager, &format!("stackmanager {}", config.running_version));
    if let Some(error) = log_file_error {
        component_warn!(Component::StackManager, "⚠️ Logging to stdout only: {}", error);
    }
    for status in &directories {
        status.log();
    }
    component_debug!(
        Component::StackManager,
        "Data directory: {}, platform: {}",
        config.data_dir.display(),
        config.platform
    );
    if let Some(build) = &config.build_directory {
        component_info!(Component::StackManager, "🛠️ Using local build at {}", build.display());
    }

    // Initialize services
    let http = Arc::new(RealHttpClient::new()?);
    let store = Arc::new(RealFileSystem::new());
    let downloader = Arc::new(RealDownloader::new(http.clone()));
    let processes = build_processes(&config);

    // Create stack manager with dependency injection
    let mut manager = StackManager::new(config, http, store, downloader, processes)
        .with_autostart(!args.no_autostart)
        .with_update_check(!args.no_update_check);

    tokio::spawn(log_events(manager.subscribe()));

    // Set up graceful shutdown
    let commands = manager.command_sender();
    tokio::spawn(async move {
        if wait_for_shutdown_signal().await {
            logging::log_shutdown(Component::StackManager, "Received shutdown signal");
            let _ = commands.send(StackCommand::Shutdown).await;
        }
    });

    manager.initialize().await?;
    manager.run().await?;

    logging::log_success(Component::StackManager, "Stack manager stopped gracefully");
    Ok(())
}

fn build_processes(config: &StackConfig) -> StackProcesses<ProcessSupervisor> {
    let launch_dir = config.launch_dir();
    let logs_dir = config.logs_dir();
    let worker_executable = config.worker_executable();

    let coordinator = ProcessSupervisor::new("domain-server", Component::Coordinator, config.coordinator_executable())
        .with_working_dir(launch_dir.clone())
        .with_log_dir(logs_dir.clone());
    let monitor = ProcessSupervisor::new("assignment-client-monitor", Component::Monitor, worker_executable.clone())
        .with_working_dir(launch_dir.clone())
        .with_log_dir(logs_dir.clone());

    let worker_factory: WorkerFactory<ProcessSupervisor> = Box::new(move |task_id| {
        ProcessSupervisor::new(
            format!("assignment-client-{task_id}"),
            Component::Worker(task_id),
            worker_executable.clone(),
        )
        .with_working_dir(launch_dir.clone())
        .with_log_dir(logs_dir.clone())
    });

    StackProcesses {
        coordinator,
        monitor,
        worker_factory,
    }
}

/// Headless stand-in for a user interface: log every stack event
async fn log_events(mut events: broadcast::Receiver<StackEvent>) {
    loop {
        match events.recv().await {
            Ok(event) => component_info!(Component::StackManager, "📣 {:?}", event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                component_warn!(Component::StackManager, "⚠️ Event log skipped {} events", skipped);
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Wait for Ctrl+C (or SIGTERM on unix); false if no signal can be awaited
#[cfg(unix)]
async fn wait_for_shutdown_signal() -> bool {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate = match signal(SignalKind::terminate()) {
        Ok(terminate) => terminate,
        Err(err) => {
            logging::log_error(Component::StackManager, "SIGTERM handler", &err);
            return wait_for_ctrl_c().await;
        }
    };

    tokio::select! {
        received = wait_for_ctrl_c() => received,
        _ = terminate.recv() => true,
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> bool {
    wait_for_ctrl_c().await
}

async fn wait_for_ctrl_c() -> bool {
    match tokio::signal::ctrl_c().await {
        Ok(()) => true,
        Err(err) => {
            logging::log_error(Component::StackManager, "Signal handling", &err);
            false
        }
    }
}
