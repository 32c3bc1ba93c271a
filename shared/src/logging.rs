//! Shared logging utilities for consistent tracing across the launcher

use crate::errors::{SharedError, SharedResult};
use crate::types::Component;
use chrono::{DateTime, Utc};
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing::{error, info};

/// Name of the per-launch log file written next to the child process logs
pub const LAST_RUN_LOG: &str = "last_run_log";

const LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Build the default filter directive for a base level
pub fn filter_directive(log_level: &str) -> SharedResult<String> {
    let level = log_level.to_ascii_lowercase();
    if !LEVELS.contains(&level.as_str()) {
        return Err(SharedError::InvalidLogLevel {
            level: log_level.to_string(),
        });
    }

    Ok(format!(
        "stackmanager={level},shared={level},reqwest=warn,hyper=warn"
    ))
}

/// Open (and truncate) the per-launch log file in `logs_dir`
pub fn open_last_run_log(logs_dir: &Path) -> SharedResult<File> {
    let path = logs_dir.join(LAST_RUN_LOG);
    File::create(&path).map_err(|source| SharedError::LogFile {
        path: path.display().to_string(),
        source,
    })
}

/// Initialize tracing to stdout and, if given, to the per-launch log file
///
/// `RUST_LOG` takes precedence over `log_level` when set.
pub fn init_tracing(log_level: &str, log_file: Option<File>) -> SharedResult<()> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let directive = filter_directive(log_level)?;
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&directive));

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact();

    let file_layer = log_file.map(|file| {
        fmt::layer()
            .with_ansi(false)
            .with_target(true)
            .with_writer(Mutex::new(file))
    });

    tracing_subscriber::registry()
        .with(env_filter)
        .with(stdout_layer)
        .with(file_layer)
        .init();

    Ok(())
}

/// Get formatted timestamp for consistent logging
pub fn format_timestamp() -> String {
    let now: DateTime<Utc> = Utc::now();
    now.format("%H:%M:%S%.3f").to_string()
}

/// Macro for component-aware info logging
#[macro_export]
macro_rules! component_info {
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(
            component = %$component,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware warning logging
#[macro_export]
macro_rules! component_warn {
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(
            component = %$component,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware error logging
#[macro_export]
macro_rules! component_error {
    ($component:expr, $($arg:tt)*) => {
        tracing::error!(
            component = %$component,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Macro for component-aware debug logging
#[macro_export]
macro_rules! component_debug {
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(
            component = %$component,
            timestamp = $crate::logging::format_timestamp(),
            $($arg)*
        );
    };
}

/// Contextual logging helper for startup messages
pub fn log_startup(component: Component, details: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🚀 Starting {}",
        details
    );
}

/// Contextual logging helper for shutdown messages
pub fn log_shutdown(component: Component, reason: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "🛑 Shutting down: {}",
        reason
    );
}

/// Contextual logging helper for error conditions
pub fn log_error(component: Component, context: &str, error: &dyn std::fmt::Display) {
    error!(
        component = %component,
        timestamp = format_timestamp(),
        error = %error,
        "❌ {} failed: {}",
        context,
        error
    );
}

/// Contextual logging helper for success conditions
pub fn log_success(component: Component, message: &str) {
    info!(
        component = %component,
        timestamp = format_timestamp(),
        "✅ {}",
        message
    );
}
