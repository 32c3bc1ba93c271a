//! Launcher configuration
//!
//! Resolves every path and URL the launcher touches from the command line,
//! the environment (with `.env` support) and compiled-in defaults.

use std::path::PathBuf;
use std::time::Duration;

use crate::core::{Artifact, Platform};
use shared::{component_debug, component_error, Component};

pub const DEFAULT_DOWNLOAD_BASE: &str = "https://s3.amazonaws.com/hifi-public/stackmanager";
pub const DEFAULT_COORDINATOR_URL: &str = "http://localhost:40100";
pub const DEFAULT_DIRECTORY_API: &str = "https://metaverse.highfidelity.com/api/v1";
pub const DEFAULT_BUILDS_URL: &str = "https://highfidelity.io/builds.xml";

/// Sent with every outbound request; some hosts filter unknown agents
pub const USER_AGENT: &str = "Mozilla/5.0 (HighFidelity)";

const COORDINATOR_NAME: &str = "domain-server";
const WORKER_NAME: &str = "assignment-client";
const RUNTIME_ARCHIVE: &str = "requirements.zip";
const RESOURCES_ARCHIVE: &str = "resources.zip";

/// Bounded retry for the first identity request after the coordinator starts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Delay before attempt `attempt` (zero based), doubling up to `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 1u32.checked_shl(attempt).unwrap_or(u32::MAX);
        self.initial_delay.saturating_mul(factor).min(self.max_delay)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(8),
            max_attempts: 6,
        }
    }
}

/// How a downloaded artifact is put in place
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallKind {
    /// Single binary written to `local_path` and marked executable
    Executable,
    /// Zip written to `local_path` and unpacked into `extract_to`
    Archive { extract_to: PathBuf },
}

/// Where an artifact comes from and where it lives on disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactSpec {
    pub artifact: Artifact,
    pub url: String,
    pub checksum_url: String,
    /// File whose content is checksummed against `checksum_url`
    pub local_path: PathBuf,
    pub install: InstallKind,
}

#[derive(Debug, Clone)]
pub struct StackConfig {
    pub platform: Platform,
    pub data_dir: PathBuf,
    pub build_directory: Option<PathBuf>,
    pub download_base_url: String,
    pub coordinator_url: String,
    pub directory_api_url: String,
    pub builds_manifest_url: String,
    pub monitor_pool_size: u32,
    pub stop_timeout: Duration,
    pub version_check_interval: Duration,
    pub identity_retry: RetryPolicy,
    pub running_version: String,
}

impl StackConfig {
    /// Defaults rooted at `data_dir`
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            platform: Platform::current(),
            data_dir: data_dir.into(),
            build_directory: None,
            download_base_url: DEFAULT_DOWNLOAD_BASE.to_string(),
            coordinator_url: DEFAULT_COORDINATOR_URL.to_string(),
            directory_api_url: DEFAULT_DIRECTORY_API.to_string(),
            builds_manifest_url: DEFAULT_BUILDS_URL.to_string(),
            monitor_pool_size: 4,
            stop_timeout: Duration::from_millis(5000),
            version_check_interval: Duration::from_secs(24 * 60 * 60),
            identity_retry: RetryPolicy::default(),
            running_version: option_env!("STACKMANAGER_BUILD_VERSION").unwrap_or("dev").to_string(),
        }
    }

    /// Apply `STACKMANAGER_*` environment overrides (after loading `.env`)
    pub fn with_env_overrides(mut self) -> Self {
        let _ = dotenv::dotenv();

        if let Ok(dir) = std::env::var("STACKMANAGER_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
        if let Ok(url) = std::env::var("STACKMANAGER_DOWNLOAD_BASE") {
            self.download_base_url = url;
        }
        if let Ok(url) = std::env::var("STACKMANAGER_COORDINATOR_URL") {
            self.coordinator_url = url;
        }
        if let Ok(url) = std::env::var("STACKMANAGER_DIRECTORY_API") {
            self.directory_api_url = url;
        }
        if let Ok(url) = std::env::var("STACKMANAGER_BUILDS_URL") {
            self.builds_manifest_url = url;
        }
        self
    }

    pub fn with_build_directory(mut self, build_directory: Option<PathBuf>) -> Self {
        self.build_directory = build_directory;
        self
    }

    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_pool_size(mut self, pool_size: u32) -> Self {
        self.monitor_pool_size = pool_size;
        self
    }

    pub fn launch_dir(&self) -> PathBuf {
        self.data_dir.join("launch")
    }

    pub fn resources_dir(&self) -> PathBuf {
        self.launch_dir().join("resources")
    }

    pub fn logs_dir(&self) -> PathBuf {
        self.data_dir.join("logs")
    }

    /// A local build replaces the downloaded executables
    pub fn is_build_override(&self) -> bool {
        self.build_directory.is_some()
    }

    pub fn coordinator_executable(&self) -> PathBuf {
        self.executable_path(COORDINATOR_NAME)
    }

    pub fn worker_executable(&self) -> PathBuf {
        self.executable_path(WORKER_NAME)
    }

    fn executable_path(&self, name: &str) -> PathBuf {
        let file = format!("{name}{}", self.platform.executable_suffix());
        match &self.build_directory {
            Some(build) => build.join(name).join(file),
            None => self.launch_dir().join(file),
        }
    }

    /// Content set written by the content-set installer
    pub fn content_set_path(&self) -> PathBuf {
        self.resources_dir().join("models.svo")
    }

    pub fn runtime_probe_path(&self) -> PathBuf {
        self.launch_dir().join(self.platform.runtime_probe())
    }

    pub fn coordinator_id_url(&self) -> String {
        format!("{}/id", self.coordinator_url.trim_end_matches('/'))
    }

    pub fn coordinator_settings_url(&self) -> String {
        format!("{}/settings.json", self.coordinator_url.trim_end_matches('/'))
    }

    pub fn directory_lookup_url(&self, id: &uuid::Uuid) -> String {
        format!("{}/domains/{id}", self.directory_api_url.trim_end_matches('/'))
    }

    pub fn artifact(&self, artifact: Artifact) -> ArtifactSpec {
        let (file, local_path, install) = match artifact {
            Artifact::RuntimeBundle => (
                RUNTIME_ARCHIVE.to_string(),
                self.launch_dir().join(RUNTIME_ARCHIVE),
                InstallKind::Archive {
                    extract_to: self.launch_dir(),
                },
            ),
            Artifact::CoordinatorResources => (
                RESOURCES_ARCHIVE.to_string(),
                self.launch_dir().join(RESOURCES_ARCHIVE),
                InstallKind::Archive {
                    extract_to: self.resources_dir(),
                },
            ),
            Artifact::WorkerExecutable => (
                format!("{WORKER_NAME}{}", self.platform.executable_suffix()),
                self.worker_executable(),
                InstallKind::Executable,
            ),
            Artifact::CoordinatorExecutable => (
                format!("{COORDINATOR_NAME}{}", self.platform.executable_suffix()),
                self.coordinator_executable(),
                InstallKind::Executable,
            ),
        };

        let url = format!(
            "{}/{}/{file}",
            self.download_base_url.trim_end_matches('/'),
            self.platform.download_segment()
        );
        ArtifactSpec {
            artifact,
            checksum_url: format!("{url}.md5"),
            url,
            local_path,
            install,
        }
    }

    /// Create launch, resources and logs directories, logging each outcome
    /// Create the launch, resources and logs directories
    ///
    /// Never fails; the returned statuses are logged once tracing is up,
    /// since the logs directory must exist before the log file opens.
    pub fn ensure_directories(&self) -> Vec<DirectoryStatus> {
        [self.launch_dir(), self.resources_dir(), self.logs_dir()]
            .into_iter()
            .map(|dir| {
                if dir.is_dir() {
                    return DirectoryStatus::Existing(dir);
                }
                match std::fs::create_dir_all(&dir) {
                    Ok(()) => DirectoryStatus::Created(dir),
                    Err(e) => DirectoryStatus::Failed(dir, e),
                }
            })
            .collect()
    }
}

/// What `ensure_directories` found or did for one directory
#[derive(Debug)]
pub enum DirectoryStatus {
    Existing(PathBuf),
    Created(PathBuf),
    Failed(PathBuf, std::io::Error),
}

impl DirectoryStatus {
    pub fn log(&self) {
        match self {
            DirectoryStatus::Existing(dir) => {
                component_debug!(Component::StackManager, "Using directory {}", dir.display())
            }
            DirectoryStatus::Created(dir) => {
                component_debug!(Component::StackManager, "📁 Created directory {}", dir.display())
            }
            DirectoryStatus::Failed(dir, e) => component_error!(
                Component::StackManager,
                "❌ Failed to create directory {}: {}",
                dir.display(),
                e
            ),
        }
    }
}
