//! Trait definitions with mockall annotations for testing
//!
//! These are the seams between launcher logic and the outside world: the
//! network, the disk, artifact installation and child processes. Real
//! implementations live in `services`; tests substitute the generated mocks.

use async_trait::async_trait;
use serde::Serialize;
use std::path::Path;
use std::time::Duration;

use crate::config::ArtifactSpec;
use crate::error::StackResult;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn post_json<T: Serialize>(url: impl Into<String>, payload: &T) -> StackResult<Self> {
        Ok(Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: vec![("Content-Type".to_string(), "application/json".to_string())],
            body: Some(serde_json::to_vec(payload)?),
        })
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// HTTP transport abstraction
///
/// A transport failure (DNS, refused connection, timeout) is reported as
/// `StackError::NetworkUnavailable`; any response, whatever its status, is
/// returned as `Ok` so callers can tell "no network" from "empty answer".
#[mockall::automock]
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Perform one request
    ///
    /// # Parameters
    /// - `request`: Method, URL, headers and optional body
    ///
    /// # Returns
    /// The response with its status and raw body, or `NetworkUnavailable`
    /// when no response arrived at all
    async fn send(&self, request: HttpRequest) -> StackResult<HttpResponse>;
}

/// Local artifact storage abstraction
#[mockall::automock]
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// File content, empty if the file is absent or unreadable
    async fn read_bytes(&self, path: &Path) -> Vec<u8>;

    async fn exists(&self, path: &Path) -> bool;

    /// Number of real entries in a directory, zero if it does not exist
    async fn entry_count(&self, dir: &Path) -> usize;

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> StackResult<()>;
}

/// Fetches an artifact and puts it in place
#[mockall::automock]
#[async_trait]
pub trait Downloader: Send + Sync {
    async fn install(&self, spec: &ArtifactSpec) -> StackResult<()>;
}

/// Lifecycle of a supervised child
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    NotStarted,
    Running,
    Stopping,
    Stopped,
}

/// Control over one named child process
#[mockall::automock]
#[async_trait]
pub trait ProcessControl: Send {
    fn name(&self) -> String;

    /// Launch with `args` unless already running
    ///
    /// # Parameters
    /// - `args`: Command line for this launch, remembered for `restart`
    ///
    /// # Returns
    /// OS process id of the live process, the existing one if it was
    /// already running
    async fn start(&mut self, args: Vec<String>) -> StackResult<Option<u32>>;

    /// Launch again with the arguments of the previous start
    async fn restart(&mut self) -> StackResult<Option<u32>>;

    /// Ask the child to exit without waiting for it
    fn terminate(&mut self) -> StackResult<()>;

    /// Terminate, wait up to `timeout`, then force-kill
    ///
    /// # Parameters
    /// - `timeout`: How long the child may take to exit after the stop signal
    ///
    /// # Returns
    /// `Ok` once the child is gone; a no-op when nothing is running
    async fn stop(&mut self, timeout: Duration) -> StackResult<()>;

    fn is_running(&mut self) -> bool;

    /// OS process id of the live incarnation
    fn process_id(&self) -> Option<u32>;

    fn last_args(&self) -> Vec<String>;

    fn state(&self) -> ProcessState;
}
