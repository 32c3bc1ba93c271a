//! Periodic check for newer launcher releases

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::{StackConfig, USER_AGENT};
use crate::core::manifest::update_available;
use crate::core::{Manifest, Platform, VersionRecord};
use crate::error::{StackError, StackResult};
use crate::events::StackEvent;
use crate::traits::{HttpClient, HttpRequest};
use shared::{component_debug, component_info, Component};

pub struct ReleaseCheckPoller<H: HttpClient> {
    http: Arc<H>,
    manifest_url: String,
    running_version: String,
    platform: Platform,
    events: broadcast::Sender<StackEvent>,
}

impl<H: HttpClient + 'static> ReleaseCheckPoller<H> {
    pub fn new(http: Arc<H>, config: &StackConfig, events: broadcast::Sender<StackEvent>) -> Self {
        Self {
            http,
            manifest_url: config.builds_manifest_url.clone(),
            running_version: config.running_version.clone(),
            platform: config.platform,
            events,
        }
    }

    /// Fetch and evaluate the manifest once
    ///
    /// Emits `UpdateAvailable` and returns the advertised build when it
    /// differs from the running one.
    pub async fn check_once(&self) -> StackResult<Option<VersionRecord>> {
        let request = HttpRequest::get(&self.manifest_url).header("User-Agent", USER_AGENT);
        let response = self.http.send(request).await?;
        if !response.is_ok() {
            return Err(StackError::HttpStatus {
                url: self.manifest_url.clone(),
                status: response.status,
            });
        }

        let xml = String::from_utf8_lossy(&response.body);
        let manifest = Manifest::parse(&xml)?;

        let Some(record) = update_available(&manifest, &self.running_version, self.platform) else {
            component_debug!(Component::ReleaseCheck, "No update for version {}", self.running_version);
            return Ok(None);
        };

        component_info!(
            Component::ReleaseCheck,
            "🆕 Version {} is available (running {})",
            record.version,
            self.running_version
        );
        let _ = self.events.send(StackEvent::UpdateAvailable {
            version: record.version,
            download_url: record.download_url.clone(),
        });
        Ok(Some(record.clone()))
    }

    /// Poll immediately and then every `period`; failures wait for the next tick
    pub fn spawn(self: Arc<Self>, period: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = self.check_once().await {
                    component_debug!(Component::ReleaseCheck, "Release check skipped: {}", e);
                }
            }
        })
    }
}
