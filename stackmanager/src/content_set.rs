//! Content-set installation and coordinator index path updates

use serde_json::json;
use url::Url;

use crate::config::{StackConfig, USER_AGENT};
use crate::controller::StackController;
use crate::error::{StackError, StackResult};
use crate::traits::{ArtifactStore, HttpClient, HttpRequest, ProcessControl};
use shared::{component_info, component_warn, Component};

/// File extension a content set download must carry
pub const CONTENT_SET_EXTENSION: &str = ".svo";

/// Validate a content-set URL, returning the parsed form
pub fn parse_content_set_url(raw: &str) -> StackResult<Url> {
    let url = Url::parse(raw.trim())?;
    if !url.path().ends_with(CONTENT_SET_EXTENSION) {
        return Err(StackError::InvalidContentSet { url: raw.to_string() });
    }
    Ok(url)
}

/// Non-empty `path` query value of a content-set URL
pub fn index_path_from_query(url: &Url) -> Option<String> {
    url.query_pairs()
        .find(|(key, _)| key == "path")
        .map(|(_, value)| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

/// Download a content set and swap it in under the monitor
///
/// The monitor is paused only around the write and is restarted whether or
/// not the write succeeded. Returns the index path requested by the URL.
pub async fn install_content_set<S, H, F>(
    controller: &mut StackController<S, H>,
    http: &H,
    store: &F,
    config: &StackConfig,
    raw_url: &str,
) -> StackResult<Option<String>>
where
    S: ProcessControl,
    H: HttpClient + 'static,
    F: ArtifactStore,
{
    let url = parse_content_set_url(raw_url)?;

    let request = HttpRequest::get(url.as_str()).header("User-Agent", USER_AGENT);
    let response = http.send(request).await?;
    if !response.is_ok() {
        return Err(StackError::HttpStatus {
            url: url.to_string(),
            status: response.status,
        });
    }

    if let Err(e) = controller.toggle_monitor(false).await {
        component_warn!(Component::Monitor, "⚠️ Could not pause monitor: {}", e);
    }

    let destination = config.content_set_path();
    let written = store.write_file(&destination, &response.body).await;

    if let Err(e) = controller.toggle_monitor(true).await {
        component_warn!(Component::Monitor, "⚠️ Could not restart monitor: {}", e);
    }

    written?;
    component_info!(
        Component::StackManager,
        "📦 Installed content set ({} bytes) to {}",
        response.body.len(),
        destination.display()
    );
    Ok(index_path_from_query(&url))
}

/// Point the coordinator's index at `path`
///
/// Returns `Ok(false)` without a request when `path` is empty.
pub async fn change_index_path<H: HttpClient>(http: &H, config: &StackConfig, path: &str) -> StackResult<bool> {
    let path = path.trim();
    if path.is_empty() {
        return Ok(false);
    }

    let url = config.coordinator_settings_url();
    let payload = json!({ "paths": { "/": { "viewpoint": path } } });
    let response = http.send(HttpRequest::post_json(&url, &payload)?).await?;
    if !response.is_ok() {
        return Err(StackError::HttpStatus {
            url,
            status: response.status,
        });
    }

    component_info!(Component::Coordinator, "🧭 Index path set to {}", path);
    Ok(true)
}
