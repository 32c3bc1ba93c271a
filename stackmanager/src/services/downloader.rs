//! Real artifact installer
//!
//! Downloads are written to a sibling temporary file and renamed into place,
//! so a failed transfer never leaves a truncated artifact behind.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;

use crate::config::{ArtifactSpec, InstallKind, USER_AGENT};
use crate::error::{StackError, StackResult};
use crate::traits::{Downloader, HttpClient, HttpRequest};
use shared::{component_debug, component_info, Component};

/// Real downloader implementation
pub struct RealDownloader<H: HttpClient> {
    http: Arc<H>,
}

impl<H: HttpClient> RealDownloader<H> {
    pub fn new(http: Arc<H>) -> Self {
        Self { http }
    }
}

fn write_failure(path: &Path, source: std::io::Error) -> StackError {
    StackError::DownloadWriteFailure {
        path: path.display().to_string(),
        source,
    }
}

async fn write_atomically(path: &Path, bytes: &[u8]) -> StackResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await.map_err(|e| write_failure(parent, e))?;
    }

    let mut partial = path.as_os_str().to_owned();
    partial.push(".partial");
    let partial = PathBuf::from(partial);

    fs::write(&partial, bytes).await.map_err(|e| write_failure(&partial, e))?;
    fs::rename(&partial, path).await.map_err(|e| write_failure(path, e))
}

#[cfg(unix)]
async fn mark_executable(path: &Path) -> StackResult<()> {
    use std::os::unix::fs::PermissionsExt;

    fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))
        .await
        .map_err(|e| write_failure(path, e))
}

#[cfg(not(unix))]
async fn mark_executable(_path: &Path) -> StackResult<()> {
    Ok(())
}

async fn extract_archive(archive: PathBuf, destination: PathBuf) -> StackResult<()> {
    let label = archive.display().to_string();
    let extraction_error = |message: String| StackError::ArchiveExtraction {
        path: label.clone(),
        message,
    };

    tokio::task::spawn_blocking(move || -> Result<(), String> {
        let file = std::fs::File::open(&archive).map_err(|e| e.to_string())?;
        let mut zip = zip::ZipArchive::new(file).map_err(|e| e.to_string())?;
        std::fs::create_dir_all(&destination).map_err(|e| e.to_string())?;
        zip.extract(&destination).map_err(|e| e.to_string())
    })
    .await
    .map_err(|e| extraction_error(e.to_string()))?
    .map_err(extraction_error)
}

#[async_trait]
impl<H: HttpClient + 'static> Downloader for RealDownloader<H> {
    async fn install(&self, spec: &ArtifactSpec) -> StackResult<()> {
        component_info!(Component::Artifacts, "⬇️ Downloading {} from {}", spec.artifact, spec.url);

        let request = HttpRequest::get(&spec.url).header("User-Agent", USER_AGENT);
        let response = self.http.send(request).await?;
        if !response.is_ok() {
            return Err(StackError::HttpStatus {
                url: spec.url.clone(),
                status: response.status,
            });
        }

        write_atomically(&spec.local_path, &response.body).await?;
        component_debug!(
            Component::Artifacts,
            "💾 Wrote {} bytes to {}",
            response.body.len(),
            spec.local_path.display()
        );

        match &spec.install {
            InstallKind::Executable => mark_executable(&spec.local_path).await?,
            InstallKind::Archive { extract_to } => {
                extract_archive(spec.local_path.clone(), extract_to.clone()).await?;
            }
        }

        component_info!(Component::Artifacts, "✅ Installed {}", spec.artifact);
        Ok(())
    }
}
