//! Real file system service implementation
//!
//! Local artifact reads are forgiving: a missing or unreadable file is an
//! empty buffer, which never matches a published checksum and therefore
//! reads as stale.

use async_trait::async_trait;
use std::path::Path;
use tokio::fs;

use crate::error::{StackError, StackResult};
use crate::traits::ArtifactStore;

/// Real file system implementation
#[derive(Debug, Default, Clone)]
pub struct RealFileSystem;

impl RealFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn write_failure(path: &Path, source: std::io::Error) -> StackError {
    StackError::DownloadWriteFailure {
        path: path.display().to_string(),
        source,
    }
}

#[async_trait]
impl ArtifactStore for RealFileSystem {
    async fn read_bytes(&self, path: &Path) -> Vec<u8> {
        fs::read(path).await.unwrap_or_default()
    }

    async fn exists(&self, path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }

    async fn entry_count(&self, dir: &Path) -> usize {
        let Ok(mut entries) = fs::read_dir(dir).await else {
            return 0;
        };
        let mut count = 0;
        while let Ok(Some(_)) = entries.next_entry().await {
            count += 1;
        }
        count
    }

    async fn write_file(&self, path: &Path, bytes: &[u8]) -> StackResult<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| write_failure(parent, e))?;
        }
        fs::write(path, bytes).await.map_err(|e| write_failure(path, e))
    }
}
