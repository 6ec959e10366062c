//! Last-installed-version record.

use anyhow::{Context, Result};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::utils::atomic_write;

/// Plain-text file holding the version installed by the last upgrade.
#[derive(Debug, Clone)]
pub struct VersionRecord {
    path: PathBuf,
}

impl VersionRecord {
    /// Record stored at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the record.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The recorded version, trimmed; an empty string when nothing has been
    /// recorded yet. An empty current version never equals a published one,
    /// so the first run always upgrades.
    pub async fn read(&self) -> Result<String> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => Ok(content.trim().to_string()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!("No version record at {}", self.path.display());
                Ok(String::new())
            }
            Err(e) => Err(e)
                .with_context(|| format!("Failed to read version record {}", self.path.display())),
        }
    }

    /// Store `version`, replacing the previous record atomically.
    pub async fn write(&self, version: &str) -> Result<()> {
        let path = self.path.clone();
        let content = version.trim().as_bytes().to_vec();
        tokio::task::spawn_blocking(move || atomic_write(&path, &content))
            .await
            .context("Version record task panicked")?
            .with_context(|| format!("Failed to write version record {}", self.path.display()))
    }
}
