//! Artifact download.

use anyhow::Result;
use reqwest::{Client, StatusCode, Url};
use std::path::Path;
use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

use crate::core::UpdaterError;
use crate::utils::progress::download_bar;

/// Streams a server archive to disk.
///
/// The body is written chunk by chunk as it arrives; the archive is never
/// held in memory. There is no retry at this layer.
pub struct ArtifactDownloader {
    client: Client,
    show_progress: bool,
}

impl ArtifactDownloader {
    /// Downloader using `client`, which carries the user agent.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            show_progress: false,
        }
    }

    /// Show an `indicatif` progress bar while downloading.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Download `url` to `destination`, truncating any existing file.
    ///
    /// The destination is only created once the server has answered 200, so
    /// a rejected request leaves nothing behind.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::DownloadFailed`] for network errors, a non-200 status
    /// or a destination that cannot be created or written.
    pub async fn download(&self, url: &Url, destination: &Path) -> Result<u64> {
        let failed = |reason: String| UpdaterError::DownloadFailed {
            url: url.to_string(),
            reason,
        };

        debug!("Downloading {} to {}", url, destination.display());
        let mut response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| failed(format!("request failed: {e}")))?;

        if response.status() != StatusCode::OK {
            return Err(failed(format!("server answered {}", response.status())).into());
        }

        let mut file = File::create(destination)
            .await
            .map_err(|e| failed(format!("cannot create {}: {e}", destination.display())))?;

        let label = destination.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let progress = download_bar(response.content_length(), self.show_progress, &label);

        let mut written = 0u64;
        while let Some(chunk) =
            response.chunk().await.map_err(|e| failed(format!("transfer interrupted: {e}")))?
        {
            file.write_all(&chunk)
                .await
                .map_err(|e| failed(format!("cannot write {}: {e}", destination.display())))?;
            written += chunk.len() as u64;
            progress.inc(chunk.len() as u64);
        }

        file.flush()
            .await
            .map_err(|e| failed(format!("cannot flush {}: {e}", destination.display())))?;
        progress.finish_and_clear();

        info!("Downloaded {} ({} bytes)", url, written);
        Ok(written)
    }
}
