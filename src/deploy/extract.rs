//! Archive extraction.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::UpdaterError;

/// Unpacks a server archive into a deployment directory.
pub struct ArchiveExtractor;

impl ArchiveExtractor {
    /// Extract every entry of `archive` below `target`.
    ///
    /// - directories are created with default permissions
    /// - files are truncated if they exist and get the archive's permission
    ///   bits on Unix
    /// - missing parent directories are created on demand
    ///
    /// Entries whose names would land outside `target` are rejected. The
    /// extraction stops at the first failure and leaves whatever was already
    /// written in place.
    ///
    /// Runs on the blocking thread pool. Returns the number of files written.
    pub async fn extract(archive: &Path, target: &Path) -> Result<usize> {
        let archive = archive.to_path_buf();
        let target = target.to_path_buf();

        tokio::task::spawn_blocking(move || extract_blocking(&archive, &target))
            .await
            .context("Extraction task panicked")?
    }
}

fn extract_blocking(archive: &Path, target: &Path) -> Result<usize> {
    let failed = |reason: String| UpdaterError::ExtractionFailed {
        archive: archive.display().to_string(),
        reason,
    };

    let file = File::open(archive).map_err(|e| failed(format!("cannot open archive: {e}")))?;
    let mut zip =
        zip::ZipArchive::new(file).map_err(|e| failed(format!("not a readable zip archive: {e}")))?;

    fs::create_dir_all(target)
        .map_err(|e| failed(format!("cannot create {}: {e}", target.display())))?;

    let mut files = 0;
    for index in 0..zip.len() {
        let mut entry =
            zip.by_index(index).map_err(|e| failed(format!("corrupt entry #{index}: {e}")))?;

        let relative: PathBuf = entry
            .enclosed_name()
            .ok_or_else(|| failed(format!("entry '{}' escapes the target directory", entry.name())))?;
        let path = target.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&path)
                .map_err(|e| failed(format!("cannot create {}: {e}", path.display())))?;
            continue;
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| failed(format!("cannot create {}: {e}", parent.display())))?;
        }

        let mut out = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)
            .map_err(|e| failed(format!("cannot write {}: {e}", path.display())))?;
        io::copy(&mut entry, &mut out)
            .map_err(|e| failed(format!("cannot write {}: {e}", path.display())))?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            if let Some(mode) = entry.unix_mode() {
                fs::set_permissions(&path, fs::Permissions::from_mode(mode & 0o7777))
                    .map_err(|e| failed(format!("cannot set mode on {}: {e}", path.display())))?;
            }
        }

        debug!("Extracted {}", relative.display());
        files += 1;
    }

    info!("Extracted {} files into {}", files, target.display());
    Ok(files)
}
