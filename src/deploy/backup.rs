//! World data snapshots taken before migration.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::config::UpdaterConfig;
use crate::utils::copy_tree;

/// Copies the active world data into a timestamped backup directory.
///
/// Each snapshot lands in `<backup_dir>/worlds-<UTC timestamp>` and, when a
/// network share is configured, is mirrored to
/// `<network_share>/worlds-<UTC timestamp>`. Old snapshots are never removed.
///
/// # Examples
///
/// ```rust,no_run
/// use bedrock_updater::deploy::WorldBackup;
/// use std::path::{Path, PathBuf};
///
/// # async fn example() -> anyhow::Result<()> {
/// let backup = WorldBackup::new(PathBuf::from("/srv/backups"), None);
/// if let Some(snapshot) = backup.backup(Path::new("/srv/bedrock/Latest/worlds")).await? {
///     println!("saved to {}", snapshot.display());
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct WorldBackup {
    backup_dir: PathBuf,
    network_share: Option<PathBuf>,
}

impl WorldBackup {
    /// Backups into `backup_dir`, optionally mirrored to `network_share`.
    pub fn new(backup_dir: PathBuf, network_share: Option<PathBuf>) -> Self {
        Self {
            backup_dir,
            network_share,
        }
    }

    /// Backup settings of `config`; `None` when no backup directory is set.
    pub fn from_config(config: &UpdaterConfig) -> Option<Self> {
        config
            .backup_dir
            .clone()
            .map(|dir| Self::new(dir, config.network_share.clone()))
    }

    /// Snapshot `worlds`. Returns the primary snapshot path, or `None` when
    /// there is no world data to save.
    pub async fn backup(&self, worlds: &Path) -> Result<Option<PathBuf>> {
        if !tokio::fs::try_exists(worlds).await.unwrap_or(false) {
            info!("No world data at {}, skipping backup", worlds.display());
            return Ok(None);
        }

        let name = snapshot_name(Utc::now());
        let snapshot = unique_path(&self.backup_dir, &name).await;
        copy_snapshot(worlds, &snapshot).await?;
        info!("Backed up worlds to {}", snapshot.display());

        if let Some(share) = &self.network_share {
            let mirror = unique_path(share, &name).await;
            copy_snapshot(&snapshot, &mirror)
                .await
                .with_context(|| format!("Failed to mirror backup to {}", share.display()))?;
            info!("Mirrored backup to {}", mirror.display());
        }

        Ok(Some(snapshot))
    }
}

/// Directory name of a snapshot taken at `at`, e.g. `worlds-20261016-093000`.
pub fn snapshot_name(at: DateTime<Utc>) -> String {
    format!("worlds-{}", at.format("%Y%m%d-%H%M%S"))
}

/// `dir/name`, or `dir/name-N` if a snapshot with that name already exists.
async fn unique_path(dir: &Path, name: &str) -> PathBuf {
    let mut candidate = dir.join(name);
    let mut counter = 1;
    while tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
        counter += 1;
        debug!("Backup {} already exists", candidate.display());
        candidate = dir.join(format!("{name}-{counter}"));
    }
    candidate
}

async fn copy_snapshot(from: &Path, to: &Path) -> Result<u64> {
    let (src, dst) = (from.to_path_buf(), to.to_path_buf());
    tokio::task::spawn_blocking(move || copy_tree(&src, &dst))
        .await
        .context("Backup task panicked")?
        .with_context(|| format!("Failed to back up {} to {}", from.display(), to.display()))
}
