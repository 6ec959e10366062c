//! The upgrade pipeline.
//!
//! [`UpdateOrchestrator::update_if_new`] runs one upgrade end to end:
//!
//! 1. ensure the deployment root exists
//! 2. resolve the latest version
//! 3. stop early if it equals the caller's current version
//! 4. download the archive into the root
//! 5. extract it into `<prefix>-<version>`
//! 6. back up the active world data (when a backup directory is configured)
//! 7. migrate world data into the new deployment
//! 8. stop the server (when a process controller is supplied)
//! 9. swing the active pointer
//! 10. start the server again
//!
//! Every step is awaited before the next one starts. A failure before the
//! pointer swap leaves the active deployment untouched; partially written
//! deployments and archives stay on disk. When stopping, swapping or starting
//! fails, the server is started again from whatever the pointer names before
//! the error is returned.
//!
//! The running server is only stopped after migration has finished, so the
//! world copy is taken while the server may still be writing to it.

use anyhow::{Context, Result};
use reqwest::Client;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use crate::config::UpdaterConfig;
use crate::constants::DEFAULT_SHUTDOWN_TIMEOUT_SECS;
use crate::deploy::{
    ActivePointerUpdater, ArchiveExtractor, ArtifactDownloader, DeploymentLayout, MigrationOutcome,
    WorldBackup, WorldMigrator,
};
use crate::process::ProcessController;
use crate::resolver::{Resolution, VersionResolver};

/// Result of [`UpdateOrchestrator::update_if_new`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    /// The installed version is already the latest; nothing was changed.
    UpToDate {
        /// The latest published version
        version: String,
    },
    /// A new deployment was installed and activated.
    Updated {
        /// The version that was installed
        version: String,
        /// The new deployment directory
        deployment: PathBuf,
    },
}

impl UpdateStatus {
    /// Whether an upgrade happened.
    pub fn updated(&self) -> bool {
        matches!(self, Self::Updated { .. })
    }

    /// The latest version, installed or not.
    pub fn version(&self) -> &str {
        match self {
            Self::UpToDate { version } | Self::Updated { version, .. } => version,
        }
    }
}

/// Sequences resolver, download, extraction, backup, migration, activation
/// and process control into one upgrade.
pub struct UpdateOrchestrator {
    layout: DeploymentLayout,
    resolver: VersionResolver,
    downloader: ArtifactDownloader,
    migrator: WorldMigrator,
    backup: Option<WorldBackup>,
    shutdown_grace: Duration,
}

impl UpdateOrchestrator {
    /// Orchestrator over explicit collaborators, without backups.
    pub fn new(
        layout: DeploymentLayout,
        resolver: VersionResolver,
        downloader: ArtifactDownloader,
        migrator: WorldMigrator,
    ) -> Self {
        Self {
            layout,
            resolver,
            downloader,
            migrator,
            backup: None,
            shutdown_grace: Duration::from_secs(DEFAULT_SHUTDOWN_TIMEOUT_SECS),
        }
    }

    /// Wire every collaborator from a configuration, sharing one HTTP client.
    pub fn from_config(config: &UpdaterConfig, client: Client) -> Result<Self> {
        let layout = config.layout();
        let resolver = VersionResolver::from_config(client.clone(), config)?;
        let migrator = WorldMigrator::new(layout.clone(), config.world_dir.clone());

        Ok(Self::new(layout, resolver, ArtifactDownloader::new(client), migrator)
            .with_backup(WorldBackup::from_config(config))
            .with_shutdown_grace(config.server.shutdown_timeout()))
    }

    /// Snapshot world data before each migration.
    pub fn with_backup(mut self, backup: Option<WorldBackup>) -> Self {
        self.backup = backup;
        self
    }

    /// How long a stopping server may take before it is killed.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Show a progress bar while downloading.
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.downloader = self.downloader.with_progress(show_progress);
        self
    }

    /// The deployment layout in use.
    pub fn layout(&self) -> &DeploymentLayout {
        &self.layout
    }

    /// Resolve the latest version without changing anything.
    pub async fn latest(&self) -> Result<Resolution> {
        Ok(self.resolver.resolve().await?)
    }

    /// Upgrade to the latest version unless `current` already is it.
    ///
    /// Versions are compared as exact strings. `process`, when given, is
    /// stopped before and started after the pointer swap, and is not touched
    /// at all when no upgrade is needed.
    ///
    /// # Errors
    ///
    /// Resolver failures are returned as is (typically
    /// [`crate::core::UpdaterError::VersionUnavailable`]); every other step
    /// adds context describing what it was doing.
    pub async fn update_if_new(
        &self,
        current: &str,
        pointer: &dyn ActivePointerUpdater,
        mut process: Option<&mut dyn ProcessController>,
    ) -> Result<UpdateStatus> {
        let root = &self.layout.root;
        tokio::fs::create_dir_all(root)
            .await
            .with_context(|| format!("Failed to create deployment root {}", root.display()))?;

        let Resolution {
            version,
            artifact_url,
        } = self.resolver.resolve().await?;

        if current == version {
            info!("Already on the latest version {}", version);
            return Ok(UpdateStatus::UpToDate { version });
        }
        info!("Upgrading from '{}' to {}", current, version);

        let deployment = self
            .layout
            .deployment_dir(&DeploymentLayout::deployment_version(&artifact_url, &version));
        let pointer_path = self.layout.pointer_path();
        if is_active(&deployment, &pointer_path) {
            warn!("{} is already active, leaving it in place", deployment.display());
            return Ok(UpdateStatus::UpToDate { version });
        }

        let archive = self.layout.artifact_path(&artifact_url);
        self.downloader.download(&artifact_url, &archive).await?;

        ArchiveExtractor::extract(&archive, &deployment).await?;

        if let Some(backup) = &self.backup {
            if let Some(worlds) = self.migrator.find_source(&deployment).await? {
                backup.backup(&worlds).await.context("World backup failed")?;
            }
        }

        match self
            .migrator
            .migrate(&deployment)
            .await
            .context("World migration failed, the active deployment was not changed")?
        {
            MigrationOutcome::Copied { from, files } => {
                debug!("Carried {} files over from {}", files, from.display());
            }
            MigrationOutcome::NothingToMigrate => {}
        }

        let swapped = async {
            if let Some(process) = process.as_mut() {
                let running =
                    process.is_running().await.context("Failed to query server state")?;
                debug!("Server running before swap: {}", running);
                process.request_shutdown().await.context("Failed to request server shutdown")?;
                process.kill(self.shutdown_grace).await.context("Failed to stop server")?;
            }

            pointer.activate(&deployment, &pointer_path).with_context(|| {
                format!("Failed to point {} at {}", pointer_path.display(), deployment.display())
            })?;

            if let Some(process) = process.as_mut() {
                process.start(&pointer_path).await.context("Failed to start server")?;
            }
            Ok::<(), anyhow::Error>(())
        }
        .await;

        if let Err(e) = swapped {
            // Whatever the pointer names now gets served again
            if let Some(process) = process.as_mut() {
                match process.is_running().await {
                    Ok(true) => {}
                    Ok(false) => {
                        warn!(
                            "Restarting the server from {} after a failed upgrade",
                            pointer_path.display()
                        );
                        if let Err(restart) = process.start(&pointer_path).await {
                            error!("Could not restart the server: {:#}", restart);
                        }
                    }
                    Err(state) => {
                        error!("Could not query the server after a failed upgrade: {:#}", state);
                    }
                }
            }
            return Err(e);
        }

        info!("Now serving {} from {}", version, deployment.display());
        Ok(UpdateStatus::Updated {
            version,
            deployment,
        })
    }
}

/// Whether `pointer` already resolves to `deployment`.
fn is_active(deployment: &Path, pointer: &Path) -> bool {
    match (std::fs::canonicalize(deployment), std::fs::canonicalize(pointer)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
