//! World data migration between deployments.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::DeploymentLayout;
use crate::utils::copy_tree;

/// What [`WorldMigrator::migrate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MigrationOutcome {
    /// World data was copied from `from`.
    Copied {
        /// Source world directory
        from: PathBuf,
        /// Number of files copied
        files: u64,
    },
    /// No earlier world data exists; nothing to do.
    NothingToMigrate,
}

/// Copies world data into a freshly extracted deployment.
///
/// The source is chosen in this order:
/// 1. the configured world directory override, if it exists
/// 2. `<pointer>/<worlds>` of the currently active deployment
/// 3. the last sibling `<prefix>-*` directory, sorted by name, that has
///    world data (the new deployment itself excluded)
///
/// The fallback is positional: it does not look at versions or timestamps.
#[derive(Debug, Clone)]
pub struct WorldMigrator {
    layout: DeploymentLayout,
    world_dir: Option<PathBuf>,
}

impl WorldMigrator {
    /// Migrator over `layout`, with an optional world directory override.
    pub fn new(layout: DeploymentLayout, world_dir: Option<PathBuf>) -> Self {
        Self {
            layout,
            world_dir,
        }
    }

    /// Copy world data into `new_deployment`.
    ///
    /// Files keep their permission bits and overwrite anything the archive
    /// already placed at the same path.
    pub async fn migrate(&self, new_deployment: &Path) -> Result<MigrationOutcome> {
        let Some(source) = self.find_source(new_deployment).await? else {
            info!("No previous world data found, nothing to migrate");
            return Ok(MigrationOutcome::NothingToMigrate);
        };

        let destination = self.layout.worlds_in(new_deployment);
        if same_location(&source, &destination) {
            info!("World data already lives in {}", destination.display());
            return Ok(MigrationOutcome::NothingToMigrate);
        }
        info!("Migrating world data from {} to {}", source.display(), destination.display());

        let (from, to) = (source.clone(), destination.clone());
        let files = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .context("World copy task panicked")?
            .with_context(|| {
                format!(
                    "Failed to migrate world data from {} to {}",
                    source.display(),
                    destination.display()
                )
            })?;

        info!("Migrated {} world files", files);
        Ok(MigrationOutcome::Copied {
            from: source,
            files,
        })
    }

    /// The world directory that [`migrate`](Self::migrate) would copy from.
    pub async fn find_source(&self, new_deployment: &Path) -> Result<Option<PathBuf>> {
        let layout = self.layout.clone();
        let world_dir = self.world_dir.clone();
        let new_deployment = new_deployment.to_path_buf();

        tokio::task::spawn_blocking(move || find_source_blocking(&layout, world_dir, &new_deployment))
            .await
            .context("World lookup task panicked")?
    }
}

fn same_location(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn find_source_blocking(
    layout: &DeploymentLayout,
    world_dir: Option<PathBuf>,
    new_deployment: &Path,
) -> Result<Option<PathBuf>> {
    if let Some(world_dir) = world_dir {
        if world_dir.is_dir() {
            return Ok(Some(world_dir));
        }
        warn!("Configured world directory {} does not exist", world_dir.display());
    }

    let active = layout.active_worlds();
    if active.is_dir() {
        return Ok(Some(active));
    }

    let fallback = last_sibling_with_worlds(layout, new_deployment)?;
    if let Some(worlds) = &fallback {
        warn!(
            "Active pointer has no world data, falling back to {}",
            worlds.display()
        );
    }
    Ok(fallback)
}

fn last_sibling_with_worlds(
    layout: &DeploymentLayout,
    new_deployment: &Path,
) -> Result<Option<PathBuf>> {
    let excluded = new_deployment.file_name();
    let entries = fs::read_dir(&layout.root)
        .with_context(|| format!("Failed to list {}", layout.root.display()))?;

    let mut candidates = Vec::new();
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list {}", layout.root.display()))?;
        let name = entry.file_name();
        if Some(name.as_os_str()) == excluded {
            continue;
        }
        if !layout.is_deployment_name(&name.to_string_lossy()) || !entry.path().is_dir() {
            continue;
        }
        candidates.push(name);
    }
    candidates.sort();

    Ok(candidates
        .into_iter()
        .rev()
        .map(|name| layout.worlds_in(&layout.root.join(name)))
        .find(|worlds| worlds.is_dir()))
}
