//! Active pointer updates.
//!
//! The pointer is a symbolic link inside the deployment root naming the
//! deployment in service. It is the only thing that decides which version
//! runs, and it is only touched as the last step of an upgrade.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::core::UpdaterError;

/// Swings the active pointer to a deployment.
pub trait ActivePointerUpdater: Send + Sync {
    /// Make `pointer` designate `deployment`.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::PointerRefused`] when `pointer` is a real directory;
    /// I/O errors otherwise.
    fn activate(&self, deployment: &Path, pointer: &Path) -> Result<()>;
}

/// Creates the new link under a temporary name and renames it over the
/// pointer, so the pointer is never missing on POSIX file systems.
///
/// Windows cannot rename a link over an existing directory link; there it
/// behaves like [`RelinkPointer`].
#[derive(Debug, Default, Clone, Copy)]
pub struct AtomicPointer;

/// Removes the old pointer, then creates the new one. Between the two steps
/// the pointer does not exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct RelinkPointer;

impl ActivePointerUpdater for AtomicPointer {
    fn activate(&self, deployment: &Path, pointer: &Path) -> Result<()> {
        if cfg!(windows) {
            return RelinkPointer.activate(deployment, pointer);
        }

        ensure_replaceable(pointer)?;
        let target = link_target(deployment, pointer);
        let temp = temp_link_path(pointer);

        if fs::symlink_metadata(&temp).is_ok() {
            remove_link(&temp)
                .with_context(|| format!("Failed to remove stale link {}", temp.display()))?;
        }
        create_link(&target, &temp)
            .with_context(|| format!("Failed to create link {}", temp.display()))?;
        fs::rename(&temp, pointer).with_context(|| {
            format!("Failed to move {} over {}", temp.display(), pointer.display())
        })?;

        info!("Activated {} via {}", deployment.display(), pointer.display());
        Ok(())
    }
}

impl ActivePointerUpdater for RelinkPointer {
    fn activate(&self, deployment: &Path, pointer: &Path) -> Result<()> {
        ensure_replaceable(pointer)?;
        let target = link_target(deployment, pointer);

        if fs::symlink_metadata(pointer).is_ok() {
            remove_link(pointer)
                .with_context(|| format!("Failed to remove old pointer {}", pointer.display()))?;
        }
        create_link(&target, pointer)
            .with_context(|| format!("Failed to create pointer {}", pointer.display()))?;

        info!("Activated {} via {}", deployment.display(), pointer.display());
        Ok(())
    }
}

/// Refuse to replace anything that is not a link (or a plain file).
fn ensure_replaceable(pointer: &Path) -> Result<()> {
    match fs::symlink_metadata(pointer) {
        Ok(meta) if meta.file_type().is_dir() => Err(UpdaterError::PointerRefused {
            path: pointer.display().to_string(),
        }
        .into()),
        Ok(_) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to inspect {}", pointer.display())),
    }
}

/// Sibling deployments are linked by name so the root can be moved as a
/// whole; anything else keeps the path it was given.
fn link_target(deployment: &Path, pointer: &Path) -> PathBuf {
    match (deployment.parent(), pointer.parent(), deployment.file_name()) {
        (Some(a), Some(b), Some(name)) if a == b => PathBuf::from(name),
        _ => deployment.to_path_buf(),
    }
}

fn temp_link_path(pointer: &Path) -> PathBuf {
    let name = pointer.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
    pointer.with_file_name(format!(".{name}.tmp"))
}

#[cfg(unix)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    debug!("Linking {} -> {}", link.display(), target.display());
    std::os::unix::fs::symlink(target, link)
}

#[cfg(windows)]
fn create_link(target: &Path, link: &Path) -> io::Result<()> {
    debug!("Linking {} -> {}", link.display(), target.display());
    std::os::windows::fs::symlink_dir(target, link)
}

fn remove_link(link: &Path) -> io::Result<()> {
    match fs::remove_file(link) {
        Ok(()) => Ok(()),
        // Directory links on Windows are removed as directories
        Err(_) if cfg!(windows) => fs::remove_dir(link),
        Err(e) => Err(e),
    }
}
