//! File system helpers shared by the deployment stages.
//!
//! All functions are synchronous; async callers run them through
//! `tokio::task::spawn_blocking`.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Ensures a directory exists, creating it and all parent directories if necessary.
///
/// Fails if `path` exists but is not a directory.
pub fn ensure_dir(path: &Path) -> Result<()> {
    if path.exists() {
        if !path.is_dir() {
            anyhow::bail!("Path exists but is not a directory: {}", path.display());
        }
        return Ok(());
    }

    fs::create_dir_all(path)
        .with_context(|| format!("Failed to create directory: {}", path.display()))
}

/// Writes a file atomically: the content goes to a sibling `.tmp` file which is
/// synced and then renamed over `path`. Readers never see a partial file.
///
/// Parent directories are created automatically.
pub fn atomic_write(path: &Path, content: &[u8]) -> Result<()> {
    use std::io::Write;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        ensure_dir(parent)?;
    }

    let temp_path = path.with_extension("tmp");

    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

        file.write_all(content)
            .with_context(|| format!("Failed to write to temp file: {}", temp_path.display()))?;

        file.sync_all().with_context(|| "Failed to sync file to disk")?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename temp file to: {}", path.display()))?;

    Ok(())
}

/// Recursively copies `src` into `dst`, preserving permission bits.
///
/// - Intermediate directories are created as needed
/// - Existing files at the destination are overwritten
/// - Symbolic links and special files are skipped
/// - Directory permissions are applied after their contents are copied, so a
///   read-only source directory does not block its own copy
///
/// Returns the number of regular files copied.
pub fn copy_tree(src: &Path, dst: &Path) -> Result<u64> {
    let mut files_copied = 0;
    let mut directories: Vec<(PathBuf, fs::Permissions)> = Vec::new();

    for entry in WalkDir::new(src).follow_links(false) {
        let entry =
            entry.with_context(|| format!("Failed to walk directory: {}", src.display()))?;
        let relative = entry
            .path()
            .strip_prefix(src)
            .with_context(|| format!("Entry outside source tree: {}", entry.path().display()))?;
        let target = dst.join(relative);
        let file_type = entry.file_type();

        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .with_context(|| format!("Failed to create directory: {}", target.display()))?;
            let permissions = entry
                .metadata()
                .with_context(|| format!("Failed to read metadata: {}", entry.path().display()))?
                .permissions();
            directories.push((target, permissions));
        } else if file_type.is_file() {
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
            }
            // fs::copy truncates the destination and carries the permission bits over
            fs::copy(entry.path(), &target).with_context(|| {
                format!(
                    "Failed to copy file from {} to {}",
                    entry.path().display(),
                    target.display()
                )
            })?;
            files_copied += 1;
        }
    }

    // Deepest first
    for (dir, permissions) in directories.into_iter().rev() {
        fs::set_permissions(&dir, permissions)
            .with_context(|| format!("Failed to set permissions on {}", dir.display()))?;
    }

    Ok(files_copied)
}
