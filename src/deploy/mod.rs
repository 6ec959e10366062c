//! Deployment pipeline stages.
//!
//! A deployment root holds one directory per installed version plus the
//! active pointer:
//!
//! ```text
//! <root>/
//! ├── bedrock-server-1.21.92.1/
//! │   └── worlds/
//! ├── bedrock-server-1.21.93.1/
//! │   └── worlds/
//! ├── bedrock-server-1.21.93.1.zip
//! └── Latest -> bedrock-server-1.21.93.1
//! ```
//!
//! Each stage lives in its own module and is awaited in sequence by the
//! orchestrator:
//! - [`download`] - stream the archive into the root
//! - [`extract`] - unpack it into a new versioned directory
//! - [`backup`] - snapshot the active world data
//! - [`migrate`] - carry world data over from the previous deployment
//! - [`pointer`] - swing the active pointer

pub mod backup;
pub mod download;
pub mod extract;
pub mod migrate;
pub mod pointer;

pub use backup::WorldBackup;
pub use download::ArtifactDownloader;
pub use extract::ArchiveExtractor;
pub use migrate::{MigrationOutcome, WorldMigrator};
pub use pointer::{ActivePointerUpdater, AtomicPointer, RelinkPointer};

use reqwest::Url;
use std::path::{Path, PathBuf};

use crate::constants::FALLBACK_ARTIFACT_NAME;
use crate::resolver::strategies::artifact_version;

/// Names and locations inside the deployment root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploymentLayout {
    /// Deployment root directory.
    pub root: PathBuf,
    /// Directory name prefix, joined to the version with `-`.
    pub prefix: String,
    /// Name of the active pointer inside `root`.
    pub pointer_name: String,
    /// Name of the world-data subtree inside a deployment.
    pub worlds_dir_name: String,
}

impl DeploymentLayout {
    /// The active pointer path.
    pub fn pointer_path(&self) -> PathBuf {
        self.root.join(&self.pointer_name)
    }

    /// Directory name for `version`, e.g. `bedrock-server-1.21.93.1`.
    pub fn deployment_name(&self, version: &str) -> String {
        format!("{}-{}", self.prefix, version)
    }

    /// Directory for `version` inside the root.
    pub fn deployment_dir(&self, version: &str) -> PathBuf {
        self.root.join(self.deployment_name(version))
    }

    /// World data of `deployment`.
    pub fn worlds_in(&self, deployment: &Path) -> PathBuf {
        deployment.join(&self.worlds_dir_name)
    }

    /// World data reached through the active pointer.
    pub fn active_worlds(&self) -> PathBuf {
        self.worlds_in(&self.pointer_path())
    }

    /// Whether a directory entry name looks like a deployment.
    pub fn is_deployment_name(&self, name: &str) -> bool {
        name.strip_prefix(&self.prefix)
            .and_then(|rest| rest.strip_prefix('-'))
            .is_some_and(|version| !version.is_empty())
    }

    /// Where the archive at `url` is stored: the last URL path segment inside
    /// the root, or `server.zip` when the URL has none.
    pub fn artifact_path(&self, url: &Url) -> PathBuf {
        let name = url
            .path_segments()
            .and_then(|mut segments| segments.next_back())
            .filter(|name| !name.is_empty())
            .unwrap_or(FALLBACK_ARTIFACT_NAME);
        self.root.join(name)
    }

    /// Version used in the deployment name: taken from the archive file name
    /// (`bedrock-server-<version>.zip`), or `resolved` when the name carries
    /// none.
    pub fn deployment_version(url: &Url, resolved: &str) -> String {
        artifact_version(url.path()).unwrap_or_else(|| resolved.to_string())
    }
}
