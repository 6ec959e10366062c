//! Updater configuration.
//!
//! The configuration is loaded once by the CLI and handed to the core as an
//! already-parsed [`UpdaterConfig`]. Two file formats are accepted:
//!
//! - **TOML** (default)
//! - **JSON** when the file name ends in `.json`, which is the format written by
//!   earlier wrapper versions (`server_dir`, `backup_dir`, `world_dir`,
//!   `network_share`, `wiki_nav_url`, `last_version_file`)
//!
//! # Example
//!
//! ```toml
//! server_dir = "~/bedrock"
//! backup_dir = "~/bedrock-backups"
//! wiki_nav_url = "https://minecraft.wiki/w/Template:Navbox_Bedrock_Edition_versions"
//! download_url = "https://www.minecraft.net/en-us/download/server/bedrock"
//! platform = "linux"
//!
//! [retry]
//! attempts = 3
//! backoff_secs = 1
//!
//! [server]
//! shutdown_timeout_secs = 30
//! check_interval_secs = 3600
//! ```
//!
//! Paths accept a leading `~`, expanded with `shellexpand`. Empty strings
//! (as written by the legacy JSON format) count as "not set".

use anyhow::{Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;

use crate::constants::{
    DEFAULT_BACKOFF_BASE, DEFAULT_CHECK_INTERVAL_SECS, DEFAULT_DEPLOYMENT_PREFIX,
    DEFAULT_POINTER_NAME, DEFAULT_RESOLVE_ATTEMPTS, DEFAULT_SERVER_EXECUTABLE,
    DEFAULT_SHUTDOWN_COMMAND, DEFAULT_SHUTDOWN_TIMEOUT_SECS, DEFAULT_WORLDS_DIR_NAME,
};
use crate::core::UpdaterError;
use crate::deploy::DeploymentLayout;
use crate::resolver::VersionSource;
use crate::utils::RetryPolicy;

/// Download platform of the server distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// `bin-win` builds, `aria-label="serverBedrockWindows"` anchors
    #[default]
    Windows,
    /// `bin-linux` builds, `aria-label="serverBedrockLinux"` anchors
    Linux,
}

impl Platform {
    /// Human-readable name, also used in `aria-label` and anchor text.
    pub fn label(self) -> &'static str {
        match self {
            Self::Windows => "Windows",
            Self::Linux => "Linux",
        }
    }

    /// Path segment of the vendor download URL.
    pub fn bin_dir(self) -> &'static str {
        match self {
            Self::Windows => "bin-win",
            Self::Linux => "bin-linux",
        }
    }
}

/// Retry settings for version resolution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrySettings {
    /// Total resolve attempts.
    #[serde(default = "default_attempts")]
    pub attempts: u32,
    /// Linear backoff base in seconds.
    #[serde(default = "default_backoff_secs")]
    pub backoff_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            backoff_secs: default_backoff_secs(),
        }
    }
}

impl RetrySettings {
    /// Convert to the policy consumed by the resolver.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.attempts, Duration::from_secs(self.backoff_secs))
    }
}

/// Settings for the supervised server process (`run` command).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    /// Executable, relative to the active deployment unless absolute.
    #[serde(default = "default_executable")]
    pub executable: String,
    /// Extra arguments passed to the executable.
    #[serde(default)]
    pub args: Vec<String>,
    /// Console line written to stdin to request a graceful stop.
    #[serde(default = "default_shutdown_command")]
    pub shutdown_command: String,
    /// How long a graceful stop may take before the process is killed.
    #[serde(default = "default_shutdown_timeout_secs")]
    pub shutdown_timeout_secs: u64,
    /// Interval between update checks.
    #[serde(default = "default_check_interval_secs")]
    pub check_interval_secs: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            executable: default_executable(),
            args: Vec::new(),
            shutdown_command: default_shutdown_command(),
            shutdown_timeout_secs: default_shutdown_timeout_secs(),
            check_interval_secs: default_check_interval_secs(),
        }
    }
}

impl ServerSettings {
    /// Grace period handed to [`crate::process::ProcessController::kill`].
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.shutdown_timeout_secs)
    }

    /// Supervisor check interval (at least one second).
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_secs.max(1))
    }
}

/// Complete updater configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdaterConfig {
    /// Deployment root: holds every `bedrock-server-<version>` directory and the pointer.
    pub server_dir: PathBuf,

    /// Destination for world snapshots taken before each migration.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub backup_dir: Option<PathBuf>,

    /// Explicit world-data location used as the migration source instead of
    /// `<pointer>/worlds`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub world_dir: Option<PathBuf>,

    /// Second destination that receives a mirror of every world snapshot.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub network_share: Option<PathBuf>,

    /// Navigation-index page listing the latest release.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wiki_nav_url: Option<String>,

    /// Changelog listing page.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub changelog_url: Option<String>,

    /// Vendor download page with direct platform links.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,

    /// File holding the last installed version. Defaults to
    /// `<server_dir>/last_version.txt`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_version_file: Option<PathBuf>,

    /// Which build to download.
    #[serde(default)]
    pub platform: Platform,

    /// Prefix of deployment directory names.
    #[serde(default = "default_deployment_prefix")]
    pub deployment_prefix: String,

    /// Name of the active pointer inside `server_dir`.
    #[serde(default = "default_pointer_name")]
    pub pointer_name: String,

    /// Name of the world-data subtree inside a deployment.
    #[serde(default = "default_worlds_dir_name")]
    pub worlds_dir_name: String,

    /// Resolve retry settings.
    #[serde(default)]
    pub retry: RetrySettings,

    /// Supervised server settings.
    #[serde(default)]
    pub server: ServerSettings,
}

impl UpdaterConfig {
    /// Minimal configuration rooted at `server_dir`, without any version source.
    pub fn new(server_dir: impl Into<PathBuf>) -> Self {
        Self {
            server_dir: server_dir.into(),
            backup_dir: None,
            world_dir: None,
            network_share: None,
            wiki_nav_url: None,
            changelog_url: None,
            download_url: None,
            last_version_file: None,
            platform: Platform::default(),
            deployment_prefix: default_deployment_prefix(),
            pointer_name: default_pointer_name(),
            worlds_dir_name: default_worlds_dir_name(),
            retry: RetrySettings::default(),
            server: ServerSettings::default(),
        }
    }

    /// Load, normalise and validate a configuration file.
    ///
    /// # Errors
    ///
    /// - the file cannot be read
    /// - the content is not valid TOML/JSON
    /// - validation fails (see [`UpdaterConfig::validate`])
    pub async fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        let is_json = path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
        let config: Self = if is_json {
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        } else {
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config from {}", path.display()))?
        };

        let config = config.normalized();
        config.validate()?;
        Ok(config)
    }

    /// Drop empty optional values and expand `~` in every path.
    #[must_use]
    pub fn normalized(mut self) -> Self {
        self.server_dir = expand_path(&self.server_dir);
        self.backup_dir = non_empty_path(self.backup_dir.take());
        self.world_dir = non_empty_path(self.world_dir.take());
        self.network_share = non_empty_path(self.network_share.take());
        self.last_version_file = non_empty_path(self.last_version_file.take());
        self.wiki_nav_url = non_empty(self.wiki_nav_url.take());
        self.changelog_url = non_empty(self.changelog_url.take());
        self.download_url = non_empty(self.download_url.take());
        self
    }

    /// Check the values the core relies on.
    ///
    /// # Errors
    ///
    /// [`UpdaterError::ConfigError`] if `server_dir` is empty, no version source
    /// is configured, or a layout name is empty; [`UpdaterError::InvalidUrl`]
    /// if a source URL does not parse.
    pub fn validate(&self) -> Result<(), UpdaterError> {
        if self.server_dir.as_os_str().is_empty() {
            return Err(UpdaterError::ConfigError {
                message: "server_dir must be set".to_string(),
            });
        }

        for (field, value) in [
            ("deployment_prefix", &self.deployment_prefix),
            ("pointer_name", &self.pointer_name),
            ("worlds_dir_name", &self.worlds_dir_name),
        ] {
            if value.trim().is_empty() {
                return Err(UpdaterError::ConfigError {
                    message: format!("{field} must not be empty"),
                });
            }
        }

        if self.sources()?.is_empty() {
            return Err(UpdaterError::ConfigError {
                message: "at least one of wiki_nav_url, changelog_url or download_url must be set"
                    .to_string(),
            });
        }

        Ok(())
    }

    /// Configured version sources in the order they are tried.
    pub fn sources(&self) -> Result<Vec<VersionSource>, UpdaterError> {
        let mut sources = Vec::new();
        if let Some(url) = &self.wiki_nav_url {
            sources.push(VersionSource::NavIndex(parse_url(url)?));
        }
        if let Some(url) = &self.changelog_url {
            sources.push(VersionSource::Changelog(parse_url(url)?));
        }
        if let Some(url) = &self.download_url {
            sources.push(VersionSource::DownloadPage(parse_url(url)?));
        }
        Ok(sources)
    }

    /// Directory layout derived from this configuration.
    pub fn layout(&self) -> DeploymentLayout {
        DeploymentLayout {
            root: self.server_dir.clone(),
            prefix: self.deployment_prefix.clone(),
            pointer_name: self.pointer_name.clone(),
            worlds_dir_name: self.worlds_dir_name.clone(),
        }
    }

    /// Location of the last-known-version record.
    pub fn version_record_path(&self) -> PathBuf {
        self.last_version_file
            .clone()
            .unwrap_or_else(|| self.server_dir.join("last_version.txt"))
    }
}

fn parse_url(url: &str) -> Result<Url, UpdaterError> {
    Url::parse(url).map_err(|e| UpdaterError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}

fn expand_path(path: &Path) -> PathBuf {
    PathBuf::from(shellexpand::tilde(&path.to_string_lossy()).into_owned())
}

fn non_empty_path(path: Option<PathBuf>) -> Option<PathBuf> {
    path.filter(|p| !p.as_os_str().is_empty()).map(|p| expand_path(&p))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn default_attempts() -> u32 {
    DEFAULT_RESOLVE_ATTEMPTS
}

fn default_backoff_secs() -> u64 {
    DEFAULT_BACKOFF_BASE.as_secs()
}

fn default_executable() -> String {
    DEFAULT_SERVER_EXECUTABLE.to_string()
}

fn default_shutdown_command() -> String {
    DEFAULT_SHUTDOWN_COMMAND.to_string()
}

fn default_shutdown_timeout_secs() -> u64 {
    DEFAULT_SHUTDOWN_TIMEOUT_SECS
}

fn default_check_interval_secs() -> u64 {
    DEFAULT_CHECK_INTERVAL_SECS
}

fn default_deployment_prefix() -> String {
    DEFAULT_DEPLOYMENT_PREFIX.to_string()
}

fn default_pointer_name() -> String {
    DEFAULT_POINTER_NAME.to_string()
}

fn default_worlds_dir_name() -> String {
    DEFAULT_WORLDS_DIR_NAME.to_string()
}
