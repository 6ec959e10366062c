//! Command-line interface for the Bedrock server updater.
//!
//! # Available Commands
//!
//! - `update` - install the latest server release once and exit
//! - `check` - report the latest published version without changing anything
//! - `run` - supervise the server and upgrade it on a fixed interval
//!
//! # Global Options
//!
//! All commands support these global options:
//! - `--verbose` - Enable debug output
//! - `--quiet` - Suppress all logging
//! - `--no-progress` - Disable download progress bars
//! - `--config` - Path to the configuration file (default `bedrock-updater.toml`)
//!
//! `RUST_LOG`, when set, overrides the level chosen by `--verbose`/`--quiet`.
//!
//! # Example
//!
//! ```bash
//! # One-shot upgrade, e.g. from cron
//! bedrock-updater --config /srv/bedrock/updater.toml update --no-progress
//!
//! # Is there anything new?
//! bedrock-updater check --format json
//!
//! # Keep the server running and up to date
//! bedrock-updater run
//! ```

mod check;
mod run;
mod update;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::config::UpdaterConfig;
use crate::constants::DEFAULT_CONFIG_FILE;

/// Settings shared by every command, derived from the global flags.
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Log level for the updater's own output; `None` disables logging.
    pub log_level: Option<String>,

    /// Hide download progress bars.
    pub no_progress: bool,

    /// Configuration file to load.
    pub config_path: PathBuf,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            log_level: Some("info".to_string()),
            no_progress: false,
            config_path: PathBuf::from(DEFAULT_CONFIG_FILE),
        }
    }
}

impl CliConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Install the global tracing subscriber.
    ///
    /// Calling it more than once is harmless; later calls are ignored.
    pub fn init_logging(&self) {
        let filter = match (std::env::var("RUST_LOG"), &self.log_level) {
            (Ok(_), _) => EnvFilter::from_default_env(),
            (Err(_), Some(level)) => EnvFilter::new(format!("bedrock_updater={level}")),
            (Err(_), None) => return,
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init();
    }

    /// Load the configuration file named by `--config`.
    pub async fn load_updater_config(&self) -> Result<UpdaterConfig> {
        UpdaterConfig::load_from(&self.config_path).await
    }

    /// Path of the configuration file.
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }
}

/// Keeps a Minecraft Bedrock Dedicated Server on the latest release.
#[derive(Parser)]
#[command(
    name = "bedrock-updater",
    about = "Keep a Minecraft Bedrock Dedicated Server on the latest release",
    version,
    author,
    long_about = "bedrock-updater finds the latest Bedrock Dedicated Server release, \
                  installs it next to the current one, carries the world data over and \
                  switches the active deployment in one step."
)]
pub struct Cli {
    /// Command to execute
    #[command(subcommand)]
    command: Commands,

    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all logging
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    quiet: bool,

    /// Path to the configuration file (TOML, or JSON for legacy files)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Disable download progress bars
    #[arg(long, global = true)]
    no_progress: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install the latest release if it is newer than the recorded one
    Update(update::UpdateCommand),

    /// Show the latest published release without installing it
    Check(check::CheckCommand),

    /// Run the server and upgrade it whenever a new release appears
    Run(run::RunCommand),
}

impl Cli {
    /// Execute the selected command.
    pub async fn execute(self) -> Result<()> {
        let config = self.build_config();
        self.execute_with_config(config).await
    }

    /// Derive the shared settings from the global flags.
    #[must_use]
    pub fn build_config(&self) -> CliConfig {
        let log_level = if self.verbose {
            Some("debug".to_string())
        } else if self.quiet {
            None
        } else {
            Some("info".to_string())
        };

        CliConfig {
            log_level,
            no_progress: self.no_progress,
            config_path: self
                .config
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE)),
        }
    }

    /// Execute the selected command with explicit settings.
    pub async fn execute_with_config(self, config: CliConfig) -> Result<()> {
        config.init_logging();

        match self.command {
            Commands::Update(cmd) => cmd.execute(&config).await,
            Commands::Check(cmd) => cmd.execute(&config).await,
            Commands::Run(cmd) => cmd.execute(&config).await,
        }
    }
}
