//! One-shot upgrade.
//!
//! Resolves the latest release and, if it differs from the recorded
//! version, installs it next to the current deployment, migrates the world
//! data and swings the active pointer. The server process is not touched;
//! use `run` for a supervised server.
//!
//! # Examples
//!
//! ```bash
//! bedrock-updater update
//! bedrock-updater update --current 1.21.92.1
//! bedrock-updater update --relink --no-progress
//! ```

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use super::CliConfig;
use crate::deploy::{ActivePointerUpdater, AtomicPointer, RelinkPointer};
use crate::orchestrator::{UpdateOrchestrator, UpdateStatus};
use crate::utils::build_http_client;
use crate::version_record::VersionRecord;

/// Install the latest release if it is newer than the recorded one.
#[derive(Args, Debug)]
pub struct UpdateCommand {
    /// Treat this as the installed version instead of reading the record
    #[arg(long, value_name = "VERSION")]
    current: Option<String>,

    /// Remove and recreate the pointer instead of replacing it atomically
    #[arg(long)]
    relink: bool,
}

impl UpdateCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let config = cli.load_updater_config().await?;
        let orchestrator = UpdateOrchestrator::from_config(&config, build_http_client()?)?
            .with_progress(!cli.no_progress);
        let record = VersionRecord::new(config.version_record_path());

        let recorded = record.read().await?;
        let current = self.current.clone().unwrap_or_else(|| recorded.clone());

        let pointer: &dyn ActivePointerUpdater = if self.relink {
            &RelinkPointer
        } else {
            &AtomicPointer
        };

        println!("🔍 Checking for a new server release");
        let status = orchestrator.update_if_new(&current, pointer, None).await?;

        // An explicit --current says nothing about what is installed, so only
        // a real upgrade or a stale record from a previous run gets written.
        if status.version() != recorded && (status.updated() || self.current.is_none()) {
            record.write(status.version()).await?;
        }

        match &status {
            UpdateStatus::UpToDate { version } => {
                println!("✅ Already up to date ({})", version.green());
            }
            UpdateStatus::Updated {
                version,
                deployment,
            } => {
                let from = if current.is_empty() { "nothing" } else { current.as_str() };
                println!("📦 Upgraded {} → {}", from.yellow(), version.green());
                println!("   Active deployment: {}", deployment.display());
            }
        }
        Ok(())
    }
}
