//! Supervised server mode.
//!
//! Starts the active deployment, checks for a new release every
//! `server.check_interval_secs` (or `--interval`), upgrades in place with a
//! graceful stop and restart, and stops the server on Ctrl-C.

use anyhow::Result;
use clap::Args;
use tracing::{info, warn};

use super::CliConfig;
use crate::deploy::RelinkPointer;
use crate::supervisor::Supervisor;
use crate::utils::build_http_client;

/// Run the server and upgrade it whenever a new release appears.
#[derive(Args, Debug)]
pub struct RunCommand {
    /// Seconds between update checks (overrides the configuration)
    #[arg(long, value_name = "SECS")]
    interval: Option<u64>,

    /// Remove and recreate the pointer instead of replacing it atomically
    #[arg(long)]
    relink: bool,
}

impl RunCommand {
    pub async fn execute(self, cli: &CliConfig) -> Result<()> {
        let mut config = cli.load_updater_config().await?;
        if let Some(secs) = self.interval {
            config.server.check_interval_secs = secs;
        }

        let mut supervisor = Supervisor::from_config(&config, build_http_client()?)?;
        if self.relink {
            supervisor = supervisor.with_pointer(Box::new(RelinkPointer));
        }

        info!(
            "Supervising {} (checking every {:?})",
            config.server_dir.display(),
            config.server.check_interval()
        );
        supervisor
            .run_until(async {
                if let Err(e) = tokio::signal::ctrl_c().await {
                    warn!("Cannot listen for Ctrl-C: {}", e);
                    std::future::pending::<()>().await;
                }
            })
            .await
    }
}
