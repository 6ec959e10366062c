//! Long-running server supervision.
//!
//! The supervisor owns the server process: it starts the active deployment,
//! checks for a new release on a fixed interval, and lets the orchestrator
//! stop, swap and restart the server when one appears. A failed check is
//! logged and the running deployment keeps serving until the next tick.

use anyhow::Result;
use reqwest::Client;
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};

use crate::config::UpdaterConfig;
use crate::core::user_friendly_error;
use crate::deploy::{ActivePointerUpdater, AtomicPointer};
use crate::orchestrator::{UpdateOrchestrator, UpdateStatus};
use crate::process::{ChildProcessController, ProcessController};
use crate::version_record::VersionRecord;

/// Runs the server and keeps it on the latest release.
pub struct Supervisor {
    orchestrator: UpdateOrchestrator,
    record: VersionRecord,
    controller: ChildProcessController,
    pointer: Box<dyn ActivePointerUpdater>,
    interval: Duration,
    grace: Duration,
}

impl Supervisor {
    /// Supervisor with explicit collaborators.
    pub fn new(
        orchestrator: UpdateOrchestrator,
        record: VersionRecord,
        controller: ChildProcessController,
        interval: Duration,
        grace: Duration,
    ) -> Self {
        Self {
            orchestrator,
            record,
            controller,
            pointer: Box::new(AtomicPointer),
            interval,
            grace,
        }
    }

    /// Supervisor built from a configuration.
    pub fn from_config(config: &UpdaterConfig, client: Client) -> Result<Self> {
        Ok(Self::new(
            UpdateOrchestrator::from_config(config, client)?,
            VersionRecord::new(config.version_record_path()),
            ChildProcessController::new(config.server.clone()),
            config.server.check_interval(),
            config.server.shutdown_timeout(),
        ))
    }

    /// Use a different pointer strategy.
    pub fn with_pointer(mut self, pointer: Box<dyn ActivePointerUpdater>) -> Self {
        self.pointer = pointer;
        self
    }

    fn pointer_path(&self) -> PathBuf {
        self.orchestrator.layout().pointer_path()
    }

    /// Run until `shutdown` completes, then stop the server.
    ///
    /// The first update check happens immediately after start-up.
    pub async fn run_until<F>(mut self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        let pointer = self.pointer_path();
        if pointer.exists() {
            self.controller.start(&pointer).await?;
        } else {
            info!("No active deployment yet, waiting for the first update");
        }

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                () = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.check_once().await {
                        error!("Update check failed: {}", user_friendly_error(e));
                    }
                }
                status = self.controller.wait() => {
                    match status {
                        Ok(status) => warn!("Server exited on its own ({})", status),
                        Err(e) => warn!("Lost track of the server process: {:#}", e),
                    }
                }
            }
        }

        self.controller.request_shutdown().await?;
        self.controller.kill(self.grace).await?;
        Ok(())
    }

    /// Run one update check with process control and record the result.
    pub async fn check_once(&mut self) -> Result<UpdateStatus> {
        let current = self.record.read().await?;
        let status = self
            .orchestrator
            .update_if_new(&current, self.pointer.as_ref(), Some(&mut self.controller))
            .await?;

        if status.version() != current {
            self.record.write(status.version()).await?;
        }
        if let UpdateStatus::Updated { version, .. } = &status {
            info!("Server upgraded to {}", version);
        }
        Ok(status)
    }
}
