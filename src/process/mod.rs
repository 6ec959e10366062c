//! Server process lifecycle.
//!
//! The orchestrator drives a running server through
//! Running -> ShutdownRequested -> Stopped -> Started around the pointer
//! swap. [`ProcessController`] is the seam: the orchestrator only sees the
//! trait, tests supply recording doubles, and [`ChildProcessController`] is
//! the concrete controller used by the `run` command.

use anyhow::{Context, Result};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, Command};
use tracing::{debug, info, warn};

use crate::config::ServerSettings;

/// Boxed future returned by [`ProcessController`] methods.
pub type ControlFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Controls the server process around an upgrade.
///
/// The orchestrator calls, exactly once per upgrade that proceeds and in
/// this order: [`is_running`](Self::is_running),
/// [`request_shutdown`](Self::request_shutdown), [`kill`](Self::kill), the
/// pointer swap, then [`start`](Self::start). None of them is called when the
/// installed version is already the latest.
///
/// If any of those steps fails, the orchestrator calls
/// [`is_running`](Self::is_running) again and, when the server is down,
/// [`start`](Self::start) with the pointer as it stands.
pub trait ProcessController: Send {
    /// Whether the server process is currently alive.
    fn is_running(&mut self) -> ControlFuture<'_, bool>;

    /// Ask the server to stop gracefully. Must not wait for the exit.
    fn request_shutdown(&mut self) -> ControlFuture<'_, ()>;

    /// Wait up to `grace` for the process to exit, then force-kill it.
    fn kill(&mut self, grace: Duration) -> ControlFuture<'_, ()>;

    /// Launch the server from the now-active deployment.
    fn start(&mut self, active: &Path) -> ControlFuture<'_, ()>;
}

/// Runs the dedicated server as a child process.
///
/// The child's stdin is piped so the console `stop` command can be written
/// to it; stdout and stderr are inherited.
pub struct ChildProcessController {
    settings: ServerSettings,
    child: Option<Child>,
}

impl ChildProcessController {
    /// Controller for the executable and arguments in `settings`. No process
    /// is started yet.
    pub fn new(settings: ServerSettings) -> Self {
        Self {
            settings,
            child: None,
        }
    }

    /// Executable path: absolute as configured, otherwise inside `active`.
    pub fn executable_in(&self, active: &Path) -> PathBuf {
        let executable = Path::new(&self.settings.executable);
        if executable.is_absolute() {
            executable.to_path_buf()
        } else {
            active.join(executable)
        }
    }

    /// PID of the running child, if any.
    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().and_then(Child::id)
    }

    /// Wait for the child to exit on its own. Pending forever when no child
    /// is running, so it can sit in a `select!` next to other events.
    pub async fn wait(&mut self) -> Result<ExitStatus> {
        match self.child.as_mut() {
            Some(child) => {
                let status = child.wait().await.context("Failed to wait for server process")?;
                self.child = None;
                Ok(status)
            }
            None => std::future::pending().await,
        }
    }

    fn command(&self, active: &Path) -> Command {
        let mut command = Command::new(self.executable_in(active));
        command
            .args(&self.settings.args)
            .current_dir(active)
            .stdin(Stdio::piped())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        // The Linux build loads its bundled libraries from the working directory
        #[cfg(unix)]
        command.env("LD_LIBRARY_PATH", active);

        command
    }
}

impl ProcessController for ChildProcessController {
    fn is_running(&mut self) -> ControlFuture<'_, bool> {
        Box::pin(async move {
            let Some(child) = self.child.as_mut() else {
                return Ok(false);
            };
            match child.try_wait().context("Failed to query server process")? {
                Some(status) => {
                    debug!("Server process already exited with {}", status);
                    self.child = None;
                    Ok(false)
                }
                None => Ok(true),
            }
        })
    }

    fn request_shutdown(&mut self) -> ControlFuture<'_, ()> {
        Box::pin(async move {
            let command = format!("{}\n", self.settings.shutdown_command);
            let Some(stdin) = self.child.as_mut().and_then(|c| c.stdin.as_mut()) else {
                debug!("No server console to send '{}' to", self.settings.shutdown_command);
                return Ok(());
            };

            info!("Requesting server shutdown");
            if let Err(e) = stdin.write_all(command.as_bytes()).await {
                // A closed pipe means the process is already on its way out
                warn!("Could not write shutdown command: {}", e);
                return Ok(());
            }
            if let Err(e) = stdin.flush().await {
                warn!("Could not flush shutdown command: {}", e);
            }
            Ok(())
        })
    }

    fn kill(&mut self, grace: Duration) -> ControlFuture<'_, ()> {
        Box::pin(async move {
            let Some(mut child) = self.child.take() else {
                return Ok(());
            };

            match tokio::time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => {
                    info!("Server stopped ({})", status);
                    Ok(())
                }
                Ok(Err(e)) => Err(e).context("Failed to wait for server process"),
                Err(_) => {
                    warn!("Server did not stop within {:?}, killing it", grace);
                    child.kill().await.context("Failed to kill server process")
                }
            }
        })
    }

    fn start(&mut self, active: &Path) -> ControlFuture<'_, ()> {
        let active = active.to_path_buf();
        Box::pin(async move {
            let executable = self.executable_in(&active);
            let child = self.command(&active).spawn().with_context(|| {
                format!("Failed to start server executable {}", executable.display())
            })?;
            info!("Started server (pid {:?}) from {}", child.id(), active.display());
            self.child = Some(child);
            Ok(())
        })
    }
}
