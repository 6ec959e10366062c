//! bedrock-updater - keeps a Minecraft Bedrock Dedicated Server on the latest release
//!
//! Each release is installed into its own versioned directory next to the
//! previous ones, and a single pointer (`Latest`) names the deployment the
//! server runs from. An upgrade never edits a running deployment in place:
//!
//! ```text
//! server_dir/
//! ├── bedrock-server-1.21.92.1/        previous deployment (kept)
//! ├── bedrock-server-1.21.93.1/        new deployment
//! │   └── worlds/                      migrated world data
//! ├── bedrock-server-1.21.93.1.zip     downloaded archive (kept)
//! ├── Latest -> bedrock-server-1.21.93.1
//! └── last_version.txt
//! ```
//!
//! # Core Modules
//!
//! - [`resolver`] - finds the latest version and its download link by scraping
//!   the configured pages, with retry and linear backoff
//! - [`deploy`] - download, extraction, world backup and migration, pointer swap
//! - [`process`] - server process control around the swap
//! - [`orchestrator`] - sequences one complete upgrade
//! - [`supervisor`] - long-running mode that owns the server process
//! - [`version_record`] - the last-installed-version file
//!
//! ## Supporting Modules
//!
//! - [`cli`] - command-line interface
//! - [`config`] - configuration file loading and validation
//! - [`core`] - error types and user-facing error formatting
//! - [`constants`] - default names, timings and HTTP identity
//! - [`utils`] - filesystem, HTTP, backoff and progress helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use bedrock_updater::config::UpdaterConfig;
//! use bedrock_updater::deploy::AtomicPointer;
//! use bedrock_updater::orchestrator::UpdateOrchestrator;
//! use bedrock_updater::utils::build_http_client;
//! use bedrock_updater::version_record::VersionRecord;
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = UpdaterConfig::load_from(Path::new("bedrock-updater.toml")).await?;
//! let orchestrator = UpdateOrchestrator::from_config(&config, build_http_client()?)?;
//! let record = VersionRecord::new(config.version_record_path());
//!
//! let status = orchestrator
//!     .update_if_new(&record.read().await?, &AtomicPointer, None)
//!     .await?;
//! if status.updated() {
//!     record.write(status.version()).await?;
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod constants;
pub mod core;
pub mod deploy;
pub mod orchestrator;
pub mod process;
pub mod resolver;
pub mod supervisor;
pub mod utils;
pub mod version_record;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
