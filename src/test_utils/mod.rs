//! Test utilities for the updater
//!
//! Available to unit tests and, through the `test-utils` feature, to the
//! integration tests:
//! - [`TestServer`] - in-process HTTP server with canned routes and hit counts
//! - [`ZipFixture`] - in-memory server archives
//! - [`RecordingController`] - process controller that logs its calls
//! - deployment tree helpers
//!
//! # Example
//!
//! ```rust,no_run
//! use bedrock_updater::test_utils::{TestServer, ZipFixture};
//!
//! # async fn example() {
//! let server = TestServer::start().await;
//! server.file("/bin-win/bedrock-server-1.21.93.1.zip", ZipFixture::server_distribution("1.21.93.1").build());
//! let url = server.url("/bin-win/bedrock-server-1.21.93.1.zip");
//! # }
//! ```

pub mod fixtures;
pub mod server;

pub use fixtures::{RecordingController, ZipFixture, deployment_with_world, link_pointer};
pub use server::TestServer;

use std::sync::Once;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use crate::constants::USER_AGENT;

/// Global flag to ensure logging is only initialized once in tests
static INIT_LOGGING: Once = Once::new();

/// Initialize logging for tests.
///
/// Uses `level` when given, otherwise `RUST_LOG`; with neither set, tests
/// run without a subscriber.
///
/// ```bash
/// RUST_LOG=bedrock_updater=debug cargo test
/// ```
pub fn init_test_logging(level: Option<Level>) {
    INIT_LOGGING.call_once(|| {
        let filter = if let Some(level) = level {
            EnvFilter::new(level.to_string())
        } else if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            return;
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .with_target(true)
            .with_thread_ids(false)
            .try_init();
    });
}

/// HTTP client for talking to a [`TestServer`].
///
/// Same user agent as production, with proxy detection disabled so a proxy
/// configured in the environment never sees loopback requests.
pub fn test_client() -> reqwest::Client {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .no_proxy()
        .build()
        .expect("build test HTTP client")
}
