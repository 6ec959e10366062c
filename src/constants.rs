//! Global constants used throughout the updater.
//!
//! Layout names, retry parameters and HTTP identity live here so the
//! defaults in [`crate::config`] and the tests agree on a single value.

use std::time::Duration;

/// Default prefix of every versioned deployment directory (`bedrock-server-<version>`).
pub const DEFAULT_DEPLOYMENT_PREFIX: &str = "bedrock-server";

/// Default name of the active pointer inside the deployment root.
pub const DEFAULT_POINTER_NAME: &str = "Latest";

/// Default name of the world-data subtree inside a deployment.
pub const DEFAULT_WORLDS_DIR_NAME: &str = "worlds";

/// Number of resolve attempts before giving up.
pub const DEFAULT_RESOLVE_ATTEMPTS: u32 = 3;

/// Base delay of the linear resolve backoff (1s, 2s, 3s, ...).
pub const DEFAULT_BACKOFF_BASE: Duration = Duration::from_secs(1);

/// Browser-like user agent. The vendor download page rejects requests
/// without one.
pub const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/126.0 Safari/537.36";

/// File name used for the artifact when the URL has no usable last segment.
pub const FALLBACK_ARTIFACT_NAME: &str = "server.zip";

/// Console command that makes the dedicated server save and exit.
pub const DEFAULT_SHUTDOWN_COMMAND: &str = "stop";

/// How long a graceful shutdown may take before the server is killed.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Interval between update checks in supervisor mode (1 hour).
pub const DEFAULT_CHECK_INTERVAL_SECS: u64 = 3600;

/// Server executable name relative to the active deployment.
#[cfg(windows)]
pub const DEFAULT_SERVER_EXECUTABLE: &str = "bedrock_server.exe";

/// Server executable name relative to the active deployment.
#[cfg(not(windows))]
pub const DEFAULT_SERVER_EXECUTABLE: &str = "bedrock_server";

/// Configuration file read when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "bedrock-updater.toml";

/// Environment variable that disables progress bars when set.
pub const NO_PROGRESS_ENV: &str = "BEDROCK_UPDATER_NO_PROGRESS";
