//! Shared helpers: file system operations, retry backoff and HTTP setup.
//!
//! - [`fs`] - directory creation, atomic writes and mode-preserving tree copies
//! - [`backoff`] - the linear [`RetryPolicy`] used by the version resolver
//! - [`http`] - the shared `reqwest` client with the browser user agent
//! - [`progress`] - `indicatif` download bars

pub mod backoff;
pub mod fs;
pub mod http;
pub mod progress;

pub use backoff::RetryPolicy;
pub use fs::{atomic_write, copy_tree, ensure_dir};
pub use http::build_http_client;
