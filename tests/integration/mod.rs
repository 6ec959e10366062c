//! Integration test suite for bedrock-updater
//!
//! End-to-end tests against an in-process HTTP server and temporary
//! deployment roots. Nothing here touches the network.
//!
//! # Running Integration Tests
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **cli**: the binary's commands and exit codes
//! - **resolver**: parser fallbacks and retry behaviour across sources
//! - **supervisor**: the long-running mode with a real child process
//! - **update_flow**: complete upgrades, world data, pointer and process ordering

mod common;

mod resolver;
#[cfg(unix)]
mod supervisor;
mod update_flow;
