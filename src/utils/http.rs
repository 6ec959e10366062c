//! Shared HTTP client construction.

use anyhow::{Context, Result};
use reqwest::Client;

use crate::constants::USER_AGENT;

/// Build the client used for every outbound request.
///
/// All requests carry the browser-like [`USER_AGENT`]. No request timeout is
/// set; the resolver's retry ceiling is the only bound.
pub fn build_http_client() -> Result<Client> {
    Client::builder().user_agent(USER_AGENT).build().context("Failed to build HTTP client")
}
