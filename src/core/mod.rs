//! Core error types shared by every stage of the update pipeline.
//!
//! - [`UpdaterError`] - classified failure modes
//! - [`ErrorContext`] - user-facing wrapper with details and suggestions
//! - [`user_friendly_error`] - converts any [`anyhow::Error`] for CLI display

pub mod error;

pub use error::{ErrorContext, UpdaterError, user_friendly_error};
