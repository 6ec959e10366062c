//! Error handling for the updater
//!
//! Failures are modelled in two layers:
//! 1. [`UpdaterError`] - a `thiserror` enum classifying the failure modes the
//!    pipeline cares about (remote data unavailable, download, extraction,
//!    activation, configuration).
//! 2. [`ErrorContext`] - a display wrapper adding details and an actionable
//!    suggestion for CLI users.
//!
//! Pipeline code returns [`anyhow::Result`] and attaches context with
//! `.with_context()`. The typed error stays reachable through
//! [`anyhow::Error::chain`], so callers can still classify a failure:
//!
//! ```rust,no_run
//! use bedrock_updater::core::UpdaterError;
//!
//! fn is_remote_outage(err: &anyhow::Error) -> bool {
//!     err.chain().any(|cause| {
//!         matches!(
//!             cause.downcast_ref::<UpdaterError>(),
//!             Some(UpdaterError::VersionUnavailable { .. })
//!         )
//!     })
//! }
//! ```

use colored::Colorize;
use std::fmt;
use thiserror::Error;

/// The main error type for updater operations.
///
/// # Error Categories
///
/// ## Transient remote
/// - [`Network`] - the HTTP request could not be completed
/// - [`HttpStatus`] - the server answered with something other than 200
/// - [`VersionNotFound`] - every parser strategy missed on a version source
/// - [`ArtifactNotFound`] - the followed page had no platform download link
/// - [`MalformedLink`] - a link scraped from a page cannot be resolved
/// - [`VersionUnavailable`] - all resolve attempts failed; wraps the last cause
///
/// ## Local pipeline
/// - [`DownloadFailed`] - artifact could not be fetched to disk
/// - [`ExtractionFailed`] - archive could not be unpacked
/// - [`PointerRefused`] - the active pointer path is occupied by a real directory
///
/// ## Configuration
/// - [`ConfigError`] - the configuration file is missing a required value
/// - [`InvalidUrl`] - a configured URL cannot be parsed
///
/// [`Network`]: UpdaterError::Network
/// [`HttpStatus`]: UpdaterError::HttpStatus
/// [`VersionNotFound`]: UpdaterError::VersionNotFound
/// [`ArtifactNotFound`]: UpdaterError::ArtifactNotFound
/// [`MalformedLink`]: UpdaterError::MalformedLink
/// [`VersionUnavailable`]: UpdaterError::VersionUnavailable
/// [`DownloadFailed`]: UpdaterError::DownloadFailed
/// [`ExtractionFailed`]: UpdaterError::ExtractionFailed
/// [`PointerRefused`]: UpdaterError::PointerRefused
/// [`ConfigError`]: UpdaterError::ConfigError
/// [`InvalidUrl`]: UpdaterError::InvalidUrl
#[derive(Error, Debug)]
pub enum UpdaterError {
    /// HTTP request failed before a response was received
    #[error("Request to {url} failed")]
    Network {
        /// The URL that was requested
        url: String,
        /// Underlying client error
        #[source]
        source: reqwest::Error,
    },

    /// Remote answered with a non-200 status
    #[error("Unexpected HTTP status {status} from {url}")]
    HttpStatus {
        /// The URL that was requested
        url: String,
        /// Status code received
        status: u16,
    },

    /// No parser strategy found a version on the page
    #[error("No version information found at {url}")]
    VersionNotFound {
        /// The page that was parsed
        url: String,
    },

    /// No download link for the configured platform on the page
    #[error("No {platform} download link found at {url}")]
    ArtifactNotFound {
        /// The page that was parsed
        url: String,
        /// Platform the link was searched for
        platform: String,
    },

    /// A link found on a fetched page is not a usable URL
    #[error("Malformed link '{link}' on {page}: {reason}")]
    MalformedLink {
        /// The page the link was found on
        page: String,
        /// The link text as scraped
        link: String,
        /// Parser message
        reason: String,
    },

    /// Every resolve attempt failed
    #[error("Version info unavailable after {attempts} attempt(s)")]
    VersionUnavailable {
        /// Number of attempts made
        attempts: u32,
        /// The error from the final attempt
        #[source]
        source: Box<UpdaterError>,
    },

    /// A configured URL could not be parsed
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl {
        /// The offending URL text
        url: String,
        /// Parser message
        reason: String,
    },

    /// Artifact download failed
    #[error("Failed to download {url}: {reason}")]
    DownloadFailed {
        /// Artifact URL
        url: String,
        /// What went wrong
        reason: String,
    },

    /// Archive extraction failed
    #[error("Failed to extract {archive}: {reason}")]
    ExtractionFailed {
        /// Archive path
        archive: String,
        /// What went wrong
        reason: String,
    },

    /// The pointer path exists but is not a link we are allowed to replace
    #[error("Refusing to replace {path}: it is a directory, not a link")]
    PointerRefused {
        /// Pointer path
        path: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError {
        /// Description of the configuration error
        message: String,
    },
}

impl UpdaterError {
    /// Whether the error came from the remote side and is worth retrying.
    ///
    /// Anything wrong with a fetched page counts as remote, including a
    /// broken link on it. Local configuration problems such as an
    /// unparseable source URL are not transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. }
                | Self::HttpStatus { .. }
                | Self::VersionNotFound { .. }
                | Self::ArtifactNotFound { .. }
                | Self::MalformedLink { .. }
        )
    }
}

/// User-facing wrapper with optional details and a suggestion.
#[derive(Debug)]
pub struct ErrorContext {
    /// Rendered error message (including its causes)
    pub message: String,
    /// Optional suggestion for resolving the error
    pub suggestion: Option<String>,
    /// Optional additional details about the error
    pub details: Option<String>,
}

impl ErrorContext {
    /// Create a new error context from a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            suggestion: None,
            details: None,
        }
    }

    /// Add a suggestion for resolving the error.
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Add additional details explaining the error.
    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    /// Print the error to stderr: message in red, details in yellow,
    /// suggestion in green.
    pub fn display(&self) {
        eprintln!("{}: {}", "error".red().bold(), self.message);

        if let Some(details) = &self.details {
            eprintln!("{}: {}", "details".yellow(), details);
        }

        if let Some(suggestion) = &self.suggestion {
            eprintln!("{}: {}", "suggestion".green(), suggestion);
        }
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(details) = &self.details {
            write!(f, "\nDetails: {details}")?;
        }

        if let Some(suggestion) = &self.suggestion {
            write!(f, "\nSuggestion: {suggestion}")?;
        }

        Ok(())
    }
}

impl std::error::Error for ErrorContext {}

/// Convert any error into a user-friendly [`ErrorContext`].
///
/// The whole cause chain is rendered into the message; the first
/// [`UpdaterError`] or [`std::io::Error`] found in the chain decides the
/// suggestion.
#[must_use]
pub fn user_friendly_error(error: anyhow::Error) -> ErrorContext {
    let message = format!("{error:#}");

    for cause in error.chain() {
        if let Some(updater_error) = cause.downcast_ref::<UpdaterError>() {
            return context_for(updater_error, message);
        }

        if let Some(io_error) = cause.downcast_ref::<std::io::Error>() {
            return match io_error.kind() {
                std::io::ErrorKind::PermissionDenied => ErrorContext::new(message)
                    .with_suggestion(
                        "Check that the updater user owns the server directory and the backup directory",
                    )
                    .with_details("The updater could not read or write a file it needs"),
                std::io::ErrorKind::NotFound => ErrorContext::new(message)
                    .with_suggestion("Check the paths in your configuration file"),
                std::io::ErrorKind::StorageFull => ErrorContext::new(message)
                    .with_suggestion("Free some disk space; every deployment is a full server copy")
                    .with_details("Old bedrock-server-* directories are never removed automatically"),
                _ => ErrorContext::new(message),
            };
        }
    }

    ErrorContext::new(message)
}

fn context_for(error: &UpdaterError, message: String) -> ErrorContext {
    match error {
        UpdaterError::VersionUnavailable { source, .. } => context_for(source, message),
        UpdaterError::Network { .. } | UpdaterError::HttpStatus { .. } => ErrorContext::new(message)
            .with_suggestion("Check your network connection and the version source URLs, then retry")
            .with_details("The currently active deployment keeps serving; nothing was changed"),
        UpdaterError::VersionNotFound { .. }
        | UpdaterError::ArtifactNotFound { .. }
        | UpdaterError::MalformedLink { .. } => {
            ErrorContext::new(message)
                .with_suggestion(
                    "The page layout may have changed; try a different source (wiki_nav_url, changelog_url or download_url)",
                )
                .with_details("Every parser strategy missed on the fetched page")
        }
        UpdaterError::DownloadFailed { .. } | UpdaterError::ExtractionFailed { .. } => {
            ErrorContext::new(message)
                .with_suggestion("Remove the partial bedrock-server-* directory and retry")
                .with_details("Partially written deployments are left on disk for inspection")
        }
        UpdaterError::PointerRefused { .. } => ErrorContext::new(message).with_suggestion(
            "Move the directory out of the way; the pointer must be a symbolic link",
        ),
        UpdaterError::ConfigError { .. } | UpdaterError::InvalidUrl { .. } => {
            ErrorContext::new(message).with_suggestion("Fix the configuration file and run again")
        }
    }
}
