//! Latest-version discovery.
//!
//! The resolver turns one or more configured web pages into a
//! [`Resolution`]: the newest published version and the URL of its server
//! archive. Three page shapes are understood (see [`VersionSource`]); each is
//! parsed by an ordered chain of independent strategies from
//! [`strategies`].
//!
//! # Resolution flow
//!
//! One attempt walks the sources in configuration order:
//!
//! 1. Fetch the source page (non-200 is a failure)
//! 2. Run the source's strategy chain; the first hit wins
//! 3. If the hit is a page rather than a `.zip`, fetch it and run the
//!    platform download chain
//! 4. Resolve relative links against the origin of the page they came from
//!
//! The first source that produces a resolution ends the attempt. When every
//! source fails, the whole attempt is retried according to the
//! [`RetryPolicy`]; after the last attempt the final cause is wrapped in
//! [`UpdaterError::VersionUnavailable`].

pub mod strategies;

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode, Url};
use tracing::{debug, info, warn};

use crate::config::{Platform, UpdaterConfig};
use crate::core::UpdaterError;
use crate::utils::RetryPolicy;
use strategies::{ArtifactStrategy, Lead, LeadStrategy};

/// A configured page the latest version can be read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VersionSource {
    /// Wiki navigation box with a `Latest: <version>` entry linking to a
    /// version page.
    NavIndex(Url),
    /// Changelog listing whose newest `Minecraft - <version> (Bedrock)` entry
    /// links to an article.
    Changelog(Url),
    /// Vendor download page carrying the platform archive links directly.
    DownloadPage(Url),
}

impl VersionSource {
    /// The page to fetch.
    pub fn url(&self) -> &Url {
        match self {
            Self::NavIndex(url) | Self::Changelog(url) | Self::DownloadPage(url) => url,
        }
    }

    /// Short name used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NavIndex(_) => "nav-index",
            Self::Changelog(_) => "changelog",
            Self::DownloadPage(_) => "download-page",
        }
    }
}

/// The newest version and where to download it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resolution {
    /// Version token as published; compared by exact string equality.
    pub version: String,
    /// Absolute URL of the server archive.
    pub artifact_url: Url,
}

/// Resolves the latest server version from the configured sources.
pub struct VersionResolver {
    client: Client,
    sources: Vec<VersionSource>,
    platform: Platform,
    retry: RetryPolicy,
    nav_chain: Vec<Box<dyn LeadStrategy>>,
    changelog_chain: Vec<Box<dyn LeadStrategy>>,
    download_chain: Vec<Box<dyn ArtifactStrategy>>,
}

impl VersionResolver {
    /// Create a resolver over explicit sources.
    ///
    /// # Errors
    ///
    /// Fails only if a strategy pattern does not compile.
    pub fn new(
        client: Client,
        sources: Vec<VersionSource>,
        platform: Platform,
        retry: RetryPolicy,
    ) -> Result<Self> {
        Ok(Self {
            client,
            sources,
            platform,
            retry,
            nav_chain: strategies::nav_index_chain()
                .context("Failed to compile navigation strategies")?,
            changelog_chain: strategies::changelog_chain()
                .context("Failed to compile changelog strategies")?,
            download_chain: strategies::download_chain(platform)
                .context("Failed to compile download strategies")?,
        })
    }

    /// Create a resolver from the sources, platform and retry settings of a
    /// configuration.
    pub fn from_config(client: Client, config: &UpdaterConfig) -> Result<Self> {
        Self::new(client, config.sources()?, config.platform, config.retry.policy())
    }

    /// Resolve the latest version, retrying transient failures.
    ///
    /// # Errors
    ///
    /// - [`UpdaterError::VersionUnavailable`] once all attempts failed; the
    ///   last cause is kept as its source
    /// - [`UpdaterError::ConfigError`] when no source is configured
    /// - any non-transient error immediately
    pub async fn resolve(&self) -> Result<Resolution, UpdaterError> {
        if self.sources.is_empty() {
            return Err(UpdaterError::ConfigError {
                message: "no version source configured".to_string(),
            });
        }

        let mut last_error = None;
        for attempt in 1..=self.retry.attempts {
            match self.resolve_once().await {
                Ok(resolution) => {
                    info!(
                        "Latest version is {} ({})",
                        resolution.version, resolution.artifact_url
                    );
                    return Ok(resolution);
                }
                Err(e) if e.is_transient() => {
                    warn!("Resolve attempt {}/{} failed: {}", attempt, self.retry.attempts, e);
                    last_error = Some(e);
                    self.retry.wait(attempt).await;
                }
                Err(e) => return Err(e),
            }
        }

        match last_error {
            Some(source) => Err(UpdaterError::VersionUnavailable {
                attempts: self.retry.attempts,
                source: Box::new(source),
            }),
            None => Err(UpdaterError::ConfigError {
                message: "resolver made no attempt".to_string(),
            }),
        }
    }

    async fn resolve_once(&self) -> Result<Resolution, UpdaterError> {
        let mut last_error = None;
        for source in &self.sources {
            match self.resolve_source(source).await {
                Ok(resolution) => return Ok(resolution),
                Err(e) => {
                    debug!("Source {} ({}) failed: {}", source.kind(), source.url(), e);
                    if !e.is_transient() {
                        return Err(e);
                    }
                    last_error = Some(e);
                }
            }
        }
        Err(last_error.unwrap_or_else(|| UpdaterError::ConfigError {
            message: "no version source configured".to_string(),
        }))
    }

    async fn resolve_source(&self, source: &VersionSource) -> Result<Resolution, UpdaterError> {
        let url = source.url();
        let document = self.fetch(url).await?;

        match source {
            VersionSource::NavIndex(_) => {
                let lead = run_lead_chain(&self.nav_chain, &document, url)?;
                self.follow(url, lead).await
            }
            VersionSource::Changelog(_) => {
                let lead = run_lead_chain(&self.changelog_chain, &document, url)?;
                self.follow(url, lead).await
            }
            VersionSource::DownloadPage(_) => {
                let artifact_url = self.artifact_on(url, &document)?;
                let version = strategies::artifact_version(artifact_url.path()).ok_or_else(
                    || UpdaterError::VersionNotFound {
                        url: artifact_url.to_string(),
                    },
                )?;
                Ok(Resolution {
                    version,
                    artifact_url,
                })
            }
        }
    }

    /// Turn a lead into a resolution, fetching the linked page unless the
    /// lead already points at an archive.
    async fn follow(&self, page: &Url, lead: Lead) -> Result<Resolution, UpdaterError> {
        let target = resolve_link(page, &lead.link)?;
        let artifact_url = if is_archive(&target) {
            target
        } else {
            debug!("Following {} for the {} download", target, self.platform.label());
            let document = self.fetch(&target).await?;
            self.artifact_on(&target, &document)?
        };

        Ok(Resolution {
            version: lead.version,
            artifact_url,
        })
    }

    fn artifact_on(&self, page: &Url, document: &str) -> Result<Url, UpdaterError> {
        let link = self
            .download_chain
            .iter()
            .find_map(|strategy| {
                let link = strategy.find(document)?;
                debug!("Download strategy '{}' matched {}", strategy.name(), link);
                Some(link)
            })
            .ok_or_else(|| UpdaterError::ArtifactNotFound {
                url: page.to_string(),
                platform: self.platform.label().to_string(),
            })?;
        resolve_link(page, &link)
    }

    async fn fetch(&self, url: &Url) -> Result<String, UpdaterError> {
        debug!("GET {}", url);
        let network = |source| UpdaterError::Network {
            url: url.to_string(),
            source,
        };

        let response = self.client.get(url.clone()).send().await.map_err(network)?;
        if response.status() != StatusCode::OK {
            return Err(UpdaterError::HttpStatus {
                url: url.to_string(),
                status: response.status().as_u16(),
            });
        }
        response.text().await.map_err(network)
    }
}

fn run_lead_chain(
    chain: &[Box<dyn LeadStrategy>],
    document: &str,
    url: &Url,
) -> Result<Lead, UpdaterError> {
    for (index, strategy) in chain.iter().enumerate() {
        if let Some(lead) = strategy.find(document) {
            if index > 0 {
                warn!("Primary marker missing on {}, matched with '{}'", url, strategy.name());
            }
            debug!("Strategy '{}' found {} -> {}", strategy.name(), lead.version, lead.link);
            return Ok(lead);
        }
    }
    Err(UpdaterError::VersionNotFound {
        url: url.to_string(),
    })
}

/// Resolve an `href` found on `page`.
///
/// Absolute links are kept. Root-relative links (`/w/...`) land on the
/// page's origin (scheme, host and port), so the host that served the page
/// is the host that serves the link. `&amp;` entities are decoded first.
pub fn resolve_link(page: &Url, link: &str) -> Result<Url, UpdaterError> {
    let link = link.trim().replace("&amp;", "&");
    page.join(&link).map_err(|e| UpdaterError::MalformedLink {
        page: page.to_string(),
        link: link.clone(),
        reason: e.to_string(),
    })
}

fn is_archive(url: &Url) -> bool {
    url.path().to_ascii_lowercase().ends_with(".zip")
}
