//! Parser strategies for the version sources.
//!
//! Each strategy is independent and looks at the raw HTML on its own; the
//! resolver runs a chain of them from strictest to loosest and stops at the
//! first hit. When the page layout changes, stricter strategies start missing
//! and a looser one takes over. When all of them miss, the resolver reports
//! [`crate::core::UpdaterError::VersionNotFound`] instead of guessing.
//!
//! Two kinds of strategy exist:
//! - [`LeadStrategy`] finds a `(version, link)` pair on an index page
//!   (navigation box, changelog listing)
//! - [`ArtifactStrategy`] finds the platform download link on a release or
//!   download page

use regex::Regex;

use crate::config::Platform;

/// Dotted-number version token (`1.21.93`, `1.21.93.1`).
const VERSION: &str = r"\d+(?:\.\d+)+";

/// A version together with the link it was found next to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lead {
    /// Version token as written on the page
    pub version: String,
    /// Raw `href` value (may be relative, may contain entities)
    pub link: String,
}

/// Finds a `(version, link)` pair on an index page.
pub trait LeadStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Search `document`; `None` when this strategy does not apply.
    fn find(&self, document: &str) -> Option<Lead>;
}

/// Finds a download link on a release or download page.
pub trait ArtifactStrategy: Send + Sync {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Search `document` for the raw `href` of the download.
    fn find(&self, document: &str) -> Option<String>;
}

/// Regex strategy with named `version` and `link` groups.
pub struct PatternLead {
    name: &'static str,
    pattern: Regex,
}

impl PatternLead {
    /// Compile `pattern`; it must define `version` and `link` groups.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
        })
    }
}

impl LeadStrategy for PatternLead {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, document: &str) -> Option<Lead> {
        let captures = self.pattern.captures(document)?;
        Some(Lead {
            version: captures.name("version")?.as_str().to_string(),
            link: captures.name("link")?.as_str().to_string(),
        })
    }
}

/// Bare `marker` text followed by a version, paired with the first link that
/// mentions that version.
///
/// The link is searched after the marker first, then anywhere in the
/// document, which covers navigation boxes that put the "Latest" label in a
/// different cell than the version links.
pub struct MarkerLead {
    name: &'static str,
    marker: &'static str,
    version_after_marker: Regex,
    href: Regex,
}

impl MarkerLead {
    /// Strategy for the given literal marker, e.g. `"Latest:"`.
    pub fn new(name: &'static str, marker: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            marker,
            version_after_marker: Regex::new(&format!(
                r"^(?:\s|&nbsp;|<[^>]+>)*(?P<version>{VERSION})"
            ))?,
            href: Regex::new(r#"href\s*=\s*"(?P<link>[^"]+)""#)?,
        })
    }

    fn link_mentioning(&self, haystack: &str, version: &str) -> Option<String> {
        self.href
            .captures_iter(haystack)
            .filter_map(|c| c.name("link"))
            .map(|m| m.as_str())
            .find(|link| mentions_version(link, version))
            .map(str::to_string)
    }
}

impl LeadStrategy for MarkerLead {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, document: &str) -> Option<Lead> {
        for (index, _) in document.match_indices(self.marker) {
            let after = &document[index + self.marker.len()..];
            let Some(captures) = self.version_after_marker.captures(after) else {
                continue;
            };
            let version = captures.name("version")?.as_str();

            let link = self
                .link_mentioning(after, version)
                .or_else(|| self.link_mentioning(document, version));
            if let Some(link) = link {
                return Some(Lead {
                    version: version.to_string(),
                    link,
                });
            }
        }
        None
    }
}

/// Regex strategy with a named `link` group.
pub struct PatternArtifact {
    name: &'static str,
    pattern: Regex,
}

impl PatternArtifact {
    /// Compile `pattern`; it must define a `link` group.
    pub fn new(name: &'static str, pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            name,
            pattern: Regex::new(pattern)?,
        })
    }
}

impl ArtifactStrategy for PatternArtifact {
    fn name(&self) -> &'static str {
        self.name
    }

    fn find(&self, document: &str) -> Option<String> {
        self.pattern
            .captures(document)
            .and_then(|c| c.name("link"))
            .map(|m| m.as_str().to_string())
    }
}

/// Strategies for the wiki navigation box, strictest first:
///
/// 1. `layout` - `<span class="bedrock-latest"><a href=".." title="..">Latest: X</a></span>`
/// 2. `anchor` - any `<a>` with an `href` (attributes in any order) whose text starts with `Latest: X`
/// 3. `marker` - bare `Latest:` text, link searched separately
/// 4. `direct` - first `Bedrock_Edition_X` link, no marker at all
pub fn nav_index_chain() -> Result<Vec<Box<dyn LeadStrategy>>, regex::Error> {
    Ok(vec![
        Box::new(PatternLead::new(
            "layout",
            &format!(
                r#"<span class="bedrock-latest">\s*<a href="(?P<link>[^"]+)" title="[^"]*">\s*Latest:\s*(?P<version>{VERSION})\s*</a>"#
            ),
        )?),
        Box::new(PatternLead::new(
            "anchor",
            &format!(
                r#"(?s)<a\s[^>]*?\bhref\s*=\s*"(?P<link>[^"]+)"[^>]*>\s*(?:<[^>]+>\s*)*Latest:\s*(?P<version>{VERSION})"#
            ),
        )?),
        Box::new(MarkerLead::new("marker", "Latest:")?),
        Box::new(PatternLead::new(
            "direct",
            &format!(r#"href\s*=\s*"(?P<link>[^"]*Bedrock_Edition_(?P<version>{VERSION}))""#),
        )?),
    ])
}

/// Strategies for the changelog listing, strictest first. Only full releases
/// (`Minecraft - X (Bedrock)`) match; preview and beta posts are skipped.
pub fn changelog_chain() -> Result<Vec<Box<dyn LeadStrategy>>, regex::Error> {
    Ok(vec![
        Box::new(PatternLead::new(
            "layout",
            &format!(
                r#"<a href="(?P<link>[^"]+)" class="article-list-link">\s*Minecraft\s*-\s*(?P<version>{VERSION})\s*\(Bedrock\)\s*</a>"#
            ),
        )?),
        Box::new(PatternLead::new(
            "anchor",
            &format!(
                r#"(?s)<a\s[^>]*?\bhref\s*=\s*"(?P<link>[^"]+)"[^>]*>\s*Minecraft(?:\s|&nbsp;)*-(?:\s|&nbsp;)*(?P<version>{VERSION})(?:\s|&nbsp;)*\(Bedrock\)"#
            ),
        )?),
    ])
}

/// Strategies for the platform download link, strictest first:
///
/// 1. `aria-label` - vendor layout, `href` before `aria-label="serverBedrock<Platform>"`
/// 2. `bin-path` - any link into `/<bin-dir>/bedrock-server-X.zip`
/// 3. `anchor-text` - a `.zip` anchor whose text names the platform
pub fn download_chain(platform: Platform) -> Result<Vec<Box<dyn ArtifactStrategy>>, regex::Error> {
    let label = regex::escape(platform.label());
    let bin_dir = regex::escape(platform.bin_dir());

    Ok(vec![
        Box::new(PatternArtifact::new(
            "aria-label",
            &format!(r#"<a\s[^>]*?\bhref="(?P<link>[^"]+\.zip)"[^>]*\baria-label="serverBedrock{label}""#),
        )?),
        Box::new(PatternArtifact::new(
            "bin-path",
            &format!(r#"href\s*=\s*"(?P<link>[^"]*/{bin_dir}/bedrock-server-{VERSION}\.zip)""#),
        )?),
        Box::new(PatternArtifact::new(
            "anchor-text",
            &format!(
                r#"(?s)<a\s[^>]*?\bhref\s*=\s*"(?P<link>[^"]+\.zip)"[^>]*>(?:[^<]|<[^/a][^>]*>|</[^a][^>]*>)*?\b{label}\b"#
            ),
        )?),
    ])
}

/// Version embedded in an artifact name such as `bedrock-server-1.21.93.1.zip`.
pub fn artifact_version(link: &str) -> Option<String> {
    let file_name = link.rsplit('/').next()?;
    let version = file_name.strip_prefix("bedrock-server-")?.strip_suffix(".zip")?;
    let mut parts = version.split('.');
    let well_formed = parts.clone().count() >= 2
        && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    well_formed.then(|| version.to_string())
}

/// Whether `haystack` contains `version` as a whole token, so `1.21.9` is not
/// found inside `1.21.93` and `1.21.93` is not found inside `1.21.93.1`.
pub fn mentions_version(haystack: &str, version: &str) -> bool {
    haystack.match_indices(version).any(|(start, _)| {
        let before = haystack[..start].chars().next_back();
        let mut after = haystack[start + version.len()..].chars();
        let next = after.next();
        let following = after.next();

        let clean_start = !matches!(before, Some(c) if c.is_ascii_digit() || c == '.');
        let clean_end = match next {
            Some(c) if c.is_ascii_digit() => false,
            Some('.') => !matches!(following, Some(c) if c.is_ascii_digit()),
            _ => true,
        };
        clean_start && clean_end
    })
}
