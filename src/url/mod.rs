//! URL handling module for Ripple-Ingest
//!
//! This module provides URL normalization, domain extraction, path pattern
//! matching, and the canonical document name used as the dedup key.

mod domain;
mod matcher;
mod normalize;

use crate::{UrlError, UrlResult};

// Re-export main functions
pub use domain::{domain_label, extract_domain};
pub use matcher::matches_path_pattern;
pub use normalize::normalize_url;

/// Maximum characters of the query string kept in a canonical name
pub const MAX_QUERY_CHARS: usize = 50;

/// Maximum total characters of a canonical name
pub const MAX_NAME_CHARS: usize = 200;

/// Derives the canonical document name for a URL
///
/// The name is `domain + path` followed by `?` and the first
/// [`MAX_QUERY_CHARS`] characters of the sorted query string, if any. It is a
/// pure function of the URL: titles and page content never influence it, so
/// the same page maps to the same name whether checked before or after
/// content extraction.
///
/// # Examples
///
/// ```
/// use ripple_ingest::url::canonical_name;
///
/// assert_eq!(canonical_name("https://x.com/a/b/").unwrap(), "x.com/a/b");
/// assert_eq!(canonical_name("https://x.com/").unwrap(), "x.com");
/// ```
pub fn canonical_name(url: &str) -> UrlResult<String> {
    let url = normalize_url(url)?;
    let domain = extract_domain(&url).ok_or(UrlError::MissingDomain)?;

    let mut name = format!("{}{}", domain, url.path().trim_end_matches('/'));
    if let Some(query) = url.query() {
        name.push('?');
        name.extend(query.chars().take(MAX_QUERY_CHARS));
    }

    Ok(name.chars().take(MAX_NAME_CHARS).collect())
}

/// A document's dedup key together with its optional human title
///
/// The title is carried along for metadata only; [`DocumentName::key`] is
/// always the canonical name of the URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentName {
    canonical: String,
    title: Option<String>,
}

impl DocumentName {
    /// Builds the document name for a page URL and optional extracted title
    pub fn new(url: &str, title: Option<&str>) -> UrlResult<Self> {
        Ok(Self {
            canonical: canonical_name(url)?,
            title: title
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string),
        })
    }

    /// The canonical name, used as the dedup key and remote document name
    pub fn key(&self) -> &str {
        &self.canonical
    }

    /// The extracted title, if one was supplied
    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title for display, falling back to the canonical name
    pub fn display_title(&self) -> &str {
        self.title().unwrap_or(&self.canonical)
    }
}
