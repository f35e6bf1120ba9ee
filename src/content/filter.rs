//! Content filter predicates
//!
//! Pure functions deciding whether a URL should be fetched at all and whether
//! a response is worth processing.

use crate::config::FilterConfig;
use crate::ConfigError;
use regex::Regex;
use url::Url;

/// Returns true if the URL path ends with one of `extensions`
///
/// Query and fragment are stripped first; the comparison is case-insensitive.
/// Multi-part extensions such as `.tar.gz` work as plain suffixes.
///
/// # Examples
///
/// ```
/// use safarnama::content::is_binary;
///
/// let exts = vec![".pdf".to_string(), ".tar.gz".to_string()];
/// assert!(is_binary("https://a.com/Report.PDF?dl=1#p2", &exts));
/// assert!(is_binary("https://a.com/src.tar.gz", &exts));
/// assert!(!is_binary("https://a.com/pdf-guide", &exts));
/// ```
pub fn is_binary(url: &str, extensions: &[String]) -> bool {
    let path = url_path(url).to_lowercase();
    extensions
        .iter()
        .any(|ext| !ext.is_empty() && path.ends_with(&ext.to_lowercase()))
}

/// Path component of a URL, or the raw string minus query and fragment when
/// it does not parse
fn url_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => parsed.path().to_string(),
        Err(_) => {
            let end = url.find(['?', '#']).unwrap_or(url.len());
            url[..end].to_string()
        }
    }
}

/// Returns true if a declared content type is on the allowlist
///
/// Parameters such as `charset` are ignored and matching is case-insensitive.
/// An allowlist entry matches exactly or as a prefix, so `text/` admits every
/// text subtype.
///
/// # Examples
///
/// ```
/// use safarnama::content::is_accepted;
///
/// let allow = vec!["text/html".to_string()];
/// assert!(is_accepted("text/html; charset=utf-8", &allow));
/// assert!(!is_accepted("image/png", &allow));
/// ```
pub fn is_accepted(content_type: &str, allowlist: &[String]) -> bool {
    let mime = essence(content_type);
    if mime.is_empty() {
        return false;
    }

    allowlist.iter().any(|entry| {
        let entry = entry.trim().to_lowercase();
        !entry.is_empty() && mime.starts_with(&entry)
    })
}

/// True for content the cleaner should parse as HTML
pub fn is_html(content_type: &str) -> bool {
    matches!(
        essence(content_type).as_str(),
        "text/html" | "application/xhtml+xml"
    )
}

/// Lowercased MIME type without parameters
fn essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_lowercase()
}

/// Extension and MIME policy assembled from configuration
#[derive(Debug, Clone)]
pub struct ContentFilter {
    binary_extensions: Vec<String>,
    accepted_content_types: Vec<String>,
}

impl ContentFilter {
    pub fn from_config(filter: &FilterConfig) -> Self {
        Self {
            binary_extensions: filter.binary_extensions.clone(),
            accepted_content_types: filter.accepted_content_types.clone(),
        }
    }

    pub fn is_binary(&self, url: &str) -> bool {
        is_binary(url, &self.binary_extensions)
    }

    pub fn is_accepted(&self, content_type: &str) -> bool {
        is_accepted(content_type, &self.accepted_content_types)
    }
}

/// Compiled `exclude-url-patterns`; matching is case-sensitive
#[derive(Debug, Clone, Default)]
pub struct UrlExclusions {
    patterns: Vec<Regex>,
}

impl UrlExclusions {
    pub fn compile(patterns: &[String]) -> Result<Self, ConfigError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(p).map_err(|e| {
                    ConfigError::InvalidPattern(format!("exclude-url-patterns '{}': {}", p, e))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    /// Returns the first exclusion pattern matching `url`, if any
    pub fn excluded_by(&self, url: &str) -> Option<&str> {
        self.patterns
            .iter()
            .find(|re| re.is_match(url))
            .map(|re| re.as_str())
    }
}
