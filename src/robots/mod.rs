//! Robots.txt handling module
//!
//! Fetches and parses robots.txt once per host when `respect-robots` is set.
//! A missing or unreachable file allows everything.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use std::time::Duration;
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// # Arguments
///
/// * `fetcher` - The fetcher used for page requests
/// * `url` - Any URL on the host
/// * `timeout` - Per-request timeout
///
/// # Returns
///
/// The parsed file, or `ParsedRobots::allow_all()` when the request fails or
/// answers with a non-2xx status.
pub async fn fetch_robots<F: Fetcher>(fetcher: &F, url: &Url, timeout: Duration) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(_) => return ParsedRobots::allow_all(),
    };

    match fetcher.fetch(robots_url.as_str(), timeout).await {
        Ok(page) if page.is_success() => {
            tracing::debug!("Fetched {}", robots_url);
            ParsedRobots::from_content(&page.body)
        }
        Ok(page) => {
            tracing::debug!(
                "No robots.txt at {} (HTTP {}), allowing all",
                robots_url,
                page.status_code
            );
            ParsedRobots::allow_all()
        }
        Err(e) => {
            tracing::warn!("Failed to fetch {}: {}, allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Path and query of a URL as matched against robots rules
pub fn robots_path(url: &Url) -> String {
    match url.query() {
        Some(query) => format!("{}?{}", url.path(), query),
        None => url.path().to_string(),
    }
}
