//! URL handling module for Safarnama
//!
//! Normalization gives every discovered URL one canonical spelling, which is
//! what the store keys records by.

mod normalize;

pub use normalize::normalize_url;

use url::Url;

/// Extracts the lowercase host of a URL, including a non-default port
///
/// Two URLs on the same host but different ports are different sites for the
/// purpose of same-host link following and per-host throttling.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use safarnama::url::extract_host;
///
/// let url = Url::parse("https://Example.com/path").unwrap();
/// assert_eq!(extract_host(&url), Some("example.com".to_string()));
///
/// let url = Url::parse("http://127.0.0.1:8080/").unwrap();
/// assert_eq!(extract_host(&url), Some("127.0.0.1:8080".to_string()));
/// ```
pub fn extract_host(url: &Url) -> Option<String> {
    let host = url.host_str()?.to_lowercase();
    Some(match url.port() {
        Some(port) => format!("{}:{}", host, port),
        None => host,
    })
}
