use crate::UrlError;
use url::Url;

/// Tracking query parameters dropped during normalization
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid", "msclkid"];

/// Canonicalizes a URL so that equivalent spellings share one store key
///
/// # Normalization Steps
///
/// 1. Parse; only `http` and `https` are accepted
/// 2. Lowercase the host (the `url` crate does this while parsing)
/// 3. Drop default ports
/// 4. Remove dot segments and duplicate slashes from the path, strip the
///    trailing slash except for the root `/`
/// 5. Remove the fragment
/// 6. Remove tracking parameters (`utm_*`, `fbclid`, ...), sort the rest by key,
///    drop an empty query
///
/// # Examples
///
/// ```
/// use safarnama::url::normalize_url;
///
/// let url = normalize_url("HTTPS://Example.COM:443/docs/./guide/?b=2&a=1#top").unwrap();
/// assert_eq!(url.as_str(), "https://example.com/docs/guide?a=1&b=2");
/// ```
pub fn normalize_url(url_str: &str) -> Result<Url, UrlError> {
    let mut url = Url::parse(url_str.trim()).map_err(|e| UrlError::Parse(e.to_string()))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    if url.host_str().is_none() {
        return Err(UrlError::MissingHost);
    }

    if url.port() == url.port_or_known_default() && url.port().is_some() {
        url.set_port(None)
            .map_err(|_| UrlError::Malformed(format!("cannot clear port of {}", url_str)))?;
    }

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if let Some(query) = url.query() {
        let canonical = canonical_query(query);
        url.set_query(canonical.as_deref());
    }

    Ok(url)
}

/// Removes dot segments, empty segments and the trailing slash
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Drops empty and tracking pairs and sorts the rest by decoded key
///
/// Pairs keep their raw spelling, so a valueless `print` is not rewritten to
/// `print=` and percent-escapes survive as sent.
fn canonical_query(query: &str) -> Option<String> {
    let mut pairs: Vec<(String, &str)> = query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| (decoded_key(pair), pair))
        .filter(|(key, _)| !is_tracking_param(key))
        .collect();

    if pairs.is_empty() {
        return None;
    }

    pairs.sort();
    Some(
        pairs
            .iter()
            .map(|(_, pair)| *pair)
            .collect::<Vec<_>>()
            .join("&"),
    )
}

fn decoded_key(pair: &str) -> String {
    let raw_key = pair.split('=').next().unwrap_or_default();
    url::form_urlencoded::parse(raw_key.as_bytes())
        .next()
        .map(|(key, _)| key.into_owned())
        .unwrap_or_default()
}

fn is_tracking_param(key: &str) -> bool {
    key.starts_with("utm_") || TRACKING_PARAMS.contains(&key)
}
