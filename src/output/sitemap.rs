//! Sitemap export
//!
//! Renders the visited set as a sitemaps.org 0.9 `urlset` document.

use std::collections::BTreeSet;
use std::io;
use std::path::Path;

const SITEMAP_NS: &str = "http://www.sitemaps.org/schemas/sitemap/0.9";

/// Renders sorted `<url><loc>` entries
pub fn render_sitemap(urls: &BTreeSet<String>) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str(&format!("<urlset xmlns=\"{}\">\n", SITEMAP_NS));
    for url in urls {
        xml.push_str("  <url>\n");
        xml.push_str(&format!("    <loc>{}</loc>\n", escape_xml(url)));
        xml.push_str("  </url>\n");
    }
    xml.push_str("</urlset>\n");
    xml
}

/// Writes the sitemap for `urls` to `path`
///
/// # Returns
///
/// * `Ok(())` - Successfully wrote sitemap
/// * `Err(io::Error)` - Failed to write file
pub fn write_sitemap(urls: &BTreeSet<String>, path: &Path) -> io::Result<()> {
    std::fs::write(path, render_sitemap(urls))?;
    tracing::info!("Sitemap with {} URLs written to {}", urls.len(), path.display());
    Ok(())
}

fn escape_xml(s: &str) -> String {
    let mut escaped = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn set(urls: &[&str]) -> BTreeSet<String> {
        urls.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_render_sorted_and_escaped() {
        let xml = render_sitemap(&set(&["https://a.com/z", "https://a.com/?a=1&b=2"]));

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">"));

        let first = xml.find("<loc>https://a.com/?a=1&amp;b=2</loc>").unwrap();
        let second = xml.find("<loc>https://a.com/z</loc>").unwrap();
        assert!(first < second);
    }

    #[test]
    fn test_render_empty() {
        let xml = render_sitemap(&BTreeSet::new());
        assert!(!xml.contains("<url>"));
        assert!(xml.trim_end().ends_with("</urlset>"));
    }

    #[test]
    fn test_write_sitemap() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sitemap.xml");
        write_sitemap(&set(&["https://a.com/"]), &path).unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("<loc>https://a.com/</loc>"));
    }
}
