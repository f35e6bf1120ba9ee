//! HTML content cleaner
//!
//! Turns a raw HTML document into:
//! - plain text with non-content nodes removed (see [`Removal`])
//! - the page title
//! - absolute, normalized outbound links, deduplicated in document order
//! - absolute image sources, collected the same way
//!
//! Links and images inside removed nodes are ignored along with their text.

use crate::config::CleanerConfig;
use crate::url::normalize_url;
use crate::ConfigError;
use regex::{Regex, RegexBuilder};
use scraper::node::Element;
use scraper::{ElementRef, Html, Node, Selector};
use std::collections::HashSet;
use url::Url;

/// Result of cleaning one page
#[derive(Debug, Clone, Default)]
pub struct CleanedPage {
    /// The page title (from <title> tag)
    pub title: Option<String>,

    /// Visible text, one block per line
    pub text: String,

    /// Absolute normalized links, first occurrence order
    pub links: Vec<String>,

    /// Absolute normalized `<img src>` targets
    pub images: Vec<String>,
}

/// A class of element dropped, with its whole subtree, while collecting text
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Removal {
    Script,
    Style,
    Noscript,
    Template,
    Iframe,
    Svg,
    Canvas,
    Meta,
    Link,
    /// `<head>`; the title is read separately
    Head,
    /// Elements carrying `hidden` or `aria-hidden="true"`
    Hidden,
}

impl Removal {
    /// Removal list applied by [`ContentCleaner::new`]
    pub const DEFAULT: &'static [Removal] = &[
        Removal::Script,
        Removal::Style,
        Removal::Noscript,
        Removal::Template,
        Removal::Iframe,
        Removal::Svg,
        Removal::Canvas,
        Removal::Meta,
        Removal::Link,
        Removal::Head,
        Removal::Hidden,
    ];

    fn matches(&self, element: &Element) -> bool {
        let name = element.name();
        match self {
            Self::Script => name == "script",
            Self::Style => name == "style",
            Self::Noscript => name == "noscript",
            Self::Template => name == "template",
            Self::Iframe => name == "iframe",
            Self::Svg => name == "svg",
            Self::Canvas => name == "canvas",
            Self::Meta => name == "meta",
            Self::Link => name == "link",
            Self::Head => name == "head",
            Self::Hidden => {
                element.attr("hidden").is_some()
                    || element
                        .attr("aria-hidden")
                        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
            }
        }
    }
}

/// Elements that start a new line of text
const BLOCK_ELEMENTS: &[&str] = &[
    "address", "article", "aside", "blockquote", "body", "br", "dd", "div", "dl", "dt",
    "figcaption", "figure", "footer", "form", "h1", "h2", "h3", "h4", "h5", "h6", "header",
    "hr", "li", "main", "nav", "ol", "p", "pre", "section", "table", "td", "th", "tr", "ul",
];

/// Strips markup from HTML and extracts links
#[derive(Debug, Clone)]
pub struct ContentCleaner {
    removals: Vec<Removal>,
    exclude_patterns: Vec<Regex>,
}

impl Default for ContentCleaner {
    fn default() -> Self {
        Self::new()
    }
}

impl ContentCleaner {
    /// Cleaner with the default removal list and no exclusion patterns
    pub fn new() -> Self {
        Self {
            removals: Removal::DEFAULT.to_vec(),
            exclude_patterns: Vec::new(),
        }
    }

    /// Cleaner whose text output also drops `exclude-content-patterns` matches
    ///
    /// Patterns match case-insensitively.
    pub fn from_config(config: &CleanerConfig) -> Result<Self, ConfigError> {
        Self::new().with_exclude_patterns(&config.exclude_content_patterns)
    }

    /// Replaces the exclusion patterns, compiled case-insensitively
    pub fn with_exclude_patterns(mut self, patterns: &[String]) -> Result<Self, ConfigError> {
        self.exclude_patterns = patterns
            .iter()
            .map(|p| {
                RegexBuilder::new(p)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| {
                        ConfigError::InvalidPattern(format!(
                            "exclude-content-patterns '{}': {}",
                            p, e
                        ))
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(self)
    }

    /// Replaces the removal list
    pub fn with_removals(mut self, removals: &[Removal]) -> Self {
        self.removals = removals.to_vec();
        self
    }

    /// Cleans an HTML document fetched from `page_url`
    ///
    /// Relative links resolve against `<base href>` when present, otherwise
    /// against `page_url`.
    ///
    /// # Example
    ///
    /// ```
    /// use safarnama::content::ContentCleaner;
    /// use url::Url;
    ///
    /// let html = r#"<html><head><title>T</title><script>x()</script></head>
    ///     <body><p>Hello</p><a href="/x">x</a></body></html>"#;
    /// let page = Url::parse("https://a.com/y/").unwrap();
    /// let cleaned = ContentCleaner::new().clean(html, &page);
    /// assert_eq!(cleaned.title.as_deref(), Some("T"));
    /// assert_eq!(cleaned.links, vec!["https://a.com/x"]);
    /// assert!(!cleaned.text.contains("x()"));
    /// ```
    pub fn clean(&self, html: &str, page_url: &Url) -> CleanedPage {
        let document = Html::parse_document(html);

        let mut raw = String::new();
        self.collect_text(document.root_element(), &mut raw);

        let base_url = base_href(&document, page_url);

        CleanedPage {
            title: extract_title(&document),
            text: self.clean_text(&raw),
            links: self.harvest(&document, &base_url, "a[href]", "href"),
            images: self.harvest(&document, &base_url, "img[src]", "src"),
        }
    }

    /// Applies exclusion patterns and whitespace collapsing to plain text
    ///
    /// Used directly for non-HTML bodies such as `text/plain`.
    pub fn clean_text(&self, text: &str) -> String {
        let mut text = text.to_string();
        for pattern in &self.exclude_patterns {
            text = pattern.replace_all(&text, "").into_owned();
        }
        collapse_whitespace(&text)
    }

    fn removes(&self, element: &Element) -> bool {
        self.removals.iter().any(|r| r.matches(element))
    }

    /// True if the element or one of its ancestors is dropped from the text
    fn is_removed(&self, element: ElementRef<'_>) -> bool {
        self.removes(element.value())
            || element
                .ancestors()
                .filter_map(|node| node.value().as_element())
                .any(|el| self.removes(el))
    }

    /// Resolves `attr` of every element matching `selector` to a normalized
    /// absolute URL, first occurrence order
    ///
    /// Anchors with a `download` attribute are skipped.
    fn harvest(&self, document: &Html, base_url: &Url, selector: &str, attr: &str) -> Vec<String> {
        let mut seen = HashSet::new();
        let mut found = Vec::new();

        let Ok(selector) = Selector::parse(selector) else {
            return found;
        };

        for element in document.select(&selector) {
            if element.value().attr("download").is_some() || self.is_removed(element) {
                continue;
            }

            let Some(target) = element.value().attr(attr) else {
                continue;
            };

            if let Some(url) = resolve_link(target, base_url) {
                if seen.insert(url.clone()) {
                    found.push(url);
                }
            }
        }

        found
    }

    fn collect_text(&self, element: ElementRef<'_>, out: &mut String) {
        for child in element.children() {
            match child.value() {
                Node::Text(text) => out.push_str(text),
                Node::Element(el) => {
                    if self.removes(el) {
                        continue;
                    }
                    let Some(child_ref) = ElementRef::wrap(child) else {
                        continue;
                    };
                    let block = BLOCK_ELEMENTS.contains(&el.name());
                    if block {
                        out.push('\n');
                    }
                    self.collect_text(child_ref, out);
                    if block {
                        out.push('\n');
                    }
                }
                _ => {}
            }
        }
    }
}

/// Cleans with the default removal list
pub fn clean(html: &str, page_url: &Url) -> CleanedPage {
    ContentCleaner::new().clean(html, page_url)
}

fn collapse_whitespace(text: &str) -> String {
    text.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Extracts the page title from the HTML document
fn extract_title(document: &Html) -> Option<String> {
    let title_selector = Selector::parse("title").ok()?;

    document
        .select(&title_selector)
        .next()
        .map(|element| collapse_whitespace(&element.text().collect::<String>()))
        .filter(|s| !s.is_empty())
}

fn base_href(document: &Html, page_url: &Url) -> Url {
    Selector::parse("base[href]")
        .ok()
        .and_then(|selector| {
            document
                .select(&selector)
                .next()
                .and_then(|el| el.value().attr("href"))
                .and_then(|href| page_url.join(href.trim()).ok())
        })
        .unwrap_or_else(|| page_url.clone())
}

/// Resolves a link href to a normalized absolute URL
///
/// Returns None if the link should be excluded:
/// - javascript:, mailto:, tel: schemes
/// - data: URIs
/// - Fragment-only anchors
/// - Invalid URLs
/// - Non-HTTP(S) URLs after resolution
fn resolve_link(href: &str, base_url: &Url) -> Option<String> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if ["javascript:", "mailto:", "tel:", "data:"]
        .iter()
        .any(|scheme| lower.starts_with(scheme))
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    normalize_url(absolute.as_str())
        .ok()
        .map(|url| url.to_string())
}
