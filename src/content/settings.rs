//! Per-page settings resolution
//!
//! Each setting is taken from the highest layer that sets it:
//! 1. the first `[[crawler.url-overrides]]` entry equal to the URL, else the
//!    first whose pattern matches it
//! 2. the `[[crawler.depth-overrides]]` entry for the URL's depth
//! 3. `[crawler]` and `[cleaner]`

use crate::config::{Config, SettingsOverride};
use crate::content::{ContentCleaner, UrlExclusions};
use crate::ConfigError;
use regex::Regex;
use std::collections::HashMap;

/// Settings in effect for one URL at one depth
#[derive(Debug, Clone, Copy)]
pub struct PageSettings<'a> {
    pub exclusions: &'a UrlExclusions,
    pub cleaner: &'a ContentCleaner,
    pub find_images: bool,
}

/// One compiled override; `None` defers to the layer below
#[derive(Debug, Clone, Default)]
struct Layer {
    exclusions: Option<UrlExclusions>,
    cleaner: Option<ContentCleaner>,
    find_images: Option<bool>,
}

impl Layer {
    fn compile(settings: &SettingsOverride) -> Result<Self, ConfigError> {
        Ok(Self {
            exclusions: settings
                .exclude_url_patterns
                .as_deref()
                .map(UrlExclusions::compile)
                .transpose()?,
            cleaner: settings
                .exclude_content_patterns
                .as_deref()
                .map(|patterns| ContentCleaner::new().with_exclude_patterns(patterns))
                .transpose()?,
            find_images: settings.find_images,
        })
    }
}

#[derive(Debug, Clone)]
struct UrlLayer {
    pattern: String,
    regex: Regex,
    layer: Layer,
}

/// Compiled base settings plus every override
#[derive(Debug, Clone)]
pub struct SettingsResolver {
    exclusions: UrlExclusions,
    cleaner: ContentCleaner,
    find_images: bool,
    by_depth: HashMap<u32, Layer>,
    by_url: Vec<UrlLayer>,
}

impl SettingsResolver {
    /// Compiles every pattern in the base settings and the overrides
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        let crawler = &config.crawler;

        let mut by_depth = HashMap::new();
        for entry in &crawler.depth_overrides {
            by_depth
                .entry(entry.depth)
                .or_insert(Layer::compile(&entry.settings)?);
        }

        let by_url = crawler
            .url_overrides
            .iter()
            .map(|entry| {
                let regex = Regex::new(&entry.pattern).map_err(|e| {
                    ConfigError::InvalidPattern(format!("url-overrides '{}': {}", entry.pattern, e))
                })?;
                Ok(UrlLayer {
                    pattern: entry.pattern.clone(),
                    regex,
                    layer: Layer::compile(&entry.settings)?,
                })
            })
            .collect::<Result<Vec<_>, ConfigError>>()?;

        Ok(Self {
            exclusions: UrlExclusions::compile(&crawler.exclude_url_patterns)?,
            cleaner: ContentCleaner::from_config(&config.cleaner)?,
            find_images: crawler.find_images,
            by_depth,
            by_url,
        })
    }

    /// Settings for `url` discovered at `depth`
    pub fn resolve(&self, url: &str, depth: u32) -> PageSettings<'_> {
        let layers = [self.url_layer(url), self.by_depth.get(&depth)];

        PageSettings {
            exclusions: layers
                .into_iter()
                .flatten()
                .find_map(|layer| layer.exclusions.as_ref())
                .unwrap_or(&self.exclusions),
            cleaner: layers
                .into_iter()
                .flatten()
                .find_map(|layer| layer.cleaner.as_ref())
                .unwrap_or(&self.cleaner),
            find_images: layers
                .into_iter()
                .flatten()
                .find_map(|layer| layer.find_images)
                .unwrap_or(self.find_images),
        }
    }

    fn url_layer(&self, url: &str) -> Option<&Layer> {
        self.by_url
            .iter()
            .find(|entry| entry.pattern == url)
            .or_else(|| self.by_url.iter().find(|entry| entry.regex.is_match(url)))
            .map(|entry| &entry.layer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DepthOverride, UrlOverride};

    fn strings(items: &[&str]) -> Option<Vec<String>> {
        Some(items.iter().map(|s| s.to_string()).collect())
    }

    fn config() -> Config {
        let mut config = Config::default();
        config.crawler.exclude_url_patterns = vec!["/private".to_string()];
        config.cleaner.exclude_content_patterns = vec!["footer text".to_string()];
        config.crawler.depth_overrides = vec![DepthOverride {
            depth: 2,
            settings: SettingsOverride {
                exclude_url_patterns: strings(&["/archive"]),
                find_images: Some(true),
                ..SettingsOverride::default()
            },
        }];
        config.crawler.url_overrides = vec![
            UrlOverride {
                pattern: "^https://a.com/blog/".to_string(),
                settings: SettingsOverride {
                    exclude_content_patterns: strings(&["share this"]),
                    find_images: Some(false),
                    ..SettingsOverride::default()
                },
            },
            UrlOverride {
                pattern: "https://a.com/blog/open".to_string(),
                settings: SettingsOverride {
                    exclude_url_patterns: strings(&[]),
                    ..SettingsOverride::default()
                },
            },
        ];
        config
    }

    #[test]
    fn test_base_settings_without_overrides() {
        let resolver = SettingsResolver::from_config(&config()).unwrap();
        let settings = resolver.resolve("https://a.com/private", 1);

        assert_eq!(settings.exclusions.excluded_by("https://a.com/private"), Some("/private"));
        assert_eq!(settings.cleaner.clean_text("keep footer text"), "keep");
        assert!(!settings.find_images);
    }

    #[test]
    fn test_depth_override_replaces_only_its_keys() {
        let resolver = SettingsResolver::from_config(&config()).unwrap();
        let settings = resolver.resolve("https://a.com/archive/1", 2);

        assert!(settings.exclusions.excluded_by("https://a.com/archive/1").is_some());
        assert!(settings.exclusions.excluded_by("https://a.com/private").is_none());
        assert_eq!(settings.cleaner.clean_text("keep footer text"), "keep");
        assert!(settings.find_images);
    }

    #[test]
    fn test_url_override_wins_over_depth() {
        let resolver = SettingsResolver::from_config(&config()).unwrap();
        let settings = resolver.resolve("https://a.com/blog/post", 2);

        assert!(!settings.find_images);
        assert_eq!(settings.cleaner.clean_text("Share This post"), "post");
        assert_eq!(settings.cleaner.clean_text("footer text"), "footer text");
        assert!(settings.exclusions.excluded_by("https://a.com/archive").is_some());
    }

    #[test]
    fn test_exact_url_match_preferred() {
        let resolver = SettingsResolver::from_config(&config()).unwrap();
        let settings = resolver.resolve("https://a.com/blog/open", 0);

        assert!(settings.exclusions.excluded_by("https://a.com/private").is_none());
        assert_eq!(settings.cleaner.clean_text("share this"), "share this");
    }
}
