use serde::{Deserialize, Serialize};

/// Main configuration structure for Safarnama
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub filter: FilterConfig,
    #[serde(default)]
    pub cleaner: CleanerConfig,
    #[serde(default, rename = "user-agent")]
    pub user_agent: UserAgentConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// How the politeness delay is applied between consecutive fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ThrottleScope {
    /// One delay between any two fetches
    #[default]
    Global,
    /// Delay only between two fetches to the same host
    PerHost,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CrawlerConfig {
    /// Seed URL used by `start` when none is given on the command line
    pub base_url: String,

    /// Maximum link distance from a root URL
    pub max_depth: u32,

    /// Politeness delay between fetches (milliseconds)
    pub delay_ms: u64,

    /// Per-request timeout for page fetches (seconds)
    pub request_timeout_secs: u64,

    pub throttle: ThrottleScope,

    /// Follow links found on fetched pages
    pub recursive: bool,

    /// Only follow links that stay on the root URL's host
    pub same_host_only: bool,

    pub respect_robots: bool,

    /// Fetch binary-looking URLs when they were injected from search results
    pub fetch_binary_search_results: bool,

    /// Regexes; matching URLs are skipped without fetching
    pub exclude_url_patterns: Vec<String>,

    /// Log the images referenced by fetched HTML pages
    pub find_images: bool,

    /// Settings replaced for every URL at a given depth
    pub depth_overrides: Vec<DepthOverride>,

    /// Settings replaced for URLs equal to or matching a pattern; applied on
    /// top of the depth override
    pub url_overrides: Vec<UrlOverride>,
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            base_url: "https://www.techbend.io".to_string(),
            max_depth: 2,
            delay_ms: 1000,
            request_timeout_secs: 10,
            throttle: ThrottleScope::Global,
            recursive: true,
            same_host_only: true,
            respect_robots: true,
            fetch_binary_search_results: false,
            exclude_url_patterns: Vec::new(),
            find_images: false,
            depth_overrides: Vec::new(),
            url_overrides: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    /// Link following is off when disabled explicitly or when a run depth of
    /// 0 leaves nothing to follow
    pub fn follows_links(&self, max_depth: u32) -> bool {
        self.recursive && max_depth > 0
    }
}

/// Per-page settings an override may replace; unset keys keep the value
/// from the layer below
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SettingsOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_url_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclude_content_patterns: Option<Vec<String>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub find_images: Option<bool>,
}

/// `[[crawler.depth-overrides]]` entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct DepthOverride {
    pub depth: u32,
    #[serde(flatten)]
    pub settings: SettingsOverride,
}

/// `[[crawler.url-overrides]]` entry
///
/// `pattern` is compared to the normalized URL verbatim first, then as a
/// regex.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UrlOverride {
    pub pattern: String,
    #[serde(flatten)]
    pub settings: SettingsOverride,
}

/// Extension blocklist and MIME allowlist
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct FilterConfig {
    pub binary_extensions: Vec<String>,
    pub accepted_content_types: Vec<String>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            binary_extensions: [
                ".pdf", ".zip", ".exe", ".tar", ".tar.gz", ".tgz", ".rar", ".iso", ".bin", ".7z",
                ".dmg", ".tar.xz", ".pkg", ".bz2",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            accepted_content_types: [
                "text/html",
                "application/xhtml+xml",
                "text/plain",
                "text/xml",
                "application/xml",
                "application/json",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CleanerConfig {
    /// Regexes removed from cleaned text before enrichment
    pub exclude_content_patterns: Vec<String>,
}

/// User agent identification configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct UserAgentConfig {
    pub crawler_name: String,
    pub crawler_version: String,

    /// URL with information about the crawler, appended to the agent string
    pub contact_url: Option<String>,
}

impl Default for UserAgentConfig {
    fn default() -> Self {
        Self {
            crawler_name: "Safarnama".to_string(),
            crawler_version: env!("CARGO_PKG_VERSION").to_string(),
            contact_url: None,
        }
    }
}

impl UserAgentConfig {
    /// Format: `Name/Version` or `Name/Version (+ContactURL)`
    pub fn header_value(&self) -> String {
        match &self.contact_url {
            Some(contact) => format!(
                "{}/{} (+{})",
                self.crawler_name, self.crawler_version, contact
            ),
            None => format!("{}/{}", self.crawler_name, self.crawler_version),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct OutputConfig {
    /// Path to the SQLite database file
    pub database_path: String,

    /// Path of the sitemap written after `start`
    pub sitemap_path: String,

    pub generate_sitemap: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            database_path: "safarnama.db".to_string(),
            sitemap_path: "sitemap.xml".to_string(),
            generate_sitemap: true,
        }
    }
}

/// Chat-completion endpoint used for summaries and tags
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct LlmConfig {
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,

    /// Sent as a bearer token; overridden by `LLM_API_KEY`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Completion budget passed to the endpoint
    pub max_tokens: u32,

    /// Input budget; longer page text is truncated from the end
    pub max_input_tokens: usize,

    pub temperature: f32,
    pub prompt_template: String,
    pub system_prompt: String,
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            endpoint: "http://localhost:1234/v1/chat/completions".to_string(),
            model: "jinaai.readerlm-v2@q4_k_m".to_string(),
            api_key: None,
            max_tokens: 1024,
            max_input_tokens: 16_000,
            temperature: 0.7,
            prompt_template: "Please summarize the following webpage content and extract a list \
                              of relevant tags. Return your answer as JSON with keys 'summary' \
                              and 'tags'."
                .to_string(),
            system_prompt:
                "You are a helpful assistant that summarizes webpages and extracts tags."
                    .to_string(),
            timeout_secs: 120,
        }
    }
}

/// Order in which search instances are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Rotation {
    /// Always start from the first configured instance
    #[default]
    Fixed,
    /// Start one past the instance that served the previous query
    RoundRobin,
}

/// Pool of meta-search instances
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct SearchConfig {
    pub instances: Vec<String>,
    pub timeout_secs: u64,

    /// Consecutive failures after which an instance is marked unhealthy
    pub failure_threshold: u32,

    pub rotation: Rotation,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            instances: Vec::new(),
            timeout_secs: 10,
            failure_threshold: 2,
            rotation: Rotation::Fixed,
        }
    }
}
