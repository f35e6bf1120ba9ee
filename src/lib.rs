//! Safarnama: a site crawler with content cleaning and LLM enrichment
//!
//! This crate walks a website breadth-first from a seed URL (or from links
//! harvested through a pool of meta-search instances), cleans each page down
//! to plain text, optionally asks a chat-completion endpoint for a summary and
//! tags, and records everything in a SQLite store that doubles as the
//! "have we seen this URL" authority.

pub mod config;
pub mod content;
pub mod crawler;
pub mod llm;
pub mod output;
pub mod retry;
pub mod robots;
pub mod search;
pub mod state;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Safarnama operations
#[derive(Debug, Error)]
pub enum SafarnamaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Unaccepted content type for {url}: {content_type}")]
    UnacceptedContentType { url: String, content_type: String },

    #[error("Binary extension skipped without fetching: {url}")]
    BinaryExtensionSkip { url: String },

    #[error("URL excluded by pattern {pattern}: {url}")]
    ExcludedByPattern { url: String, pattern: String },

    #[error("URL disallowed by robots.txt: {url}")]
    RobotsDenied { url: String },

    #[error("Malformed LLM response: {0}")]
    MalformedLlmResponse(String),

    #[error("No healthy search instance answered (tried {tried})")]
    NoHealthyInstance { tried: usize },

    #[error("Persistence error: {0}")]
    Persistence(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    Url(#[from] UrlError),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl SafarnamaError {
    /// Returns true for per-URL outcomes that mark a page `Skipped`
    /// rather than aborting anything
    pub fn is_skip(&self) -> bool {
        matches!(
            self,
            Self::UnacceptedContentType { .. }
                | Self::BinaryExtensionSkip { .. }
                | Self::ExcludedByPattern { .. }
                | Self::RobotsDenied { .. }
        )
    }
}

impl From<llm::LlmError> for SafarnamaError {
    fn from(err: llm::LlmError) -> Self {
        match err {
            llm::LlmError::Malformed(message) => Self::MalformedLlmResponse(message),
            other => Self::Network {
                url: other.endpoint().unwrap_or_default().to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl From<search::SearchError> for SafarnamaError {
    fn from(err: search::SearchError) -> Self {
        match err {
            search::SearchError::NoHealthyInstance { tried } => Self::NoHealthyInstance { tried },
            search::SearchError::Http(e) => Self::Http(e),
        }
    }
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to render TOML: {0}")]
    Render(#[from] toml::ser::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern in config: {0}")]
    InvalidPattern(String),

    #[error("Config file already exists: {0}")]
    AlreadyExists(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing host in URL")]
    MissingHost,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Result type alias for Safarnama operations
pub type Result<T> = std::result::Result<T, SafarnamaError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::SiteCrawler;
pub use llm::{Enrichment, LlmClient};
pub use search::{SearchClient, SearchResult};
pub use state::UrlStatus;
pub use storage::{SqliteStorage, Storage, UrlRecord};
pub use url::{extract_host, normalize_url};
