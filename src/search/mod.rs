//! Search integration
//!
//! Queries a pool of meta-search instances (SearxNG-style JSON API) with
//! per-instance health tracking and failover. Results seed the crawl frontier.

mod client;
mod instance;

pub use client::SearchClient;
pub use instance::SearchInstance;

use thiserror::Error;

/// One hit returned by a search instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub url: String,
    pub title: String,
    pub snippet: String,
}

/// Hits from the instance that served a query
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Address of the serving instance
    pub instance: String,
    pub hits: Vec<SearchHit>,
}

impl SearchResult {
    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.hits.iter().map(|hit| hit.url.as_str())
    }
}

/// Why one instance failed a query
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InstanceError {
    #[error("timed out")]
    Timeout,

    /// Connection refused, reset, or the body could not be read
    #[error("transport error: {0}")]
    Transport(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("malformed JSON: {0}")]
    Malformed(String),
}

impl InstanceError {
    fn classify(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Timeout
        } else {
            Self::Transport(err.to_string())
        }
    }
}

/// Errors returned by the search client
#[derive(Debug, Error)]
pub enum SearchError {
    /// Every instance was unhealthy or failed this query
    #[error("No healthy search instance answered (tried {tried})")]
    NoHealthyInstance { tried: usize },

    #[error("Failed to build HTTP client: {0}")]
    Http(#[from] reqwest::Error),
}
