//! LLM enrichment module
//!
//! Sends cleaned page text to a chat-completion endpoint and parses the
//! `{"summary": ..., "tags": [...]}` reply.
//!
//! # Components
//!
//! - `client`: request building, bearer auth, retry on transient failure
//! - `response`: envelope and content parsing, input truncation

mod client;
mod response;

pub use client::{LlmClient, PingReport};
pub use response::{parse_chat_response, strip_code_fence, truncate_to_budget, CHARS_PER_TOKEN};

use thiserror::Error;

/// Summary and tags attached to a fetched page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Enrichment {
    pub summary: String,
    pub tags: Vec<String>,
}

/// Errors returned by the LLM client
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Cannot reach LLM endpoint {endpoint}: {message}")]
    Connection { endpoint: String, message: String },

    #[error("LLM endpoint {endpoint} timed out")]
    Timeout { endpoint: String },

    #[error("LLM endpoint {endpoint} answered HTTP {code}: {body}")]
    Status {
        endpoint: String,
        code: u16,
        body: String,
    },

    #[error("Malformed LLM response: {0}")]
    Malformed(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(#[from] reqwest::Error),
}

impl LlmError {
    /// Endpoint the failing request went to, when known
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Connection { endpoint, .. }
            | Self::Timeout { endpoint }
            | Self::Status { endpoint, .. } => Some(endpoint),
            Self::Malformed(_) | Self::Client(_) => None,
        }
    }

    /// Short name of the failure kind, as reported by `test-llm`
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection { .. } => "connection",
            Self::Timeout { .. } => "timeout",
            Self::Status { .. } => "http-status",
            Self::Malformed(_) => "malformed-response",
            Self::Client(_) => "client",
        }
    }
}
