//! Content filtering and cleaning
//!
//! # Components
//!
//! - `filter`: extension blocklist, MIME allowlist and URL exclusion patterns
//! - `cleaner`: HTML to plain text plus outbound links and images
//! - `settings`: per-depth and per-URL overrides of the exclusion patterns
//!   and image discovery
//!
//! All are side-effect free.

mod cleaner;
mod filter;
mod settings;

pub use cleaner::{clean, CleanedPage, ContentCleaner, Removal};
pub use filter::{is_accepted, is_binary, is_html, ContentFilter, UrlExclusions};
pub use settings::{PageSettings, SettingsResolver};
