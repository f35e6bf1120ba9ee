//! State module for tracking crawl progress
//!
//! # Components
//!
//! - `UrlStatus`: lifecycle of a URL record (pending, fetched, failed, skipped)
//!   with forward-only transitions

mod url_status;

pub use url_status::UrlStatus;
