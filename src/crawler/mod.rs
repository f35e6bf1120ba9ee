//! Crawler module for web page fetching and processing
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the [`Fetcher`] trait
//! - Breadth-first frontier and politeness throttling
//! - Overall crawl coordination ([`SiteCrawler`])

mod coordinator;
mod fetcher;
mod scheduler;

pub use coordinator::{CancelHandle, SiteCrawler};
pub use fetcher::{build_http_client, FetchError, FetchedPage, Fetcher, HttpFetcher};
pub use scheduler::{Frontier, QueuedUrl, SeedOrigin, Throttle};
