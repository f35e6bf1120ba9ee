//! Output module for crawl results
//!
//! This module handles:
//! - Exporting the visited set as an XML sitemap
//! - Loading and printing crawl statistics

mod sitemap;
pub mod stats;

pub use sitemap::{render_sitemap, write_sitemap};
pub use stats::{load_statistics, print_statistics, CrawlStatistics};
