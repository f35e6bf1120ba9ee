//! Statistics generation from crawl database
//!
//! This module provides functionality for extracting and displaying
//! crawl statistics from the storage layer.

use crate::state::UrlStatus;
use crate::storage::{RunRecord, Storage, StorageResult};
use std::collections::{BTreeMap, HashMap};

/// Crawl statistics summary
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of URL records
    pub total_urls: u64,

    /// Count of URLs by status
    pub urls_by_status: HashMap<UrlStatus, u64>,

    /// Count of URLs by depth
    pub depth_breakdown: BTreeMap<u32, u64>,

    /// The most recent crawl run, if any
    pub latest_run: Option<RunRecord>,
}

impl CrawlStatistics {
    pub fn count(&self, status: UrlStatus) -> u64 {
        self.urls_by_status.get(&status).copied().unwrap_or(0)
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let urls_by_status = storage.count_by_status()?;
    let total_urls = urls_by_status.values().sum();

    Ok(CrawlStatistics {
        total_urls,
        urls_by_status,
        depth_breakdown: storage.depth_breakdown()?,
        latest_run: storage.get_latest_run()?,
    })
}

/// Prints statistics to stdout in a formatted manner
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Crawl Statistics ===\n");

    println!("URLs by Status:");
    for status in UrlStatus::all() {
        let count = stats.count(status);
        let percentage = if stats.total_urls > 0 {
            (count as f64 / stats.total_urls as f64) * 100.0
        } else {
            0.0
        };
        println!("  {}: {} ({:.1}%)", status, count, percentage);
    }
    println!("  total: {}", stats.total_urls);
    println!();

    if !stats.depth_breakdown.is_empty() {
        println!("URLs by Depth:");
        for (depth, count) in &stats.depth_breakdown {
            println!("  {}: {}", depth, count);
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Last Run (#{}):", run.id);
            println!("  Status: {}", run.status.to_db_string());
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!(
                "  Fetched: {}, Failed: {}, Skipped: {}",
                run.counts.fetched, run.counts.failed, run.counts.skipped
            );
        }
        None => println!("No crawl runs recorded"),
    }
}
