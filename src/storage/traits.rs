//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::state::UrlStatus;
use crate::storage::{RunCounts, RunRecord, RunStatus, UpsertOutcome, UrlRecord};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("Corrupt record for {url}: {message}")]
    Corrupt { url: String, message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// This trait defines all persistence operations needed by the crawler.
/// Writes to one URL must be atomic: either the whole merged record lands or
/// the previous record stays.
pub trait Storage {
    // ===== URL Records =====

    /// Inserts a record or merges it into the stored one
    ///
    /// # Arguments
    ///
    /// * `record` - The record to write; `url` must already be normalized
    ///
    /// # Returns
    ///
    /// What the write changed (see [`UrlRecord::merge`])
    fn upsert(&mut self, record: &UrlRecord) -> StorageResult<UpsertOutcome>;

    /// Gets a record by normalized URL
    fn get(&self, url: &str) -> StorageResult<Option<UrlRecord>>;

    /// Returns every URL whose status is not `Pending`
    fn list_visited(&self) -> StorageResult<BTreeSet<String>>;

    /// Returns `Pending` records at or below `max_depth`, shallowest first,
    /// in discovery order within a depth
    fn pending(&self, max_depth: u32) -> StorageResult<Vec<UrlRecord>>;

    /// Counts records per status
    fn count_by_status(&self) -> StorageResult<HashMap<UrlStatus, u64>>;

    /// Counts records per depth
    fn depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>>;

    /// Removes every URL record and run
    fn clear(&mut self) -> StorageResult<()>;

    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Fingerprint of the configuration in effect
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Finishes a run with its final status and outcome counts
    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &RunCounts,
    ) -> StorageResult<()>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Releases the underlying resources
    fn close(self) -> StorageResult<()>
    where
        Self: Sized;
}
