//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - One record per normalized URL with its status, depth and enrichment
//! - Run tracking with per-run outcome counts
//!
//! The store is the single authority on whether a URL has been seen. Writes
//! for one URL go through [`Storage::upsert`], which applies the merge rules of
//! [`UrlRecord::merge`] atomically.

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::state::UrlStatus;
use chrono::{DateTime, Utc};
use std::path::Path;

/// Opens (or creates) a SQLite store at `path`
pub fn open_storage(path: &Path) -> StorageResult<SqliteStorage> {
    SqliteStorage::new(path)
}

/// One record per distinct normalized URL ever discovered
#[derive(Debug, Clone, PartialEq)]
pub struct UrlRecord {
    pub url: String,
    pub depth: u32,
    pub status: UrlStatus,
    pub content_type: Option<String>,
    pub summary: Option<String>,
    pub tags: Option<Vec<String>>,
    pub discovered_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

/// What an upsert did to the stored record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// The URL was not in the store before
    Inserted,
    /// The record changed (status advanced or depth lowered)
    Updated,
    /// The incoming record carried nothing the store would accept
    Unchanged,
}

impl UrlRecord {
    /// Creates a `Pending` record discovered now
    pub fn pending(url: impl Into<String>, depth: u32) -> Self {
        Self {
            url: url.into(),
            depth,
            status: UrlStatus::Pending,
            content_type: None,
            summary: None,
            tags: None,
            discovered_at: Some(Utc::now()),
            processed_at: None,
            error_message: None,
        }
    }

    /// Moves a record to a terminal status, stamping `processed_at`
    pub fn settle(mut self, status: UrlStatus) -> Self {
        self.status = status;
        self.processed_at = Some(Utc::now());
        self
    }

    /// Merges an incoming write into the stored record
    ///
    /// # Rules
    ///
    /// - A new URL is stored as given
    /// - Depth keeps the smaller of the two values
    /// - A terminal record is frozen; only its depth may still drop
    /// - A `Pending` record takes the incoming status and payload when the
    ///   incoming status is terminal
    ///
    /// # Returns
    ///
    /// The record to store and what changed
    pub fn merge(existing: Option<UrlRecord>, incoming: UrlRecord) -> (UrlRecord, UpsertOutcome) {
        let Some(existing) = existing else {
            let mut record = incoming;
            if record.discovered_at.is_none() {
                record.discovered_at = Some(Utc::now());
            }
            return (record, UpsertOutcome::Inserted);
        };

        let depth = existing.depth.min(incoming.depth);
        let depth_lowered = depth < existing.depth;

        if existing.status.is_terminal() || !incoming.status.is_terminal() {
            let outcome = if depth_lowered {
                UpsertOutcome::Updated
            } else {
                UpsertOutcome::Unchanged
            };
            return (UrlRecord { depth, ..existing }, outcome);
        }

        let merged = UrlRecord {
            url: existing.url,
            depth,
            status: incoming.status,
            content_type: incoming.content_type,
            summary: incoming.summary,
            tags: incoming.tags,
            discovered_at: existing.discovered_at.or(incoming.discovered_at),
            processed_at: incoming.processed_at.or_else(|| Some(Utc::now())),
            error_message: incoming.error_message,
        };
        (merged, UpsertOutcome::Updated)
    }
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
    pub counts: RunCounts,
}

/// Per-run outcome counts reported in the crawl summary
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunCounts {
    pub fetched: u64,
    pub failed: u64,
    pub skipped: u64,
}

impl RunCounts {
    /// Bumps the counter matching a terminal status
    pub fn record(&mut self, status: UrlStatus) {
        match status {
            UrlStatus::Fetched => self.fetched += 1,
            UrlStatus::Failed => self.failed += 1,
            UrlStatus::Skipped => self.skipped += 1,
            UrlStatus::Pending => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.fetched + self.failed + self.skipped
    }
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    Completed,
    Interrupted,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Interrupted => "interrupted",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "interrupted" => Some(Self::Interrupted),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}
