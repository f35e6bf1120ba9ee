//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::state::UrlStatus;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{RunCounts, RunRecord, RunStatus, UpsertOutcome, UrlRecord};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

const URL_COLUMNS: &str =
    "url, depth, status, content_type, summary, tags, discovered_at, processed_at, error_message";

const RUN_COLUMNS: &str =
    "id, started_at, finished_at, config_hash, status, fetched, failed, skipped";

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

/// Row as stored, before text columns are decoded
struct RawUrlRow {
    url: String,
    depth: u32,
    status: String,
    content_type: Option<String>,
    summary: Option<String>,
    tags: Option<String>,
    discovered_at: Option<String>,
    processed_at: Option<String>,
    error_message: Option<String>,
}

impl RawUrlRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            url: row.get(0)?,
            depth: row.get(1)?,
            status: row.get(2)?,
            content_type: row.get(3)?,
            summary: row.get(4)?,
            tags: row.get(5)?,
            discovered_at: row.get(6)?,
            processed_at: row.get(7)?,
            error_message: row.get(8)?,
        })
    }

    fn decode(self) -> StorageResult<UrlRecord> {
        let corrupt = |message: String| StorageError::Corrupt {
            url: self.url.clone(),
            message,
        };

        let status = UrlStatus::from_db_string(&self.status)
            .ok_or_else(|| corrupt(format!("unknown status '{}'", self.status)))?;
        let tags = match &self.tags {
            Some(json) => Some(serde_json::from_str::<Vec<String>>(json)?),
            None => None,
        };
        let discovered_at = parse_timestamp(self.discovered_at.as_deref()).map_err(&corrupt)?;
        let processed_at = parse_timestamp(self.processed_at.as_deref()).map_err(&corrupt)?;

        Ok(UrlRecord {
            url: self.url,
            depth: self.depth,
            status,
            content_type: self.content_type,
            summary: self.summary,
            tags,
            discovered_at,
            processed_at,
            error_message: self.error_message,
        })
    }
}

fn parse_timestamp(value: Option<&str>) -> Result<Option<DateTime<Utc>>, String> {
    value
        .map(|s| {
            DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| format!("bad timestamp '{}': {}", s, e))
        })
        .transpose()
}

fn read_run(row: &Row<'_>) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?)
            .unwrap_or(RunStatus::Running),
        counts: RunCounts {
            fetched: row.get::<_, i64>(5)? as u64,
            failed: row.get::<_, i64>(6)? as u64,
            skipped: row.get::<_, i64>(7)? as u64,
        },
    })
}

fn select_record(conn: &Connection, url: &str) -> StorageResult<Option<UrlRecord>> {
    let raw = conn
        .query_row(
            &format!("SELECT {} FROM urls WHERE url = ?1", URL_COLUMNS),
            params![url],
            RawUrlRow::from_row,
        )
        .optional()?;

    raw.map(RawUrlRow::decode).transpose()
}

impl Storage for SqliteStorage {
    // ===== URL Records =====

    fn upsert(&mut self, record: &UrlRecord) -> StorageResult<UpsertOutcome> {
        let tx = self.conn.transaction()?;

        let existing = select_record(&tx, &record.url)?;
        let (merged, outcome) = UrlRecord::merge(existing, record.clone());

        if outcome != UpsertOutcome::Unchanged {
            let tags = merged.tags.as_ref().map(serde_json::to_string).transpose()?;
            tx.execute(
                "INSERT INTO urls (url, depth, status, content_type, summary, tags,
                                   discovered_at, processed_at, error_message)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(url) DO UPDATE SET
                    depth = excluded.depth,
                    status = excluded.status,
                    content_type = excluded.content_type,
                    summary = excluded.summary,
                    tags = excluded.tags,
                    discovered_at = excluded.discovered_at,
                    processed_at = excluded.processed_at,
                    error_message = excluded.error_message",
                params![
                    merged.url,
                    merged.depth,
                    merged.status.to_db_string(),
                    merged.content_type,
                    merged.summary,
                    tags,
                    merged.discovered_at.map(|t| t.to_rfc3339()),
                    merged.processed_at.map(|t| t.to_rfc3339()),
                    merged.error_message,
                ],
            )?;
        }

        tx.commit()?;
        Ok(outcome)
    }

    fn get(&self, url: &str) -> StorageResult<Option<UrlRecord>> {
        select_record(&self.conn, url)
    }

    fn list_visited(&self) -> StorageResult<BTreeSet<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT url FROM urls WHERE status != ?1")?;

        let urls = stmt
            .query_map(params![UrlStatus::Pending.to_db_string()], |row| row.get(0))?
            .collect::<Result<BTreeSet<String>, _>>()?;

        Ok(urls)
    }

    fn pending(&self, max_depth: u32) -> StorageResult<Vec<UrlRecord>> {
        let mut stmt = self.conn.prepare(&format!(
            "SELECT {} FROM urls WHERE status = ?1 AND depth <= ?2 ORDER BY depth, id",
            URL_COLUMNS
        ))?;

        let rows = stmt
            .query_map(
                params![UrlStatus::Pending.to_db_string(), max_depth],
                RawUrlRow::from_row,
            )?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(RawUrlRow::decode).collect()
    }

    fn count_by_status(&self) -> StorageResult<HashMap<UrlStatus, u64>> {
        let mut counts: HashMap<UrlStatus, u64> =
            UrlStatus::all().into_iter().map(|s| (s, 0)).collect();

        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM urls GROUP BY status")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        for row in rows {
            let (status_str, count) = row?;
            if let Some(status) = UrlStatus::from_db_string(&status_str) {
                counts.insert(status, count as u64);
            }
        }

        Ok(counts)
    }

    fn depth_breakdown(&self) -> StorageResult<BTreeMap<u32, u64>> {
        let mut stmt = self
            .conn
            .prepare("SELECT depth, COUNT(*) FROM urls GROUP BY depth ORDER BY depth")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, u32>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut breakdown = BTreeMap::new();
        for row in rows {
            let (depth, count) = row?;
            breakdown.insert(depth, count as u64);
        }

        Ok(breakdown)
    }

    fn clear(&mut self) -> StorageResult<()> {
        self.conn
            .execute_batch("DELETE FROM urls; DELETE FROM runs;")?;
        Ok(())
    }

    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn complete_run(
        &mut self,
        run_id: i64,
        status: RunStatus,
        counts: &RunCounts,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE runs SET status = ?1, finished_at = ?2, fetched = ?3, failed = ?4, skipped = ?5
             WHERE id = ?6",
            params![
                status.to_db_string(),
                now,
                counts.fetched as i64,
                counts.failed as i64,
                counts.skipped as i64,
                run_id
            ],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                &format!("SELECT {} FROM runs ORDER BY id DESC LIMIT 1", RUN_COLUMNS),
                [],
                read_run,
            )
            .optional()?;

        Ok(run)
    }

    fn close(self) -> StorageResult<()> {
        self.conn
            .close()
            .map_err(|(_, e)| StorageError::Database(format!("failed to close database: {}", e)))
    }
}
