//! Storage layer for roster availability.
//!
//! Provides persistence for availability intervals, default templates and
//! the member directory using `rusqlite`.
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! For concurrent request handlers use [`Store`], which opens a connection per
//! operation and runs it on Tokio's blocking pool. Writers serialise through
//! SQLite `BEGIN IMMEDIATE` transactions; readers run in parallel under WAL.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Timestamps are stored as TEXT in ISO 8601 format with millisecond precision
//! (e.g., `2024-01-15T10:30:00.000Z`). The fixed width keeps lexicographic
//! ordering equal to chronological ordering, so range predicates run on the
//! indexed text columns directly.
//!
//! ## Partition Keys
//!
//! `availability_intervals.unit` is NULL for member-only partitions. The
//! templates table stores the empty string instead so `(member, unit)` can be
//! its primary key.

use std::path::Path;
use std::time::Duration;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, ErrorCode, Transaction, TransactionBehavior};
use thiserror::Error;

use roster_core::{TimeRange, ValidationError};

mod availability;
mod members;
mod store;
mod templates;

pub use availability::{StoreCounts, WriteSummary};
pub use store::Store;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// The request was rejected before any transaction began.
    #[error(transparent)]
    Validation(#[from] ValidationError),
    /// Two intervals in one write batch overlap each other.
    #[error(
        "conflicting intervals in write batch: {}..{} overlaps {}..{}",
        first.start(), first.end(), second.start(), second.end()
    )]
    Conflict { first: TimeRange, second: TimeRange },
    /// The write lost a concurrency conflict on every attempt.
    #[error("transaction aborted after {attempts} attempts: {source}")]
    Transaction {
        attempts: u32,
        #[source]
        source: rusqlite::Error,
    },
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp in {table} row {id}: {timestamp}")]
    TimestampParse {
        table: &'static str,
        id: i64,
        timestamp: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row could not be converted into a domain value.
    #[error("invalid {table} row {id}: {message}")]
    InvalidRecord {
        table: &'static str,
        id: i64,
        message: String,
    },
    /// Failed to encode or decode a JSON column.
    #[error("invalid JSON column: {0}")]
    Json(#[from] serde_json::Error),
    /// A blocking database task panicked or was cancelled.
    #[error("database task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
}

impl DbError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transaction { .. } => true,
            Self::Sqlite(err) => is_busy(err),
            _ => false,
        }
    }
}

fn is_busy(err: &rusqlite::Error) -> bool {
    matches!(
        err.sqlite_error_code(),
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked)
    )
}

/// Bounded exponential backoff for write transactions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_millis(20),
            max_backoff: Duration::from_millis(500),
        }
    }
}

/// Connection settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseOptions {
    /// How long SQLite waits on a locked database before reporting busy.
    pub busy_timeout: Duration,
    pub retry: RetryPolicy,
}

impl Default for DatabaseOptions {
    fn default() -> Self {
        Self {
            busy_timeout: Duration::from_secs(5),
            retry: RetryPolicy::default(),
        }
    }
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
    retry: RetryPolicy,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        Self::open_with(path, DatabaseOptions::default())
    }

    /// Opens a database with explicit connection settings.
    pub fn open_with(path: &Path, options: DatabaseOptions) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(options.busy_timeout)?;
        let mode: String =
            conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
        tracing::trace!(journal_mode = %mode, path = %path.display(), "opened database");
        let db = Self {
            conn,
            retry: options.retry,
        };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self {
            conn,
            retry: RetryPolicy::default(),
        };
        db.init()?;
        Ok(db)
    }

    /// Replaces the retry policy used by write transactions.
    pub const fn set_retry_policy(&mut self, retry: RetryPolicy) {
        self.retry = retry;
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            -- One row per availability interval, half-open [start_at, end_at).
            -- Rows sharing (member, unit) never overlap.
            CREATE TABLE IF NOT EXISTS availability_intervals (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                member INTEGER NOT NULL,
                unit TEXT,
                start_at TEXT NOT NULL,
                end_at TEXT NOT NULL,
                storm TEXT,
                rescue TEXT,
                CHECK (start_at < end_at)
            );

            CREATE INDEX IF NOT EXISTS idx_availability_partition
                ON availability_intervals(member, unit, start_at);
            CREATE INDEX IF NOT EXISTS idx_availability_start ON availability_intervals(start_at);
            CREATE INDEX IF NOT EXISTS idx_availability_end ON availability_intervals(end_at);

            -- entries: JSON array of offset-based template entries
            CREATE TABLE IF NOT EXISTS default_availabilities (
                member INTEGER NOT NULL,
                unit TEXT NOT NULL DEFAULT '',
                origin TEXT NOT NULL,
                entries TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                PRIMARY KEY (member, unit)
            );

            CREATE TABLE IF NOT EXISTS members (
                number INTEGER PRIMARY KEY,
                full_name TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS member_units (
                member INTEGER NOT NULL,
                unit TEXT NOT NULL,
                team TEXT,
                PRIMARY KEY (member, unit),
                FOREIGN KEY (member) REFERENCES members(number) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_member_units_unit ON member_units(unit);

            CREATE TABLE IF NOT EXISTS member_qualifications (
                member INTEGER NOT NULL,
                qualification TEXT NOT NULL,
                PRIMARY KEY (member, qualification),
                FOREIGN KEY (member) REFERENCES members(number) ON DELETE CASCADE
            );
            ",
        )?;
        Ok(())
    }

    /// Runs `apply` inside an immediate write transaction, retrying busy
    /// aborts with exponential backoff.
    ///
    /// The transaction rolls back whenever `apply` fails or the closure
    /// unwinds, so a failed attempt leaves no partial state.
    fn write_with_retry<T, F>(&mut self, operation: &'static str, mut apply: F) -> Result<T, DbError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, DbError>,
    {
        let mut attempt = 1;
        let mut backoff = self.retry.initial_backoff;
        loop {
            match self.try_write(&mut apply) {
                Err(DbError::Sqlite(source)) if is_busy(&source) => {
                    if attempt >= self.retry.max_attempts {
                        return Err(DbError::Transaction {
                            attempts: attempt,
                            source,
                        });
                    }
                    tracing::warn!(
                        operation,
                        attempt,
                        backoff_ms = u64::try_from(backoff.as_millis()).unwrap_or(u64::MAX),
                        error = %source,
                        "write transaction busy, retrying"
                    );
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(self.retry.max_backoff);
                    attempt += 1;
                }
                result => return result,
            }
        }
    }

    fn try_write<T, F>(&mut self, apply: &mut F) -> Result<T, DbError>
    where
        F: FnMut(&Transaction<'_>) -> Result<T, DbError>,
    {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;
        let output = apply(&tx)?;
        tx.commit()?;
        Ok(output)
    }
}

fn parse_timestamp(timestamp: &str, table: &'static str, id: i64) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            table,
            id,
            timestamp: timestamp.to_string(),
            source,
        })
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
