//! SQLite-backed item store.
//!
//! The database runs in WAL mode. Every call checks a connection out of a
//! small idle pool, so readers never wait on a writer and only the short
//! IMMEDIATE write transaction serializes against other writers.
//!
//! Timestamps are stored as integer microseconds since the Unix epoch, which
//! orders correctly and covers chrono's full date range.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Mutex;
use std::time::Duration;

use super::{ItemStore, UpdateFn};
use crate::error::{CadenceError, CadenceResult};
use crate::types::{CardState, LearningItem, ReviewLog};

/// How long a writer waits for the database write lock.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Connections kept open between calls.
const MAX_IDLE_CONNECTIONS: usize = 8;

const ITEM_COLUMNS: &str = "item_id, learner_id, node_id, item_type, state, stability, difficulty,
     elapsed_days, scheduled_days, reps, lapses, last_review, due_date";

const LOG_COLUMNS: &str = "item_id, learner_id, quality, state_before, state_after, elapsed_days,
     scheduled_days, stability, difficulty, reviewed_at";

/// SQLite-backed store for learning items and their review log.
pub struct SqliteItemStore {
    path: PathBuf,
    /// Idle connections. Locked only to check one out or return it.
    idle: Mutex<Vec<Connection>>,
}

impl SqliteItemStore {
    /// Create a new store with the given database path.
    ///
    /// Creates the database file, its parent directory, and the schema if
    /// they don't exist.
    pub fn new<P: AsRef<Path>>(path: P) -> CadenceResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| CadenceError::StorageUnavailable {
                message: format!("cannot create {}: {}", parent.display(), e),
                source: Some(Box::new(e)),
            })?;
        }

        let conn = open_connection(path)?;
        init_schema(&conn)?;

        tracing::info!(path = %path.display(), "opened sqlite item store");
        Ok(Self {
            path: path.to_path_buf(),
            idle: Mutex::new(vec![conn]),
        })
    }

    /// Run `f` on a pooled connection, opening a new one when none is idle.
    fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> CadenceResult<T>,
    ) -> CadenceResult<T> {
        let pooled = self.idle.lock()?.pop();
        let mut conn = match pooled {
            Some(conn) => conn,
            None => open_connection(&self.path)?,
        };

        let result = f(&mut conn);

        let mut idle = self.idle.lock()?;
        if idle.len() < MAX_IDLE_CONNECTIONS {
            idle.push(conn);
        }
        result
    }

    fn query_items(&self, sql: &str, params: &[&dyn rusqlite::ToSql]) -> CadenceResult<Vec<LearningItem>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let items = stmt
                .query_map(params, item_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(items)
        })
    }

    fn query_logs(&self, sql: &str, key: &str) -> CadenceResult<Vec<ReviewLog>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let logs = stmt
                .query_map(params![key], log_from_row)?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(logs)
        })
    }
}

fn open_connection(path: &Path) -> CadenceResult<Connection> {
    let conn = Connection::open(path)?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA foreign_keys = ON;",
    )?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> CadenceResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS learning_items (
            item_id TEXT PRIMARY KEY,
            learner_id TEXT NOT NULL,
            node_id TEXT NOT NULL,
            item_type TEXT NOT NULL,
            state TEXT NOT NULL DEFAULT 'new',
            stability REAL NOT NULL,
            difficulty REAL NOT NULL,
            elapsed_days INTEGER NOT NULL DEFAULT 0,
            scheduled_days INTEGER NOT NULL DEFAULT 0,
            reps INTEGER NOT NULL DEFAULT 0,
            lapses INTEGER NOT NULL DEFAULT 0,
            last_review INTEGER,
            due_date INTEGER NOT NULL,
            created_at INTEGER NOT NULL,
            updated_at INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_learning_items_learner ON learning_items(learner_id);
        CREATE INDEX IF NOT EXISTS idx_learning_items_due ON learning_items(learner_id, due_date, item_id);

        CREATE TABLE IF NOT EXISTS review_log (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            item_id TEXT NOT NULL,
            learner_id TEXT NOT NULL,
            quality INTEGER NOT NULL,
            state_before TEXT NOT NULL,
            state_after TEXT NOT NULL,
            elapsed_days INTEGER NOT NULL,
            scheduled_days INTEGER NOT NULL,
            stability REAL NOT NULL,
            difficulty REAL NOT NULL,
            reviewed_at INTEGER NOT NULL,
            FOREIGN KEY (item_id) REFERENCES learning_items(item_id)
        );

        CREATE INDEX IF NOT EXISTS idx_review_log_item ON review_log(item_id);
        CREATE INDEX IF NOT EXISTS idx_review_log_learner ON review_log(learner_id, reviewed_at);
        ",
    )?;

    Ok(())
}

impl ItemStore for SqliteItemStore {
    fn insert_if_absent(&self, item: &LearningItem) -> CadenceResult<LearningItem> {
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let now = to_micros(Utc::now());

            tx.execute(
                &format!(
                    "INSERT OR IGNORE INTO learning_items ({}, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?14)",
                    ITEM_COLUMNS
                ),
                params![
                    item.item_id,
                    item.learner_id,
                    item.node_id,
                    item.item_type,
                    item.state.to_string(),
                    item.stability,
                    item.difficulty,
                    item.elapsed_days,
                    item.scheduled_days,
                    item.reps,
                    item.lapses,
                    item.last_review.map(to_micros),
                    to_micros(item.due_date),
                    now,
                ],
            )?;

            let stored = tx.query_row(
                &format!("SELECT {} FROM learning_items WHERE item_id = ?1", ITEM_COLUMNS),
                params![item.item_id],
                item_from_row,
            )?;
            tx.commit()?;
            Ok(stored)
        })
    }

    fn get(&self, item_id: &str) -> CadenceResult<Option<LearningItem>> {
        self.with_connection(|conn| {
            let result = conn
                .query_row(
                    &format!("SELECT {} FROM learning_items WHERE item_id = ?1", ITEM_COLUMNS),
                    params![item_id],
                    item_from_row,
                )
                .optional()?;
            Ok(result)
        })
    }

    fn list_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<LearningItem>> {
        self.query_items(
            &format!(
                "SELECT {} FROM learning_items WHERE learner_id = ?1 ORDER BY item_id ASC",
                ITEM_COLUMNS
            ),
            params![learner_id],
        )
    }

    fn list_due(
        &self,
        learner_id: &str,
        now: DateTime<Utc>,
        limit: usize,
    ) -> CadenceResult<Vec<LearningItem>> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.query_items(
            &format!(
                "SELECT {} FROM learning_items
                 WHERE learner_id = ?1 AND due_date <= ?2
                 ORDER BY due_date ASC, item_id ASC
                 LIMIT ?3",
                ITEM_COLUMNS
            ),
            params![learner_id, to_micros(now), limit],
        )
    }

    fn update_with(&self, item_id: &str, apply: &mut UpdateFn<'_>) -> CadenceResult<LearningItem> {
        self.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let current = tx
                .query_row(
                    &format!("SELECT {} FROM learning_items WHERE item_id = ?1", ITEM_COLUMNS),
                    params![item_id],
                    item_from_row,
                )
                .optional()?
                .ok_or_else(|| CadenceError::not_found(item_id))?;

            // Dropping `tx` on error rolls back
            let (item, log) = apply(&current)?;

            tx.execute(
                "UPDATE learning_items SET
                    state = ?1, stability = ?2, difficulty = ?3, elapsed_days = ?4,
                    scheduled_days = ?5, reps = ?6, lapses = ?7, last_review = ?8,
                    due_date = ?9, updated_at = ?10
                 WHERE item_id = ?11",
                params![
                    item.state.to_string(),
                    item.stability,
                    item.difficulty,
                    item.elapsed_days,
                    item.scheduled_days,
                    item.reps,
                    item.lapses,
                    item.last_review.map(to_micros),
                    to_micros(item.due_date),
                    to_micros(Utc::now()),
                    item_id,
                ],
            )?;

            tx.execute(
                &format!(
                    "INSERT INTO review_log ({}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                    LOG_COLUMNS
                ),
                params![
                    log.item_id,
                    log.learner_id,
                    log.quality,
                    log.state_before.to_string(),
                    log.state_after.to_string(),
                    log.elapsed_days,
                    log.scheduled_days,
                    log.stability,
                    log.difficulty,
                    to_micros(log.reviewed_at),
                ],
            )?;

            // Re-read so callers see the stored (microsecond) timestamps
            let stored = tx.query_row(
                &format!("SELECT {} FROM learning_items WHERE item_id = ?1", ITEM_COLUMNS),
                params![item_id],
                item_from_row,
            )?;
            tx.commit()?;
            Ok(stored)
        })
    }

    fn reviews_for_learner(&self, learner_id: &str) -> CadenceResult<Vec<ReviewLog>> {
        self.query_logs(
            &format!(
                "SELECT {} FROM review_log WHERE learner_id = ?1 ORDER BY reviewed_at ASC, id ASC",
                LOG_COLUMNS
            ),
            learner_id,
        )
    }

    fn reviews_for_item(&self, item_id: &str) -> CadenceResult<Vec<ReviewLog>> {
        self.query_logs(
            &format!(
                "SELECT {} FROM review_log WHERE item_id = ?1 ORDER BY reviewed_at ASC, id ASC",
                LOG_COLUMNS
            ),
            item_id,
        )
    }

    fn count(&self) -> CadenceResult<usize> {
        self.with_connection(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM learning_items", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }
}

fn to_micros(ts: DateTime<Utc>) -> i64 {
    ts.timestamp_micros()
}

fn from_micros(idx: usize, value: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_micros(value)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn parse_state(idx: usize, value: &str) -> rusqlite::Result<CardState> {
    CardState::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
    })
}

fn item_from_row(row: &Row<'_>) -> rusqlite::Result<LearningItem> {
    let state: String = row.get(4)?;
    let last_review: Option<i64> = row.get(11)?;

    Ok(LearningItem {
        item_id: row.get(0)?,
        learner_id: row.get(1)?,
        node_id: row.get(2)?,
        item_type: row.get(3)?,
        state: parse_state(4, &state)?,
        stability: row.get(5)?,
        difficulty: row.get(6)?,
        elapsed_days: row.get(7)?,
        scheduled_days: row.get(8)?,
        reps: row.get(9)?,
        lapses: row.get(10)?,
        last_review: last_review.map(|v| from_micros(11, v)).transpose()?,
        due_date: from_micros(12, row.get(12)?)?,
    })
}

fn log_from_row(row: &Row<'_>) -> rusqlite::Result<ReviewLog> {
    let state_before: String = row.get(3)?;
    let state_after: String = row.get(4)?;

    Ok(ReviewLog {
        item_id: row.get(0)?,
        learner_id: row.get(1)?,
        quality: row.get(2)?,
        state_before: parse_state(3, &state_before)?,
        state_after: parse_state(4, &state_after)?,
        elapsed_days: row.get(5)?,
        scheduled_days: row.get(6)?,
        stability: row.get(7)?,
        difficulty: row.get(8)?,
        reviewed_at: from_micros(9, row.get(9)?)?,
    })
}
