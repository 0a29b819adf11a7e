//! `SQLite` record store.
//!
//! A single `trademarks` table holds every record. Embeddings are stored as
//! little-endian `f32` blobs and are `NULL` when absent. Serial numbers are
//! unique, and ids come from `AUTOINCREMENT` so they are never reused.
//!
//! ## Module Structure
//!
//! - [`connection`]: lock acquisition with poison recovery, opening, pragmas
//! - [`sql`]: blob codec, placeholder lists, date handling
//! - `row`: row mapping
//! - [`metrics`]: per-operation metrics

mod connection;
mod metrics;
mod row;
mod sql;

pub use connection::{acquire_lock, configure_connection, open_connection};
pub use metrics::{record_operation_metrics, timed};
pub use sql::{decode_embedding, encode_embedding, numbered_placeholders};

use crate::models::{
    InsertOutcome, NewTrademark, RecordFilter, TrademarkId, TrademarkRecord, TrademarkSummary,
};
use crate::storage::traits::RecordStore;
use crate::{Error, Result, current_timestamp};
use row::{RECORD_COLUMNS, SUMMARY_COLUMNS, record_from_row, summary_from_row};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite`-backed [`RecordStore`].
pub struct SqliteRecordStore {
    /// Connection to the database.
    conn: Mutex<Connection>,
    /// Path to the database file (`None` for in-memory).
    db_path: Option<PathBuf>,
}

impl SqliteRecordStore {
    /// Opens (or creates) the store at `db_path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the database cannot be opened
    /// or its schema cannot be created.
    pub fn open(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        let conn = open_connection(&db_path)?;
        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns [`Error::StoreUnavailable`] if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(unavailable("open_sqlite_memory"))?;
        configure_connection(&conn);
        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path.
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS trademarks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                serial_number TEXT NOT NULL UNIQUE,
                class_indices TEXT NOT NULL DEFAULT '',
                registration_date TEXT,
                description TEXT NOT NULL DEFAULT '',
                applicant_name TEXT NOT NULL DEFAULT '',
                agent_details TEXT NOT NULL DEFAULT '',
                logo_data BLOB,
                text_embedding BLOB,
                logo_embedding BLOB,
                created_at INTEGER NOT NULL
            );",
        )
        .map_err(unavailable("create_schema"))
    }
}

/// Maps a `rusqlite` error to [`Error::StoreUnavailable`].
fn unavailable(operation: &'static str) -> impl FnOnce(rusqlite::Error) -> Error {
    move |e| Error::StoreUnavailable {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

impl RecordStore for SqliteRecordStore {
    #[instrument(skip(self, record), fields(serial_number = %record.serial_number))]
    fn insert(&self, record: &NewTrademark) -> Result<InsertOutcome> {
        if record.serial_number.trim().is_empty() {
            return Err(Error::InvalidInput(
                "serial number must not be empty".to_string(),
            ));
        }

        timed(BACKEND, "insert", || {
            let conn = acquire_lock(&self.conn);
            let created_at = i64::try_from(current_timestamp()).unwrap_or(i64::MAX);
            let changed = conn
                .execute(
                    "INSERT INTO trademarks (
                        serial_number, class_indices, registration_date, description,
                        applicant_name, agent_details, logo_data, text_embedding,
                        logo_embedding, created_at
                    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                    ON CONFLICT(serial_number) DO NOTHING",
                    params![
                        record.serial_number.trim(),
                        record.class_indices.as_str(),
                        record.registration_date.map(sql::format_date),
                        record.description,
                        record.applicant_name,
                        record.agent_details,
                        record.logo.as_deref(),
                        record.text_embedding.as_deref().map(encode_embedding),
                        record.logo_embedding.as_deref().map(encode_embedding),
                        created_at,
                    ],
                )
                .map_err(unavailable("insert"))?;

            if changed == 0 {
                tracing::debug!("Serial number already stored, skipping");
                Ok(InsertOutcome::Duplicate)
            } else {
                Ok(InsertOutcome::Inserted(TrademarkId::new(
                    conn.last_insert_rowid(),
                )))
            }
        })
    }

    fn get(&self, id: TrademarkId) -> Result<Option<TrademarkRecord>> {
        timed(BACKEND, "get", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM trademarks WHERE id = ?1"),
                params![id.get()],
                record_from_row,
            )
            .optional()
            .map_err(unavailable("get"))
        })
    }

    fn contains_serial(&self, serial_number: &str) -> Result<bool> {
        timed(BACKEND, "contains_serial", || {
            let conn = acquire_lock(&self.conn);
            conn.query_row(
                "SELECT 1 FROM trademarks WHERE serial_number = ?1",
                params![serial_number.trim()],
                |_| Ok(()),
            )
            .optional()
            .map(|found| found.is_some())
            .map_err(unavailable("contains_serial"))
        })
    }

    fn fetch_logo(&self, id: TrademarkId) -> Result<Option<Vec<u8>>> {
        timed(BACKEND, "fetch_logo", || {
            let conn = acquire_lock(&self.conn);
            let logo: Option<Option<Vec<u8>>> = conn
                .query_row(
                    "SELECT logo_data FROM trademarks WHERE id = ?1",
                    params![id.get()],
                    |row| row.get(0),
                )
                .optional()
                .map_err(unavailable("fetch_logo"))?;
            Ok(logo.flatten().filter(|bytes| !bytes.is_empty()))
        })
    }

    #[instrument(skip(self))]
    fn fetch_all_embeddings(&self) -> Result<Vec<(TrademarkId, Option<Vec<f32>>)>> {
        timed(BACKEND, "fetch_all_embeddings", || {
            let conn = acquire_lock(&self.conn);
            let mut stmt = conn
                .prepare("SELECT id, logo_embedding FROM trademarks ORDER BY id")
                .map_err(unavailable("prepare_fetch_all_embeddings"))?;
            let rows = stmt
                .query_map([], |row| {
                    let id: i64 = row.get(0)?;
                    let blob: Option<Vec<u8>> = row.get(1)?;
                    Ok((id, blob))
                })
                .map_err(unavailable("fetch_all_embeddings"))?;

            let mut out = Vec::new();
            for row in rows {
                let (id, blob) = row.map_err(unavailable("fetch_all_embeddings"))?;
                let embedding = blob.as_deref().and_then(|bytes| {
                    let decoded = decode_embedding(bytes);
                    if decoded.is_none() {
                        tracing::warn!(id, len = bytes.len(), "Ignoring malformed embedding blob");
                    }
                    decoded
                });
                out.push((TrademarkId::new(id), embedding));
            }
            Ok(out)
        })
    }

    #[instrument(skip(self, filter), fields(
        has_text = filter.text.is_some(),
        class_code = ?filter.class_code,
        allowlist = filter.allowlist.as_ref().map(std::collections::BTreeSet::len),
    ))]
    fn filtered_search(&self, filter: &RecordFilter) -> Result<Vec<TrademarkSummary>> {
        if filter.excludes_everything() {
            return Ok(Vec::new());
        }

        timed(BACKEND, "filtered_search", || {
            let conn = acquire_lock(&self.conn);
            let allowed: Vec<i64> = filter
                .allowlist
                .iter()
                .flatten()
                .map(|id| id.get())
                .collect();
            let where_clause = if filter.allowlist.is_some() {
                format!(" WHERE id IN ({})", numbered_placeholders(1, allowed.len()))
            } else {
                String::new()
            };

            let mut stmt = conn
                .prepare(&format!(
                    "SELECT {SUMMARY_COLUMNS} FROM trademarks{where_clause} ORDER BY id DESC"
                ))
                .map_err(unavailable("prepare_filtered_search"))?;
            let rows = stmt
                .query_map(params_from_iter(allowed.iter()), summary_from_row)
                .map_err(unavailable("filtered_search"))?;

            // Text and class predicates are evaluated here: SQLite's LIKE only
            // folds ASCII case and class codes need token-wise comparison.
            let mut out = Vec::new();
            for row in rows {
                let row = row.map_err(unavailable("filtered_search"))?;
                if filter.matches_classes(&row.class_indices)
                    && filter.matches_text(&row.description, &row.applicant_name)
                {
                    out.push(row.into_summary());
                }
            }
            Ok(out)
        })
    }

    fn count(&self) -> Result<usize> {
        timed(BACKEND, "count", || {
            let conn = acquire_lock(&self.conn);
            let count: i64 = conn
                .query_row("SELECT COUNT(*) FROM trademarks", [], |row| row.get(0))
                .map_err(unavailable("count"))?;
            Ok(usize::try_from(count).unwrap_or(0))
        })
    }
}
