//! Connection handling for the `SQLite` record store.
//!
//! Mutex acquisition with poison recovery plus the pragmas every connection
//! is opened with.

use crate::{Error, Result};
use rusqlite::Connection;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// Busy timeout applied to every connection, in milliseconds.
const BUSY_TIMEOUT_MS: &str = "5000";

/// Acquires a mutex lock, recovering from poison.
///
/// A panic inside a previous critical section leaves the connection itself
/// usable, so the guard is recovered and the event is logged and counted.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Opens a database file, creating parent directories as needed.
///
/// # Errors
///
/// Returns [`Error::StoreUnavailable`] if the directory cannot be created or
/// the file cannot be opened.
pub fn open_connection(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent).map_err(|e| Error::StoreUnavailable {
            operation: "create_db_dir".to_string(),
            cause: format!("{}: {e}", parent.display()),
        })?;
    }

    let conn = Connection::open(path).map_err(|e| Error::StoreUnavailable {
        operation: "open_sqlite".to_string(),
        cause: format!("{}: {e}", path.display()),
    })?;
    configure_connection(&conn);
    Ok(conn)
}

/// Applies WAL journaling, NORMAL sync and a busy timeout.
///
/// WAL lets readers proceed while ingestion writes. The pragma results are
/// ignored: `journal_mode` answers with a row, and in-memory databases
/// refuse WAL without that being an error for our purposes.
pub fn configure_connection(conn: &Connection) {
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", BUSY_TIMEOUT_MS);
}
