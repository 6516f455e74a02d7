pub mod migrations;
pub mod schema;

use anyhow::{Context, Result};
use rusqlite::Connection;
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use crate::error::BusyError;

static SQLITE_VEC_INIT: Once = Once::new();

/// A connection shared between request handlers. All access goes through
/// `tokio::task::spawn_blocking`.
pub type SharedDb = Arc<Mutex<Connection>>;

/// Register the sqlite-vec extension globally. Safe to call multiple times.
pub fn load_sqlite_vec() {
    SQLITE_VEC_INIT.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// Open (or create) the database at the given path, with all extensions
/// loaded and schema initialized.
pub fn open_database(path: impl AsRef<Path>, dimensions: usize) -> Result<Connection> {
    let path = path.as_ref();

    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create directory {}", parent.display()))?;
    }

    load_sqlite_vec();

    let conn = Connection::open(path)
        .with_context(|| format!("failed to open database at {}", path.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.busy_timeout(std::time::Duration::from_millis(5000))?;

    schema::init_schema(&conn, dimensions).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;

    if let Some(stored) = migrations::get_embedding_dimensions(&conn)? {
        if stored != dimensions {
            tracing::warn!(
                stored,
                configured = dimensions,
                "embedding dimensions differ from the vector index; stores will be rejected"
            );
        }
    }

    tracing::info!(path = %path.display(), "database initialized");
    Ok(conn)
}

/// Open an in-memory database with schema and migrations applied.
pub fn open_memory_database(dimensions: usize) -> Result<Connection> {
    load_sqlite_vec();
    let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    schema::init_schema(&conn, dimensions).context("failed to initialize schema")?;
    migrations::run_migrations(&conn).context("failed to run migrations")?;
    Ok(conn)
}

/// Result of [`check_database_health`].
#[derive(Debug)]
pub struct HealthReport {
    pub integrity_ok: bool,
    pub integrity_details: String,
    pub schema_version: u32,
    pub sqlite_vec_version: String,
    pub embedding_model: Option<String>,
    pub embedding_dimensions: Option<usize>,
    pub user_count: u64,
    pub memory_count: u64,
    pub message_count: u64,
}

/// Run `PRAGMA integrity_check` and gather schema and row-count facts.
pub fn check_database_health(conn: &Connection) -> Result<HealthReport> {
    let integrity_details: String =
        conn.query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
    let sqlite_vec_version: String =
        conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;

    let count = |table: &str| -> Result<u64> {
        let n: i64 = conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
            row.get(0)
        })?;
        Ok(n as u64)
    };

    Ok(HealthReport {
        integrity_ok: integrity_details == "ok",
        integrity_details,
        schema_version: migrations::get_schema_version(conn)?,
        sqlite_vec_version,
        embedding_model: migrations::get_embedding_model(conn)?,
        embedding_dimensions: migrations::get_embedding_dimensions(conn)?,
        user_count: count("users")?,
        memory_count: count("memories")?,
        message_count: count("messages")?,
    })
}

/// Current time as a fixed-width RFC 3339 string, so text order is time order.
pub fn timestamp_now() -> String {
    chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true)
}

/// Run a closure against the shared connection on the blocking pool.
pub async fn db_call<T, F>(db: &SharedDb, f: F) -> Result<T, BusyError>
where
    F: FnOnce(&mut Connection) -> Result<T, BusyError> + Send + 'static,
    T: Send + 'static,
{
    let db = Arc::clone(db);
    tokio::task::spawn_blocking(move || {
        let mut conn = db
            .lock()
            .map_err(|e| BusyError::Internal(format!("db lock poisoned: {e}")))?;
        f(&mut conn)
    })
    .await
    .map_err(|e| BusyError::Internal(format!("db task failed: {e}")))?
}
