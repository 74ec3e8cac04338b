//! SQLite persistence for the triage store.
//!
//! One `qt` process can be loading with a shared project lock while the
//! write-behind thread of another is committing, so file databases run in
//! WAL mode: the loader reads the last committed snapshot instead of
//! waiting. `synchronous = NORMAL` is enough in WAL mode; a power cut can
//! drop the newest transitions but never tears a batch, and the lost batch
//! is only a triage decision to redo. The busy timeout matches the default
//! project lock timeout, so SQLite waits as long as a `qt` process would for
//! its lock. Foreign keys stay on in every mode because an owned question
//! must reference a registered user and tags must cascade with their
//! question.

pub mod gateway;
pub mod migrations;
pub mod query;
pub mod schema;
pub mod write;

pub use gateway::SqliteGateway;

use anyhow::{Context, Result};
use rusqlite::Connection;
use std::{path::Path, time::Duration};

/// How long a statement waits on another connection's write lock.
pub const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Storage {
    File,
    /// Private to one connection; WAL and busy waits do not apply.
    Memory,
}

/// Open (or create) the triage database at `path` and migrate it.
///
/// # Errors
///
/// Returns an error if the file cannot be opened, configured, or migrated.
pub fn open_db(path: &Path) -> Result<Connection> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("create database directory {}", parent.display()))?;
    }
    let conn =
        Connection::open(path).with_context(|| format!("open database {}", path.display()))?;
    prepare(conn, Storage::File)
}

/// A migrated private in-memory database.
///
/// # Errors
///
/// Returns an error if migration fails.
pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory().context("open in-memory database")?;
    prepare(conn, Storage::Memory)
}

fn prepare(mut conn: Connection, storage: Storage) -> Result<Connection> {
    conn.pragma_update(None, "foreign_keys", "ON")
        .context("enable foreign keys")?;
    if storage == Storage::File {
        let mode: String = conn
            .query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))
            .context("switch to WAL")?;
        if !mode.eq_ignore_ascii_case("wal") {
            tracing::warn!(mode = %mode, "database did not switch to WAL; readers may block");
        }
        conn.pragma_update(None, "synchronous", "NORMAL")
            .context("set synchronous")?;
        conn.busy_timeout(BUSY_TIMEOUT).context("set busy timeout")?;
    }
    let version = migrations::migrate(&mut conn).context("apply schema migrations")?;
    tracing::trace!(version, ?storage, "database ready");
    Ok(conn)
}
