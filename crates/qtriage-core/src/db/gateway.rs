//! [`PersistenceGateway`] over a single SQLite connection.

use anyhow::{Result, anyhow};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use super::{open_db, open_in_memory, query, write};
use crate::engine::Change;
use crate::model::{Question, QuestionId, QuestionRecord, User, UserId};
use crate::persist::{PersistenceGateway, QuestionFilter, StoredUser, Table, TagCount};

pub struct SqliteGateway {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteGateway")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteGateway {
    /// Open (creating and migrating if needed) the database at `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or migrated.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = open_db(path)?;
        tracing::debug!(path = %path.display(), "opened triage database");
        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// A private migrated in-memory database.
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn in_memory() -> Result<Self> {
        Ok(Self {
            conn: Mutex::new(open_in_memory()?),
            path: None,
        })
    }

    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow!("sqlite connection lock poisoned"))
    }
}

impl PersistenceGateway for SqliteGateway {
    fn question_exists(&self, id: QuestionId) -> Result<bool> {
        let conn = self.conn()?;
        query::question_exists(&conn, id)
    }

    fn load_all(&self, filter: &QuestionFilter) -> Result<Vec<QuestionRecord>> {
        let conn = self.conn()?;
        query::load_records(&conn, filter)
    }

    fn question(&self, id: QuestionId) -> Result<Option<QuestionRecord>> {
        let conn = self.conn()?;
        query::get_record(&conn, id)
    }

    fn persist_transition(
        &self,
        changes: &[Change],
        actor: &User,
        timestamp_ms: i64,
    ) -> Result<()> {
        let mut conn = self.conn()?;
        write::apply_changes(&mut conn, changes, actor, timestamp_ms)
    }

    fn last_updated(&self, table: Table) -> Result<i64> {
        let conn = self.conn()?;
        query::last_updated(&conn, table)
    }

    fn remove_questions(&self, ids: &[QuestionId], timestamp_ms: i64) -> Result<usize> {
        let mut conn = self.conn()?;
        write::delete_questions(&mut conn, ids, timestamp_ms)
    }

    fn add_questions(&self, questions: &[Question], timestamp_ms: i64) -> Result<usize> {
        let mut conn = self.conn()?;
        write::insert_questions(&mut conn, questions, timestamp_ms)
    }

    fn upsert_user(&self, user: &User, timestamp_ms: i64) -> Result<()> {
        let conn = self.conn()?;
        write::upsert_user(&conn, user, timestamp_ms)
    }

    fn record_login(&self, id: UserId, timestamp_ms: i64) -> Result<()> {
        let conn = self.conn()?;
        write::record_login(&conn, id, timestamp_ms)
    }

    fn user(&self, id: UserId) -> Result<Option<StoredUser>> {
        let conn = self.conn()?;
        query::get_user(&conn, id)
    }

    fn users(&self) -> Result<Vec<StoredUser>> {
        let conn = self.conn()?;
        query::list_users(&conn)
    }

    fn tag_counts(&self) -> Result<Vec<TagCount>> {
        let conn = self.conn()?;
        query::tag_counts(&conn)
    }
}
