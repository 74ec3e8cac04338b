//! Persistence boundary.
//!
//! The in-memory store is authoritative while a process runs; the
//! [`PersistenceGateway`] is where it is bootstrapped from, where committed
//! transitions are written behind, and what is consulted to decide whether
//! another writer has changed things since the last load.
//!
//! Writes are best effort. A failed write is logged and counted by the
//! [`writer::PersistenceWriter`]; the in-memory commit stands and the next
//! staleness check or reload reconciles any drift.

pub mod writer;

pub use writer::{PersistJob, PersistenceWriter, WriterStats};

use anyhow::Result;
use serde::Serialize;
use std::fmt;

use crate::engine::Change;
use crate::model::{Question, QuestionId, QuestionRecord, State, User, UserId};

/// Tables whose modification time is tracked for staleness checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Questions,
    Users,
}

impl Table {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Questions => "questions",
            Self::Users => "users",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Filter for [`PersistenceGateway::load_all`]. Fields combine with AND.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QuestionFilter {
    pub state: Option<State>,
    pub tag: Option<String>,
    pub owner: Option<UserId>,
}

impl QuestionFilter {
    /// No filtering: every stored question.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    #[must_use]
    pub const fn is_unfiltered(&self) -> bool {
        self.state.is_none() && self.tag.is_none() && self.owner.is_none()
    }
}

/// A registered user with bookkeeping columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StoredUser {
    #[serde(flatten)]
    pub user: User,
    pub last_login_ms: Option<i64>,
    /// Number of questions this user currently owns.
    pub owned: usize,
}

/// Tag inventory row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagCount {
    pub tag: String,
    pub count: usize,
}

/// Durable store of questions, triage state, ownership, and update times.
pub trait PersistenceGateway: Send + Sync {
    /// Cheap existence check used before spending upstream quota on a fetch.
    fn question_exists(&self, id: QuestionId) -> Result<bool>;

    /// Every stored question matching `filter`, with tags, state, and owner.
    fn load_all(&self, filter: &QuestionFilter) -> Result<Vec<QuestionRecord>>;

    /// One stored question.
    fn question(&self, id: QuestionId) -> Result<Option<QuestionRecord>>;

    /// Write the outcome of a committed transition and stamp
    /// `questions` with `timestamp_ms`.
    fn persist_transition(&self, changes: &[Change], actor: &User, timestamp_ms: i64) -> Result<()>;

    /// Whether `table` was modified after `last_known_ms`.
    fn is_stale(&self, table: Table, last_known_ms: i64) -> Result<bool> {
        Ok(self.last_updated(table)? > last_known_ms)
    }

    /// Stored modification time of `table` (0 if never written).
    fn last_updated(&self, table: Table) -> Result<i64>;

    /// Delete questions and their tags. Returns how many rows went away.
    fn remove_questions(&self, ids: &[QuestionId], timestamp_ms: i64) -> Result<usize>;

    /// Insert new questions as `unanswered`, ignoring ids already stored.
    /// Returns how many were inserted.
    fn add_questions(&self, questions: &[Question], timestamp_ms: i64) -> Result<usize>;

    /// Insert or refresh a user's profile.
    fn upsert_user(&self, user: &User, timestamp_ms: i64) -> Result<()>;

    /// Record that `id` logged in at `timestamp_ms`.
    fn record_login(&self, id: UserId, timestamp_ms: i64) -> Result<()>;

    fn user(&self, id: UserId) -> Result<Option<StoredUser>>;

    fn users(&self) -> Result<Vec<StoredUser>>;

    fn tag_counts(&self) -> Result<Vec<TagCount>>;
}

/// Wall clock in milliseconds, the unit of every stored update time.
#[must_use]
pub fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_names_match_schema() {
        assert_eq!(Table::Questions.to_string(), "questions");
        assert_eq!(Table::Users.as_str(), "users");
    }

    #[test]
    fn default_filter_is_unfiltered() {
        assert!(QuestionFilter::all().is_unfiltered());
        let filter = QuestionFilter {
            tag: Some("maps".into()),
            ..QuestionFilter::default()
        };
        assert!(!filter.is_unfiltered());
    }
}
