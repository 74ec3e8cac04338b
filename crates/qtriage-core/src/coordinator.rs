//! Process-wide coordinator for the triage store.
//!
//! [`Triage`] owns the one authoritative [`TriageState`]. Transitions are
//! serialised by a writer mutex held across compute, verify, and commit, so
//! they are totally ordered by lock acquisition and never merged. Readers
//! take the published `Arc` snapshot and never see a half-applied batch.
//!
//! Persistence is write-behind: the commit point is the swap of the
//! published snapshot, after which a job is queued for the
//! [`PersistenceWriter`] and the caller returns without waiting on I/O.

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};
use std::time::Instant;

use crate::engine::{self, Change};
use crate::error::TriageError;
use crate::model::{QuestionId, User, UserId};
use crate::persist::{
    PersistJob, PersistenceGateway, PersistenceWriter, QuestionFilter, Table, WriterStats, now_ms,
};
use crate::proposal::ProposalSet;
use crate::store::{TriageState, TriageView, UserView};

/// Result of a committed transition.
#[derive(Debug, Clone)]
pub struct Committed {
    /// The state as published by this commit.
    pub snapshot: Arc<TriageState>,
    pub changes: Vec<Change>,
    /// Questions whose proposal named a bucket they had already left.
    pub stale: Vec<QuestionId>,
}

struct WriterState {
    current: Arc<TriageState>,
    /// Update time of `questions` as of the last load or own commit.
    last_known_ms: i64,
}

struct Persistence {
    gateway: Arc<dyn PersistenceGateway>,
    writer: PersistenceWriter,
}

pub struct Triage {
    writer: Mutex<WriterState>,
    published: RwLock<Arc<TriageState>>,
    persistence: Option<Persistence>,
}

impl std::fmt::Debug for Triage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Triage")
            .field("questions", &self.snapshot().store().len())
            .field("persistent", &self.persistence.is_some())
            .finish()
    }
}

impl Triage {
    /// An isolated instance with no persistence.
    #[must_use]
    pub fn new(state: TriageState) -> Self {
        let state = Arc::new(state);
        Self {
            writer: Mutex::new(WriterState {
                current: Arc::clone(&state),
                last_known_ms: 0,
            }),
            published: RwLock::new(state),
            persistence: None,
        }
    }

    /// Bootstrap from `gateway` and write committed changes back to it.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Persistence`] if loading fails or the writer
    /// thread cannot start, and [`TriageError::Invariant`] if the stored
    /// rows do not form a consistent state.
    pub fn load(gateway: Arc<dyn PersistenceGateway>) -> Result<Self, TriageError> {
        let (state, last_known_ms) = load_from(gateway.as_ref())?;
        let writer = PersistenceWriter::spawn(Arc::clone(&gateway))
            .map_err(|err| TriageError::Persistence(err.into()))?;

        let state = Arc::new(state);
        Ok(Self {
            writer: Mutex::new(WriterState {
                current: Arc::clone(&state),
                last_known_ms,
            }),
            published: RwLock::new(state),
            persistence: Some(Persistence { gateway, writer }),
        })
    }

    /// Apply one batch of proposals on behalf of `actor`.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Invariant`] or
    /// [`TriageError::MalformedBuckets`] if the candidate state is invalid;
    /// the published state is then unchanged. Returns
    /// [`TriageError::LockPoisoned`] if an earlier writer panicked.
    pub fn submit(&self, actor: &User, proposals: &ProposalSet) -> Result<Committed, TriageError> {
        let started = Instant::now();
        let mut writer = self.lock_writer()?;
        let transition = engine::apply(&writer.current, actor, proposals)?;

        if transition.changes.is_empty() {
            return Ok(Committed {
                snapshot: Arc::clone(&writer.current),
                changes: transition.changes,
                stale: transition.stale,
            });
        }

        let expected_ms = writer.last_known_ms;
        let timestamp_ms = next_timestamp(expected_ms);
        let next = Arc::new(transition.next);
        writer.current = Arc::clone(&next);
        writer.last_known_ms = timestamp_ms;
        self.publish(Arc::clone(&next));

        if let Some(persistence) = &self.persistence {
            persistence.writer.enqueue(PersistJob::Transition {
                changes: transition.changes.clone(),
                actor: actor.clone(),
                expected_ms,
                timestamp_ms,
            });
        }
        drop(writer);

        tracing::info!(
            actor = %actor.id,
            changes = transition.changes.len(),
            stale = transition.stale.len(),
            elapsed_ms = started.elapsed().as_millis(),
            "transition committed"
        );
        Ok(Committed {
            snapshot: next,
            changes: transition.changes,
            stale: transition.stale,
        })
    }

    /// The current published state.
    #[must_use]
    pub fn snapshot(&self) -> Arc<TriageState> {
        Arc::clone(&self.published.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// All four buckets with owners, plus `user`'s lists when given.
    #[must_use]
    pub fn view(&self, user: Option<UserId>) -> TriageView {
        self.snapshot().view(user)
    }

    #[must_use]
    pub fn user_view(&self, user: UserId) -> UserView {
        self.snapshot().user_view(user)
    }

    #[must_use]
    pub fn tag_view(&self, tag: &str) -> TriageView {
        self.snapshot().tag_view(tag)
    }

    /// Remove questions that no longer exist upstream.
    ///
    /// This is a plain removal, not a transition: nothing is reassigned.
    /// Returns how many of `ids` were present.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::LockPoisoned`] or [`TriageError::Invariant`];
    /// in both cases nothing is removed.
    pub fn purge(&self, ids: &[QuestionId]) -> Result<usize, TriageError> {
        let wanted: HashSet<QuestionId> = ids.iter().copied().collect();
        let mut writer = self.lock_writer()?;

        let mut next = TriageState::clone(&writer.current);
        let removed = next.purge(&wanted);
        if removed.is_empty() {
            return Ok(0);
        }
        next.verify()?;

        let expected_ms = writer.last_known_ms;
        let timestamp_ms = next_timestamp(expected_ms);
        let next = Arc::new(next);
        writer.current = Arc::clone(&next);
        writer.last_known_ms = timestamp_ms;
        self.publish(next);

        if let Some(persistence) = &self.persistence {
            persistence.writer.enqueue(PersistJob::Purge {
                ids: removed.clone(),
                expected_ms,
                timestamp_ms,
            });
        }
        tracing::info!(removed = removed.len(), "purged questions deleted upstream");
        Ok(removed.len())
    }

    /// Reload from the gateway if another writer touched `questions` since
    /// the last load, including writes that landed before one of our own
    /// commits. Returns whether a reload happened.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::Persistence`] if the persistence worker is
    /// gone, or the check or reload fails; the published state is then
    /// unchanged.
    pub fn refresh_if_stale(&self) -> Result<bool, TriageError> {
        let Some(persistence) = &self.persistence else {
            return Ok(false);
        };
        let mut writer = self.lock_writer()?;
        if !persistence.writer.flush() {
            tracing::warn!("persistence worker unavailable; skipping refresh");
            return Err(TriageError::Persistence(anyhow::anyhow!(
                "persistence worker is gone; queued writes may not have landed"
            )));
        }

        let foreign = persistence.writer.stats().foreign_write_pending();
        let stale = foreign
            || persistence
                .gateway
                .is_stale(Table::Questions, writer.last_known_ms)
                .map_err(TriageError::Persistence)?;
        if !stale {
            return Ok(false);
        }

        tracing::info!(
            last_known_ms = writer.last_known_ms,
            foreign,
            "store is stale; reloading"
        );
        let (state, last_known_ms) = load_from(persistence.gateway.as_ref())?;
        let state = Arc::new(state);
        writer.current = Arc::clone(&state);
        writer.last_known_ms = last_known_ms;
        persistence.writer.stats().clear_foreign_write();
        self.publish(state);
        Ok(true)
    }

    /// Wait until every queued persistence job has been applied.
    pub fn flush(&self) {
        if let Some(persistence) = &self.persistence
            && !persistence.writer.flush()
        {
            tracing::warn!("persistence worker unavailable during flush");
        }
    }

    /// Counters from the persistence worker, if there is one.
    #[must_use]
    pub fn writer_stats(&self) -> Option<&WriterStats> {
        self.persistence.as_ref().map(|p| p.writer.stats())
    }

    /// Drain queued writes and stop the persistence worker.
    pub fn shutdown(self) {
        if let Some(persistence) = self.persistence {
            persistence.writer.shutdown();
        }
    }

    fn lock_writer(&self) -> Result<MutexGuard<'_, WriterState>, TriageError> {
        self.writer.lock().map_err(|_| TriageError::LockPoisoned)
    }

    fn publish(&self, state: Arc<TriageState>) {
        *self.published.write().unwrap_or_else(PoisonError::into_inner) = state;
    }
}

fn load_from(gateway: &dyn PersistenceGateway) -> Result<(TriageState, i64), TriageError> {
    let started = Instant::now();
    let last_known_ms = gateway
        .last_updated(Table::Questions)
        .map_err(TriageError::Persistence)?;
    let records = gateway
        .load_all(&QuestionFilter::all())
        .map_err(TriageError::Persistence)?;
    let count = records.len();
    let state = TriageState::from_records(records)?;
    tracing::debug!(
        questions = count,
        last_known_ms,
        elapsed_ms = started.elapsed().as_millis(),
        "loaded triage state"
    );
    Ok((state, last_known_ms))
}

/// Commit timestamps strictly increase even if the wall clock does not.
fn next_timestamp(last_known_ms: i64) -> i64 {
    now_ms().max(last_known_ms + 1)
}
