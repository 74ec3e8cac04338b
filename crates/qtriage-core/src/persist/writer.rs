//! Write-behind persistence worker.
//!
//! The coordinator hands committed results to a dedicated thread over an
//! unbounded channel, so enqueueing never blocks the transition lock. Jobs
//! are applied in submission order. Failures are logged and counted, never
//! retried.
//!
//! Each write carries the `questions` update time the coordinator believed
//! current when it committed. Before applying it the worker compares that
//! against the stored time; a newer stored time means another process wrote
//! in between, and that is latched so the next refresh reloads even though
//! this write raises the stored time past the foreign one.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle};

use super::{PersistenceGateway, Table};
use crate::engine::Change;
use crate::model::{QuestionId, User};

/// Work for the persistence thread.
#[derive(Debug)]
pub enum PersistJob {
    Transition {
        changes: Vec<Change>,
        actor: User,
        /// `questions` update time as of the commit, before this write.
        expected_ms: i64,
        timestamp_ms: i64,
    },
    Purge {
        ids: Vec<QuestionId>,
        expected_ms: i64,
        timestamp_ms: i64,
    },
    /// Acknowledge once every earlier job has been applied.
    Flush(Sender<()>),
}

/// Counters shared between the worker and its handle.
#[derive(Debug, Default)]
pub struct WriterStats {
    written: AtomicU64,
    failed: AtomicU64,
    foreign_writes: AtomicU64,
    foreign_pending: AtomicBool,
}

impl WriterStats {
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn failed(&self) -> u64 {
        self.failed.load(Ordering::Relaxed)
    }

    /// Writes that found another process had touched `questions` first.
    #[must_use]
    pub fn foreign_writes(&self) -> u64 {
        self.foreign_writes.load(Ordering::Relaxed)
    }

    /// Whether a foreign write was seen and not yet reloaded.
    pub(crate) fn foreign_write_pending(&self) -> bool {
        self.foreign_pending.load(Ordering::Acquire)
    }

    pub(crate) fn clear_foreign_write(&self) {
        self.foreign_pending.store(false, Ordering::Release);
    }

    fn note_foreign_write(&self) {
        self.foreign_writes.fetch_add(1, Ordering::Relaxed);
        self.foreign_pending.store(true, Ordering::Release);
    }
}

/// Handle to the background persistence thread.
///
/// Dropping the handle closes the queue and waits for queued jobs to drain.
#[derive(Debug)]
pub struct PersistenceWriter {
    tx: Option<Sender<PersistJob>>,
    handle: Option<JoinHandle<()>>,
    stats: Arc<WriterStats>,
}

impl PersistenceWriter {
    /// Start the worker thread.
    ///
    /// # Errors
    ///
    /// Returns an error if the OS refuses to spawn the thread.
    pub fn spawn(gateway: Arc<dyn PersistenceGateway>) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let stats = Arc::new(WriterStats::default());
        let worker_stats = Arc::clone(&stats);
        let handle = thread::Builder::new()
            .name("qtriage-persist".to_string())
            .spawn(move || run(&*gateway, &rx, &worker_stats))?;
        Ok(Self {
            tx: Some(tx),
            handle: Some(handle),
            stats,
        })
    }

    /// Queue a job without waiting for it.
    ///
    /// Returns `false` if the worker is gone; the job is dropped and logged.
    pub fn enqueue(&self, job: PersistJob) -> bool {
        let Some(tx) = &self.tx else {
            return false;
        };
        match tx.send(job) {
            Ok(()) => true,
            Err(err) => {
                tracing::error!(job = ?err.0, "persistence worker is gone; dropping job");
                self.stats.failed.fetch_add(1, Ordering::Relaxed);
                false
            }
        }
    }

    /// Block until every job queued so far has been applied.
    pub fn flush(&self) -> bool {
        let (ack_tx, ack_rx) = mpsc::channel();
        self.enqueue(PersistJob::Flush(ack_tx)) && ack_rx.recv().is_ok()
    }

    #[must_use]
    pub fn stats(&self) -> &WriterStats {
        &self.stats
    }

    /// Close the queue and wait for the worker to finish queued jobs.
    pub fn shutdown(mut self) {
        self.close();
    }

    fn close(&mut self) {
        drop(self.tx.take());
        if let Some(handle) = self.handle.take()
            && handle.join().is_err()
        {
            tracing::error!("persistence worker panicked");
        }
    }
}

impl Drop for PersistenceWriter {
    fn drop(&mut self) {
        self.close();
    }
}

fn run(gateway: &dyn PersistenceGateway, rx: &Receiver<PersistJob>, stats: &WriterStats) {
    for job in rx {
        let result = match job {
            PersistJob::Transition {
                changes,
                actor,
                expected_ms,
                timestamp_ms,
            } => {
                check_foreign(gateway, expected_ms, stats);
                gateway
                    .persist_transition(&changes, &actor, timestamp_ms)
                    .map(|()| changes.len())
            }
            PersistJob::Purge {
                ids,
                expected_ms,
                timestamp_ms,
            } => {
                check_foreign(gateway, expected_ms, stats);
                gateway.remove_questions(&ids, timestamp_ms)
            }
            PersistJob::Flush(ack) => {
                let _ = ack.send(());
                continue;
            }
        };

        match result {
            Ok(rows) => {
                stats.written.fetch_add(1, Ordering::Relaxed);
                tracing::debug!(rows, "persisted");
            }
            Err(err) => {
                stats.failed.fetch_add(1, Ordering::Relaxed);
                tracing::error!("persistence write failed (in-memory state kept): {err:#}");
            }
        }
    }
    tracing::debug!("persistence worker stopped");
}

/// A failed check counts as foreign so the next refresh reloads.
fn check_foreign(gateway: &dyn PersistenceGateway, expected_ms: i64, stats: &WriterStats) {
    match gateway.is_stale(Table::Questions, expected_ms) {
        Ok(false) => {}
        Ok(true) => {
            tracing::info!(expected_ms, "questions were written by another process");
            stats.note_foreign_write();
        }
        Err(err) => {
            tracing::warn!("staleness check before write failed: {err:#}");
            stats.note_foreign_write();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Question, QuestionRecord, State, UserId};
    use crate::persist::{QuestionFilter, StoredUser, Table, TagCount};
    use anyhow::{Result, bail};
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingGateway {
        fail: bool,
        stored_ms: i64,
        transitions: Mutex<Vec<(Vec<Change>, i64)>>,
        purged: Mutex<Vec<QuestionId>>,
    }

    impl PersistenceGateway for RecordingGateway {
        fn question_exists(&self, _id: QuestionId) -> Result<bool> {
            Ok(false)
        }
        fn load_all(&self, _filter: &QuestionFilter) -> Result<Vec<QuestionRecord>> {
            Ok(Vec::new())
        }
        fn question(&self, _id: QuestionId) -> Result<Option<QuestionRecord>> {
            Ok(None)
        }
        fn persist_transition(&self, changes: &[Change], _actor: &User, ts: i64) -> Result<()> {
            if self.fail {
                bail!("database is locked");
            }
            self.transitions
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push((changes.to_vec(), ts));
            Ok(())
        }
        fn last_updated(&self, _table: Table) -> Result<i64> {
            Ok(self.stored_ms)
        }
        fn remove_questions(&self, ids: &[QuestionId], _ts: i64) -> Result<usize> {
            self.purged
                .lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .extend_from_slice(ids);
            Ok(ids.len())
        }
        fn add_questions(&self, _questions: &[Question], _ts: i64) -> Result<usize> {
            Ok(0)
        }
        fn upsert_user(&self, _user: &User, _ts: i64) -> Result<()> {
            Ok(())
        }
        fn record_login(&self, _id: UserId, _ts: i64) -> Result<()> {
            Ok(())
        }
        fn user(&self, _id: UserId) -> Result<Option<StoredUser>> {
            Ok(None)
        }
        fn users(&self) -> Result<Vec<StoredUser>> {
            Ok(Vec::new())
        }
        fn tag_counts(&self) -> Result<Vec<TagCount>> {
            Ok(Vec::new())
        }
    }

    fn change(id: i64) -> Change {
        Change {
            question_id: QuestionId::new(id),
            from: State::Unanswered,
            to: State::Pending,
            owner: Some(UserId::new(7)),
        }
    }

    #[test]
    fn jobs_apply_in_order_and_flush_waits() {
        let gateway = Arc::new(RecordingGateway::default());
        let writer = PersistenceWriter::spawn(gateway.clone()).expect("spawn writer");
        let actor = User::new(UserId::new(7), "alice");

        for ts in 1..=3 {
            assert!(writer.enqueue(PersistJob::Transition {
                changes: vec![change(ts)],
                actor: actor.clone(),
                expected_ms: ts - 1,
                timestamp_ms: ts,
            }));
        }
        assert!(writer.enqueue(PersistJob::Purge {
            ids: vec![QuestionId::new(2)],
            expected_ms: 3,
            timestamp_ms: 4,
        }));
        assert!(writer.flush());

        let seen: Vec<i64> = gateway
            .transitions
            .lock()
            .expect("lock")
            .iter()
            .map(|(_, ts)| *ts)
            .collect();
        assert_eq!(seen, vec![1, 2, 3]);
        assert_eq!(*gateway.purged.lock().expect("lock"), vec![QuestionId::new(2)]);
        assert_eq!(writer.stats().written(), 4);
        assert_eq!(writer.stats().failed(), 0);
        assert_eq!(writer.stats().foreign_writes(), 0);
        writer.shutdown();
    }

    #[test]
    fn failures_are_counted_not_retried() {
        let gateway = Arc::new(RecordingGateway {
            fail: true,
            ..RecordingGateway::default()
        });
        let writer = PersistenceWriter::spawn(gateway).expect("spawn writer");
        writer.enqueue(PersistJob::Transition {
            changes: vec![change(1)],
            actor: User::new(UserId::new(7), "alice"),
            expected_ms: 0,
            timestamp_ms: 1,
        });
        assert!(writer.flush());
        assert_eq!(writer.stats().failed(), 1);
        assert_eq!(writer.stats().written(), 0);
    }

    #[test]
    fn drop_drains_queue() {
        let gateway = Arc::new(RecordingGateway::default());
        {
            let writer = PersistenceWriter::spawn(gateway.clone()).expect("spawn writer");
            writer.enqueue(PersistJob::Purge {
                ids: vec![QuestionId::new(1), QuestionId::new(2)],
                expected_ms: 0,
                timestamp_ms: 1,
            });
        }
        assert_eq!(gateway.purged.lock().expect("lock").len(), 2);
    }

    #[test]
    fn newer_stored_time_is_latched_once() {
        let gateway = Arc::new(RecordingGateway {
            stored_ms: 50,
            ..RecordingGateway::default()
        });
        let writer = PersistenceWriter::spawn(gateway).expect("spawn writer");
        let actor = User::new(UserId::new(7), "alice");

        writer.enqueue(PersistJob::Transition {
            changes: vec![change(1)],
            actor: actor.clone(),
            expected_ms: 50,
            timestamp_ms: 51,
        });
        assert!(writer.flush());
        assert!(!writer.stats().foreign_write_pending());

        writer.enqueue(PersistJob::Transition {
            changes: vec![change(2)],
            actor,
            expected_ms: 10,
            timestamp_ms: 52,
        });
        assert!(writer.flush());
        assert_eq!(writer.stats().foreign_writes(), 1);
        assert!(writer.stats().foreign_write_pending());
        writer.stats().clear_foreign_write();
        assert!(!writer.stats().foreign_write_pending());
    }
}
