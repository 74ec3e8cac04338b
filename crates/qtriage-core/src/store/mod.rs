//! In-memory triage store.
//!
//! - [`StateStore`] partitions questions into the four state buckets
//! - [`OwnershipIndex`] maps owned questions to their responsible user
//! - [`ShadowStore`] mirrors, per user, the owned subset of each bucket
//! - [`TriageState`] bundles the three so they are always replaced together
//!
//! Bucket order is newest-first by `creation_date`, with ties kept in the
//! order questions were placed into the bucket.

pub mod ownership;
pub mod shadow;
pub mod triage_state;

pub use ownership::OwnershipIndex;
pub use shadow::{ShadowBucket, ShadowStore, UserShadow};
pub use triage_state::{TriageState, TriageView, UserView};

use std::collections::{HashMap, HashSet};

use crate::error::TriageError;
use crate::model::{Question, QuestionId, State};

/// A full set of four buckets, indexed by [`State::index`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Buckets([Vec<Question>; 4]);

impl Buckets {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, state: State, question: Question) {
        self.0[state.index()].push(question);
    }

    #[must_use]
    pub fn get(&self, state: State) -> &[Question] {
        &self.0[state.index()]
    }

    /// Stable sort of every bucket, newest first.
    pub fn sort(&mut self) {
        for bucket in &mut self.0 {
            sort_newest_first(bucket);
        }
    }

    /// Iterate `(state, question)` pairs in [`State::ALL`] order.
    pub fn iter(&self) -> impl Iterator<Item = (State, &Question)> {
        State::ALL
            .into_iter()
            .flat_map(move |state| self.get(state).iter().map(move |q| (state, q)))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.iter().all(Vec::is_empty)
    }
}

/// Stable sort by `creation_date` descending.
pub fn sort_newest_first(questions: &mut [Question]) {
    questions.sort_by(|a, b| b.creation_date.cmp(&a.creation_date));
}

/// The four-way partition of questions by triage state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StateStore {
    buckets: Buckets,
    index: HashMap<QuestionId, State>,
}

impl StateStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from a bucket set.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::MalformedBuckets`] if any question id is listed
    /// more than once.
    pub fn from_buckets(buckets: Buckets) -> Result<Self, TriageError> {
        let mut store = Self::new();
        store.replace(buckets)?;
        Ok(store)
    }

    /// Independent copy of all four buckets for read-only serving.
    #[must_use]
    pub fn snapshot(&self) -> Self {
        self.clone()
    }

    /// Substitute all four buckets at once.
    ///
    /// The new set is validated before anything is touched, so a rejected
    /// set leaves the store exactly as it was.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::MalformedBuckets`] if any question id is listed
    /// more than once.
    pub fn replace(&mut self, buckets: Buckets) -> Result<(), TriageError> {
        let mut index = HashMap::with_capacity(buckets.len());
        for (state, question) in buckets.iter() {
            if index.insert(question.id, state).is_some() {
                return Err(TriageError::MalformedBuckets { id: question.id });
            }
        }
        self.buckets = buckets;
        self.index = index;
        Ok(())
    }

    #[must_use]
    pub fn bucket(&self, state: State) -> &[Question] {
        self.buckets.get(state)
    }

    #[must_use]
    pub const fn buckets(&self) -> &Buckets {
        &self.buckets
    }

    #[must_use]
    pub fn state_of(&self, id: QuestionId) -> Option<State> {
        self.index.get(&id).copied()
    }

    #[must_use]
    pub fn get(&self, id: QuestionId) -> Option<&Question> {
        let state = self.state_of(id)?;
        self.bucket(state).iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.index.contains_key(&id)
    }

    /// All question ids currently held, in bucket order.
    #[must_use]
    pub fn ids(&self) -> Vec<QuestionId> {
        self.buckets.iter().map(|(_, q)| q.id).collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Copy of the store holding only questions carrying `tag`.
    #[must_use]
    pub fn filter_by_tag(&self, tag: &str) -> Self {
        let mut buckets = Buckets::new();
        for (state, question) in self.buckets.iter() {
            if question.has_tag(tag) {
                buckets.push(state, question.clone());
            }
        }
        let index = buckets.iter().map(|(state, q)| (q.id, state)).collect();
        Self { buckets, index }
    }

    /// Drop the given ids from every bucket, returning what was removed.
    pub(crate) fn purge(&mut self, ids: &HashSet<QuestionId>) -> Vec<(QuestionId, State)> {
        let mut removed = Vec::new();
        for (i, bucket) in self.buckets.0.iter_mut().enumerate() {
            let state = State::ALL[i];
            bucket.retain(|q| {
                if ids.contains(&q.id) {
                    removed.push((q.id, state));
                    false
                } else {
                    true
                }
            });
        }
        for (id, _) in &removed {
            self.index.remove(id);
        }
        removed
    }
}
