//! Per-user shadow buckets.
//!
//! A shadow bucket holds the questions a user owns in one owned state. It
//! is derived from the global buckets and the ownership index, and is only
//! ever updated in the same step that changes them.
//!
//! Entries are keyed by `(Reverse(creation_date), sequence)` so iteration
//! is newest-first with ties in insertion order, which is exactly what a
//! stable sort of the appended entries would produce. A side index from
//! question id to key makes removal by id direct.

use std::cmp::Reverse;
use std::collections::{BTreeMap, HashMap};

use crate::model::{Question, QuestionId, State, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct ShadowKey {
    newest_first: Reverse<i64>,
    seq: u64,
}

/// One user's questions in one owned state.
#[derive(Debug, Clone, Default)]
pub struct ShadowBucket {
    entries: BTreeMap<ShadowKey, Question>,
    keys: HashMap<QuestionId, ShadowKey>,
}

impl ShadowBucket {
    /// Insert unless already present. Returns whether the bucket changed.
    fn insert(&mut self, question: Question, seq: u64) -> bool {
        if self.keys.contains_key(&question.id) {
            return false;
        }
        let key = ShadowKey {
            newest_first: Reverse(question.creation_date),
            seq,
        };
        self.keys.insert(question.id, key);
        self.entries.insert(key, question);
        true
    }

    fn remove(&mut self, id: QuestionId) -> Option<Question> {
        let key = self.keys.remove(&id)?;
        self.entries.remove(&key)
    }

    #[must_use]
    pub fn contains(&self, id: QuestionId) -> bool {
        self.keys.contains_key(&id)
    }

    /// Questions newest first.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.entries.values()
    }

    #[must_use]
    pub fn ids(&self) -> Vec<QuestionId> {
        self.iter().map(|q| q.id).collect()
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<Question> {
        self.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The three owned-state buckets of a single user.
#[derive(Debug, Clone, Default)]
pub struct UserShadow {
    buckets: [ShadowBucket; 3],
}

impl UserShadow {
    const fn slot(state: State) -> Option<usize> {
        match state {
            State::Unanswered => None,
            State::Answered => Some(0),
            State::Pending => Some(1),
            State::Updating => Some(2),
        }
    }

    /// The bucket for `state`; `None` for `unanswered`, which has no owner.
    #[must_use]
    pub fn bucket(&self, state: State) -> Option<&ShadowBucket> {
        Self::slot(state).map(|i| &self.buckets[i])
    }

    fn bucket_mut(&mut self, state: State) -> Option<&mut ShadowBucket> {
        Self::slot(state).map(|i| &mut self.buckets[i])
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.buckets.iter().map(ShadowBucket::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.buckets.iter().all(ShadowBucket::is_empty)
    }
}

/// Shadow buckets for every user that has ever owned a question.
#[derive(Debug, Clone, Default)]
pub struct ShadowStore {
    users: BTreeMap<UserId, UserShadow>,
    next_seq: u64,
}

impl ShadowStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `question` to `user`'s bucket for `state`.
    ///
    /// Returns `false` when nothing changed: the question was already there,
    /// or `state` is `unanswered`.
    pub fn insert(&mut self, user: UserId, state: State, question: Question) -> bool {
        if !state.is_owned() {
            tracing::warn!(
                %user,
                question_id = %question.id,
                "ignoring shadow insert into unanswered"
            );
            return false;
        }
        let seq = self.next_seq;
        let inserted = self
            .users
            .entry(user)
            .or_default()
            .bucket_mut(state)
            .is_some_and(|bucket| bucket.insert(question, seq));
        if inserted {
            self.next_seq += 1;
        }
        inserted
    }

    /// Remove question `id` from `user`'s bucket for `state`.
    pub fn remove(&mut self, user: UserId, state: State, id: QuestionId) -> Option<Question> {
        self.users
            .get_mut(&user)
            .and_then(|shadow| shadow.bucket_mut(state))
            .and_then(|bucket| bucket.remove(id))
    }

    /// Remove question `id` from every bucket of every user.
    pub(crate) fn purge(&mut self, id: QuestionId) -> usize {
        let mut removed = 0;
        for shadow in self.users.values_mut() {
            for bucket in &mut shadow.buckets {
                if bucket.remove(id).is_some() {
                    removed += 1;
                }
            }
        }
        removed
    }

    #[must_use]
    pub fn user(&self, user: UserId) -> Option<&UserShadow> {
        self.users.get(&user)
    }

    #[must_use]
    pub fn contains(&self, user: UserId, state: State, id: QuestionId) -> bool {
        self.user(user)
            .and_then(|shadow| shadow.bucket(state))
            .is_some_and(|bucket| bucket.contains(id))
    }

    /// Iterate users in id order.
    pub fn users(&self) -> impl Iterator<Item = (UserId, &UserShadow)> {
        self.users.iter().map(|(id, shadow)| (*id, shadow))
    }

    /// Every `(user, state, question)` entry, users in id order.
    pub fn entries(&self) -> impl Iterator<Item = (UserId, State, &Question)> {
        self.users().flat_map(|(user, shadow)| {
            State::OWNED.into_iter().flat_map(move |state| {
                shadow
                    .bucket(state)
                    .into_iter()
                    .flat_map(ShadowBucket::iter)
                    .map(move |q| (user, state, q))
            })
        })
    }

    /// Contents as ordered id lists, skipping empty buckets.
    ///
    /// Two stores with equal contents compare equal here even if their
    /// internal insertion counters differ.
    #[must_use]
    pub fn contents(&self) -> BTreeMap<(UserId, State), Vec<QuestionId>> {
        let mut out = BTreeMap::new();
        for (user, shadow) in self.users() {
            for state in State::OWNED {
                if let Some(bucket) = shadow.bucket(state).filter(|b| !b.is_empty()) {
                    out.insert((user, state), bucket.ids());
                }
            }
        }
        out
    }
}
