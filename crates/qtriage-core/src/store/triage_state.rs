//! The store, ownership index, and shadow store as one value.
//!
//! A [`TriageState`] is only ever built whole (bootstrap, reload, or a
//! transition candidate), verified, and then published as an immutable
//! snapshot. Nothing mutates a published state.

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;

use super::{Buckets, OwnershipIndex, ShadowStore, StateStore};
use crate::error::{InvariantViolation, TriageError};
use crate::model::{Question, QuestionId, QuestionRecord, State, User, UserId};

#[derive(Debug, Clone, Default)]
pub struct TriageState {
    pub(crate) store: StateStore,
    pub(crate) ownership: OwnershipIndex,
    pub(crate) shadows: ShadowStore,
}

/// Serving shape for a whole store: four named lists plus owners.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriageView {
    pub unanswered: Vec<Question>,
    pub answered: Vec<Question>,
    pub pending: Vec<Question>,
    pub updating: Vec<Question>,
    pub owners: BTreeMap<QuestionId, User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<UserView>,
}

impl TriageView {
    #[must_use]
    pub fn bucket(&self, state: State) -> &[Question] {
        match state {
            State::Unanswered => &self.unanswered,
            State::Answered => &self.answered,
            State::Pending => &self.pending,
            State::Updating => &self.updating,
        }
    }
}

/// One user's owned questions, per owned state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserView {
    pub user_id: UserId,
    pub answered: Vec<Question>,
    pub pending: Vec<Question>,
    pub updating: Vec<Question>,
}

impl UserView {
    #[must_use]
    pub fn bucket(&self, state: State) -> &[Question] {
        match state {
            State::Unanswered => &[],
            State::Answered => &self.answered,
            State::Pending => &self.pending,
            State::Updating => &self.updating,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.answered.len() + self.pending.len() + self.updating.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TriageState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start state for a freshly imported dataset: everything unanswered.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::MalformedBuckets`] if the dataset repeats an id.
    pub fn from_unanswered(
        questions: impl IntoIterator<Item = Question>,
    ) -> Result<Self, TriageError> {
        Self::from_records(questions.into_iter().map(QuestionRecord::unanswered))
    }

    /// Rebuild the whole state from persisted records.
    ///
    /// Shadow buckets are derived from the owners after the global buckets
    /// are sorted, so their tie order matches the global order.
    ///
    /// # Errors
    ///
    /// Returns [`TriageError::MalformedBuckets`] for repeated ids and
    /// [`TriageError::Invariant`] if a record's owner disagrees with its state.
    pub fn from_records(
        records: impl IntoIterator<Item = QuestionRecord>,
    ) -> Result<Self, TriageError> {
        let mut buckets = Buckets::new();
        let mut owners: HashMap<QuestionId, User> = HashMap::new();

        for record in records {
            let id = record.question.id;
            match (record.state.is_owned(), record.owner) {
                (true, Some(owner)) => {
                    owners.insert(id, owner);
                }
                (true, None) => {
                    return Err(InvariantViolation::MissingOwner {
                        id,
                        state: record.state,
                    }
                    .into());
                }
                (false, Some(owner)) => {
                    return Err(InvariantViolation::UnexpectedOwner {
                        id,
                        owner: owner.id,
                    }
                    .into());
                }
                (false, None) => {}
            }
            buckets.push(record.state, record.question);
        }
        buckets.sort();

        let store = StateStore::from_buckets(buckets)?;
        let mut ownership = OwnershipIndex::new();
        let mut shadows = ShadowStore::new();
        for state in State::OWNED {
            for question in store.bucket(state) {
                if let Some(owner) = owners.remove(&question.id) {
                    shadows.insert(owner.id, state, question.clone());
                    ownership.assign(question.id, owner);
                }
            }
        }

        let state = Self {
            store,
            ownership,
            shadows,
        };
        state.verify()?;
        Ok(state)
    }

    #[must_use]
    pub const fn store(&self) -> &StateStore {
        &self.store
    }

    #[must_use]
    pub const fn ownership(&self) -> &OwnershipIndex {
        &self.ownership
    }

    #[must_use]
    pub const fn shadows(&self) -> &ShadowStore {
        &self.shadows
    }

    #[must_use]
    pub fn owner_of(&self, id: QuestionId) -> Option<&User> {
        self.ownership.owner_of(id)
    }

    /// Check every structural invariant.
    ///
    /// - buckets are disjoint and free of repeats
    /// - buckets are ordered newest first
    /// - exactly the non-unanswered questions have owners
    /// - every shadow entry matches ownership and global state, and every
    ///   owned question has its shadow entry
    ///
    /// # Errors
    ///
    /// Returns the first [`InvariantViolation`] found.
    pub fn verify(&self) -> Result<(), InvariantViolation> {
        let mut seen: HashMap<QuestionId, State> = HashMap::with_capacity(self.store.len());
        for state in State::ALL {
            let bucket = self.store.bucket(state);
            for (position, question) in bucket.iter().enumerate() {
                if let Some(first) = seen.insert(question.id, state) {
                    return Err(if first == state {
                        InvariantViolation::DuplicateWithinBucket {
                            id: question.id,
                            state,
                        }
                    } else {
                        InvariantViolation::DuplicateAcrossBuckets {
                            id: question.id,
                            first,
                            second: state,
                        }
                    });
                }
                if position > 0 && bucket[position - 1].creation_date < question.creation_date {
                    return Err(InvariantViolation::OutOfOrder { state, position });
                }

                match (state.is_owned(), self.ownership.owner_of(question.id)) {
                    (true, None) => {
                        return Err(InvariantViolation::MissingOwner {
                            id: question.id,
                            state,
                        });
                    }
                    (false, Some(owner)) => {
                        return Err(InvariantViolation::UnexpectedOwner {
                            id: question.id,
                            owner: owner.id,
                        });
                    }
                    (true, Some(owner)) => {
                        if !self.shadows.contains(owner.id, state, question.id) {
                            return Err(InvariantViolation::MissingShadowEntry {
                                user: owner.id,
                                state,
                                id: question.id,
                            });
                        }
                    }
                    (false, None) => {}
                }
            }
        }

        for (id, _) in self.ownership.iter() {
            if !seen.contains_key(&id) {
                return Err(InvariantViolation::DanglingOwner { id });
            }
        }

        for (user, state, question) in self.shadows.entries() {
            let owned_here = self.ownership.is_owned_by(question.id, user)
                && seen.get(&question.id) == Some(&state);
            if !owned_here {
                return Err(InvariantViolation::StrayShadowEntry {
                    user,
                    state,
                    id: question.id,
                });
            }
        }

        Ok(())
    }

    /// Four named lists plus owners, and `user`'s lists when given.
    #[must_use]
    pub fn view(&self, user: Option<UserId>) -> TriageView {
        Self::view_of(&self.store, &self.ownership, user.map(|id| self.user_view(id)))
    }

    /// Same as [`TriageState::view`] restricted to questions tagged `tag`.
    #[must_use]
    pub fn tag_view(&self, tag: &str) -> TriageView {
        Self::view_of(&self.store.filter_by_tag(tag), &self.ownership, None)
    }

    fn view_of(
        store: &StateStore,
        ownership: &OwnershipIndex,
        user: Option<UserView>,
    ) -> TriageView {
        let owners = store
            .ids()
            .into_iter()
            .filter_map(|id| ownership.owner_of(id).map(|owner| (id, owner.clone())))
            .collect();
        TriageView {
            unanswered: store.bucket(State::Unanswered).to_vec(),
            answered: store.bucket(State::Answered).to_vec(),
            pending: store.bucket(State::Pending).to_vec(),
            updating: store.bucket(State::Updating).to_vec(),
            owners,
            user,
        }
    }

    /// A user's shadow lists; empty lists for users who own nothing.
    #[must_use]
    pub fn user_view(&self, user: UserId) -> UserView {
        let list = |state: State| {
            self.shadows
                .user(user)
                .and_then(|shadow| shadow.bucket(state))
                .map(super::ShadowBucket::to_vec)
                .unwrap_or_default()
        };
        UserView {
            user_id: user,
            answered: list(State::Answered),
            pending: list(State::Pending),
            updating: list(State::Updating),
        }
    }

    /// Remove upstream-deleted ids from buckets, ownership, and shadows.
    ///
    /// Returns the ids that were actually present.
    pub(crate) fn purge(&mut self, ids: &HashSet<QuestionId>) -> Vec<QuestionId> {
        let removed = self.store.purge(ids);
        for (id, _) in &removed {
            self.ownership.clear(*id);
            self.shadows.purge(*id);
        }
        removed.into_iter().map(|(id, _)| id).collect()
    }
}
