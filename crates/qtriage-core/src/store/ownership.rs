//! Question → owner mapping.
//!
//! Single writer: only the transition engine and upstream-deletion purges
//! mutate an index, and only on a candidate state built inside the
//! coordinator's critical section. Published indexes are never mutated.

use std::collections::BTreeMap;

use crate::model::{QuestionId, User, UserId};

/// Maps each owned question to the one user responsible for it.
///
/// A question has an entry exactly when it is not `unanswered`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OwnershipIndex {
    owners: BTreeMap<QuestionId, User>,
}

impl OwnershipIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set or overwrite the owner, returning the previous one.
    ///
    /// Overwriting is a single map update, so there is never a moment in
    /// which a reassigned question has no owner.
    pub fn assign(&mut self, id: QuestionId, user: User) -> Option<User> {
        self.owners.insert(id, user)
    }

    /// Remove the owner; used when a question returns to `unanswered`.
    pub fn clear(&mut self, id: QuestionId) -> Option<User> {
        self.owners.remove(&id)
    }

    #[must_use]
    pub fn owner_of(&self, id: QuestionId) -> Option<&User> {
        self.owners.get(&id)
    }

    /// Whether `id` is owned by `user`.
    #[must_use]
    pub fn is_owned_by(&self, id: QuestionId, user: UserId) -> bool {
        self.owner_of(id).is_some_and(|owner| owner.id == user)
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, &User)> {
        self.owners.iter().map(|(id, user)| (*id, user))
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.owners.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    #[must_use]
    pub fn as_map(&self) -> &BTreeMap<QuestionId, User> {
        &self.owners
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn assign_overwrites_and_reports_previous() {
        let mut index = OwnershipIndex::new();
        let id = QuestionId::new(101);
        let alice = User::new(UserId::new(7), "alice");
        let bob = User::new(UserId::new(9), "bob");

        assert!(index.assign(id, alice.clone()).is_none());
        assert_eq!(index.assign(id, bob.clone()), Some(alice));
        assert_eq!(index.owner_of(id), Some(&bob));
        assert!(index.is_owned_by(id, UserId::new(9)));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn clear_removes_entry() {
        let mut index = OwnershipIndex::new();
        let id = QuestionId::new(1);
        index.assign(id, User::new(UserId::new(1), "a"));
        assert!(index.clear(id).is_some());
        assert!(index.clear(id).is_none());
        assert!(index.owner_of(id).is_none());
        assert!(index.is_empty());
    }
}
