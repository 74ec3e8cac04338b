//! Batch transition engine.
//!
//! [`apply`] is a pure function from the current [`TriageState`], an acting
//! user, and a [`ProposalSet`] to a verified candidate state plus the list
//! of per-question changes. It never touches the current state; the
//! coordinator decides whether and when the candidate is published.
//!
//! # Algorithm
//!
//! 1. Walk buckets in [`State::ALL`] order and each bucket front to back.
//! 2. No proposal (or `no_change`, or a proposal made against a different
//!    bucket) keeps the question in its bucket with its owner.
//! 3. `Move(L)` places the question in bucket `L`; `L` may equal the current
//!    bucket, which lets a user claim a question in place.
//! 4. Ownership follows the target:
//!    - `unanswered` drops the question from its previous owner's shadow
//!      bucket and clears the owner, whoever that was;
//!    - any other target drops it from the previous owner's shadow bucket
//!      for the old state, assigns the actor, and adds it to the actor's
//!      shadow bucket for `L`. Re-claiming one's own question in place
//!      changes nothing.
//! 5. Global buckets are stable-sorted newest first; shadow buckets keep
//!    that order by construction.
//! 6. The candidate is verified before it is returned.

use std::time::Instant;

use serde::Serialize;

use crate::error::TriageError;
use crate::model::{Proposal, QuestionId, State, User, UserId};
use crate::proposal::ProposalSet;
use crate::store::{Buckets, StateStore, TriageState};

/// A question whose state or owner changed in a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Change {
    pub question_id: QuestionId,
    pub from: State,
    pub to: State,
    /// Owner after the change; `None` exactly when `to` is `unanswered`.
    pub owner: Option<UserId>,
}

/// Outcome of applying one proposal set.
#[derive(Debug, Clone)]
pub struct Transition {
    pub next: TriageState,
    pub changes: Vec<Change>,
    /// Proposals that named a bucket the question was no longer in.
    pub stale: Vec<QuestionId>,
}

/// Compute the state that results from `actor` submitting `proposals`.
///
/// # Errors
///
/// Returns [`TriageError::Invariant`] if the candidate fails verification
/// (a logic defect) and [`TriageError::MalformedBuckets`] if the candidate
/// bucket set repeats an id. In both cases nothing has been committed.
pub fn apply(
    current: &TriageState,
    actor: &User,
    proposals: &ProposalSet,
) -> Result<Transition, TriageError> {
    let started = Instant::now();
    let mut buckets = Buckets::new();
    let mut ownership = current.ownership.clone();
    let mut shadows = current.shadows.clone();
    let mut changes = Vec::new();
    let mut stale = Vec::new();

    for state in State::ALL {
        for question in current.store.bucket(state) {
            let target = match proposals.get(question.id) {
                Some(entry) if entry.bucket == state => entry.target,
                Some(entry) => {
                    tracing::warn!(
                        question_id = %question.id,
                        proposed_from = %entry.bucket,
                        actual = %state,
                        "proposal made against a stale bucket; leaving question in place"
                    );
                    stale.push(question.id);
                    Proposal::NoChange
                }
                None => Proposal::NoChange,
            };

            let Proposal::Move(to) = target else {
                buckets.push(state, question.clone());
                continue;
            };
            buckets.push(to, question.clone());

            let previous = ownership.owner_of(question.id).map(|owner| owner.id);
            if to == State::Unanswered {
                if let Some(prev) = previous {
                    shadows.remove(prev, state, question.id);
                    ownership.clear(question.id);
                    tracing::debug!(question_id = %question.id, owner = %prev, "released");
                }
            } else if previous == Some(actor.id) && to == state {
                // Re-claim in place.
            } else {
                if let Some(prev) = previous {
                    shadows.remove(prev, state, question.id);
                }
                ownership.assign(question.id, actor.clone());
                shadows.insert(actor.id, to, question.clone());
                if previous.is_some_and(|prev| prev != actor.id) {
                    tracing::debug!(
                        question_id = %question.id,
                        from_owner = ?previous,
                        to_owner = %actor.id,
                        "reassigned"
                    );
                }
            }

            let owner = ownership.owner_of(question.id).map(|o| o.id);
            if to != state || owner != previous {
                changes.push(Change {
                    question_id: question.id,
                    from: state,
                    to,
                    owner,
                });
            }
        }
    }

    buckets.sort();
    let next = TriageState {
        store: StateStore::from_buckets(buckets)?,
        ownership,
        shadows,
    };
    next.verify()?;

    tracing::debug!(
        actor = %actor.id,
        proposals = proposals.len(),
        changes = changes.len(),
        stale = stale.len(),
        elapsed_us = started.elapsed().as_micros(),
        "transition computed"
    );

    Ok(Transition {
        next,
        changes,
        stale,
    })
}
