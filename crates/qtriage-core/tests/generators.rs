#![allow(dead_code)]

use proptest::prelude::*;
use qtriage_core::ProposalSet;
use qtriage_core::model::{Proposal, Question, QuestionId, QuestionRecord, State, User, UserId};
use qtriage_core::store::TriageState;

pub const USERS: i64 = 4;

pub fn user(id: i64) -> User {
    User::new(UserId::new(id), format!("user{id}"))
}

pub fn arb_state() -> impl Strategy<Value = State> + Clone {
    prop_oneof![
        Just(State::Unanswered),
        Just(State::Answered),
        Just(State::Pending),
        Just(State::Updating),
    ]
}

pub fn arb_proposal() -> impl Strategy<Value = Proposal> + Clone {
    prop_oneof![
        1 => Just(Proposal::NoChange),
        4 => arb_state().prop_map(Proposal::Move),
    ]
}

pub fn arb_user() -> impl Strategy<Value = User> + Clone {
    (1..=USERS).prop_map(user)
}

/// A consistent persisted store: unique ids, a narrow date range so ties
/// are common, and an owner exactly for owned states.
pub fn arb_records() -> impl Strategy<Value = Vec<QuestionRecord>> {
    prop::collection::vec((0i64..8, arb_state(), 1..=USERS), 0..30).prop_map(|rows| {
        rows.into_iter()
            .enumerate()
            .map(|(i, (created, state, owner))| {
                let id = i64::try_from(i).expect("small index") + 1;
                QuestionRecord {
                    question: Question::new(QuestionId::new(id), format!("q{id}"), created),
                    state,
                    owner: state.is_owned().then(|| user(owner)),
                }
            })
            .collect()
    })
}

/// One proposal recipe: which question (by position in the store), whether
/// to name its real bucket or a possibly stale one, and the target.
#[derive(Debug, Clone)]
pub struct Pick {
    pub index: usize,
    pub honest: bool,
    pub claimed: State,
    pub target: Proposal,
}

pub fn arb_picks() -> impl Strategy<Value = Vec<Pick>> {
    prop::collection::vec(
        (any::<usize>(), prop::bool::weighted(0.85), arb_state(), arb_proposal()).prop_map(
            |(index, honest, claimed, target)| Pick {
                index,
                honest,
                claimed,
                target,
            },
        ),
        0..12,
    )
}

/// Materialise picks against `state`.
pub fn build_proposals(state: &TriageState, picks: &[Pick]) -> ProposalSet {
    let ids = state.store().ids();
    let mut proposals = ProposalSet::new();
    if ids.is_empty() {
        return proposals;
    }
    for pick in picks {
        let id = ids[pick.index % ids.len()];
        let bucket = if pick.honest {
            state.store().state_of(id).expect("id is stored")
        } else {
            pick.claimed
        };
        proposals.insert(id, bucket, pick.target);
    }
    proposals
}

/// Every question proposed `no_change` from its actual bucket.
pub fn all_no_change(state: &TriageState) -> ProposalSet {
    let mut proposals = ProposalSet::new();
    for id in state.store().ids() {
        let bucket = state.store().state_of(id).expect("id is stored");
        proposals.insert(id, bucket, Proposal::NoChange);
    }
    proposals
}
