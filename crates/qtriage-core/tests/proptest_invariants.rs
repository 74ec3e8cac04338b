use proptest::prelude::*;
use qtriage_core::engine::apply;
use qtriage_core::model::{Proposal, QuestionId, State};
use qtriage_core::store::TriageState;
use std::collections::BTreeSet;

#[path = "generators.rs"]
mod generators;
use generators::*;

fn id_set(state: &TriageState) -> BTreeSet<QuestionId> {
    state.store().ids().into_iter().collect()
}

fn assert_shadows_mirror_global(state: &TriageState) {
    for user_id in 1..=USERS {
        let user_id = qtriage_core::model::UserId::new(user_id);
        let view = state.user_view(user_id);
        for bucket in State::OWNED {
            let expected: BTreeSet<QuestionId> = state
                .store()
                .bucket(bucket)
                .iter()
                .filter(|q| state.ownership().is_owned_by(q.id, user_id))
                .map(|q| q.id)
                .collect();
            let shadow = view.bucket(bucket);
            let actual: BTreeSet<QuestionId> = shadow.iter().map(|q| q.id).collect();
            assert_eq!(actual, expected, "user {user_id} bucket {bucket}");
            assert_eq!(actual.len(), shadow.len(), "shadow {bucket} repeats an id");
            assert!(
                shadow.windows(2).all(|w| w[0].creation_date >= w[1].creation_date),
                "shadow {bucket} of user {user_id} out of order"
            );
        }
    }
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(512))]

    #[test]
    fn transitions_preserve_partition_and_ownership(
        records in arb_records(),
        batches in prop::collection::vec((arb_user(), arb_picks()), 1..6),
    ) {
        let mut state =
            TriageState::from_records(records).expect("generated records are consistent");
        let ids = id_set(&state);

        for (actor, picks) in &batches {
            let proposals = build_proposals(&state, picks);
            let transition = apply(&state, actor, &proposals).expect("transition must verify");
            state = transition.next;

            prop_assert_eq!(id_set(&state), ids.clone());
            prop_assert!(state.verify().is_ok());
            for bucket in State::ALL {
                for question in state.store().bucket(bucket) {
                    prop_assert_eq!(state.owner_of(question.id).is_some(), bucket.is_owned());
                }
            }
        }
    }

    #[test]
    fn shadow_buckets_mirror_owned_globals(
        records in arb_records(),
        actor in arb_user(),
        picks in arb_picks(),
    ) {
        let state = TriageState::from_records(records).expect("consistent");
        assert_shadows_mirror_global(&state);
        let proposals = build_proposals(&state, &picks);
        let next = apply(&state, &actor, &proposals).expect("apply").next;
        assert_shadows_mirror_global(&next);
    }

    #[test]
    fn buckets_stay_newest_first(
        records in arb_records(),
        actor in arb_user(),
        picks in arb_picks(),
    ) {
        let state = TriageState::from_records(records).expect("consistent");
        let next = apply(&state, &actor, &build_proposals(&state, &picks)).expect("apply").next;
        for bucket in State::ALL {
            let dates: Vec<i64> =
                next.store().bucket(bucket).iter().map(|q| q.creation_date).collect();
            prop_assert!(dates.windows(2).all(|w| w[0] >= w[1]), "{bucket}: {dates:?}");
        }
    }

    #[test]
    fn all_no_change_is_identity(records in arb_records(), actor in arb_user()) {
        let state = TriageState::from_records(records).expect("consistent");
        let transition = apply(&state, &actor, &all_no_change(&state)).expect("apply");
        prop_assert!(transition.changes.is_empty());
        prop_assert_eq!(transition.next.store(), state.store());
        prop_assert_eq!(transition.next.ownership(), state.ownership());
        prop_assert_eq!(transition.next.shadows().contents(), state.shadows().contents());
    }

    #[test]
    fn honest_moves_land_and_are_owned_by_actor(
        records in arb_records(),
        actor in arb_user(),
        picks in arb_picks(),
    ) {
        let state = TriageState::from_records(records).expect("consistent");
        let proposals = build_proposals(&state, &picks);
        let next = apply(&state, &actor, &proposals).expect("apply").next;

        for (id, entry) in proposals.iter() {
            let before = state.store().state_of(id).expect("stored");
            let after = next.store().state_of(id).expect("still stored");
            match entry.target {
                Proposal::Move(target) if entry.bucket == before => {
                    prop_assert_eq!(after, target);
                    let owner = next.owner_of(id).map(|u| u.id);
                    if target == State::Unanswered {
                        prop_assert_eq!(owner, None);
                    } else {
                        prop_assert_eq!(owner, Some(actor.id));
                    }
                }
                _ => {
                    prop_assert_eq!(after, before);
                    prop_assert_eq!(
                        next.owner_of(id).map(|u| u.id),
                        state.owner_of(id).map(|u| u.id)
                    );
                }
            }
        }
    }
}
