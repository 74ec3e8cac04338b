use std::sync::{Arc, Barrier};
use std::thread;

use qtriage_core::model::{Question, QuestionId, State, User, UserId};
use qtriage_core::store::TriageState;
use qtriage_core::{ProposalSet, Triage};

fn user(id: i64) -> User {
    User::new(UserId::new(id), format!("user{id}"))
}

fn seeded(n: i64) -> Triage {
    Triage::new(
        TriageState::from_unanswered(
            (1..=n).map(|id| Question::new(QuestionId::new(id), format!("q{id}"), id % 7)),
        )
        .expect("valid"),
    )
}

#[test]
fn concurrent_claims_give_each_question_one_owner() {
    const WRITERS: i64 = 8;
    let triage = Arc::new(seeded(40));
    let barrier = Arc::new(Barrier::new(usize::try_from(WRITERS).expect("small")));

    let handles: Vec<_> = (1..=WRITERS)
        .map(|writer| {
            let triage = Arc::clone(&triage);
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                // Everyone races for every question, proposing from whatever
                // bucket they last saw.
                for round in 0..5 {
                    let snapshot = triage.snapshot();
                    let mut proposals = ProposalSet::new();
                    for id in snapshot.store().ids() {
                        let bucket = snapshot.store().state_of(id).expect("stored");
                        let slot = usize::try_from((writer + round) % 3).expect("small");
                        let target = State::OWNED[slot];
                        proposals = proposals.with_move(id, bucket, target);
                    }
                    triage.submit(&user(writer), &proposals).expect("submit");
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("writer thread");
    }

    let state = triage.snapshot();
    state.verify().expect("final state is consistent");
    assert_eq!(state.store().len(), 40);
    assert!(state.store().bucket(State::Unanswered).is_empty());

    let owned_total: usize = (1..=WRITERS)
        .map(|writer| triage.user_view(UserId::new(writer)).len())
        .sum();
    assert_eq!(owned_total, 40);
}

#[test]
fn readers_never_observe_torn_snapshots() {
    let triage = Arc::new(seeded(30));
    let stop = Arc::new(std::sync::atomic::AtomicBool::new(false));

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let triage = Arc::clone(&triage);
            let stop = Arc::clone(&stop);
            thread::spawn(move || {
                let mut observed = 0_u64;
                while !stop.load(std::sync::atomic::Ordering::Relaxed) {
                    let snapshot = triage.snapshot();
                    snapshot.verify().expect("published snapshot is consistent");
                    assert_eq!(snapshot.store().len(), 30);
                    observed += 1;
                }
                observed
            })
        })
        .collect();

    // Shuttle every question between unanswered and pending.
    for round in 0..50 {
        let snapshot = triage.snapshot();
        let (from, to) = if round % 2 == 0 {
            (State::Unanswered, State::Pending)
        } else {
            (State::Pending, State::Unanswered)
        };
        let mut proposals = ProposalSet::new();
        for question in snapshot.store().bucket(from) {
            proposals = proposals.with_move(question.id, from, to);
        }
        triage.submit(&user(round % 3 + 1), &proposals).expect("submit");
    }
    stop.store(true, std::sync::atomic::Ordering::Relaxed);

    for reader in readers {
        assert!(reader.join().expect("reader thread") > 0);
    }
}

#[test]
fn transitions_are_totally_ordered() {
    // Two writers each flip the same question; whichever commits second
    // sees the first's result, so the final owner is the last committer.
    let triage = Arc::new(seeded(1));
    let id = QuestionId::new(1);

    for round in 0..20_i64 {
        let handles: Vec<_> = [1_i64, 2]
            .into_iter()
            .map(|writer| {
                let triage = Arc::clone(&triage);
                thread::spawn(move || {
                    let bucket = triage.snapshot().store().state_of(id).expect("stored");
                    let proposals = ProposalSet::new().with_move(id, bucket, State::Answered);
                    triage.submit(&user(writer + round * 10), &proposals).expect("submit")
                })
            })
            .collect();

        let commits: Vec<_> = handles
            .into_iter()
            .map(|h| h.join().expect("writer thread"))
            .collect();
        let state = triage.snapshot();
        state.verify().expect("consistent");
        let owner = state.owner_of(id).map(|u| u.id).expect("owned");
        assert!(commits.iter().any(|c| c.snapshot.owner_of(id).map(|u| u.id) == Some(owner)));
    }
}
