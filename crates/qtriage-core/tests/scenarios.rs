use qtriage_core::model::{Proposal, Question, QuestionId, QuestionRecord, State, User, UserId};
use qtriage_core::store::TriageState;
use qtriage_core::{ProposalSet, Triage};

const Q: QuestionId = QuestionId::new(101);

fn user(id: i64) -> User {
    User::new(UserId::new(id), format!("user{id}"))
}

fn question(id: i64, created: i64) -> Question {
    Question::new(QuestionId::new(id), format!("question {id}"), created)
}

fn owned(state: State, owner: i64) -> Triage {
    Triage::new(
        TriageState::from_records([QuestionRecord {
            question: question(101, 1000),
            state,
            owner: Some(user(owner)),
        }])
        .expect("valid"),
    )
}

fn ids(questions: &[Question]) -> Vec<i64> {
    questions.iter().map(|q| q.id.get()).collect()
}

#[test]
fn scenario_a_claiming_an_unanswered_question() {
    let triage = Triage::new(TriageState::from_unanswered([question(101, 1000)]).expect("valid"));
    let parse = ProposalSet::from_form_fields([("unanswered_101", "pending")]);
    assert!(parse.rejected.is_empty());

    triage.submit(&user(7), &parse.proposals).expect("submit");
    let state = triage.snapshot();

    assert_eq!(ids(state.store().bucket(State::Pending)), vec![101]);
    assert!(state.store().bucket(State::Unanswered).is_empty());
    assert_eq!(state.owner_of(Q).map(|u| u.id), Some(UserId::new(7)));
    assert_eq!(ids(&triage.user_view(UserId::new(7)).pending), vec![101]);
}

#[test]
fn scenario_b_another_user_takes_over() {
    let triage = owned(State::Pending, 7);
    let parse = ProposalSet::from_form_fields([("pending_101", "answered")]);

    triage.submit(&user(9), &parse.proposals).expect("submit");
    let state = triage.snapshot();

    assert_eq!(ids(state.store().bucket(State::Answered)), vec![101]);
    assert!(triage.user_view(UserId::new(7)).pending.is_empty());
    assert_eq!(ids(&triage.user_view(UserId::new(9)).answered), vec![101]);
    assert_eq!(state.owner_of(Q).map(|u| u.id), Some(UserId::new(9)));
}

#[test]
fn scenario_c_release_back_to_unanswered() {
    for actor in [9, 3] {
        let triage = owned(State::Answered, 9);
        let parse = ProposalSet::from_form_fields([("answered_101", "unanswered")]);

        triage.submit(&user(actor), &parse.proposals).expect("submit");
        let state = triage.snapshot();

        assert_eq!(ids(state.store().bucket(State::Unanswered)), vec![101]);
        assert!(state.owner_of(Q).is_none());
        assert!(triage.user_view(UserId::new(9)).is_empty());
        assert!(triage.user_view(UserId::new(actor)).is_empty());
    }
}

#[test]
fn scenario_d_ties_keep_submission_order() {
    let triage = Triage::new(
        TriageState::from_unanswered([question(5, 500), question(8, 500), question(2, 900)])
            .expect("valid"),
    );
    let parse = ProposalSet::from_form_fields([
        ("unanswered_5", "updating"),
        ("unanswered_8", "updating"),
    ]);

    triage.submit(&user(1), &parse.proposals).expect("submit");
    let state = triage.snapshot();

    assert_eq!(ids(state.store().bucket(State::Updating)), vec![5, 8]);
    assert_eq!(ids(&triage.user_view(UserId::new(1)).updating), vec![5, 8]);
    assert_eq!(ids(state.store().bucket(State::Unanswered)), vec![2]);
}

#[test]
fn missing_and_unrecognised_proposals_stay_put() {
    let triage = owned(State::Pending, 7);
    let before = triage.snapshot();

    // Default-constructed entry, unknown label, and no entry at all.
    let mut defaulted = ProposalSet::new();
    defaulted.insert(Q, State::Pending, Proposal::default());
    let garbage = ProposalSet::from_form_fields([("pending_101", "reopen")]).proposals;

    for proposals in [defaulted, garbage, ProposalSet::new()] {
        let committed = triage.submit(&user(9), &proposals).expect("submit");
        assert!(committed.changes.is_empty());
        let state = triage.snapshot();
        assert_eq!(state.store().state_of(Q), Some(State::Pending));
        assert_eq!(state.owner_of(Q).map(|u| u.id), Some(UserId::new(7)));
    }
    assert_eq!(triage.snapshot().store(), before.store());
}

#[test]
fn stale_bucket_in_form_is_reported() {
    let triage = owned(State::Pending, 7);
    let parse = ProposalSet::from_form_fields([("unanswered_101", "answered")]);
    let committed = triage.submit(&user(9), &parse.proposals).expect("submit");
    assert_eq!(committed.stale, vec![Q]);
    assert_eq!(triage.snapshot().store().state_of(Q), Some(State::Pending));
}

#[test]
fn mixed_batch_is_atomic_in_one_snapshot() {
    let triage = Triage::new(
        TriageState::from_unanswered([question(1, 10), question(2, 20), question(3, 30)])
            .expect("valid"),
    );
    let parse = ProposalSet::from_form_fields([
        ("unanswered_1", "answered"),
        ("unanswered_2", "pending"),
        ("unanswered_3", "no_change"),
    ]);
    let committed = triage.submit(&user(4), &parse.proposals).expect("submit");

    assert_eq!(committed.changes.len(), 2);
    let view = committed.snapshot.view(Some(UserId::new(4)));
    assert_eq!(ids(&view.answered), vec![1]);
    assert_eq!(ids(&view.pending), vec![2]);
    assert_eq!(ids(&view.unanswered), vec![3]);
    assert_eq!(view.owners.len(), 2);
    let mine = view.user.expect("user lists requested");
    assert_eq!(mine.len(), 2);
}
