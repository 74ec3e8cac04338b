use std::sync::Arc;

use qtriage_core::db::SqliteGateway;
use qtriage_core::model::{Question, QuestionId, State, User, UserId};
use qtriage_core::persist::{PersistenceGateway, QuestionFilter, Table, now_ms};
use qtriage_core::{ProposalSet, Triage};

fn open(dir: &tempfile::TempDir) -> Arc<SqliteGateway> {
    Arc::new(SqliteGateway::open(&dir.path().join("qtriage.db")).expect("open db"))
}

fn seed(gateway: &SqliteGateway) {
    gateway
        .add_questions(
            &[
                Question::new(QuestionId::new(101), "geocoder", 1000).with_tags(["maps"]),
                Question::new(QuestionId::new(102), "markers", 2000).with_tags(["maps", "js"]),
                Question::new(QuestionId::new(103), "billing", 3000),
            ],
            1,
        )
        .expect("seed");
    gateway
        .upsert_user(&User::new(UserId::new(7), "alice"), 1)
        .expect("user");
}

#[test]
fn committed_transitions_survive_reload() {
    let dir = tempfile::tempdir().expect("temp dir");
    let gateway = open(&dir);
    seed(&gateway);

    let triage = Triage::load(gateway.clone()).expect("load");
    let proposals = ProposalSet::from_form_fields([
        ("unanswered_101", "pending"),
        ("unanswered_103", "answered"),
    ])
    .proposals;
    triage
        .submit(&User::new(UserId::new(7), "alice"), &proposals)
        .expect("submit");
    triage.flush();
    assert_eq!(triage.writer_stats().map(|s| s.failed()), Some(0));
    triage.shutdown();

    let reopened = open(&dir);
    let reloaded = Triage::load(reopened).expect("reload");
    let state = reloaded.snapshot();
    assert_eq!(state.store().state_of(QuestionId::new(101)), Some(State::Pending));
    assert_eq!(state.store().state_of(QuestionId::new(103)), Some(State::Answered));
    assert_eq!(state.store().state_of(QuestionId::new(102)), Some(State::Unanswered));
    let mine = reloaded.user_view(UserId::new(7));
    assert_eq!(mine.pending.len(), 1);
    assert_eq!(mine.answered.len(), 1);
    assert_eq!(
        state.store().get(QuestionId::new(102)).map(|q| q.tags.clone()),
        Some(vec!["maps".to_string(), "js".to_string()])
    );
}

#[test]
fn own_writes_do_not_look_stale_but_foreign_writes_do() {
    let dir = tempfile::tempdir().expect("temp dir");
    let gateway = open(&dir);
    seed(&gateway);

    let triage = Triage::load(gateway.clone()).expect("load");
    let proposals = ProposalSet::new().with_move(
        QuestionId::new(102),
        State::Unanswered,
        State::Updating,
    );
    triage
        .submit(&User::new(UserId::new(7), "alice"), &proposals)
        .expect("submit");
    assert!(!triage.refresh_if_stale().expect("check"));

    // A second process adds a question behind our back.
    let other = open(&dir);
    let later = gateway.last_updated(Table::Questions).expect("time") + 1_000;
    other
        .add_questions(&[Question::new(QuestionId::new(104), "new", 4000)], later)
        .expect("foreign write");

    assert!(triage.refresh_if_stale().expect("check"));
    let state = triage.snapshot();
    assert_eq!(state.store().len(), 4);
    assert_eq!(state.store().state_of(QuestionId::new(102)), Some(State::Updating));
    assert!(!triage.refresh_if_stale().expect("check again"));
}

#[test]
fn foreign_write_before_own_commit_still_reloads() {
    let dir = tempfile::tempdir().expect("temp dir");
    let gateway = open(&dir);
    seed(&gateway);
    let triage = Triage::load(gateway.clone()).expect("load");

    // Another process writes on the real clock; our commit then stamps later.
    let other = open(&dir);
    other
        .add_questions(&[Question::new(QuestionId::new(104), "new", 4000)], now_ms())
        .expect("foreign write");
    let proposals = ProposalSet::new().with_move(
        QuestionId::new(101),
        State::Unanswered,
        State::Pending,
    );
    triage
        .submit(&User::new(UserId::new(7), "alice"), &proposals)
        .expect("submit");

    assert!(triage.refresh_if_stale().expect("check"));
    let state = triage.snapshot();
    assert!(state.store().contains(QuestionId::new(104)));
    assert_eq!(state.store().state_of(QuestionId::new(101)), Some(State::Pending));
    assert_eq!(triage.writer_stats().map(|s| s.foreign_writes()), Some(1));
    assert!(!triage.refresh_if_stale().expect("check again"));
}

#[test]
fn foreign_write_before_own_purge_still_reloads() {
    let dir = tempfile::tempdir().expect("temp dir");
    let gateway = open(&dir);
    seed(&gateway);
    let triage = Triage::load(gateway.clone()).expect("load");

    let other = open(&dir);
    other
        .add_questions(&[Question::new(QuestionId::new(104), "new", 4000)], now_ms())
        .expect("foreign write");
    assert_eq!(triage.purge(&[QuestionId::new(103)]).expect("purge"), 1);

    assert!(triage.refresh_if_stale().expect("check"));
    let state = triage.snapshot();
    assert!(state.store().contains(QuestionId::new(104)));
    assert!(!state.store().contains(QuestionId::new(103)));
}

#[test]
fn purge_removes_rows_and_memory() {
    let dir = tempfile::tempdir().expect("temp dir");
    let gateway = open(&dir);
    seed(&gateway);

    let triage = Triage::load(gateway.clone()).expect("load");
    assert_eq!(triage.purge(&[QuestionId::new(102), QuestionId::new(999)]).expect("purge"), 1);
    triage.flush();

    assert!(!gateway.question_exists(QuestionId::new(102)).expect("exists"));
    assert_eq!(gateway.load_all(&QuestionFilter::all()).expect("load").len(), 2);
    let tags = gateway.tag_counts().expect("tags");
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].count, 1);
    assert!(!triage.refresh_if_stale().expect("check"));
}

#[test]
fn inconsistent_rows_refuse_to_load() {
    let dir = tempfile::tempdir().expect("temp dir");
    let path = dir.path().join("qtriage.db");
    let gateway = Arc::new(SqliteGateway::open(&path).expect("open"));
    gateway
        .add_questions(&[Question::new(QuestionId::new(1), "q", 1)], 1)
        .expect("seed");

    // Bypass the CHECK constraint to simulate a corrupted row.
    let conn = rusqlite::Connection::open(&path).expect("raw connection");
    conn.execute_batch(
        "PRAGMA ignore_check_constraints = ON;
         UPDATE questions SET state = 'answered' WHERE question_id = 1;",
    )
    .expect("corrupt row");

    let err = Triage::load(gateway).expect_err("must not load");
    assert_eq!(err.code(), qtriage_core::ErrorCode::InvariantViolation);
}
