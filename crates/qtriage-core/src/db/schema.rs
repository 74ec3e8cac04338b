//! SQLite schema for the persisted triage store.
//!
//! - `questions` holds one row per question with its triage state and owner
//! - `question_tags` keeps tags in upstream order
//! - `users` holds registered responders
//! - `update_times` records when `questions` and `users` last changed, in
//!   milliseconds, for staleness checks

/// Migration v1: core tables plus update-time bookkeeping.
pub const MIGRATION_V1_SQL: &str = r"
CREATE TABLE IF NOT EXISTS users (
    user_id INTEGER PRIMARY KEY,
    display_name TEXT NOT NULL,
    profile_image TEXT NOT NULL DEFAULT '',
    link TEXT,
    last_login_ms INTEGER
);

CREATE TABLE IF NOT EXISTS questions (
    question_id INTEGER PRIMARY KEY,
    title TEXT NOT NULL,
    body TEXT NOT NULL DEFAULT '',
    link TEXT NOT NULL DEFAULT '',
    creation_date INTEGER NOT NULL,
    last_edit_date INTEGER,
    state TEXT NOT NULL DEFAULT 'unanswered'
        CHECK (state IN ('unanswered', 'answered', 'pending', 'updating')),
    owner_id INTEGER REFERENCES users(user_id) ON DELETE RESTRICT,
    CHECK ((state = 'unanswered') = (owner_id IS NULL))
);

CREATE TABLE IF NOT EXISTS question_tags (
    question_id INTEGER NOT NULL REFERENCES questions(question_id) ON DELETE CASCADE,
    position INTEGER NOT NULL,
    tag TEXT NOT NULL CHECK (length(trim(tag)) > 0),
    PRIMARY KEY (question_id, tag)
);

CREATE TABLE IF NOT EXISTS update_times (
    table_name TEXT PRIMARY KEY,
    last_updated_ms INTEGER NOT NULL DEFAULT 0
);

INSERT OR IGNORE INTO update_times (table_name, last_updated_ms)
VALUES ('questions', 0), ('users', 0);
";

/// Migration v2: read-path indexes for filtered loads and inventories.
pub const MIGRATION_V2_SQL: &str = r"
CREATE INDEX IF NOT EXISTS idx_questions_state_created
    ON questions(state, creation_date DESC);

CREATE INDEX IF NOT EXISTS idx_questions_owner
    ON questions(owner_id, state);

CREATE INDEX IF NOT EXISTS idx_question_tags_tag
    ON question_tags(tag, question_id);
";

/// Indexes expected after all migrations have run.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_questions_state_created",
    "idx_questions_owner",
    "idx_question_tags_tag",
];
