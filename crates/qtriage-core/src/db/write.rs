//! Write helpers over the triage database.
//!
//! Every write that changes `questions` or `users` stamps the matching
//! `update_times` row. Stamps only move forward, so a slower writer cannot
//! hide a newer change from staleness checks.

use anyhow::{Context, Result, bail};
use rusqlite::{Connection, params};

use crate::engine::Change;
use crate::model::{Question, QuestionId, User, UserId};
use crate::persist::Table;

/// Insert questions as `unanswered`, skipping ids already stored.
///
/// Runs in one transaction. Returns how many rows were inserted.
pub fn insert_questions(
    conn: &mut Connection,
    questions: &[Question],
    timestamp_ms: i64,
) -> Result<usize> {
    let tx = conn.transaction().context("begin insert_questions")?;
    let mut inserted = 0;
    {
        let mut insert = tx
            .prepare(
                "INSERT OR IGNORE INTO questions \
                 (question_id, title, body, link, creation_date, last_edit_date, state, owner_id) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, 'unanswered', NULL)",
            )
            .context("prepare question insert")?;
        let mut insert_tag = tx
            .prepare(
                "INSERT OR IGNORE INTO question_tags (question_id, position, tag) \
                 VALUES (?1, ?2, ?3)",
            )
            .context("prepare tag insert")?;

        for question in questions {
            let rows = insert
                .execute(params![
                    question.id.get(),
                    question.title,
                    question.body,
                    question.link,
                    question.creation_date,
                    question.last_edit_date,
                ])
                .with_context(|| format!("insert question {}", question.id))?;
            if rows == 0 {
                tracing::debug!(question_id = %question.id, "question already stored; skipped");
                continue;
            }
            inserted += 1;

            for (position, tag) in question.tags.iter().enumerate() {
                let position = i64::try_from(position).unwrap_or(i64::MAX);
                insert_tag
                    .execute(params![question.id.get(), position, tag])
                    .with_context(|| format!("insert tag '{tag}' for question {}", question.id))?;
            }
        }
    }
    if inserted > 0 {
        touch(&tx, Table::Questions, timestamp_ms)?;
    }
    tx.commit().context("commit insert_questions")?;
    Ok(inserted)
}

/// Write the outcome of one committed transition.
///
/// The actor is registered first if missing so the owner reference holds.
/// Changes for questions no longer stored are skipped.
pub fn apply_changes(
    conn: &mut Connection,
    changes: &[Change],
    actor: &User,
    timestamp_ms: i64,
) -> Result<()> {
    let tx = conn.transaction().context("begin apply_changes")?;
    tx.execute(
        "INSERT OR IGNORE INTO users (user_id, display_name, profile_image, link) \
         VALUES (?1, ?2, ?3, ?4)",
        params![actor.id.get(), actor.display_name, actor.profile_image, actor.link],
    )
    .with_context(|| format!("register actor {}", actor.id))?;

    {
        let mut update = tx
            .prepare("UPDATE questions SET state = ?2, owner_id = ?3 WHERE question_id = ?1")
            .context("prepare state update")?;
        for change in changes {
            let rows = update
                .execute(params![
                    change.question_id.get(),
                    change.to.as_str(),
                    change.owner.map(UserId::get),
                ])
                .with_context(|| format!("update question {}", change.question_id))?;
            if rows == 0 {
                tracing::debug!(
                    question_id = %change.question_id,
                    "question no longer stored; change skipped"
                );
            }
        }
    }

    touch(&tx, Table::Questions, timestamp_ms)?;
    tx.commit().context("commit apply_changes")
}

/// Delete questions (tags cascade). Returns how many were deleted.
pub fn delete_questions(
    conn: &mut Connection,
    ids: &[QuestionId],
    timestamp_ms: i64,
) -> Result<usize> {
    let tx = conn.transaction().context("begin delete_questions")?;
    let mut deleted = 0;
    {
        let mut delete = tx
            .prepare("DELETE FROM questions WHERE question_id = ?1")
            .context("prepare question delete")?;
        for id in ids {
            deleted += delete
                .execute(params![id.get()])
                .with_context(|| format!("delete question {id}"))?;
        }
    }
    if deleted > 0 {
        touch(&tx, Table::Questions, timestamp_ms)?;
    }
    tx.commit().context("commit delete_questions")?;
    Ok(deleted)
}

/// Insert a user or refresh its profile columns.
pub fn upsert_user(conn: &Connection, user: &User, timestamp_ms: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO users (user_id, display_name, profile_image, link) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT(user_id) DO UPDATE SET \
           display_name = excluded.display_name, \
           profile_image = excluded.profile_image, \
           link = excluded.link",
        params![user.id.get(), user.display_name, user.profile_image, user.link],
    )
    .with_context(|| format!("upsert user {}", user.id))?;
    touch(conn, Table::Users, timestamp_ms)
}

pub fn record_login(conn: &Connection, id: UserId, timestamp_ms: i64) -> Result<()> {
    let rows = conn
        .execute(
            "UPDATE users SET last_login_ms = ?2 WHERE user_id = ?1",
            params![id.get(), timestamp_ms],
        )
        .with_context(|| format!("record login for {id}"))?;
    if rows == 0 {
        bail!("user {id} is not registered");
    }
    touch(conn, Table::Users, timestamp_ms)
}

/// Move `table`'s update time forward to `timestamp_ms`.
pub fn touch(conn: &Connection, table: Table, timestamp_ms: i64) -> Result<()> {
    conn.execute(
        "INSERT INTO update_times (table_name, last_updated_ms) VALUES (?1, ?2) \
         ON CONFLICT(table_name) DO UPDATE SET \
           last_updated_ms = MAX(last_updated_ms, excluded.last_updated_ms)",
        params![table.as_str(), timestamp_ms],
    )
    .with_context(|| format!("stamp update time for {table}"))?;
    Ok(())
}
