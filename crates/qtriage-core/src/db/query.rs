//! Read helpers over the triage database.
//!
//! All functions take a shared `&Connection` and return typed values.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, params, params_from_iter, types::Type};
use std::collections::HashMap;
use std::fmt::Write as _;

use crate::model::{Question, QuestionId, QuestionRecord, State, User, UserId};
use crate::persist::{QuestionFilter, StoredUser, Table, TagCount};

const RECORD_COLUMNS: &str = "q.question_id, q.title, q.body, q.link, q.creation_date, \
     q.last_edit_date, q.state, q.owner_id, u.display_name, u.profile_image, u.link";

pub fn question_exists(conn: &Connection, id: QuestionId) -> Result<bool> {
    conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM questions WHERE question_id = ?1)",
        params![id.get()],
        |row| row.get(0),
    )
    .context("check question_exists")
}

/// Stored questions matching `filter`, newest first, with tags attached.
pub fn load_records(conn: &Connection, filter: &QuestionFilter) -> Result<Vec<QuestionRecord>> {
    let mut conditions: Vec<String> = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();
    let mut joins = String::new();

    if let Some(state) = filter.state {
        param_values.push(Box::new(state.as_str()));
        conditions.push(format!("q.state = ?{}", param_values.len()));
    }

    if let Some(owner) = filter.owner {
        param_values.push(Box::new(owner.get()));
        conditions.push(format!("q.owner_id = ?{}", param_values.len()));
    }

    if let Some(ref tag) = filter.tag {
        param_values.push(Box::new(tag.clone()));
        let _ = write!(
            joins,
            " INNER JOIN question_tags t ON t.question_id = q.question_id AND t.tag = ?{}",
            param_values.len()
        );
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", conditions.join(" AND "))
    };

    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM questions q \
         LEFT JOIN users u ON u.user_id = q.owner_id{joins}{where_clause} \
         ORDER BY q.creation_date DESC, q.question_id"
    );

    let mut stmt = conn
        .prepare(&sql)
        .with_context(|| format!("prepare load_records query: {sql}"))?;
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(AsRef::as_ref).collect();
    let rows = stmt
        .query_map(params_from_iter(params_ref), row_to_record)
        .context("execute load_records query")?;

    let mut records = Vec::new();
    for row in rows {
        records.push(row.context("read load_records row")?);
    }

    let mut tags = all_tags(conn)?;
    for record in &mut records {
        if let Some(list) = tags.remove(&record.question.id) {
            record.question.tags = list;
        }
    }
    Ok(records)
}

/// One stored question with its tags.
pub fn get_record(conn: &Connection, id: QuestionId) -> Result<Option<QuestionRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM questions q \
         LEFT JOIN users u ON u.user_id = q.owner_id WHERE q.question_id = ?1"
    );
    let record = conn
        .query_row(&sql, params![id.get()], row_to_record)
        .optional()
        .with_context(|| format!("get_record for {id}"))?;

    let Some(mut record) = record else {
        return Ok(None);
    };
    record.question.tags = tags_for(conn, id)?;
    Ok(Some(record))
}

/// Stored modification time of `table` in milliseconds.
pub fn last_updated(conn: &Connection, table: Table) -> Result<i64> {
    conn.query_row(
        "SELECT last_updated_ms FROM update_times WHERE table_name = ?1",
        params![table.as_str()],
        |row| row.get(0),
    )
    .optional()
    .with_context(|| format!("read update time for {table}"))
    .map(Option::unwrap_or_default)
}

const USER_COLUMNS: &str = "u.user_id, u.display_name, u.profile_image, u.link, u.last_login_ms, \
     (SELECT COUNT(*) FROM questions q WHERE q.owner_id = u.user_id)";

pub fn get_user(conn: &Connection, id: UserId) -> Result<Option<StoredUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u WHERE u.user_id = ?1");
    conn.query_row(&sql, params![id.get()], row_to_stored_user)
        .optional()
        .with_context(|| format!("get_user for {id}"))
}

/// Registered users ordered by display name.
pub fn list_users(conn: &Connection) -> Result<Vec<StoredUser>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users u ORDER BY u.display_name, u.user_id");
    let mut stmt = conn.prepare(&sql).context("prepare list_users query")?;
    let rows = stmt
        .query_map([], row_to_stored_user)
        .context("execute list_users query")?;

    let mut users = Vec::new();
    for row in rows {
        users.push(row.context("read list_users row")?);
    }
    Ok(users)
}

/// Tag inventory, most used first.
pub fn tag_counts(conn: &Connection) -> Result<Vec<TagCount>> {
    let mut stmt = conn
        .prepare(
            "SELECT tag, COUNT(*) AS cnt FROM question_tags \
             GROUP BY tag ORDER BY cnt DESC, tag ASC",
        )
        .context("prepare tag_counts query")?;
    let rows = stmt
        .query_map([], |row| {
            let count: i64 = row.get(1)?;
            Ok(TagCount {
                tag: row.get(0)?,
                count: usize::try_from(count).unwrap_or(0),
            })
        })
        .context("execute tag_counts query")?;

    let mut counts = Vec::new();
    for row in rows {
        counts.push(row.context("read tag_counts row")?);
    }
    Ok(counts)
}

fn all_tags(conn: &Connection) -> Result<HashMap<QuestionId, Vec<String>>> {
    let mut stmt = conn
        .prepare("SELECT question_id, tag FROM question_tags ORDER BY question_id, position")
        .context("prepare tag query")?;
    let rows = stmt
        .query_map([], |row| Ok((QuestionId::new(row.get(0)?), row.get::<_, String>(1)?)))
        .context("execute tag query")?;

    let mut tags: HashMap<QuestionId, Vec<String>> = HashMap::new();
    for row in rows {
        let (id, tag) = row.context("read tag row")?;
        tags.entry(id).or_default().push(tag);
    }
    Ok(tags)
}

fn tags_for(conn: &Connection, id: QuestionId) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT tag FROM question_tags WHERE question_id = ?1 ORDER BY position")
        .context("prepare tags_for query")?;
    let rows = stmt
        .query_map(params![id.get()], |row| row.get(0))
        .context("execute tags_for query")?;

    let mut tags = Vec::new();
    for row in rows {
        tags.push(row.context("read tags_for row")?);
    }
    Ok(tags)
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<QuestionRecord> {
    let state_text: String = row.get(6)?;
    let state: State = state_text.parse().map_err(|err| {
        rusqlite::Error::FromSqlConversionFailure(6, Type::Text, Box::new(err))
    })?;

    let owner_id: Option<i64> = row.get(7)?;
    let owner = match owner_id {
        Some(raw) => Some(User {
            id: UserId::new(raw),
            display_name: row.get::<_, Option<String>>(8)?.unwrap_or_default(),
            profile_image: row.get::<_, Option<String>>(9)?.unwrap_or_default(),
            link: row.get(10)?,
        }),
        None => None,
    };

    Ok(QuestionRecord {
        question: Question {
            id: QuestionId::new(row.get(0)?),
            title: row.get(1)?,
            body: row.get(2)?,
            link: row.get(3)?,
            creation_date: row.get(4)?,
            last_edit_date: row.get(5)?,
            tags: Vec::new(),
        },
        state,
        owner,
    })
}

fn row_to_stored_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<StoredUser> {
    let owned: i64 = row.get(5)?;
    Ok(StoredUser {
        user: User {
            id: UserId::new(row.get(0)?),
            display_name: row.get(1)?,
            profile_image: row.get(2)?,
            link: row.get(3)?,
        },
        last_login_ms: row.get(4)?,
        owned: usize::try_from(owned).unwrap_or(0),
    })
}
