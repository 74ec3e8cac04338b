//! Subcommand implementations. Each module exposes `XArgs` and `run_x`.

pub mod import;
pub mod init;
pub mod list;
pub mod login;
pub mod reconcile;
pub mod show;
pub mod tags;
pub mod triage;
pub mod users;

use std::collections::BTreeMap;
use std::io::{self, Write};

use chrono::{DateTime, Utc};
use qtriage_core::model::{Question, QuestionId, State, User};

use crate::output::pretty_section;

/// Unix seconds as a `YYYY-MM-DD` date, or the raw number if out of range.
pub fn format_date(secs: i64) -> String {
    DateTime::<Utc>::from_timestamp(secs, 0)
        .map_or_else(|| secs.to_string(), |ts| ts.format("%Y-%m-%d").to_string())
}

/// Epoch milliseconds as a UTC timestamp.
pub fn format_millis(ms: i64) -> String {
    DateTime::<Utc>::from_timestamp_millis(ms).map_or_else(
        || ms.to_string(),
        |ts| ts.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}

fn truncate(title: &str, width: usize) -> String {
    if title.chars().count() <= width {
        return title.to_string();
    }
    let mut short: String = title.chars().take(width.saturating_sub(3)).collect();
    short.push_str("...");
    short
}

fn heading(state: State) -> String {
    let name = state.as_str();
    let mut chars = name.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// One bucket as a pretty section: heading, blurb, one row per question.
pub fn write_bucket_pretty(
    w: &mut dyn Write,
    state: State,
    questions: &[Question],
    owners: &BTreeMap<QuestionId, User>,
) -> io::Result<()> {
    pretty_section(w, &format!("{} ({})", heading(state), questions.len()))?;
    writeln!(w, "{}", state.blurb())?;
    if questions.is_empty() {
        writeln!(w, "  (none)")?;
    }
    for question in questions {
        let owner = owners
            .get(&question.id)
            .map_or("-", |user| user.display_name.as_str());
        writeln!(
            w,
            "  {:>10}  {}  {:<16}  {}",
            question.id,
            format_date(question.creation_date),
            truncate(owner, 16),
            truncate(&question.title, 60)
        )?;
    }
    writeln!(w)
}

/// Column headers for [`write_bucket_text`].
pub const BUCKET_TEXT_HEADERS: &str = "STATE  ID  CREATED  OWNER  TITLE";

/// One bucket as text rows: `state  id  created  owner-id  title`.
pub fn write_bucket_text(
    w: &mut dyn Write,
    state: State,
    questions: &[Question],
    owners: &BTreeMap<QuestionId, User>,
) -> io::Result<()> {
    for question in questions {
        let owner = owners
            .get(&question.id)
            .map_or_else(|| "-".to_string(), |user| user.id.to_string());
        writeln!(
            w,
            "{}  {}  {}  {}  {}",
            state,
            question.id,
            format_date(question.creation_date),
            owner,
            question.title
        )?;
    }
    Ok(())
}
