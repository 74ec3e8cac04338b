//! `qt show` displays one stored question with its state and owner.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::model::{QuestionId, QuestionRecord};
use qtriage_core::persist::PersistenceGateway;
use std::io::Write;
use std::path::Path;

use crate::cmd::format_date;
use crate::output::{
    CliError, OutputMode, fail, pretty_kv, pretty_rule, pretty_section, render_mode,
};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct ShowArgs {
    /// Question id.
    pub id: QuestionId,
}

/// Execute `qt show <ID>`.
///
/// # Errors
///
/// Returns an error if the project is missing, the query fails, or the
/// question is not stored.
pub fn run_show(args: &ShowArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let _lock = project.lock(LockMode::Shared, output)?;
    let gateway = project.gateway(output)?;

    let record = gateway.question(args.id).map_err(|err| {
        fail(
            output,
            &CliError::from_code(ErrorCode::CorruptDatabase, format!("{err:#}")),
        )
    })?;
    let Some(record) = record else {
        return Err(fail(
            output,
            &CliError::from_code(
                ErrorCode::QuestionNotFound,
                format!("question {} not found", args.id),
            )
            .with_suggestion("use `qt list` to see stored questions"),
        ));
    };

    render_mode(output, &record, render_show_text, render_show_human)
}

fn render_show_human(record: &QuestionRecord, w: &mut dyn Write) -> std::io::Result<()> {
    let question = &record.question;
    pretty_section(w, &format!("Question {}", question.id))?;
    writeln!(w, "{}", question.title)?;
    pretty_rule(w)?;
    pretty_kv(w, "state", record.state.as_str())?;
    if let Some(owner) = &record.owner {
        pretty_kv(w, "owner", format!("{} ({})", owner.display_name, owner.id))?;
    }
    pretty_kv(w, "created", format_date(question.creation_date))?;
    if let Some(edited) = question.last_edit_date {
        pretty_kv(w, "edited", format_date(edited))?;
    }
    if !question.tags.is_empty() {
        pretty_kv(w, "tags", question.tags.join(", "))?;
    }
    if !question.link.is_empty() {
        pretty_kv(w, "link", &question.link)?;
    }

    if !question.body.is_empty() {
        writeln!(w)?;
        pretty_section(w, "Body")?;
        for line in question.body.lines() {
            writeln!(w, "{line}")?;
        }
    }
    Ok(())
}

fn render_show_text(record: &QuestionRecord, w: &mut dyn Write) -> std::io::Result<()> {
    let question = &record.question;
    writeln!(w, "id:       {}", question.id)?;
    writeln!(w, "title:    {}", question.title)?;
    writeln!(w, "state:    {}", record.state)?;
    writeln!(
        w,
        "owner:    {}",
        record
            .owner
            .as_ref()
            .map_or_else(|| "-".to_string(), |o| o.id.to_string())
    )?;
    writeln!(w, "created:  {}", format_date(question.creation_date))?;
    writeln!(w, "tags:     {}", question.tags.join(","))?;
    if !question.link.is_empty() {
        writeln!(w, "link:     {}", question.link)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use qtriage_core::model::{Question, State, User, UserId};

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: ShowArgs,
    }

    #[test]
    fn show_id_must_be_numeric() {
        assert_eq!(Wrapper::parse_from(["test", "101"]).args.id, QuestionId::new(101));
        assert!(Wrapper::try_parse_from(["test", "q-101"]).is_err());
    }

    #[test]
    fn text_render_lists_owner_id() {
        let record = QuestionRecord {
            question: Question::new(QuestionId::new(5), "Heatmap layer", 0)
                .with_tags(["maps", "heatmap"]),
            state: State::Updating,
            owner: Some(User::new(UserId::new(9), "bo")),
        };
        let mut buf = Vec::new();
        render_show_text(&record, &mut buf).expect("render");
        let text = String::from_utf8(buf).expect("utf8");
        assert!(text.contains("state:    updating\n"));
        assert!(text.contains("owner:    9\n"));
        assert!(text.contains("tags:     maps,heatmap\n"));
    }
}
