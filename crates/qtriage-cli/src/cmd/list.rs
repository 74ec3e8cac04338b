//! `qt list` shows the four buckets, optionally narrowed by state or tag,
//! plus one user's own lists.

use anyhow::Result;
use clap::Args;
use qtriage_core::lock::LockMode;
use qtriage_core::model::{State, UserId};
use qtriage_core::store::{TriageView, UserView};
use std::io::Write;
use std::path::Path;

use crate::cmd::{BUCKET_TEXT_HEADERS, write_bucket_pretty, write_bucket_text};
use crate::output::{OutputMode, render_mode};
use crate::project::Project;

#[derive(Args, Debug, Default)]
pub struct ListArgs {
    /// Only show this bucket.
    #[arg(long)]
    pub state: Option<State>,

    /// Only show questions carrying this tag.
    #[arg(long)]
    pub tag: Option<String>,

    /// Also show this user's answered, pending, and updating lists.
    #[arg(long, value_name = "USER_ID")]
    pub user: Option<UserId>,
}

/// Narrow a full view to what `args` asks for.
pub fn select(mut view: TriageView, mut user: Option<UserView>, args: &ListArgs) -> TriageView {
    if let Some(tag) = &args.tag
        && let Some(user) = user.as_mut()
    {
        for list in [&mut user.answered, &mut user.pending, &mut user.updating] {
            list.retain(|q| q.has_tag(tag));
        }
    }

    if let Some(only) = args.state {
        for state in State::ALL.into_iter().filter(|s| *s != only) {
            match state {
                State::Unanswered => view.unanswered.clear(),
                State::Answered => view.answered.clear(),
                State::Pending => view.pending.clear(),
                State::Updating => view.updating.clear(),
            }
        }
        let kept: Vec<_> = view.bucket(only).iter().map(|q| q.id).collect();
        view.owners.retain(|id, _| kept.contains(id));
    }

    view.user = user;
    view
}

fn shown_states(args: &ListArgs) -> Vec<State> {
    args.state.map_or_else(|| State::ALL.to_vec(), |only| vec![only])
}

/// Write every shown bucket, then the user's lists, as pretty sections.
pub fn write_view_pretty(
    w: &mut dyn Write,
    view: &TriageView,
    states: &[State],
) -> std::io::Result<()> {
    for state in states {
        write_bucket_pretty(w, *state, view.bucket(*state), &view.owners)?;
    }
    if let Some(user) = &view.user {
        writeln!(w, "User {} ({} owned)", user.user_id, user.len())?;
        writeln!(w)?;
        for state in State::OWNED {
            write_bucket_pretty(w, state, user.bucket(state), &view.owners)?;
        }
    }
    Ok(())
}

/// Write every shown bucket as text rows under one header.
pub fn write_view_text(
    w: &mut dyn Write,
    view: &TriageView,
    states: &[State],
) -> std::io::Result<()> {
    writeln!(w, "{BUCKET_TEXT_HEADERS}")?;
    for state in states {
        write_bucket_text(w, *state, view.bucket(*state), &view.owners)?;
    }
    if let Some(user) = &view.user {
        writeln!(w, "# user {}", user.user_id)?;
        for state in State::OWNED {
            write_bucket_text(w, state, user.bucket(state), &view.owners)?;
        }
    }
    Ok(())
}

/// Execute `qt list`.
///
/// # Errors
///
/// Returns an error if the project is missing or the store cannot be loaded.
pub fn run_list(args: &ListArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let lock = project.lock(LockMode::Shared, output)?;
    let gateway = project.gateway(output)?;
    let triage = project.load_triage(&gateway, output)?;
    lock.release();

    let view = match &args.tag {
        Some(tag) => triage.tag_view(tag),
        None => triage.view(None),
    };
    let user = args.user.map(|id| triage.user_view(id));
    triage.shutdown();

    let view = select(view, user, args);
    let states = shown_states(args);
    render_mode(
        output,
        &view,
        |v, w| write_view_text(w, v, &states),
        |v, w| write_view_pretty(w, v, &states),
    )
}
