//! `qt triage` submits one batch of proposals as the acting user.
//!
//! Each argument is a form field `<bucket>_<question id>=<label>`, where
//! `<bucket>` is where the caller saw the question and `<label>` is one of
//! the four states or `no_change`. The batch is applied atomically; fields
//! that do not parse leave their question where it is.

use anyhow::Result;
use clap::Args;
use qtriage_core::engine::Change;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::model::{QuestionId, State, User, UserId};
use qtriage_core::persist::PersistenceGateway;
use qtriage_core::proposal::{RejectReason, RejectedField, split_assignment};
use qtriage_core::store::TriageView;
use qtriage_core::ProposalSet;
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use crate::cmd::list::{write_view_pretty, write_view_text};
use crate::output::{CliError, OutputMode, fail, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct TriageArgs {
    /// Proposals as `<bucket>_<id>=<label>`, e.g. `unanswered_101=pending`.
    #[arg(value_name = "BUCKET_ID=LABEL")]
    pub fields: Vec<String>,
}

/// A proposal whose bucket no longer matched the question.
#[derive(Debug, Serialize)]
struct StaleProposal {
    question_id: QuestionId,
    /// Where the question actually was when the batch ran.
    current: Option<State>,
}

#[derive(Debug, Serialize)]
struct TriageReport {
    actor: User,
    changes: Vec<Change>,
    stale: Vec<StaleProposal>,
    rejected: Vec<RejectedField>,
    /// Another writer changed the store and the view below was reloaded.
    reloaded: bool,
    view: TriageView,
}

/// Turn raw arguments into a proposal set plus the fields that were dropped.
pub fn parse_fields(fields: &[String]) -> (ProposalSet, Vec<RejectedField>) {
    let mut pairs = Vec::with_capacity(fields.len());
    let mut rejected = Vec::new();
    for field in fields {
        match split_assignment(field) {
            Ok(pair) => pairs.push(pair),
            Err(name) => {
                tracing::warn!(field = name, "argument is not name=value; ignored");
                rejected.push(RejectedField {
                    name: name.to_string(),
                    value: String::new(),
                    reason: RejectReason::MalformedName,
                });
            }
        }
    }

    let parse = ProposalSet::from_form_fields(pairs);
    rejected.extend(parse.rejected);
    (parse.proposals, rejected)
}

/// Execute `qt triage [--as <USER_ID>] <BUCKET_ID=LABEL>...`.
///
/// # Errors
///
/// Returns an error if no registered acting user is known, the store cannot
/// be loaded, the transition is rejected, or persisting it fails.
pub fn run_triage(
    args: &TriageArgs,
    actor: Option<UserId>,
    output: OutputMode,
    project_root: &Path,
) -> Result<()> {
    let Some(actor_id) = actor else {
        return Err(fail(
            output,
            &CliError::from_code(ErrorCode::UnknownUser, "no acting user").with_suggestion(
                "pass --as <USER_ID>, set QTRIAGE_USER, or set default_user in the user config",
            ),
        ));
    };

    let project = Project::discover(project_root, output)?;
    let _lock = project.lock(LockMode::Exclusive, output)?;
    let gateway = project.gateway(output)?;

    let stored = gateway.user(actor_id).map_err(|err| {
        fail(
            output,
            &CliError::from_code(ErrorCode::CorruptDatabase, format!("{err:#}")),
        )
    })?;
    let Some(stored) = stored else {
        return Err(fail(
            output,
            &CliError::from_code(
                ErrorCode::UnknownUser,
                format!("user {actor_id} is not registered"),
            ),
        ));
    };
    let actor = stored.user;

    let (proposals, rejected) = parse_fields(&args.fields);
    let triage = project.load_triage(&gateway, output)?;
    let committed = triage
        .submit(&actor, &proposals)
        .map_err(|err| fail(output, &CliError::from(&err)))?;

    triage.flush();
    if let Some(stats) = triage.writer_stats()
        && stats.failed() > 0
    {
        return Err(fail(
            output,
            &CliError::from_code(
                ErrorCode::PersistenceFailed,
                format!(
                    "{} change(s) applied in memory but {} write(s) failed",
                    committed.changes.len(),
                    stats.failed()
                ),
            ),
        ));
    }

    let reloaded = if project.config.refresh.check_staleness {
        triage
            .refresh_if_stale()
            .map_err(|err| fail(output, &CliError::from(&err)))?
    } else {
        false
    };
    if reloaded {
        tracing::info!("store changed outside this process; showing reloaded view");
    }

    let stale = committed
        .stale
        .iter()
        .map(|&question_id| StaleProposal {
            question_id,
            current: committed.snapshot.store().state_of(question_id),
        })
        .collect();
    let report = TriageReport {
        view: triage.view(Some(actor.id)),
        actor,
        changes: committed.changes,
        stale,
        rejected,
        reloaded,
    };
    triage.shutdown();

    render_mode(
        output,
        &report,
        |r, w| {
            write_outcome(w, r)?;
            write_view_text(w, &r.view, &State::ALL)
        },
        |r, w| {
            write_outcome(w, r)?;
            writeln!(w)?;
            write_view_pretty(w, &r.view, &State::ALL)
        },
    )
}

fn write_outcome(w: &mut dyn Write, report: &TriageReport) -> std::io::Result<()> {
    if report.changes.is_empty() {
        writeln!(w, "No changes applied")?;
    } else {
        writeln!(
            w,
            "✓ Applied {} change(s) as {}",
            report.changes.len(),
            report.actor.display_name
        )?;
    }
    for change in &report.changes {
        writeln!(w, "  {:>10}  {} -> {}", change.question_id, change.from, change.to)?;
    }
    for stale in &report.stale {
        let current = stale.current.map_or("gone", State::as_str);
        writeln!(
            w,
            "  ! {} moved before this batch; left in {current}",
            stale.question_id
        )?;
    }
    for field in &report.rejected {
        writeln!(
            w,
            "  ! ignored {}={} ({:?})",
            field.name, field.value, field.reason
        )?;
    }
    Ok(())
}
