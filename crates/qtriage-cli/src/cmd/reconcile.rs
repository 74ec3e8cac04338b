//! `qt reconcile` drops stored questions that no longer exist upstream.
//!
//! The upstream is a dataset file (the freshest export), given with
//! `--source` or as `reconcile.dataset` in the project config.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::model::QuestionId;
use qtriage_core::source::{DatasetSource, find_deleted};
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{CliError, OutputMode, fail, pretty_kv, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct ReconcileArgs {
    /// Dataset to check against. Defaults to `reconcile.dataset`.
    #[arg(long, value_name = "FILE")]
    pub source: Option<PathBuf>,

    /// Report what would be removed without removing it.
    #[arg(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct ReconcileReport {
    source: PathBuf,
    checked: usize,
    deleted: Vec<QuestionId>,
    purged: usize,
    dry_run: bool,
}

/// Execute `qt reconcile`.
///
/// # Errors
///
/// Returns an error if no source is configured, the source cannot be read,
/// or the purge fails.
pub fn run_reconcile(args: &ReconcileArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let source_path = match (&args.source, &project.config.reconcile.dataset) {
        (Some(path), _) => path.clone(),
        (None, Some(path)) => project.resolve(path),
        (None, None) => {
            return Err(fail(
                output,
                &CliError::new("no upstream source to reconcile against").with_suggestion(
                    "pass --source <FILE> or set reconcile.dataset in .qtriage/config.toml",
                ),
            ));
        }
    };
    let source = DatasetSource::from_path(&source_path).map_err(|err| {
        fail(output, &CliError::from_code(err.code(), err.to_string()))
    })?;

    let _lock = project.lock(LockMode::Exclusive, output)?;
    let gateway = project.gateway(output)?;
    let triage = project.load_triage(&gateway, output)?;

    let ids = triage.snapshot().store().ids();
    let deleted = find_deleted(&source, &ids, project.config.reconcile.batch_size).map_err(|err| {
        fail(
            output,
            &CliError::from_code(ErrorCode::InternalUnexpected, format!("{err:#}")),
        )
    })?;

    let purged = if args.dry_run {
        0
    } else {
        triage
            .purge(&deleted)
            .map_err(|err| fail(output, &CliError::from(&err)))?
    };
    triage.flush();
    let failed = triage.writer_stats().map_or(0, |stats| stats.failed());
    triage.shutdown();
    if failed > 0 {
        return Err(fail(
            output,
            &CliError::from_code(
                ErrorCode::PersistenceFailed,
                format!("{purged} question(s) purged in memory but the write failed"),
            ),
        ));
    }

    let report = ReconcileReport {
        source: source_path,
        checked: ids.len(),
        deleted,
        purged,
        dry_run: args.dry_run,
    };
    render_mode(
        output,
        &report,
        |r, w| {
            for id in &r.deleted {
                writeln!(w, "{id}")?;
            }
            Ok(())
        },
        |r, w| {
            if r.dry_run {
                writeln!(w, "Dry run: {} question(s) would be removed", r.deleted.len())?;
            } else {
                writeln!(w, "✓ Removed {} question(s) deleted upstream", r.purged)?;
            }
            pretty_kv(w, "source", r.source.display().to_string())?;
            pretty_kv(w, "checked", r.checked.to_string())?;
            if !r.deleted.is_empty() {
                let ids: Vec<String> = r.deleted.iter().map(ToString::to_string).collect();
                pretty_kv(w, "deleted", ids.join(", "))?;
            }
            Ok(())
        },
    )
}
