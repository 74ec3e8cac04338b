//! `qt import` loads a question wrapper file into the store as `unanswered`.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::persist::{PersistenceGateway, now_ms};
use qtriage_core::source::DatasetSource;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{CliError, OutputMode, fail, pretty_kv, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct ImportArgs {
    /// JSON file with an `items` array of questions.
    #[arg(value_name = "FILE")]
    pub file: PathBuf,
}

#[derive(Debug, Serialize)]
struct ImportReport {
    file: PathBuf,
    read: usize,
    added: usize,
    /// Questions already in the store. Their state and owner are untouched.
    skipped: usize,
}

/// Execute `qt import <FILE>`.
///
/// # Errors
///
/// Returns an error if the project is missing, the file cannot be parsed,
/// or the database write fails.
pub fn run_import(args: &ImportArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let dataset = DatasetSource::from_path(&args.file).map_err(|err| {
        fail(output, &CliError::from_code(err.code(), err.to_string()))
    })?;

    let _lock = project.lock(LockMode::Exclusive, output)?;
    let gateway = project.gateway(output)?;
    let added = gateway
        .add_questions(dataset.questions(), now_ms())
        .map_err(|err| {
            fail(
                output,
                &CliError::from_code(ErrorCode::PersistenceFailed, format!("{err:#}")),
            )
        })?;

    let report = ImportReport {
        file: args.file.clone(),
        read: dataset.len(),
        added,
        skipped: dataset.len() - added,
    };
    tracing::info!(read = report.read, added, "imported dataset");

    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "read {}  added {}  skipped {}", r.read, r.added, r.skipped),
        |r, w| {
            writeln!(w, "✓ Imported {}", r.file.display())?;
            pretty_kv(w, "read", r.read.to_string())?;
            pretty_kv(w, "added", r.added.to_string())?;
            pretty_kv(w, "skipped", r.skipped.to_string())
        },
    )
}
