//! `qt tags` lists every tag with the number of stored questions carrying it.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::persist::{PersistenceGateway, TagCount};
use std::io::{self, Write};
use std::path::Path;

use crate::output::{CliError, OutputMode, Renderable, fail, render_list};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct TagsArgs {
    /// Hide tags used by fewer than this many questions.
    #[arg(long, default_value_t = 1)]
    pub min_count: usize,
}

impl Renderable for TagCount {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{:>6}  {}", self.count, self.tag)
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(w, "{}  {}", self.tag, self.count)
    }

    fn table_headers() -> &'static [&'static str] {
        &["TAG", "COUNT"]
    }
}

/// Execute `qt tags`.
///
/// # Errors
///
/// Returns an error if the project is missing or the query fails.
pub fn run_tags(args: &TagsArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let _lock = project.lock(LockMode::Shared, output)?;
    let gateway = project.gateway(output)?;

    let mut tags = gateway.tag_counts().map_err(|err| {
        fail(
            output,
            &CliError::from_code(ErrorCode::CorruptDatabase, format!("{err:#}")),
        )
    })?;
    tags.retain(|t| t.count >= args.min_count);

    render_list(&tags, output)?;
    Ok(())
}
