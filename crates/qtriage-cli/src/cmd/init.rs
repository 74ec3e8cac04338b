use anyhow::{Context as _, Result};
use clap::Args;
use qtriage_core::config::{self, PROJECT_DIR, ProjectConfig};
use qtriage_core::db::SqliteGateway;
use serde::Serialize;
use std::path::{Path, PathBuf};

use crate::output::{OutputMode, pretty_kv, render_mode};

#[derive(Args, Debug)]
pub struct InitArgs {
    /// Rewrite `.qtriage/config.toml` with defaults even if the project
    /// exists. The database is kept.
    #[arg(long)]
    pub force: bool,
}

const GITIGNORE: &str = "qtriage.db\nqtriage.db-wal\nqtriage.db-shm\nlock\n";

#[derive(Debug, Serialize)]
struct InitReport {
    ok: bool,
    project_dir: PathBuf,
    config: PathBuf,
    database: PathBuf,
    wrote_config: bool,
}

/// Execute `qt init`. Creates the project skeleton:
///
/// ```text
/// .qtriage/
///   config.toml   (default project config)
///   qtriage.db    (migrated, empty)
///   .gitignore    (database files and the lock)
/// ```
///
/// # Errors
///
/// Returns an error if `.qtriage/` already exists and `--force` is not set,
/// or if any filesystem or database operation fails.
pub fn run_init(args: &InitArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let dir = project_root.join(PROJECT_DIR);
    if dir.exists() && !args.force {
        anyhow::bail!(".qtriage/ already exists. Use `qt init --force` to reset the config.");
    }

    let config_path = dir.join("config.toml");
    if args.force && config_path.exists() {
        std::fs::remove_file(&config_path)
            .with_context(|| format!("Failed to remove {}", config_path.display()))?;
    }
    let wrote_config = config::write_default_project_config(project_root)?;

    let gitignore_path = dir.join(".gitignore");
    std::fs::write(&gitignore_path, GITIGNORE)
        .with_context(|| format!("Failed to write {}", gitignore_path.display()))?;

    let database = ProjectConfig::default().database_path(project_root);
    SqliteGateway::open(&database)?;
    tracing::info!(path = %dir.display(), "initialized project");

    let report = InitReport {
        ok: true,
        project_dir: dir,
        config: config_path,
        database,
        wrote_config,
    };
    render_mode(
        output,
        &report,
        |r, w| writeln!(w, "initialized {}", r.project_dir.display()),
        |r, w| {
            writeln!(w, "✓ Initialized {}", r.project_dir.display())?;
            writeln!(w)?;
            pretty_kv(w, "config", r.config.display().to_string())?;
            pretty_kv(w, "database", r.database.display().to_string())?;
            writeln!(w)?;
            writeln!(w, "Next steps:")?;
            writeln!(w, "  qt import questions.json")?;
            writeln!(w, "  qt login --id <USER_ID> --name <NAME>")?;
            writeln!(w, "  qt list")
        },
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Wrapper {
        #[command(flatten)]
        args: InitArgs,
    }

    #[test]
    fn init_args_default_no_force() {
        let w = Wrapper::parse_from(["test"]);
        assert!(!w.args.force);
        assert!(Wrapper::parse_from(["test", "--force"]).args.force);
    }

    #[test]
    fn init_creates_skeleton_and_refuses_rerun() {
        let dir = tempfile::tempdir().expect("temp dir");
        run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).expect("init");

        let project = dir.path().join(PROJECT_DIR);
        assert!(project.join("config.toml").is_file());
        assert!(project.join("qtriage.db").is_file());
        assert!(project.join(".gitignore").is_file());

        assert!(run_init(&InitArgs { force: false }, OutputMode::Json, dir.path()).is_err());
        run_init(&InitArgs { force: true }, OutputMode::Json, dir.path()).expect("force init");
    }
}
