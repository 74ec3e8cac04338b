//! `qt login` registers (or refreshes) a responding user and stamps the
//! login time. A user must be registered before it can act in `qt triage`.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::model::{User, UserId};
use qtriage_core::persist::{PersistenceGateway, now_ms};
use std::path::Path;

use crate::cmd::format_millis;
use crate::output::{CliError, OutputMode, fail, pretty_kv, render_mode};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Upstream user id.
    #[arg(long, value_name = "USER_ID")]
    pub id: UserId,

    /// Name shown next to owned questions.
    #[arg(long)]
    pub name: String,

    /// Profile image URL.
    #[arg(long)]
    pub image: Option<String>,

    /// Profile page URL.
    #[arg(long)]
    pub link: Option<String>,
}

impl LoginArgs {
    fn user(&self) -> User {
        User {
            id: self.id,
            display_name: self.name.trim().to_string(),
            profile_image: self.image.clone().unwrap_or_default(),
            link: self.link.clone(),
        }
    }
}

/// Execute `qt login --id <ID> --name <NAME>`.
///
/// # Errors
///
/// Returns an error if the name is blank, the project is missing, or the
/// database write fails.
pub fn run_login(args: &LoginArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let user = args.user();
    if user.display_name.is_empty() {
        return Err(fail(output, &CliError::new("display name must not be empty")));
    }

    let project = Project::discover(project_root, output)?;
    let _lock = project.lock(LockMode::Exclusive, output)?;
    let gateway = project.gateway(output)?;

    let persist_err = |err: anyhow::Error| {
        fail(
            output,
            &CliError::from_code(ErrorCode::PersistenceFailed, format!("{err:#}")),
        )
    };
    let now = now_ms();
    gateway.upsert_user(&user, now).map_err(persist_err)?;
    gateway.record_login(user.id, now).map_err(persist_err)?;
    let stored = gateway
        .user(user.id)
        .map_err(persist_err)?
        .ok_or_else(|| anyhow::anyhow!("user {} vanished after registration", user.id))?;
    tracing::info!(user = %user.id, "user logged in");

    render_mode(
        output,
        &stored,
        |s, w| writeln!(w, "{}  {}", s.user.id, s.user.display_name),
        |s, w| {
            writeln!(w, "✓ Logged in as {} ({})", s.user.display_name, s.user.id)?;
            pretty_kv(w, "owned", s.owned.to_string())?;
            if let Some(ms) = s.last_login_ms {
                pretty_kv(w, "last login", format_millis(ms))?;
            }
            Ok(())
        },
    )
}
