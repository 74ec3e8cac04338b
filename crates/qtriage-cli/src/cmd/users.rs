//! `qt users` lists registered users with how many questions each owns.

use anyhow::Result;
use clap::Args;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::LockMode;
use qtriage_core::persist::{PersistenceGateway, StoredUser};
use std::io::{self, Write};
use std::path::Path;

use crate::cmd::format_millis;
use crate::output::{CliError, OutputMode, Renderable, fail, render_list};
use crate::project::Project;

#[derive(Args, Debug)]
pub struct UsersArgs {}

impl Renderable for StoredUser {
    fn render_human(&self, w: &mut dyn Write) -> io::Result<()> {
        let last = self
            .last_login_ms
            .map_or_else(|| "never".to_string(), format_millis);
        writeln!(
            w,
            "{:>10}  {:<24}  {:>4} owned  last login {last}",
            self.user.id, self.user.display_name, self.owned
        )
    }

    fn render_json(&self, w: &mut dyn Write) -> io::Result<()> {
        serde_json::to_writer(&mut *w, self).map_err(io::Error::other)?;
        writeln!(w)
    }

    fn render_table(&self, w: &mut dyn Write) -> io::Result<()> {
        writeln!(
            w,
            "{}  {}  {}",
            self.user.id, self.owned, self.user.display_name
        )
    }

    fn table_headers() -> &'static [&'static str] {
        &["ID", "OWNED", "NAME"]
    }
}

/// Execute `qt users`.
///
/// # Errors
///
/// Returns an error if the project is missing or the query fails.
pub fn run_users(_args: &UsersArgs, output: OutputMode, project_root: &Path) -> Result<()> {
    let project = Project::discover(project_root, output)?;
    let _lock = project.lock(LockMode::Shared, output)?;
    let gateway = project.gateway(output)?;

    let users = gateway.users().map_err(|err| {
        fail(
            output,
            &CliError::from_code(ErrorCode::CorruptDatabase, format!("{err:#}")),
        )
    })?;
    render_list(&users, output)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use qtriage_core::model::{User, UserId};

    #[test]
    fn user_row_flattens_profile() {
        let row = StoredUser {
            user: User::new(UserId::new(8), "cy"),
            last_login_ms: None,
            owned: 2,
        };
        let mut buf = Vec::new();
        row.render_json(&mut buf).expect("render");
        let value: serde_json::Value = serde_json::from_slice(&buf).expect("json");
        assert_eq!(value["id"], 8);
        assert_eq!(value["display_name"], "cy");
        assert_eq!(value["owned"], 2);

        let mut text = Vec::new();
        row.render_table(&mut text).expect("render");
        assert_eq!(String::from_utf8(text).expect("utf8"), "8  2  cy\n");
    }
}
