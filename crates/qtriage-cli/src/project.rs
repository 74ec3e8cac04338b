//! Locating a project and opening its store for one command.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use qtriage_core::config::{self, ProjectConfig};
use qtriage_core::db::SqliteGateway;
use qtriage_core::error::ErrorCode;
use qtriage_core::lock::{LockMode, ProjectLock};
use qtriage_core::persist::PersistenceGateway;
use qtriage_core::Triage;

use crate::output::{CliError, OutputMode, fail};

/// A discovered project with its parsed config.
#[derive(Debug)]
pub struct Project {
    pub root: PathBuf,
    pub config: ProjectConfig,
}

impl Project {
    /// Find the project enclosing `start` and load its config.
    ///
    /// # Errors
    ///
    /// Fails with `E1001` when no `.qtriage/` directory exists above `start`
    /// and `E1002` when the config file does not parse.
    pub fn discover(start: &Path, output: OutputMode) -> anyhow::Result<Self> {
        let Some(root) = config::find_project_root(start) else {
            return Err(fail(
                output,
                &CliError::from_code(
                    ErrorCode::NotInitialized,
                    format!("no .qtriage/ directory found at or above {}", start.display()),
                ),
            ));
        };

        let config = config::load_project_config(&root).map_err(|err| {
            fail(
                output,
                &CliError::from_code(ErrorCode::ConfigParseError, format!("{err:#}")),
            )
        })?;

        tracing::debug!(root = %root.display(), "using project");
        Ok(Self { root, config })
    }

    /// Take the cross-process project lock.
    ///
    /// # Errors
    ///
    /// Fails with `E5002` if another process holds a conflicting lock past
    /// the configured timeout.
    pub fn lock(&self, mode: LockMode, output: OutputMode) -> anyhow::Result<ProjectLock> {
        let timeout = Duration::from_millis(self.config.lock.timeout_ms);
        ProjectLock::acquire(&ProjectConfig::lock_path(&self.root), mode, timeout)
            .map_err(|err| fail(output, &CliError::from(&err)))
    }

    /// Open (and migrate) the project database.
    ///
    /// # Errors
    ///
    /// Fails with `E3001` if the database cannot be opened.
    pub fn gateway(&self, output: OutputMode) -> anyhow::Result<Arc<SqliteGateway>> {
        let path = self.config.database_path(&self.root);
        SqliteGateway::open(&path).map(Arc::new).map_err(|err| {
            fail(
                output,
                &CliError::from_code(ErrorCode::CorruptDatabase, format!("{err:#}")),
            )
        })
    }

    /// Bootstrap a coordinator over `gateway`.
    ///
    /// # Errors
    ///
    /// Fails with the store's error code if the stored rows cannot be loaded
    /// or do not form a consistent state.
    pub fn load_triage(
        &self,
        gateway: &Arc<SqliteGateway>,
        output: OutputMode,
    ) -> anyhow::Result<Triage> {
        let gateway: Arc<dyn PersistenceGateway> = gateway.clone();
        Triage::load(gateway).map_err(|err| fail(output, &CliError::from(&err)))
    }

    /// Resolve a path given relative to the project root.
    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.root.join(path)
        }
    }
}
