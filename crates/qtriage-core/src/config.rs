//! Project and user configuration.
//!
//! Project settings live in `.qtriage/config.toml`; per-user preferences in
//! `<config dir>/qtriage/config.toml`. Every field has a default, so a
//! missing file or section is never an error.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::model::UserId;
use crate::source::DEFAULT_BATCH_SIZE;

/// Name of the per-project state directory.
pub const PROJECT_DIR: &str = ".qtriage";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub reconcile: ReconcileConfig,
    #[serde(default)]
    pub lock: LockConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Database file, relative to the project directory unless absolute.
    #[serde(default = "default_database")]
    pub database: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database: default_database(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Compare `update_times` before serving and reload when another
    /// writer has been active.
    #[serde(default = "default_true")]
    pub check_staleness: bool,
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            check_staleness: default_true(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileConfig {
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Dataset used as the upstream source when `--source` is not given.
    #[serde(default)]
    pub dataset: Option<PathBuf>,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            dataset: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockConfig {
    #[serde(default = "default_lock_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_lock_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserConfig {
    #[serde(default)]
    pub output: Option<String>,
    /// Acting user when neither `--as` nor `QTRIAGE_USER` is given.
    #[serde(default)]
    pub default_user: Option<UserId>,
}

impl ProjectConfig {
    /// Absolute path of the database for a project rooted at `root`.
    #[must_use]
    pub fn database_path(&self, root: &Path) -> PathBuf {
        if self.store.database.is_absolute() {
            self.store.database.clone()
        } else {
            root.join(PROJECT_DIR).join(&self.store.database)
        }
    }

    #[must_use]
    pub fn lock_path(root: &Path) -> PathBuf {
        root.join(PROJECT_DIR).join("lock")
    }
}

/// Load `.qtriage/config.toml` under `project_root`, or defaults if absent.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_project_config(project_root: &Path) -> Result<ProjectConfig> {
    let path = project_root.join(PROJECT_DIR).join("config.toml");
    if !path.exists() {
        return Ok(ProjectConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<ProjectConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Write the default project config unless one already exists.
///
/// Returns whether a file was written.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be written.
pub fn write_default_project_config(project_root: &Path) -> Result<bool> {
    let dir = project_root.join(PROJECT_DIR);
    let path = dir.join("config.toml");
    if path.exists() {
        return Ok(false);
    }
    std::fs::create_dir_all(&dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let content = toml::to_string_pretty(&ProjectConfig::default())
        .context("Failed to serialize default config")?;
    std::fs::write(&path, content).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(true)
}

/// Load the per-user config, or defaults if there is none.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config() -> Result<UserConfig> {
    let Some(config_dir) = dirs::config_dir() else {
        return Ok(UserConfig::default());
    };
    load_user_config_from(&config_dir.join("qtriage/config.toml"))
}

/// Load a user config from an explicit path.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_user_config_from(path: &Path) -> Result<UserConfig> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    toml::from_str::<UserConfig>(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))
}

/// Walk up from `start` to the nearest directory containing `.qtriage/`.
#[must_use]
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(PROJECT_DIR).is_dir())
        .map(Path::to_path_buf)
}

/// Acting user precedence: explicit flag, then `env_user` (the value of
/// `QTRIAGE_USER`), then the user config default.
///
/// # Errors
///
/// Returns an error if `env_user` is set but is not an integer id.
pub fn resolve_acting_user(
    flag: Option<UserId>,
    env_user: Option<&str>,
    user_config: &UserConfig,
) -> Result<Option<UserId>> {
    if flag.is_some() {
        return Ok(flag);
    }
    if let Some(raw) = env_user.map(str::trim).filter(|raw| !raw.is_empty()) {
        let id = raw
            .parse::<UserId>()
            .with_context(|| format!("QTRIAGE_USER must be a user id, got '{raw}'"))?;
        return Ok(Some(id));
    }
    Ok(user_config.default_user)
}

const fn default_true() -> bool {
    true
}

fn default_database() -> PathBuf {
    PathBuf::from("qtriage.db")
}

const fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

const fn default_lock_timeout_ms() -> u64 {
    5_000
}
