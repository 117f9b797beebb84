//! Configuration primitives for the Caelum platform.
//!
//! This crate parses the TOML-based `~/.caelum/config.toml` (and
//! project-specific variants) so the facade, interpreter, registry, and
//! supervisor share one schema. Environment variables override file values:
//! `CAELUM_MODULE_PATH` selects the addon root, `CAELUM_TASK_FOLDER` the
//! script import folder.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use dirs::home_dir;
use thiserror::Error;

pub(crate) type Result<T> = std::result::Result<T, ConfigError>;

/// Environment variable naming the addon module root.
pub const ENV_MODULE_PATH: &str = "CAELUM_MODULE_PATH";
/// Environment variable naming the task-script folder.
pub const ENV_TASK_FOLDER: &str = "CAELUM_TASK_FOLDER";

/// Application configuration loaded from TOML files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CaelumConfig {
    /// Addon discovery and loading.
    pub modules: ModulesConfig,

    /// Task interpreter tuning.
    pub interpreter: InterpreterConfig,

    /// Driver supervisor tuning.
    pub supervisor: SupervisorConfig,
}

/// Where addons and task scripts live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModulesConfig {
    /// Root directory scanned for addon subdirectories.
    pub module_root: PathBuf,

    /// Folder that `import` resolves `<script>.json` files against.
    pub task_folder: PathBuf,
}

impl Default for ModulesConfig {
    fn default() -> Self {
        Self {
            module_root: PathBuf::from("./modules"),
            task_folder: PathBuf::from("./tasks"),
        }
    }
}

/// Task interpreter tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct InterpreterConfig {
    /// Per-label jump budget before a `goto` loop is declared runaway.
    pub goto_limit: u32,

    /// Attempts to take the variable-store write lock before giving up.
    pub lock_retries: u32,

    /// Delay between lock attempts, in milliseconds.
    pub lock_retry_delay_ms: u64,
}

impl Default for InterpreterConfig {
    fn default() -> Self {
        Self {
            goto_limit: 100,
            lock_retries: 3,
            lock_retry_delay_ms: 50,
        }
    }
}

/// Driver supervisor tuning knobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SupervisorConfig {
    /// Monitor loop cadence, in milliseconds.
    pub poll_interval_ms: u64,

    /// Bytes read from the driver's stdout per tick.
    pub read_chunk: usize,

    /// Restart a driver that exits while supervised.
    pub auto_restart: bool,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: 100,
            read_chunk: 1024,
            auto_restart: true,
        }
    }
}

impl CaelumConfig {
    /// Loads configuration from the given path.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(ConfigError::Io)?;
        let mut config = toml::from_str::<CaelumConfig>(&contents).map_err(ConfigError::Parse)?;
        config.apply_env();
        Ok(config)
    }

    /// Returns the default configuration path (`$HOME/.caelum/config.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let home = home_dir().ok_or(ConfigError::HomeDirMissing)?;
        Ok(home.join(".caelum").join("config.toml"))
    }

    /// Loads configuration for the current working directory, falling back to
    /// the global config, then to defaults when no file exists.
    pub fn load_scoped() -> Self {
        let mut config = project_config_path()
            .or_else(|| Self::default_path().ok().filter(|p| p.exists()))
            .and_then(|path| Self::from_file(path).ok())
            .unwrap_or_default();
        config.apply_env();
        config
    }

    /// Applies environment-variable overrides.
    pub fn apply_env(&mut self) {
        if let Ok(root) = env::var(ENV_MODULE_PATH) {
            self.modules.module_root = PathBuf::from(root);
        }
        if let Ok(folder) = env::var(ENV_TASK_FOLDER) {
            self.modules.task_folder = PathBuf::from(folder);
        }
    }
}

fn project_config_path() -> Option<PathBuf> {
    let cwd = env::current_dir().ok()?;
    for ancestor in cwd.ancestors() {
        let candidate = ancestor.join(".caelum").join("config.toml");
        if candidate.exists() {
            return Some(candidate);
        }
    }
    None
}

/// Errors that can occur while parsing Caelum configuration files.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO failure when reading config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Unable to determine home directory for default config path")]
    HomeDirMissing,
}
