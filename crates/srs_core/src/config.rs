//! Runtime configuration for one data directory.
//!
//! # Responsibility
//! - Derive every on-disk path from a single data directory.
//! - Resolve the data directory and log level from the environment.
//!
//! # Invariants
//! - `data_dir` is absolute.
//! - Paths are never global; callers pass `AppConfig` explicitly.

use crate::logging::default_log_level;
use crate::service::recall_service::RecallParams;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

/// Overrides the data directory.
pub const DATA_DIR_ENV: &str = "SRS_DATA_DIR";
/// Overrides the log level.
pub const LOG_LEVEL_ENV: &str = "SRS_LOG_LEVEL";

const APP_DIR_NAME: &str = "srs";
const DATABASE_FILE_NAME: &str = "srs.db";
const WORKING_SET_FILE_NAME: &str = "working.set";
const COMPLETED_SET_FILE_NAME: &str = "completed.set";
const LOG_DIR_NAME: &str = "logs";

pub type ConfigResult<T> = Result<T, ConfigError>;

#[derive(Debug)]
pub enum ConfigError {
    RelativeDataDir(PathBuf),
    /// No `SRS_DATA_DIR` and the platform reports no data directory.
    NoPlatformDataDir,
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RelativeDataDir(path) => write!(
                f,
                "data directory must be an absolute path, got `{}`",
                path.display()
            ),
            Self::NoPlatformDataDir => write!(
                f,
                "cannot determine a data directory; set {DATA_DIR_ENV}"
            ),
            Self::Io { path, source } => {
                write!(f, "failed to create `{}`: {source}", path.display())
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub data_dir: PathBuf,
    pub database_path: PathBuf,
    pub working_set_path: PathBuf,
    pub completed_set_path: PathBuf,
    pub log_dir: PathBuf,
    pub log_level: String,
    pub recall: RecallParams,
}

impl AppConfig {
    /// Builds a config rooted at `data_dir` with default level and scoring.
    pub fn from_data_dir(data_dir: impl Into<PathBuf>) -> ConfigResult<Self> {
        let data_dir = data_dir.into();
        if !data_dir.is_absolute() {
            return Err(ConfigError::RelativeDataDir(data_dir));
        }
        Ok(Self {
            database_path: data_dir.join(DATABASE_FILE_NAME),
            working_set_path: data_dir.join(WORKING_SET_FILE_NAME),
            completed_set_path: data_dir.join(COMPLETED_SET_FILE_NAME),
            log_dir: data_dir.join(LOG_DIR_NAME),
            log_level: default_log_level().to_string(),
            recall: RecallParams::default(),
            data_dir,
        })
    }

    /// Resolves `SRS_DATA_DIR`, falling back to `<platform data dir>/srs`.
    /// `SRS_LOG_LEVEL` replaces the build-mode default level when set.
    pub fn from_env() -> ConfigResult<Self> {
        let data_dir = match std::env::var_os(DATA_DIR_ENV) {
            Some(value) if !value.is_empty() => PathBuf::from(value),
            _ => dirs::data_dir()
                .ok_or(ConfigError::NoPlatformDataDir)?
                .join(APP_DIR_NAME),
        };
        let mut config = Self::from_data_dir(data_dir)?;
        if let Ok(level) = std::env::var(LOG_LEVEL_ENV) {
            if !level.trim().is_empty() {
                config.log_level = level.trim().to_string();
            }
        }
        Ok(config)
    }

    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    pub fn with_recall_params(mut self, params: RecallParams) -> Self {
        self.recall = params;
        self
    }

    /// Creates the data and log directories.
    pub fn ensure_dirs(&self) -> ConfigResult<()> {
        create_dir(&self.data_dir)?;
        create_dir(&self.log_dir)
    }
}

fn create_dir(path: &Path) -> ConfigResult<()> {
    std::fs::create_dir_all(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}
