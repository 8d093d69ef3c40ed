//! Per-invocation application context.
//!
//! # Responsibility
//! - Resolve the data directory, start file logging and open the database.
//! - Build a lifecycle service bound to today's date for one command.
//!
//! # Invariants
//! - Logging is initialized before the database is opened.
//! - Every service borrows the single connection owned by `App`.

use anyhow::{Context, Result};
use chrono::Local;
use log::info;
use rusqlite::Connection;
use srs_core::{
    init_logging, open_db, AppConfig, CompletedSet, LifecycleService, SqliteItemStore, WorkingSet,
};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

/// Request refused by the CLI itself, before any store is touched.
#[derive(Debug)]
pub struct UsageError(pub String);

impl Display for UsageError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Error for UsageError {}

/// Opened data directory shared by every command.
pub struct App {
    config: AppConfig,
    conn: Connection,
}

impl App {
    /// Resolves configuration, starts logging and opens the database.
    pub fn new(data_dir: Option<PathBuf>, log_level: Option<String>) -> Result<Self> {
        let mut config = match data_dir {
            Some(dir) if dir.is_relative() => {
                let cwd = std::env::current_dir().context("Failed to resolve current directory")?;
                AppConfig::from_data_dir(cwd.join(dir))?
            }
            Some(dir) => AppConfig::from_data_dir(dir)?,
            None => AppConfig::from_env()?,
        };
        if let Some(level) = log_level {
            config = config.with_log_level(level);
        }

        config.ensure_dirs()?;
        init_logging(&config.log_level, &config.log_dir).context("Failed to start logging")?;
        let conn = open_db(&config.database_path).with_context(|| {
            format!("Failed to open database `{}`", config.database_path.display())
        })?;
        info!(
            "event=cli_start module=cli status=ok data_dir={}",
            config.data_dir.display()
        );

        Ok(Self { config, conn })
    }

    /// Builds a coordinator over this data directory, dated today.
    pub fn service(&self) -> Result<LifecycleService<SqliteItemStore<'_>, SqliteItemStore<'_>>> {
        let today = Local::now().date_naive();
        let active = SqliteItemStore::active(&self.conn)?;
        let archive = SqliteItemStore::archive(&self.conn)?;
        let working = WorkingSet::open(&self.config.working_set_path, today)?;
        let completed = CompletedSet::open(&self.config.completed_set_path, today)?;

        Ok(LifecycleService::new(active, archive, working, completed)
            .with_today(today)
            .with_recall_params(self.config.recall))
    }
}
