//! Core domain logic for the `srs` spaced-repetition tracker.
//! This crate is the single source of truth for item lifecycle invariants.

pub mod config;
pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod session;

pub use config::{AppConfig, ConfigError};
pub use db::{open_db, open_db_in_memory, DbError};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::item::{Item, ItemId, ItemValidationError, Pool};
pub use repo::item_repo::{ItemStore, ItemTable, RepoError, RepoResult, SqliteItemStore};
pub use service::lifecycle_service::{
    CompleteRequest, DeleteReport, DeleteRequest, ImportMode, ImportReport, LifecycleError,
    LifecycleResult, LifecycleService, NewItem, Outcome, OutcomeStatus, RecallRequest,
    RecallSource, SessionSnapshot, StagedEntry,
};
pub use service::csv_import::{parse_items_csv, CsvImportError, ParsedCsv};
pub use service::recall_service::{RecallParams, RecallService};
pub use session::completed_set::{CompletedSet, PendingRecall};
pub use session::working_set::WorkingSet;
pub use session::SessionError;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
