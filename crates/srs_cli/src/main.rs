//! `srs` command-line front end.
//!
//! Exit codes: 0 success, 1 operational or fatal failure, 2 rejected request.

mod app;
mod render;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use srs_core::model::item::{parse_iso_date, ItemId, Pool};
use srs_core::{
    CompleteRequest, DeleteRequest, ImportMode, LifecycleError, NewItem, RecallRequest,
    RecallSource,
};
use std::path::{Path, PathBuf};
use std::fs::File;
use std::process::ExitCode;

use crate::app::{App, UsageError};

#[derive(Parser)]
#[command(name = "srs", about = "Spaced-repetition item tracker", version)]
struct Cli {
    /// Data directory (default: $SRS_DATA_DIR or the platform data dir)
    #[arg(long, global = true, env = "SRS_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Log level: trace, debug, info, warn, error
    #[arg(long, global = true, env = "SRS_LOG_LEVEL")]
    log_level: Option<String>,

    /// Output format
    #[arg(long, global = true, default_value = "plain")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Plain,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Add a new item to the store
    Add {
        id: ItemId,
        name: String,
        /// Must start with https://
        link: String,
        /// H, M or L
        #[arg(value_parser = parse_pool)]
        pool: Pool,
        /// Overwrite an existing item (resets its recall history)
        #[arg(long)]
        update: bool,
    },

    /// Import items from a CSV file
    ///
    /// Columns: id, name, link, pool, last_recall, total_recalls. A header
    /// row is optional; empty last_recall means today, empty total_recalls
    /// means 0.
    Import {
        file: PathBuf,
        /// Which side wins for ids already in the store
        #[arg(long, value_enum)]
        overwrite: ImportWinner,
    },

    /// Fill the working set with the most urgent items
    Recall {
        /// Number of items to recall
        #[arg(required_unless_present = "ids", conflicts_with = "ids")]
        count: Option<usize>,
        /// Recall these ids instead (comma-separated)
        #[arg(long, value_delimiter = ',')]
        ids: Vec<ItemId>,
        /// Replace a non-empty working set
        #[arg(long)]
        force: bool,
        /// With --force, keep the current working set and add to it
        #[arg(long, requires = "force")]
        append: bool,
    },

    /// Mark items as recalled
    Complete {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<ItemId>,
        /// Complete every item in the working set
        #[arg(long)]
        all: bool,
        /// Move the item to another pool on commit
        #[arg(long, value_parser = parse_pool)]
        pool: Option<Pool>,
        /// Recall date (YYYY-MM-DD, default today)
        #[arg(long, value_parser = parse_date)]
        date: Option<NaiveDate>,
        /// Complete an item that is not in the working set
        #[arg(long)]
        force: bool,
    },

    /// Write completed items back to the store
    Commit {
        /// Commit even if the working set is not empty
        #[arg(long)]
        force: bool,
    },

    /// Move completed items back into the working set
    Rollback {
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        id: Option<ItemId>,
        #[arg(long)]
        all: bool,
    },

    /// Delete items from the working set, staging or store
    #[command(subcommand)]
    Delete(DeleteCommand),

    /// Move items to and from the archive
    #[command(subcommand)]
    Archive(ArchiveCommand),

    /// Show the working set and completed items
    List,

    /// Show one stored item
    Show { id: ItemId },

    /// Search stored items by name
    Search { query: String },
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
enum ImportWinner {
    /// Keep stored rows and only add new ids
    Db,
    /// Overwrite stored rows with the file's values
    Csv,
}

impl From<ImportWinner> for ImportMode {
    fn from(value: ImportWinner) -> Self {
        match value {
            ImportWinner::Db => ImportMode::KeepStore,
            ImportWinner::Csv => ImportMode::OverwriteStore,
        }
    }
}

#[derive(Subcommand)]
enum DeleteCommand {
    /// Remove an id from the working set
    Working { id: ItemId },
    /// Drop a completed, uncommitted item
    Completed { id: ItemId },
    /// Delete an item from the store
    Item {
        id: ItemId,
        #[arg(long)]
        sure: bool,
    },
    /// Clear the store, working set and completed items (archive is kept)
    Reset {
        #[arg(long)]
        sure: bool,
    },
}

#[derive(Subcommand)]
enum ArchiveCommand {
    /// Archive one item
    Add { id: ItemId },
    /// Archive every item not in the working set or completed items
    AddAll {
        #[arg(long)]
        sure: bool,
    },
    /// Restore one archived item
    Restore { id: ItemId },
    /// Restore every archived item
    RestoreAll {
        #[arg(long)]
        sure: bool,
    },
    /// Permanently delete one archived item
    Delete {
        id: ItemId,
        #[arg(long)]
        sure: bool,
    },
    /// List archived items
    List,
    /// Show one archived item
    Show { id: ItemId },
    /// Search archived items by name
    Search { query: String },
}

fn parse_pool(value: &str) -> Result<Pool, String> {
    Pool::parse(value).map_err(|err| err.to_string())
}

fn parse_date(value: &str) -> Result<NaiveDate, String> {
    parse_iso_date(value).map_err(|err| err.to_string())
}

fn require_sure(sure: bool, action: &str) -> Result<()> {
    if !sure {
        return Err(UsageError(format!("refusing to {action} without --sure")).into());
    }
    Ok(())
}

fn open_csv(path: &Path) -> Result<File> {
    let is_csv = path
        .extension()
        .is_some_and(|extension| extension.eq_ignore_ascii_case("csv"));
    if !is_csv {
        return Err(UsageError(format!("{} is not a .csv file", path.display())).into());
    }
    if !path.is_file() {
        return Err(UsageError(format!("{} is not an existing file", path.display())).into());
    }
    File::open(path).with_context(|| format!("Failed to open `{}`", path.display()))
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

fn exit_status(err: &anyhow::Error) -> u8 {
    if err.downcast_ref::<UsageError>().is_some() {
        return 2;
    }
    match err.downcast_ref::<LifecycleError>() {
        Some(lifecycle) if !lifecycle.is_fatal() => 2,
        _ => 1,
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let app = App::new(cli.data_dir, cli.log_level)?;
    let format = cli.format;

    match cli.command {
        Command::Add {
            id,
            name,
            link,
            pool,
            update,
        } => {
            let service = app.service()?;
            let outcome = service.add_item(NewItem { id, name, link, pool }, update)?;
            render::outcome(&outcome, format)
        }
        Command::Import { file, overwrite } => {
            let reader = open_csv(&file)?;
            let service = app.service()?;
            render::outcome(&service.import_csv(reader, overwrite.into())?, format)
        }
        Command::Recall {
            count,
            ids,
            force,
            append,
        } => {
            let source = if ids.is_empty() {
                RecallSource::Top(count.unwrap_or_default())
            } else {
                RecallSource::Custom(ids)
            };
            let mut service = app.service()?;
            let outcome = service.recall(RecallRequest {
                source,
                force,
                append,
            })?;
            render::outcome(&outcome, format)
        }
        Command::Complete {
            id,
            all,
            pool,
            date,
            force,
        } => {
            let mut service = app.service()?;
            match id {
                Some(id) if !all => {
                    let outcome = service.complete(CompleteRequest {
                        id,
                        pool_override: pool,
                        recall_date: date,
                        force,
                    })?;
                    render::outcome(&outcome, format)
                }
                _ => render::outcome(&service.complete_all()?, format),
            }
        }
        Command::Commit { force } => {
            let mut service = app.service()?;
            render::outcome(&service.commit(force)?, format)
        }
        Command::Rollback { id, all } => {
            let mut service = app.service()?;
            match id {
                Some(id) if !all => render::outcome(&service.rollback(id)?, format),
                _ => render::outcome(&service.rollback_all()?, format),
            }
        }
        Command::Delete(command) => {
            let request = match command {
                DeleteCommand::Working { id } => DeleteRequest::Working(id),
                DeleteCommand::Completed { id } => DeleteRequest::Completed(id),
                DeleteCommand::Item { id, sure } => {
                    require_sure(sure, "delete an item from the store")?;
                    DeleteRequest::Database(id)
                }
                DeleteCommand::Reset { sure } => {
                    require_sure(sure, "reset the store")?;
                    DeleteRequest::HardReset
                }
            };
            let mut service = app.service()?;
            render::outcome(&service.delete(request)?, format)
        }
        Command::Archive(command) => {
            let service = app.service()?;
            match command {
                ArchiveCommand::Add { id } => render::outcome(&service.archive_add(id)?, format),
                ArchiveCommand::AddAll { sure } => {
                    require_sure(sure, "archive every item")?;
                    render::outcome(&service.archive_all()?, format)
                }
                ArchiveCommand::Restore { id } => {
                    render::outcome(&service.archive_restore(id)?, format)
                }
                ArchiveCommand::RestoreAll { sure } => {
                    require_sure(sure, "restore every archived item")?;
                    render::outcome(&service.restore_all()?, format)
                }
                ArchiveCommand::Delete { id, sure } => {
                    require_sure(sure, "permanently delete an archived item")?;
                    render::outcome(&service.archive_delete(id)?, format)
                }
                ArchiveCommand::List => render::items(&service.archived_items()?, format),
                ArchiveCommand::Show { id } => {
                    render::item(id, service.archived_item(id)?.as_ref(), format)
                }
                ArchiveCommand::Search { query } => {
                    render::items(&service.search_archive(&query)?, format)
                }
            }
        }
        Command::List => {
            let service = app.service()?;
            render::snapshot(&service.snapshot()?, format)
        }
        Command::Show { id } => {
            let service = app.service()?;
            render::item(id, service.item(id)?.as_ref(), format)
        }
        Command::Search { query } => {
            let service = app.service()?;
            render::items(&service.search_items(&query)?, format)
        }
    }
}
