//! Terminal output for command results.
//!
//! # Responsibility
//! - Print outcomes, items and the session snapshot as plain text or JSON.
//! - Map a failed outcome to exit code 1.
//!
//! # Invariants
//! - JSON output is a single pretty-printed document on stdout.
//! - Plain-mode warnings and failures go to stderr.

use anyhow::Result;
use serde::Serialize;
use srs_core::{Item, ItemId, Outcome, SessionSnapshot};
use std::process::ExitCode;

use crate::OutputFormat;

/// Prints an operation result; failed outcomes exit with 1.
pub fn outcome<T: Serialize>(outcome: &Outcome<T>, format: OutputFormat) -> Result<ExitCode> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(outcome)?),
        OutputFormat::Plain => {
            for warning in &outcome.warnings {
                eprintln!("warning: {warning}");
            }
            for failure in &outcome.rollback_failures {
                eprintln!("rollback failure: {failure}");
            }
            if outcome.is_success() {
                println!("{}", outcome.message);
            } else {
                eprintln!("failed: {}", outcome.message);
            }
        }
    }

    Ok(if outcome.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::from(1)
    })
}

pub fn item(id: ItemId, item: Option<&Item>, format: OutputFormat) -> Result<ExitCode> {
    let Some(item) = item else {
        eprintln!("item {id} not found");
        return Ok(ExitCode::from(1));
    };
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Plain => {
            println!("id:            {}", item.id);
            println!("name:          {}", item.name);
            println!("link:          {}", item.link);
            println!("pool:          {}", item.pool);
            println!("last recall:   {}", item.last_recall);
            println!("total recalls: {}", item.total_recalls);
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn items(items: &[Item], format: OutputFormat) -> Result<ExitCode> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(items)?),
        OutputFormat::Plain => {
            if items.is_empty() {
                println!("No items.");
            } else {
                print_table(items);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

pub fn snapshot(snapshot: &SessionSnapshot, format: OutputFormat) -> Result<ExitCode> {
    if let OutputFormat::Json = format {
        println!("{}", serde_json::to_string_pretty(snapshot)?);
        return Ok(ExitCode::SUCCESS);
    }

    println!(
        "store: {} items, archive: {} items",
        snapshot.store_count, snapshot.archive_count
    );
    println!(
        "\nworking set (since {}): {} items",
        snapshot.working_created_on,
        snapshot.working.len() + snapshot.working_missing.len()
    );
    print_table(&snapshot.working);
    for id in &snapshot.working_missing {
        println!("{id:>6}  <missing from store>");
    }

    println!(
        "\ncompleted (since {}): {} items",
        snapshot.completed_created_on,
        snapshot.completed.len()
    );
    for entry in &snapshot.completed {
        let name = entry
            .item
            .as_ref()
            .map_or("<missing from store>", |item| item.name.as_str());
        let pool = entry
            .pending
            .pool_override
            .map_or_else(|| "-".to_string(), |pool| pool.to_string());
        println!(
            "{:>6}  {:<40}  pool->{:<2} on {}",
            entry.id, name, pool, entry.pending.recall_date
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn print_table(items: &[Item]) {
    let name_w = items
        .iter()
        .map(|item| item.name.chars().count())
        .max()
        .unwrap_or(4)
        .clamp(4, 40);
    for item in items {
        let name: String = item.name.chars().take(name_w).collect();
        println!(
            "{:>6}  {:<name_w$}  {}  {}  {:>3}  {}",
            item.id, name, item.pool, item.last_recall, item.total_recalls, item.link
        );
    }
}
