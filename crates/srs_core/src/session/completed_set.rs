//! Completed staging: recalls finished this session but not yet committed.
//!
//! # Invariants
//! - First writer wins: `add` never overwrites a pending entry.
//! - `pool_override = None` means "keep the stored pool" and is written as the
//!   literal `null`, distinct from every concrete pool code.

use super::set_file::{malformed, read_set_file, write_set_file};
use super::SessionResult;
use crate::model::item::{format_iso_date, parse_iso_date, ItemId, Pool};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const NO_OVERRIDE: &str = "null";

/// Pending mutation applied to an item on commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingRecall {
    pub pool_override: Option<Pool>,
    pub recall_date: NaiveDate,
}

/// File-backed map from item id to its pending recall.
#[derive(Debug)]
pub struct CompletedSet {
    path: PathBuf,
    created_on: NaiveDate,
    entries: BTreeMap<ItemId, PendingRecall>,
}

impl CompletedSet {
    /// Loads staging from `path`, creating an empty file dated `today` when
    /// missing.
    pub fn open(path: impl Into<PathBuf>, today: NaiveDate) -> SessionResult<Self> {
        let path = path.into();
        let Some(file) = read_set_file(&path)? else {
            let set = Self {
                path,
                created_on: today,
                entries: BTreeMap::new(),
            };
            set.persist()?;
            return Ok(set);
        };

        let mut entries = BTreeMap::new();
        for (line, record) in file.records {
            let (id, pending) = parse_record(&record)
                .map_err(|message| malformed(&path, line, message))?;
            entries.insert(id, pending);
        }

        Ok(Self {
            path,
            created_on: file.created_on,
            entries,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_on
    }

    pub fn entries(&self) -> &BTreeMap<ItemId, PendingRecall> {
        &self.entries
    }

    pub fn get(&self, id: ItemId) -> Option<&PendingRecall> {
        self.entries.get(&id)
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.entries.contains_key(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Stages `id`. Returns `false` if it is already staged.
    pub fn add(
        &mut self,
        id: ItemId,
        pool_override: Option<Pool>,
        recall_date: NaiveDate,
    ) -> SessionResult<bool> {
        if self.entries.contains_key(&id) {
            return Ok(false);
        }
        self.entries.insert(
            id,
            PendingRecall {
                pool_override,
                recall_date,
            },
        );
        self.persist()?;
        Ok(true)
    }

    /// Returns `true` iff `id` was staged and got removed.
    pub fn remove(&mut self, id: ItemId) -> SessionResult<bool> {
        if self.entries.remove(&id).is_none() {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Removes every listed id with a single rewrite of the file. Returns how
    /// many were staged. Memory is left unchanged if the write fails.
    pub fn remove_all(&mut self, ids: &[ItemId]) -> SessionResult<usize> {
        let removed: Vec<(ItemId, PendingRecall)> = ids
            .iter()
            .filter_map(|id| self.entries.remove(id).map(|pending| (*id, pending)))
            .collect();
        if removed.is_empty() {
            return Ok(0);
        }
        if let Err(err) = self.persist() {
            self.entries.extend(removed);
            return Err(err);
        }
        Ok(removed.len())
    }

    /// Returns `true` iff staging is empty afterwards.
    pub fn clear(&mut self) -> SessionResult<bool> {
        self.entries.clear();
        self.persist()?;
        Ok(self.entries.is_empty())
    }

    fn persist(&self) -> SessionResult<()> {
        let records: Vec<String> = self
            .entries
            .iter()
            .map(|(id, pending)| format_record(*id, pending))
            .collect();
        write_set_file(&self.path, self.created_on, &records)
    }
}

fn format_record(id: ItemId, pending: &PendingRecall) -> String {
    let pool = pending.pool_override.map_or(NO_OVERRIDE, Pool::code);
    format!("{id} {pool} {}", format_iso_date(pending.recall_date))
}

fn parse_record(record: &str) -> Result<(ItemId, PendingRecall), String> {
    let fields: Vec<&str> = record.split_whitespace().collect();
    let [id, pool, date] = fields.as_slice() else {
        return Err(format!("expected `<id> <pool|null> <date>`, got `{record}`"));
    };

    let id: ItemId = id
        .parse()
        .map_err(|_| format!("invalid item id `{id}`"))?;
    let pool_override = if *pool == NO_OVERRIDE {
        None
    } else {
        Some(Pool::parse(pool).map_err(|err| err.to_string())?)
    };
    let recall_date = parse_iso_date(date).map_err(|err| err.to_string())?;

    Ok((
        id,
        PendingRecall {
            pool_override,
            recall_date,
        },
    ))
}
