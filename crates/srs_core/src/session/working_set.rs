//! Working selection: the ids queued for the current recall session.

use super::set_file::{malformed, read_set_file, write_set_file};
use super::SessionResult;
use crate::model::item::ItemId;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// File-backed set of item ids.
#[derive(Debug)]
pub struct WorkingSet {
    path: PathBuf,
    created_on: NaiveDate,
    ids: BTreeSet<ItemId>,
}

impl WorkingSet {
    /// Loads the set from `path`, creating an empty one dated `today` when the
    /// file does not exist yet.
    pub fn open(path: impl Into<PathBuf>, today: NaiveDate) -> SessionResult<Self> {
        let path = path.into();
        let Some(file) = read_set_file(&path)? else {
            let set = Self {
                path,
                created_on: today,
                ids: BTreeSet::new(),
            };
            set.persist()?;
            return Ok(set);
        };

        let mut ids = BTreeSet::new();
        for (line, record) in file.records {
            let id: ItemId = record
                .parse()
                .map_err(|_| malformed(&path, line, format!("invalid item id `{record}`")))?;
            ids.insert(id);
        }

        Ok(Self {
            path,
            created_on: file.created_on,
            ids,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn created_on(&self) -> NaiveDate {
        self.created_on
    }

    pub fn ids(&self) -> &BTreeSet<ItemId> {
        &self.ids
    }

    pub fn contains(&self, id: ItemId) -> bool {
        self.ids.contains(&id)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    /// Unions `ids` into the set.
    pub fn fill(&mut self, ids: impl IntoIterator<Item = ItemId>) -> SessionResult<bool> {
        self.ids.extend(ids);
        self.persist()?;
        Ok(true)
    }

    /// Returns `true` iff the set is empty afterwards.
    pub fn clear(&mut self) -> SessionResult<bool> {
        self.ids.clear();
        self.persist()?;
        Ok(self.ids.is_empty())
    }

    /// Returns `true` iff `id` is present afterwards.
    pub fn add(&mut self, id: ItemId) -> SessionResult<bool> {
        self.ids.insert(id);
        self.persist()?;
        Ok(self.ids.contains(&id))
    }

    /// Returns `true` iff `id` was present and got removed.
    pub fn remove(&mut self, id: ItemId) -> SessionResult<bool> {
        if !self.ids.remove(&id) {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> SessionResult<()> {
        let records: Vec<String> = self.ids.iter().map(ItemId::to_string).collect();
        write_set_file(&self.path, self.created_on, &records)
    }
}
