#![allow(dead_code)]

use chrono::{Duration, NaiveDate};
use rusqlite::Connection;
use srs_core::db::open_db_in_memory;
use srs_core::{
    CompletedSet, Item, ItemId, ItemStore, LifecycleService, Pool, RepoResult, SqliteItemStore,
    WorkingSet,
};
use std::collections::HashSet;
use std::path::PathBuf;
use tempfile::TempDir;

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 6, 30).unwrap()
}

pub fn day(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Item last recalled so that `days_since` (inclusive) equals `days_since`.
pub fn item(id: ItemId, pool: Pool, days_since: i64, total_recalls: u32) -> Item {
    let mut item = Item::new(
        id,
        format!("item {id}"),
        format!("https://example.com/problems/{id}"),
        pool,
        today() - Duration::days(days_since - 1),
    )
    .unwrap();
    item.total_recalls = total_recalls;
    item
}

/// In-memory database plus a temp directory holding the session files.
pub struct Harness {
    pub dir: TempDir,
    pub conn: Connection,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            conn: open_db_in_memory().unwrap(),
        }
    }

    pub fn with_items(items: &[Item]) -> Self {
        let harness = Self::new();
        for item in items {
            assert!(harness.active().insert(item).unwrap());
        }
        harness
    }

    pub fn active(&self) -> SqliteItemStore<'_> {
        SqliteItemStore::active(&self.conn).unwrap()
    }

    pub fn archive(&self) -> SqliteItemStore<'_> {
        SqliteItemStore::archive(&self.conn).unwrap()
    }

    pub fn working_path(&self) -> PathBuf {
        self.dir.path().join("working.set")
    }

    pub fn completed_path(&self) -> PathBuf {
        self.dir.path().join("completed.set")
    }

    /// Re-reads the working selection from disk.
    pub fn working(&self) -> WorkingSet {
        WorkingSet::open(self.working_path(), today()).unwrap()
    }

    /// Re-reads completed staging from disk.
    pub fn completed(&self) -> CompletedSet {
        CompletedSet::open(self.completed_path(), today()).unwrap()
    }

    pub fn service(&self) -> LifecycleService<SqliteItemStore<'_>, SqliteItemStore<'_>> {
        self.service_with(self.active(), self.archive())
    }

    pub fn service_with<A: ItemStore, R: ItemStore>(
        &self,
        active: A,
        archive: R,
    ) -> LifecycleService<A, R> {
        LifecycleService::new(active, archive, self.working(), self.completed())
            .with_today(today())
    }
}

/// Store wrapper that reports chosen write operations as failed.
pub struct FaultyStore<S> {
    inner: S,
    failing: HashSet<&'static str>,
}

impl<S: ItemStore> FaultyStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            failing: HashSet::new(),
        }
    }

    /// `op` is one of `insert`, `update`, `batch_update`, `batch_insert`,
    /// `batch_upsert`, `delete`, `clear`.
    pub fn failing(mut self, op: &'static str) -> Self {
        self.failing.insert(op);
        self
    }

    fn fails(&self, op: &'static str) -> bool {
        self.failing.contains(op)
    }
}

impl<S: ItemStore> ItemStore for FaultyStore<S> {
    fn insert(&self, item: &Item) -> RepoResult<bool> {
        if self.fails("insert") {
            return Ok(false);
        }
        self.inner.insert(item)
    }

    fn update(&self, item: &Item) -> RepoResult<bool> {
        if self.fails("update") {
            return Ok(false);
        }
        self.inner.update(item)
    }

    fn batch_update(&self, items: &[Item]) -> RepoResult<bool> {
        if self.fails("batch_update") {
            return Ok(false);
        }
        self.inner.batch_update(items)
    }

    fn batch_insert(&self, items: &[Item]) -> RepoResult<bool> {
        if self.fails("batch_insert") {
            return Ok(false);
        }
        self.inner.batch_insert(items)
    }

    fn batch_upsert(&self, items: &[Item]) -> RepoResult<bool> {
        if self.fails("batch_upsert") {
            return Ok(false);
        }
        self.inner.batch_upsert(items)
    }

    fn delete(&self, id: ItemId) -> RepoResult<bool> {
        if self.fails("delete") {
            return Ok(false);
        }
        self.inner.delete(id)
    }

    fn exists(&self, id: ItemId) -> RepoResult<bool> {
        self.inner.exists(id)
    }

    fn get_by_id(&self, id: ItemId) -> RepoResult<Option<Item>> {
        self.inner.get_by_id(id)
    }

    fn get_all(&self) -> RepoResult<Vec<Item>> {
        self.inner.get_all()
    }

    fn get_by_ids(&self, ids: &[ItemId]) -> RepoResult<Vec<Item>> {
        self.inner.get_by_ids(ids)
    }

    fn search_by_name(&self, query: &str) -> RepoResult<Vec<Item>> {
        self.inner.search_by_name(query)
    }

    fn clear(&self) -> RepoResult<bool> {
        if self.fails("clear") {
            return Ok(false);
        }
        self.inner.clear()
    }

    fn count(&self) -> RepoResult<usize> {
        self.inner.count()
    }
}
