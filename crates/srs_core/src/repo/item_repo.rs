//! Item store contracts and SQLite implementation.
//!
//! # Responsibility
//! - Provide CRUD and batch APIs over the `items` and `archive` tables.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - Write paths call `Item::validate()` before SQL mutations.
//! - Recoverable failures (duplicate key, missing row) are `Ok(false)`;
//!   `Err` is reserved for connection, schema and corrupt-data failures.
//! - Batch writes are all-or-nothing inside their own table only.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::item::{
    format_iso_date, parse_iso_date, Item, ItemId, ItemValidationError, Pool,
};
use rusqlite::{
    params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row, Transaction,
    TransactionBehavior,
};
use std::error::Error;
use std::fmt::{Display, Formatter};

const ITEM_COLUMNS: &[&str] = &["id", "name", "link", "pool", "last_recall", "total_recalls"];

pub type RepoResult<T> = Result<T, RepoError>;

/// Store-level error for item persistence and query operations.
#[derive(Debug)]
pub enum RepoError {
    Validation(ItemValidationError),
    Db(DbError),
    /// Connection schema is not at the expected migrated version.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    MissingRequiredColumn {
        table: &'static str,
        column: &'static str,
    },
    /// Persisted row cannot be converted to a valid `Item`.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "item store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "item store requires table `{table}`")
            }
            Self::MissingRequiredColumn { table, column } => write!(
                f,
                "item store requires column `{column}` in table `{table}`"
            ),
            Self::InvalidData(message) => write!(f, "invalid persisted item data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<ItemValidationError> for RepoError {
    fn from(value: ItemValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Which of the two identically shaped tables a store operates on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemTable {
    /// Canonical table of active items.
    Active,
    /// Cold storage; id space disjoint from `Active`.
    Archive,
}

impl ItemTable {
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Active => "items",
            Self::Archive => "archive",
        }
    }
}

impl Display for ItemTable {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

/// Store interface shared by the active store and the archive.
///
/// `bool` results follow the lifecycle contract: `false` means the operation
/// did not apply and the caller decides on compensation.
pub trait ItemStore {
    fn insert(&self, item: &Item) -> RepoResult<bool>;
    fn update(&self, item: &Item) -> RepoResult<bool>;
    fn batch_update(&self, items: &[Item]) -> RepoResult<bool>;
    fn batch_insert(&self, items: &[Item]) -> RepoResult<bool>;
    /// Inserts new ids and overwrites existing ones in one transaction.
    fn batch_upsert(&self, items: &[Item]) -> RepoResult<bool>;
    fn delete(&self, id: ItemId) -> RepoResult<bool>;
    fn exists(&self, id: ItemId) -> RepoResult<bool>;
    fn get_by_id(&self, id: ItemId) -> RepoResult<Option<Item>>;
    fn get_all(&self) -> RepoResult<Vec<Item>>;
    fn get_by_ids(&self, ids: &[ItemId]) -> RepoResult<Vec<Item>>;
    fn search_by_name(&self, query: &str) -> RepoResult<Vec<Item>>;
    fn clear(&self) -> RepoResult<bool>;
    fn count(&self) -> RepoResult<usize>;
}

/// SQLite-backed item store bound to one table.
pub struct SqliteItemStore<'conn> {
    conn: &'conn Connection,
    table: ItemTable,
}

impl<'conn> SqliteItemStore<'conn> {
    /// Creates a store after verifying the connection is migrated and the
    /// target table has the expected columns.
    pub fn try_new(conn: &'conn Connection, table: ItemTable) -> RepoResult<Self> {
        ensure_item_connection_ready(conn, table)?;
        Ok(Self { conn, table })
    }

    /// Store over the active `items` table.
    pub fn active(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_new(conn, ItemTable::Active)
    }

    /// Store over the `archive` table.
    pub fn archive(conn: &'conn Connection) -> RepoResult<Self> {
        Self::try_new(conn, ItemTable::Archive)
    }

    pub fn table(&self) -> ItemTable {
        self.table
    }

    fn select_sql(&self) -> String {
        format!(
            "SELECT id, name, link, pool, last_recall, total_recalls FROM {}",
            self.table.table_name()
        )
    }

    fn insert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, name, link, pool, last_recall, total_recalls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
            self.table.table_name()
        )
    }

    fn update_sql(&self) -> String {
        format!(
            "UPDATE {}
             SET name = ?1, link = ?2, pool = ?3, last_recall = ?4, total_recalls = ?5
             WHERE id = ?6;",
            self.table.table_name()
        )
    }

    fn upsert_sql(&self) -> String {
        format!(
            "INSERT INTO {} (id, name, link, pool, last_recall, total_recalls)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
               name = excluded.name,
               link = excluded.link,
               pool = excluded.pool,
               last_recall = excluded.last_recall,
               total_recalls = excluded.total_recalls;",
            self.table.table_name()
        )
    }

    /// Runs `sql` once per item with insert-ordered parameters inside one
    /// `Immediate` transaction. A constraint violation rolls back the batch.
    fn write_batch(&self, sql: &str, items: &[Item]) -> RepoResult<bool> {
        for item in items {
            item.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(sql)?;
            for item in items {
                let result = stmt.execute(params![
                    item.id,
                    item.name.as_str(),
                    item.link.as_str(),
                    item.pool.code(),
                    format_iso_date(item.last_recall),
                    item.total_recalls,
                ]);
                match result {
                    Ok(_) => {}
                    Err(err) if is_constraint_violation(&err) => return Ok(false),
                    Err(err) => return Err(err.into()),
                }
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn query_items(&self, sql: &str, values: Vec<rusqlite::types::Value>) -> RepoResult<Vec<Item>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query(params_from_iter(values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_item_row(row, self.table)?);
        }
        Ok(items)
    }
}

impl ItemStore for SqliteItemStore<'_> {
    fn insert(&self, item: &Item) -> RepoResult<bool> {
        item.validate()?;
        let result = self.conn.execute(
            &self.insert_sql(),
            params![
                item.id,
                item.name.as_str(),
                item.link.as_str(),
                item.pool.code(),
                format_iso_date(item.last_recall),
                item.total_recalls,
            ],
        );
        match result {
            Ok(_) => Ok(true),
            Err(err) if is_constraint_violation(&err) => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    fn update(&self, item: &Item) -> RepoResult<bool> {
        item.validate()?;
        let changed = self.conn.execute(
            &self.update_sql(),
            params![
                item.name.as_str(),
                item.link.as_str(),
                item.pool.code(),
                format_iso_date(item.last_recall),
                item.total_recalls,
                item.id,
            ],
        )?;
        Ok(changed == 1)
    }

    fn batch_update(&self, items: &[Item]) -> RepoResult<bool> {
        for item in items {
            item.validate()?;
        }

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        {
            let mut stmt = tx.prepare(&self.update_sql())?;
            for item in items {
                let changed = stmt.execute(params![
                    item.name.as_str(),
                    item.link.as_str(),
                    item.pool.code(),
                    format_iso_date(item.last_recall),
                    item.total_recalls,
                    item.id,
                ])?;
                if changed != 1 {
                    // Dropping `tx` rolls back every row written so far.
                    return Ok(false);
                }
            }
        }
        tx.commit()?;
        Ok(true)
    }

    fn batch_insert(&self, items: &[Item]) -> RepoResult<bool> {
        self.write_batch(&self.insert_sql(), items)
    }

    fn batch_upsert(&self, items: &[Item]) -> RepoResult<bool> {
        self.write_batch(&self.upsert_sql(), items)
    }

    fn delete(&self, id: ItemId) -> RepoResult<bool> {
        let changed = self.conn.execute(
            &format!("DELETE FROM {} WHERE id = ?1;", self.table.table_name()),
            [id],
        )?;
        Ok(changed == 1)
    }

    fn exists(&self, id: ItemId) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE id = ?1);",
                self.table.table_name()
            ),
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn get_by_id(&self, id: ItemId) -> RepoResult<Option<Item>> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} WHERE id = ?1;", self.select_sql()))?;
        let mut rows = stmt.query([id])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_item_row(row, self.table)?));
        }
        Ok(None)
    }

    fn get_all(&self) -> RepoResult<Vec<Item>> {
        self.query_items(&format!("{} ORDER BY id ASC;", self.select_sql()), Vec::new())
    }

    fn get_by_ids(&self, ids: &[ItemId]) -> RepoResult<Vec<Item>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "{} WHERE id IN ({placeholders}) ORDER BY id ASC;",
            self.select_sql()
        );
        let values = ids
            .iter()
            .map(|id| rusqlite::types::Value::Integer(*id))
            .collect();
        self.query_items(&sql, values)
    }

    fn search_by_name(&self, query: &str) -> RepoResult<Vec<Item>> {
        let pattern = format!("%{}%", escape_like(&query.to_lowercase()));
        let sql = format!(
            "{} WHERE lower(name) LIKE ?1 ESCAPE '\\' ORDER BY id ASC;",
            self.select_sql()
        );
        self.query_items(&sql, vec![rusqlite::types::Value::Text(pattern)])
    }

    fn clear(&self) -> RepoResult<bool> {
        self.conn
            .execute(&format!("DELETE FROM {};", self.table.table_name()), [])?;
        Ok(self.count()? == 0)
    }

    fn count(&self) -> RepoResult<usize> {
        let rows: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {};", self.table.table_name()),
            [],
            |row| row.get(0),
        )?;
        usize::try_from(rows).map_err(|_| {
            RepoError::InvalidData(format!("negative row count {rows} in {}", self.table))
        })
    }
}

fn parse_item_row(row: &Row<'_>, table: ItemTable) -> RepoResult<Item> {
    let id: ItemId = row.get("id")?;

    let pool_text: String = row.get("pool")?;
    let pool = Pool::parse(&pool_text).map_err(|_| {
        RepoError::InvalidData(format!("invalid pool `{pool_text}` in {table}.pool (id {id})"))
    })?;

    let date_text: String = row.get("last_recall")?;
    let last_recall = parse_iso_date(&date_text).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid date `{date_text}` in {table}.last_recall (id {id})"
        ))
    })?;

    let total_recalls: i64 = row.get("total_recalls")?;
    let total_recalls = u32::try_from(total_recalls).map_err(|_| {
        RepoError::InvalidData(format!(
            "invalid count `{total_recalls}` in {table}.total_recalls (id {id})"
        ))
    })?;

    let item = Item {
        id,
        name: row.get("name")?,
        link: row.get("link")?,
        pool,
        last_recall,
        total_recalls,
    };
    item.validate()
        .map_err(|err| RepoError::InvalidData(format!("{table} row {id}: {err}")))?;
    Ok(item)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _) if failure.code == ErrorCode::ConstraintViolation
    )
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

fn ensure_item_connection_ready(conn: &Connection, table: ItemTable) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    let table_name = table.table_name();
    let exists: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1;",
            [table_name],
            |row| row.get(0),
        )
        .optional()?;
    if exists.is_none() {
        return Err(RepoError::MissingRequiredTable(table_name));
    }

    let mut present = Vec::new();
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({table_name});"))?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let column: String = row.get(1)?;
        present.push(column);
    }
    for &column in ITEM_COLUMNS {
        if !present.iter().any(|current| current == column) {
            return Err(RepoError::MissingRequiredColumn {
                table: table_name,
                column,
            });
        }
    }

    Ok(())
}
