//! Item domain model.
//!
//! # Responsibility
//! - Define the canonical record shared by the active store and the archive.
//! - Own field-level validation for ids, names, links, pools and dates.
//!
//! # Invariants
//! - `id` is strictly positive.
//! - `name` is non-empty after trim.
//! - `link` starts with [`REQUIRED_LINK_SCHEME`].
//! - `total_recalls` only grows through commit; admin overwrite may reset it.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Stable item identifier, shared by the active store and the archive.
pub type ItemId = i64;

/// Every stored link must start with this scheme.
///
/// Guards against swapped positional arguments on insert.
pub const REQUIRED_LINK_SCHEME: &str = "https://";

/// Format used for every persisted calendar date.
pub const ISO_DATE_FORMAT: &str = "%Y-%m-%d";

/// Coarse urgency bucket feeding the recall weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Pool {
    #[serde(rename = "H")]
    High,
    #[serde(rename = "M")]
    Medium,
    #[serde(rename = "L")]
    Low,
}

impl Pool {
    /// Single-character persisted code.
    pub fn code(self) -> &'static str {
        match self {
            Self::High => "H",
            Self::Medium => "M",
            Self::Low => "L",
        }
    }

    /// Recall weight used by the scheduler score.
    pub fn weight(self) -> f64 {
        match self {
            Self::High => 3.0,
            Self::Medium => 2.0,
            Self::Low => 1.0,
        }
    }

    /// Parses a pool code (`H`/`M`/`L`, case-insensitive, surrounding
    /// whitespace ignored).
    pub fn parse(value: &str) -> Result<Self, ItemValidationError> {
        match value.trim().to_ascii_uppercase().as_str() {
            "H" => Ok(Self::High),
            "M" => Ok(Self::Medium),
            "L" => Ok(Self::Low),
            _ => Err(ItemValidationError::UnknownPool(value.to_string())),
        }
    }
}

impl Display for Pool {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Field-level validation failures for item input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ItemValidationError {
    NonPositiveId(ItemId),
    EmptyName,
    InvalidLinkScheme(String),
    UnknownPool(String),
    InvalidDate(String),
}

impl Display for ItemValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonPositiveId(id) => write!(f, "item id must be positive, got {id}"),
            Self::EmptyName => write!(f, "item name must not be blank"),
            Self::InvalidLinkScheme(link) => write!(
                f,
                "item link `{link}` must start with {REQUIRED_LINK_SCHEME}"
            ),
            Self::UnknownPool(value) => {
                write!(f, "unknown pool `{value}`; expected one of H, M, L")
            }
            Self::InvalidDate(value) => {
                write!(f, "invalid date `{value}`; expected YYYY-MM-DD")
            }
        }
    }
}

impl Error for ItemValidationError {}

/// Canonical record stored in both the active table and the archive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "ItemWire")]
pub struct Item {
    pub id: ItemId,
    pub name: String,
    pub link: String,
    pub pool: Pool,
    /// Date of the most recent committed recall.
    pub last_recall: NaiveDate,
    pub total_recalls: u32,
}

impl Item {
    /// Creates a never-recalled item dated `today`.
    ///
    /// # Errors
    /// - Returns validation errors for id, name or link.
    pub fn new(
        id: ItemId,
        name: impl Into<String>,
        link: impl Into<String>,
        pool: Pool,
        today: NaiveDate,
    ) -> Result<Self, ItemValidationError> {
        let item = Self {
            id,
            name: name.into(),
            link: link.into(),
            pool,
            last_recall: today,
            total_recalls: 0,
        };
        item.validate()?;
        Ok(item)
    }

    /// Validates field invariants before persistence.
    pub fn validate(&self) -> Result<(), ItemValidationError> {
        validate_item_id(self.id)?;
        if self.name.trim().is_empty() {
            return Err(ItemValidationError::EmptyName);
        }
        if !self.link.starts_with(REQUIRED_LINK_SCHEME) {
            return Err(ItemValidationError::InvalidLinkScheme(self.link.clone()));
        }
        Ok(())
    }

    /// Applies one committed recall: optional pool change, new recall date,
    /// counter increment.
    pub fn record_recall(&mut self, pool_override: Option<Pool>, recalled_on: NaiveDate) {
        if let Some(pool) = pool_override {
            self.pool = pool;
        }
        self.last_recall = recalled_on;
        self.total_recalls = self.total_recalls.saturating_add(1);
    }
}

#[derive(Deserialize)]
struct ItemWire {
    id: ItemId,
    name: String,
    link: String,
    pool: Pool,
    last_recall: NaiveDate,
    total_recalls: u32,
}

impl TryFrom<ItemWire> for Item {
    type Error = ItemValidationError;

    fn try_from(wire: ItemWire) -> Result<Self, Self::Error> {
        let item = Self {
            id: wire.id,
            name: wire.name,
            link: wire.link,
            pool: wire.pool,
            last_recall: wire.last_recall,
            total_recalls: wire.total_recalls,
        };
        item.validate()?;
        Ok(item)
    }
}

/// Rejects zero and negative ids.
pub fn validate_item_id(id: ItemId) -> Result<ItemId, ItemValidationError> {
    if id <= 0 {
        return Err(ItemValidationError::NonPositiveId(id));
    }
    Ok(id)
}

/// Parses a strict `YYYY-MM-DD` calendar date.
pub fn parse_iso_date(value: &str) -> Result<NaiveDate, ItemValidationError> {
    NaiveDate::parse_from_str(value.trim(), ISO_DATE_FORMAT)
        .map_err(|_| ItemValidationError::InvalidDate(value.to_string()))
}

/// Formats a date the way every store and set file persists it.
pub fn format_iso_date(date: NaiveDate) -> String {
    date.format(ISO_DATE_FORMAT).to_string()
}
