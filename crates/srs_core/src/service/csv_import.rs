//! CSV item import parsing.
//!
//! # Responsibility
//! - Turn `id,name,link,pool,last_recall,total_recalls` rows into validated
//!   `Item`s ready for a store batch.
//!
//! # Invariants
//! - Every row has exactly six fields; any other width rejects the file.
//! - A first row whose id field is not a number is a header and is skipped
//!   only if all six fields are non-blank.
//! - Rows that fail field validation are reported, never imported.
//! - Within one file the first row for an id wins.

use crate::model::item::{parse_iso_date, Item, ItemId, Pool};
use chrono::NaiveDate;
use log::warn;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::io::Read;

const CSV_FIELDS: usize = 6;

/// File-level import failures. Row-level problems are collected on
/// [`ParsedCsv::rejected`] instead.
#[derive(Debug)]
pub enum CsvImportError {
    Read(csv::Error),
    InvalidHeader,
    /// A row does not have the six expected fields.
    Malformed { line: u64, fields: usize },
    /// Parsing finished without a single importable row.
    NoValidRows { rejected: usize },
}

impl CsvImportError {
    /// Whether the failure came from the underlying reader rather than the
    /// file content.
    pub fn is_io(&self) -> bool {
        matches!(self, Self::Read(err) if err.is_io_error())
    }
}

impl Display for CsvImportError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Read(err) => write!(f, "failed to read csv: {err}"),
            Self::InvalidHeader => write!(
                f,
                "invalid csv header; expected id,name,link,pool,last_recall,total_recalls"
            ),
            Self::Malformed { line, fields } => write!(
                f,
                "csv line {line} has {fields} fields; expected {CSV_FIELDS}"
            ),
            Self::NoValidRows { rejected } => {
                write!(f, "csv holds no valid rows ({rejected} rejected)")
            }
        }
    }
}

impl Error for CsvImportError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Read(err) => Some(err),
            _ => None,
        }
    }
}

impl From<csv::Error> for CsvImportError {
    fn from(value: csv::Error) -> Self {
        Self::Read(value)
    }
}

/// Rows accepted from one CSV file.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedCsv {
    pub items: Vec<Item>,
    /// One message per skipped row, naming its line.
    pub rejected: Vec<String>,
}

/// Parses an item CSV. Empty `last_recall` means `today`; empty
/// `total_recalls` means zero. Dates after `today` are rejected.
pub fn parse_items_csv<R: Read>(
    reader: R,
    today: NaiveDate,
) -> Result<ParsedCsv, CsvImportError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(reader);

    let mut items = Vec::new();
    let mut rejected = Vec::new();
    let mut seen = BTreeSet::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let line = record
            .position()
            .map_or(index as u64 + 1, |position| position.line());
        if record.len() != CSV_FIELDS {
            return Err(CsvImportError::Malformed {
                line,
                fields: record.len(),
            });
        }
        let fields: Vec<String> = record.iter().map(sanitize).collect();

        if index == 0 && fields[0].parse::<ItemId>().is_err() {
            if fields.iter().any(|field| field.is_empty()) {
                return Err(CsvImportError::InvalidHeader);
            }
            continue;
        }

        match parse_row(&fields, today) {
            Ok(item) if seen.insert(item.id) => items.push(item),
            Ok(item) => rejected.push(format!(
                "line {line}: duplicate id {} in file, keeping the first row",
                item.id
            )),
            Err(reason) => rejected.push(format!("line {line}: {reason}")),
        }
    }

    for message in &rejected {
        warn!("event=csv_import module=import status=warn message=\"{message}\"");
    }
    if items.is_empty() {
        return Err(CsvImportError::NoValidRows {
            rejected: rejected.len(),
        });
    }
    Ok(ParsedCsv { items, rejected })
}

fn parse_row(fields: &[String], today: NaiveDate) -> Result<Item, String> {
    let id: ItemId = fields[0]
        .parse()
        .map_err(|_| format!("invalid item id `{}`", fields[0]))?;
    let pool = Pool::parse(&fields[3]).map_err(|err| err.to_string())?;

    let last_recall = if fields[4].is_empty() {
        today
    } else {
        parse_iso_date(&fields[4]).map_err(|err| err.to_string())?
    };
    if last_recall > today {
        return Err(format!("last recall {last_recall} is in the future"));
    }

    let total_recalls = if fields[5].is_empty() {
        0
    } else {
        fields[5]
            .parse::<u32>()
            .map_err(|_| format!("invalid recall count `{}`", fields[5]))?
    };

    let mut item = Item::new(id, fields[1].as_str(), fields[2].as_str(), pool, today)
        .map_err(|err| err.to_string())?;
    item.last_recall = last_recall;
    item.total_recalls = total_recalls;
    Ok(item)
}

/// Strips stray quote characters the csv reader leaves inside fields.
fn sanitize(field: &str) -> String {
    field.replace(['"', '\''], "").trim().to_string()
}
