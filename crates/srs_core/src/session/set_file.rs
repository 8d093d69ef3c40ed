//! Shared on-disk layout for session files.
//!
//! ```text
//! 2025-04-09        <- creation date (ISO)
//! 2                 <- record count
//! 17                <- records, one per line
//! 42
//! ```

use super::{SessionError, SessionResult};
use crate::model::item::{format_iso_date, parse_iso_date};
use chrono::NaiveDate;
use log::warn;
use std::path::Path;

/// Parsed file contents with 1-based line numbers kept for error reporting.
pub(crate) struct SetFile {
    pub created_on: NaiveDate,
    pub records: Vec<(usize, String)>,
}

/// Reads a session file. Returns `None` when the file does not exist.
pub(crate) fn read_set_file(path: &Path) -> SessionResult<Option<SetFile>> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(SessionError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let lines: Vec<&str> = content.lines().collect();
    if lines.len() < 2 {
        return Err(malformed(path, lines.len() + 1, "expected date and count header"));
    }

    let created_on = parse_iso_date(lines[0])
        .map_err(|_| malformed(path, 1, format!("invalid creation date `{}`", lines[0])))?;
    let declared: usize = lines[1]
        .trim()
        .parse()
        .map_err(|_| malformed(path, 2, format!("invalid record count `{}`", lines[1])))?;

    let records: Vec<(usize, String)> = lines
        .iter()
        .enumerate()
        .skip(2)
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| (index + 1, line.trim().to_string()))
        .collect();

    if records.len() != declared {
        warn!(
            "event=set_load module=session status=warn path={} declared={} found={}",
            path.display(),
            declared,
            records.len()
        );
    }

    Ok(Some(SetFile {
        created_on,
        records,
    }))
}

/// Rewrites the whole session file.
pub(crate) fn write_set_file(
    path: &Path,
    created_on: NaiveDate,
    records: &[String],
) -> SessionResult<()> {
    let mut content = String::new();
    content.push_str(&format_iso_date(created_on));
    content.push('\n');
    content.push_str(&records.len().to_string());
    content.push('\n');
    for record in records {
        content.push_str(record);
        content.push('\n');
    }

    std::fs::write(path, content).map_err(|source| SessionError::Io {
        path: path.to_path_buf(),
        source,
    })
}

pub(crate) fn malformed(path: &Path, line: usize, message: impl Into<String>) -> SessionError {
    SessionError::Malformed {
        path: path.to_path_buf(),
        line,
        message: message.into(),
    }
}
