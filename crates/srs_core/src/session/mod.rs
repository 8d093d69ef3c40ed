//! File-backed session state: the working selection and completed staging.
//!
//! # Responsibility
//! - Persist the ids queued for the current recall session.
//! - Persist completed-but-uncommitted recalls with their pending metadata.
//!
//! # Invariants
//! - Every mutation rewrites the whole backing file before returning.
//! - Reads after a successful mutation reflect the written value.
//! - Files are rewritten in place, not via temp-file rename; a crash
//!   mid-write can truncate them.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;

pub mod completed_set;
mod set_file;
pub mod working_set;

pub type SessionResult<T> = Result<T, SessionError>;

/// Fatal errors from session file access.
#[derive(Debug)]
pub enum SessionError {
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Backing file exists but cannot be parsed.
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl Display for SessionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "session file `{}` i/o failed: {source}", path.display())
            }
            Self::Malformed {
                path,
                line,
                message,
            } => write!(
                f,
                "session file `{}` malformed at line {line}: {message}",
                path.display()
            ),
        }
    }
}

impl Error for SessionError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Malformed { .. } => None,
        }
    }
}
