//! SQLite storage entry points for the clinic core.
//!
//! # Responsibility
//! - Open and configure the connections the repositories run on.
//! - Keep the schema at the version this build understands.
//!
//! # Invariants
//! - The applied schema version lives in `PRAGMA user_version`.
//! - No clinic data is read or written before migrations succeed.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the clinic database.
#[derive(Debug)]
pub enum DbError {
    /// Transport or SQL error from the SQLite layer.
    Sqlite(rusqlite::Error),
    /// The file on disk was written by a newer release than this build.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "clinic database is at schema version {db_version}, but this build \
                 only supports up to {latest_supported}; upgrade the application"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
