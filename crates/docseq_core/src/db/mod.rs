//! SQLite bootstrap for the document/node store.
//!
//! # Responsibility
//! - Open connections configured the way the sequencing engine expects.
//! - Apply schema migrations before any document data is touched.
//!
//! # Invariants
//! - Schema version lives in `PRAGMA user_version`.
//! - `foreign_keys` is on for every returned connection, so deleting a
//!   document cascades to its nodes.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Failures while opening or migrating the document store.
#[derive(Debug)]
pub enum DbError {
    /// Connection could not be opened, or a plain statement failed.
    Sqlite(rusqlite::Error),
    /// A connection setting the engine depends on could not be applied.
    ConnectionSetup {
        setting: &'static str,
        source: rusqlite::Error,
    },
    /// File was written by a build with newer schema steps.
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// One schema step failed; the whole pending batch was rolled back.
    MigrationFailed {
        version: u32,
        name: &'static str,
        source: rusqlite::Error,
    },
}

impl DbError {
    /// Stable code written to `error_code=` in bootstrap log lines.
    pub fn code(&self) -> &'static str {
        match self {
            Self::Sqlite(_) => "db_sqlite_error",
            Self::ConnectionSetup { .. } => "db_setup_failed",
            Self::UnsupportedSchemaVersion { .. } => "db_schema_too_new",
            Self::MigrationFailed { .. } => "db_migration_failed",
        }
    }
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "document store error: {err}"),
            Self::ConnectionSetup { setting, source } => {
                write!(f, "could not apply `{setting}` to the document store: {source}")
            }
            Self::UnsupportedSchemaVersion {
                db_version,
                latest_supported,
            } => write!(
                f,
                "document store schema {db_version} is newer than this build supports ({latest_supported})"
            ),
            Self::MigrationFailed {
                version,
                name,
                source,
            } => write!(f, "schema step {version} ({name}) failed: {source}"),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::ConnectionSetup { source, .. } | Self::MigrationFailed { source, .. } => {
                Some(source)
            }
            Self::UnsupportedSchemaVersion { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
