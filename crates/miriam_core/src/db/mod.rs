//! SQLite storage bootstrap for the registry database.
//!
//! # Responsibility
//! - Open and configure connections shared by the published and draft schemas.
//! - Apply schema migrations in deterministic order.
//! - Verify that a connection carries the registry tables before repositories
//!   touch it.
//!
//! # Invariants
//! - Migration version is tracked via `PRAGMA user_version`.
//! - Published tables use the `mir_` prefix, draft tables the `cura_` prefix.
//! - Repositories must not read or write registry data before migrations succeed.

use rusqlite::Connection;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

/// Tables every registry connection must expose after migration.
pub const REGISTRY_TABLES: &[&str] = &[
    "mir_datatype",
    "mir_synonym",
    "mir_uri",
    "mir_resource",
    "mir_doc",
    "mir_restriction_type",
    "mir_restriction",
    "cura_datatype",
    "cura_synonym",
    "cura_uri",
    "cura_resource",
    "cura_doc",
    "cura_restriction",
    "cura_material",
    "mir_url_check",
    "mir_url_history",
];

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    UnsupportedSchemaVersion {
        db_version: u32,
        latest_supported: u32,
    },
    /// Connection was not migrated to the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
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
                "registry schema version {db_version} is newer than supported {latest_supported}"
            ),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "registry requires schema version {expected_version}, got {actual_version}"
            ),
            Self::MissingRequiredTable(table) => {
                write!(f, "registry requires table `{table}`")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::UnsupportedSchemaVersion { .. }
            | Self::UninitializedConnection { .. }
            | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

/// Checks that `conn` is migrated to the latest version and carries every
/// registry table.
pub fn ensure_registry_ready(conn: &Connection) -> DbResult<()> {
    let expected_version = migrations::latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(DbError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for &table in REGISTRY_TABLES {
        let exists: i64 = conn.query_row(
            "SELECT EXISTS(
                SELECT 1
                FROM sqlite_master
                WHERE type = 'table' AND name = ?1
            );",
            [table],
            |row| row.get(0),
        )?;
        if exists != 1 {
            return Err(DbError::MissingRequiredTable(table));
        }
    }

    Ok(())
}
