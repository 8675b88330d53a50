//! Sequential identifier allocation.
//!
//! # Invariants
//! - The next sequence is `row count + 1` of the kind's table; rows of these
//!   tables are never deleted, so allocated ids stay unique.
//! - Allocation must run inside the write transaction that inserts the row, so
//!   concurrent writers are serialized by the database write lock.
//! - Exhaustion and query failures are errors, never a fallback id.

use super::error::{RepoError, RepoResult};
use crate::model::identifier::{format_identifier, IdKind, MAX_SEQUENCE};
use log::debug;
use rusqlite::Connection;

/// Returns the next free identifier of `kind`.
///
/// # Errors
/// - [`RepoError::IdentifierExhausted`] when the table already holds
///   `MAX_SEQUENCE` rows.
/// - [`RepoError::Db`] when the count query fails.
pub fn next_identifier(conn: &Connection, kind: IdKind) -> RepoResult<String> {
    let count: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM {};", kind.table()),
        [],
        |row| row.get(0),
    )?;

    let sequence = u32::try_from(count + 1)
        .ok()
        .filter(|sequence| *sequence <= MAX_SEQUENCE)
        .ok_or(RepoError::IdentifierExhausted(kind))?;
    let identifier = format_identifier(kind, sequence).ok_or(RepoError::IdentifierExhausted(kind))?;

    debug!(
        "event=id_allocate module=repo status=ok kind={} id={}",
        kind, identifier
    );
    Ok(identifier)
}
