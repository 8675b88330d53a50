//! Restriction vocabulary and per-collection restrictions.
//!
//! # Invariants
//! - Adding a restriction flags its collection restricted in the same
//!   transaction; removing the last one clears the flag.

use super::error::{RepoError, RepoResult};
use super::facets;
use super::schema::Schema;
use crate::db::ensure_registry_ready;
use crate::model::restriction::{Restriction, RestrictionType};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};

pub trait RestrictionRepository {
    /// Restriction categories ordered by short description.
    fn categories(&self) -> RepoResult<Vec<RestrictionType>>;
    fn restriction_type(&self, id: i64) -> RepoResult<Option<RestrictionType>>;
    fn list(&self, schema: Schema, collection_id: &str) -> RepoResult<Vec<Restriction>>;
    /// Attaches a restriction and returns its storage id.
    fn add(&self, schema: Schema, collection_id: &str, restriction: &Restriction) -> RepoResult<i64>;
    fn remove(&self, schema: Schema, collection_id: &str, restriction_id: i64) -> RepoResult<()>;
}

pub struct SqliteRestrictionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteRestrictionRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_registry_ready(conn)?;
        Ok(Self { conn })
    }
}

impl RestrictionRepository for SqliteRestrictionRepository<'_> {
    fn categories(&self) -> RepoResult<Vec<RestrictionType>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, short_desc, long_desc
             FROM mir_restriction_type
             ORDER BY short_desc ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(RestrictionType {
                id: row.get(0)?,
                short_desc: row.get(1)?,
                long_desc: row.get(2)?,
            })
        })?;
        let categories = rows.collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(categories)
    }

    fn restriction_type(&self, id: i64) -> RepoResult<Option<RestrictionType>> {
        let category = self
            .conn
            .query_row(
                "SELECT id, short_desc, long_desc FROM mir_restriction_type WHERE id = ?1;",
                [id],
                |row| {
                    Ok(RestrictionType {
                        id: row.get(0)?,
                        short_desc: row.get(1)?,
                        long_desc: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(category)
    }

    fn list(&self, schema: Schema, collection_id: &str) -> RepoResult<Vec<Restriction>> {
        facets::load_restrictions(self.conn, schema, collection_id)
    }

    fn add(&self, schema: Schema, collection_id: &str, restriction: &Restriction) -> RepoResult<i64> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        facets::set_restricted_flag(&tx, schema, collection_id, true)?;
        let id = facets::insert_restriction(&tx, schema, collection_id, restriction)?;
        tx.commit()?;

        info!(
            "event=restriction_add module=repo status=ok schema={} collection_id={} kind={}",
            schema,
            collection_id,
            restriction.kind.code()
        );
        Ok(id)
    }

    fn remove(&self, schema: Schema, collection_id: &str, restriction_id: i64) -> RepoResult<()> {
        let table = schema.tables().restriction;
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let removed = tx.execute(
            &format!("DELETE FROM {table} WHERE id = ?1 AND ptr_datatype = ?2;"),
            params![restriction_id, collection_id],
        )?;
        if removed == 0 {
            return Err(RepoError::NotFound(format!(
                "restriction {restriction_id} of {collection_id}"
            )));
        }
        let remaining: i64 = tx.query_row(
            &format!("SELECT COUNT(*) FROM {table} WHERE ptr_datatype = ?1;"),
            [collection_id],
            |row| row.get(0),
        )?;
        if remaining == 0 {
            facets::set_restricted_flag(&tx, schema, collection_id, false)?;
        }
        tx.commit()?;
        Ok(())
    }
}
