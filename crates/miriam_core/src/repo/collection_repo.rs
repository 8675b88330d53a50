//! Published collection repository.
//!
//! # Responsibility
//! - CRUD and query operations over the published (`mir_*`) schema.
//! - Deprecation, restriction flag and modification date bookkeeping.
//!
//! # Invariants
//! - Every multi-table write runs inside one IMMEDIATE transaction.
//! - Published collections are never deleted; retirement is `deprecate`.
//! - Resources read through this repository carry computed reliability.

use super::error::{RepoError, RepoResult, WriteReport};
use super::facets::{self, FacetPolicy};
use super::id_generator::next_identifier;
use super::schema::Schema;
use super::uniqueness::{find_conflict, UniquenessConflict, UniquenessScope};
use crate::db::ensure_registry_ready;
use crate::model::collection::DataCollection;
use crate::model::identifier::{CollectionId, IdKind};
use crate::model::resource::Resource;
use log::info;
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

/// Obsolescence filter for listing and counting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ObsoleteFilter {
    #[default]
    Active,
    Obsolete,
    All,
}

impl ObsoleteFilter {
    fn clause(self) -> Option<&'static str> {
        match self {
            Self::Active => Some("obsolete = 0"),
            Self::Obsolete => Some("obsolete = 1"),
            Self::All => None,
        }
    }
}

/// Query options for listing published collections.
#[derive(Debug, Clone, Default)]
pub struct CollectionListQuery {
    /// Case-insensitive name prefix.
    pub name_prefix: Option<String>,
    pub obsolete: ObsoleteFilter,
    pub restricted_only: bool,
    pub limit: Option<u32>,
}

/// Listing row of a published collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CollectionSummary {
    pub id: CollectionId,
    pub name: String,
    pub definition: String,
    pub obsolete: bool,
    pub restricted: bool,
    /// Epoch ms.
    pub date_modification: i64,
}

/// Why and by what a collection was retired.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObsoleteInfo {
    pub obsolete: bool,
    pub comment: Option<String>,
    pub replaced_by: Option<CollectionId>,
}

pub trait CollectionRepository {
    /// Stores a new published collection under a fresh identifier.
    fn create_collection(&self, collection: &DataCollection) -> RepoResult<WriteReport>;
    fn get_collection(&self, id: &str) -> RepoResult<Option<DataCollection>>;
    fn find_id_by_name(&self, name: &str) -> RepoResult<Option<CollectionId>>;
    fn collection_exists(&self, id: &str) -> RepoResult<bool>;
    fn collection_name(&self, id: &str) -> RepoResult<Option<String>>;
    fn list_collections(&self, query: &CollectionListQuery) -> RepoResult<Vec<CollectionSummary>>;
    /// Most recently modified collections first.
    fn recently_updated(&self, limit: u32) -> RepoResult<Vec<CollectionSummary>>;
    fn count_collections(&self, filter: ObsoleteFilter) -> RepoResult<u64>;
    fn count_resources(&self, filter: ObsoleteFilter) -> RepoResult<u64>;
    /// Rewrites `old` with the content of `new`, same id.
    fn update_collection(&self, new: &DataCollection, old: &DataCollection) -> RepoResult<WriteReport>;
    fn deprecate(&self, id: &str, comment: &str, replaced_by: Option<&str>) -> RepoResult<()>;
    fn obsolete_info(&self, id: &str) -> RepoResult<Option<ObsoleteInfo>>;
    fn is_restricted(&self, id: &str) -> RepoResult<bool>;
    fn set_restricted(&self, id: &str) -> RepoResult<()>;
    /// Sets the last-modification date to now.
    fn touch(&self, id: &str) -> RepoResult<()>;
    fn get_resource(&self, resource_id: &str) -> RepoResult<Option<Resource>>;
    fn resources_of(&self, collection_id: &str, include_obsolete: bool) -> RepoResult<Vec<Resource>>;
    fn find_conflict(
        &self,
        candidate: &DataCollection,
        scope: UniquenessScope,
    ) -> RepoResult<Option<UniquenessConflict>>;

    fn exists(&self, candidate: &DataCollection, scope: UniquenessScope) -> RepoResult<bool> {
        Ok(self.find_conflict(candidate, scope)?.is_some())
    }
}

/// SQLite-backed published collection repository.
pub struct SqliteCollectionRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCollectionRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_registry_ready(conn)?;
        Ok(Self { conn })
    }
}

/// Writes `collection` into the published schema under a fresh identifier.
///
/// Runs on the caller's transaction. Resource ids are reallocated in the
/// published space.
pub(crate) fn store_published(
    conn: &Connection,
    collection: &DataCollection,
) -> RepoResult<WriteReport> {
    let id = next_identifier(conn, IdKind::Collection)?;
    let mut report = WriteReport::new(id.clone());
    facets::insert_collection(conn, Schema::Published, &id, collection, &mut report)?;
    Ok(report)
}

const SUMMARY_SELECT_SQL: &str = "SELECT
    datatype_id,
    name,
    definition,
    obsolete,
    restriction,
    date_modif
 FROM mir_datatype";

impl CollectionRepository for SqliteCollectionRepository<'_> {
    fn create_collection(&self, collection: &DataCollection) -> RepoResult<WriteReport> {
        collection.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(conflict) = find_conflict(&tx, collection, UniquenessScope::Published)? {
            return Err(RepoError::DuplicateName(conflict));
        }
        let report = store_published(&tx, collection)?;
        tx.commit()?;

        info!(
            "event=collection_create module=repo status=ok collection_id={}",
            report.target_id
        );
        Ok(report)
    }

    fn get_collection(&self, id: &str) -> RepoResult<Option<DataCollection>> {
        facets::load_collection(self.conn, Schema::Published, id, FacetPolicy::Strict)
    }

    fn find_id_by_name(&self, name: &str) -> RepoResult<Option<CollectionId>> {
        let id = self
            .conn
            .query_row(
                "SELECT datatype_id
                 FROM mir_datatype
                 WHERE name = ?1
                 ORDER BY datatype_id ASC
                 LIMIT 1;",
                [name.trim()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    fn collection_exists(&self, id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM mir_datatype WHERE datatype_id = ?1);",
            [id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn collection_name(&self, id: &str) -> RepoResult<Option<String>> {
        let name = self
            .conn
            .query_row(
                "SELECT name FROM mir_datatype WHERE datatype_id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(name)
    }

    fn list_collections(&self, query: &CollectionListQuery) -> RepoResult<Vec<CollectionSummary>> {
        let mut sql = format!("{SUMMARY_SELECT_SQL} WHERE 1 = 1");
        let mut bind_values: Vec<Value> = Vec::new();

        if let Some(clause) = query.obsolete.clause() {
            sql.push_str(" AND ");
            sql.push_str(clause);
        }
        if query.restricted_only {
            sql.push_str(" AND restriction = 1");
        }
        if let Some(prefix) = query.name_prefix.as_deref().map(str::trim) {
            if !prefix.is_empty() {
                sql.push_str(" AND name LIKE ? ESCAPE '\\'");
                bind_values.push(Value::Text(format!("{}%", escape_like(prefix))));
            }
        }

        sql.push_str(" ORDER BY name COLLATE NOCASE ASC, datatype_id ASC");

        if let Some(limit) = query.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_summary_row(row)?);
        }
        Ok(items)
    }

    fn recently_updated(&self, limit: u32) -> RepoResult<Vec<CollectionSummary>> {
        let mut stmt = self.conn.prepare(&format!(
            "{SUMMARY_SELECT_SQL} ORDER BY date_modif DESC, datatype_id DESC LIMIT ?1;"
        ))?;
        let mut rows = stmt.query([i64::from(limit)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_summary_row(row)?);
        }
        Ok(items)
    }

    fn count_collections(&self, filter: ObsoleteFilter) -> RepoResult<u64> {
        let sql = match filter.clause() {
            Some(clause) => format!("SELECT COUNT(*) FROM mir_datatype WHERE {clause};"),
            None => "SELECT COUNT(*) FROM mir_datatype;".to_string(),
        };
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn count_resources(&self, filter: ObsoleteFilter) -> RepoResult<u64> {
        let sql = match filter.clause() {
            Some(clause) => format!("SELECT COUNT(*) FROM mir_resource WHERE {clause};"),
            None => "SELECT COUNT(*) FROM mir_resource;".to_string(),
        };
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn update_collection(&self, new: &DataCollection, old: &DataCollection) -> RepoResult<WriteReport> {
        new.validate()?;
        let id = old
            .id
            .as_deref()
            .ok_or_else(|| RepoError::InvalidData("collection to update has no id".to_string()))?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(conflict) = find_conflict(&tx, new, UniquenessScope::Published)? {
            return Err(RepoError::DuplicateName(conflict));
        }
        let mut report = WriteReport::new(id);
        facets::update_collection(&tx, Schema::Published, id, new, old, &mut report)?;
        tx.commit()?;

        info!(
            "event=collection_update module=repo status=ok collection_id={} steps={}",
            id,
            report.steps.len()
        );
        Ok(report)
    }

    fn deprecate(&self, id: &str, comment: &str, replaced_by: Option<&str>) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE mir_datatype
             SET obsolete = 1,
                 obsolete_comment = ?2,
                 replacement = ?3,
                 date_modif = (strftime('%s', 'now') * 1000)
             WHERE datatype_id = ?1;",
            params![id, comment, replaced_by],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(id.to_string()));
        }
        info!(
            "event=collection_deprecate module=repo status=ok collection_id={} replaced_by={}",
            id,
            replaced_by.unwrap_or("none")
        );
        Ok(())
    }

    fn obsolete_info(&self, id: &str) -> RepoResult<Option<ObsoleteInfo>> {
        let info = self
            .conn
            .query_row(
                "SELECT obsolete, obsolete_comment, replacement
                 FROM mir_datatype
                 WHERE datatype_id = ?1;",
                [id],
                |row| {
                    Ok(ObsoleteInfo {
                        obsolete: row.get::<_, i64>(0)? == 1,
                        comment: row.get(1)?,
                        replaced_by: row.get(2)?,
                    })
                },
            )
            .optional()?;
        Ok(info)
    }

    fn is_restricted(&self, id: &str) -> RepoResult<bool> {
        let flag: Option<i64> = self
            .conn
            .query_row(
                "SELECT restriction FROM mir_datatype WHERE datatype_id = ?1;",
                [id],
                |row| row.get(0),
            )
            .optional()?;
        flag.map(|flag| flag == 1)
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    fn set_restricted(&self, id: &str) -> RepoResult<()> {
        facets::set_restricted_flag(self.conn, Schema::Published, id, true)
    }

    fn touch(&self, id: &str) -> RepoResult<()> {
        facets::touch_collection(self.conn, Schema::Published, id)
    }

    fn get_resource(&self, resource_id: &str) -> RepoResult<Option<Resource>> {
        facets::load_resource(self.conn, Schema::Published, resource_id)
    }

    fn resources_of(&self, collection_id: &str, include_obsolete: bool) -> RepoResult<Vec<Resource>> {
        let mut resources = facets::load_resources(self.conn, Schema::Published, collection_id)?;
        if !include_obsolete {
            resources.retain(|resource| !resource.obsolete);
        }
        Ok(resources)
    }

    fn find_conflict(
        &self,
        candidate: &DataCollection,
        scope: UniquenessScope,
    ) -> RepoResult<Option<UniquenessConflict>> {
        find_conflict(self.conn, candidate, scope)
    }
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<CollectionSummary> {
    Ok(CollectionSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        definition: row.get(2)?,
        obsolete: row.get::<_, i64>(3)? == 1,
        restricted: row.get::<_, i64>(4)? == 1,
        date_modification: row.get(5)?,
    })
}

fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}
