//! Curation pipeline repository.
//!
//! # Responsibility
//! - Store, retrieve and rewrite draft collections (`cura_*`) with their
//!   curation metadata (`cura_material`).
//! - Promote a draft into the published schema.
//!
//! # Invariants
//! - Submission, update and promotion are each one IMMEDIATE transaction:
//!   uniqueness checks, identifier allocation and every insert commit
//!   together or not at all.
//! - Draft reads tolerate facet failures, curation metadata included (logged,
//!   facet empty); only the main lookup decides whether a draft exists.
//! - Promotion copies a strict reload of the draft taken inside its
//!   transaction.
//! - A promoted draft keeps its rows, moves to `Published` and records the
//!   public id.

use super::collection_repo::store_published;
use super::error::{RepoError, RepoResult, WriteReport};
use super::facets::{self, FacetPolicy};
use super::id_generator::next_identifier;
use super::schema::Schema;
use super::uniqueness::{find_conflict, UniquenessConflict, UniquenessScope};
use crate::db::ensure_registry_ready;
use crate::model::collection::DataCollection;
use crate::model::curation::{CuraDataType, CurationState, DraftSummary, NEW_SUBMISSION_COMMENT};
use crate::model::identifier::{CollectionId, IdKind};
use log::info;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use serde::Serialize;

/// Result of promoting a draft.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PublishReceipt {
    pub draft_id: CollectionId,
    pub public_id: CollectionId,
    /// Steps of the published-schema write plus the curation state update.
    pub report: WriteReport,
}

pub trait CurationRepository {
    /// Stores a new draft in `Submitted` state.
    ///
    /// # Errors
    /// - [`RepoError::DuplicateName`] when the name, a synonym or a URI is
    ///   already used anywhere in the registry.
    fn submit(&self, collection: &DataCollection, sub_info: &str) -> RepoResult<WriteReport>;
    /// Loads a draft with its facets and curation metadata.
    fn retrieve(&self, draft_id: &str) -> RepoResult<Option<CuraDataType>>;
    /// Rewrites `old` with the content of `new`.
    fn update(&self, new: &CuraDataType, old: &CuraDataType) -> RepoResult<WriteReport>;
    fn find_conflict(
        &self,
        candidate: &DataCollection,
        scope: UniquenessScope,
    ) -> RepoResult<Option<UniquenessConflict>>;
    fn exists_by_id(&self, draft_id: &str) -> RepoResult<bool>;
    fn state(&self, draft_id: &str) -> RepoResult<Option<CurationState>>;
    /// Stores a new state, keeping the comment when `comment` is `None`.
    fn set_state(
        &self,
        draft_id: &str,
        state: CurationState,
        comment: Option<&str>,
    ) -> RepoResult<()>;
    /// Drafts ordered by submission date, optionally filtered by state.
    fn list_drafts(&self, state: Option<CurationState>) -> RepoResult<Vec<DraftSummary>>;
    /// Drafts in `Submitted`, `Curation` or `Pending`.
    fn count_active_drafts(&self) -> RepoResult<u64>;
    /// Resources of active drafts.
    fn count_active_resources(&self) -> RepoResult<u64>;
    fn touch(&self, draft_id: &str) -> RepoResult<()>;
    fn set_restricted(&self, draft_id: &str) -> RepoResult<()>;
    /// Copies the draft into the published schema and marks it `Published`.
    ///
    /// # Errors
    /// - [`RepoError::AlreadyPublished`] on a second promotion.
    /// - [`RepoError::DuplicateName`] when the published registry already
    ///   holds the name, a synonym or a URI.
    fn publish(&self, draft_id: &str) -> RepoResult<PublishReceipt>;

    fn exists(&self, candidate: &DataCollection, scope: UniquenessScope) -> RepoResult<bool> {
        Ok(self.find_conflict(candidate, scope)?.is_some())
    }
}

/// SQLite-backed curation repository.
pub struct SqliteCurationRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteCurationRepository<'conn> {
    /// Creates repository from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_registry_ready(conn)?;
        Ok(Self { conn })
    }
}

const MATERIAL_SELECT_SQL: &str = "SELECT comment, state, sub_info, public_id
 FROM cura_material
 WHERE ptr_datatype = ?1;";

impl CurationRepository for SqliteCurationRepository<'_> {
    fn submit(&self, collection: &DataCollection, sub_info: &str) -> RepoResult<WriteReport> {
        collection.validate()?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        if let Some(conflict) = find_conflict(&tx, collection, UniquenessScope::Registry)? {
            return Err(RepoError::DuplicateName(conflict));
        }
        let draft_id = next_identifier(&tx, IdKind::DraftCollection)?;
        let mut report = WriteReport::new(draft_id.clone());

        facets::insert_collection(&tx, Schema::Draft, &draft_id, collection, &mut report)?;
        report.run("curation_state", || {
            let rows = tx.execute(
                "INSERT INTO cura_material (ptr_datatype, comment, state, sub_info, public_id)
                 VALUES (?1, ?2, ?3, ?4, '');",
                params![
                    draft_id,
                    NEW_SUBMISSION_COMMENT,
                    CurationState::Submitted.as_str(),
                    sub_info
                ],
            )?;
            Ok(rows)
        })?;
        tx.commit()?;

        info!(
            "event=draft_submit module=repo status=ok draft_id={} resources={}",
            draft_id,
            collection.resources.len()
        );
        Ok(report)
    }

    fn retrieve(&self, draft_id: &str) -> RepoResult<Option<CuraDataType>> {
        let Some(collection) =
            facets::load_collection(self.conn, Schema::Draft, draft_id, FacetPolicy::Tolerant)?
        else {
            return Ok(None);
        };

        let material = facets::facet(
            FacetPolicy::Tolerant,
            Schema::Draft,
            draft_id,
            "curation_state",
            load_material(self.conn, draft_id).and_then(|material| {
                material.ok_or_else(|| {
                    RepoError::InvalidData(format!("draft {draft_id} has no curation record"))
                })
            }),
        )?;

        Ok(Some(CuraDataType {
            collection,
            state: material.state,
            comment: material.comment,
            sub_info: material.sub_info,
            public_id: material.public_id,
        }))
    }

    fn update(&self, new: &CuraDataType, old: &CuraDataType) -> RepoResult<WriteReport> {
        new.collection.validate()?;
        let draft_id = old
            .draft_id()
            .ok_or_else(|| RepoError::InvalidData("draft to update has no id".to_string()))?;

        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        let mut report = WriteReport::new(draft_id);
        facets::update_collection(
            &tx,
            Schema::Draft,
            draft_id,
            &new.collection,
            &old.collection,
            &mut report,
        )?;
        report.run("curation_state", || {
            let rows = tx.execute(
                "UPDATE cura_material
                 SET comment = ?2,
                     state = ?3,
                     sub_info = ?4
                 WHERE ptr_datatype = ?1;",
                params![draft_id, new.comment, new.state.as_str(), new.sub_info],
            )?;
            if rows == 0 {
                return Err(RepoError::NotFound(draft_id.to_string()));
            }
            Ok(rows)
        })?;
        tx.commit()?;

        info!(
            "event=draft_update module=repo status=ok draft_id={} state={}",
            draft_id, new.state
        );
        Ok(report)
    }

    fn find_conflict(
        &self,
        candidate: &DataCollection,
        scope: UniquenessScope,
    ) -> RepoResult<Option<UniquenessConflict>> {
        find_conflict(self.conn, candidate, scope)
    }

    fn exists_by_id(&self, draft_id: &str) -> RepoResult<bool> {
        let exists: i64 = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM cura_datatype WHERE datatype_id = ?1);",
            [draft_id],
            |row| row.get(0),
        )?;
        Ok(exists == 1)
    }

    fn state(&self, draft_id: &str) -> RepoResult<Option<CurationState>> {
        load_state(self.conn, draft_id)
    }

    fn set_state(
        &self,
        draft_id: &str,
        state: CurationState,
        comment: Option<&str>,
    ) -> RepoResult<()> {
        let changed = self.conn.execute(
            "UPDATE cura_material
             SET state = ?2,
                 comment = COALESCE(?3, comment)
             WHERE ptr_datatype = ?1;",
            params![draft_id, state.as_str(), comment],
        )?;
        if changed == 0 {
            return Err(RepoError::NotFound(draft_id.to_string()));
        }
        info!(
            "event=draft_state module=repo status=ok draft_id={} state={}",
            draft_id, state
        );
        Ok(())
    }

    fn list_drafts(&self, state: Option<CurationState>) -> RepoResult<Vec<DraftSummary>> {
        let mut stmt = self.conn.prepare(
            "SELECT d.datatype_id, d.name, d.definition, m.state, d.date_creation, m.public_id
             FROM cura_datatype d
             JOIN cura_material m ON m.ptr_datatype = d.datatype_id
             WHERE ?1 IS NULL OR m.state = ?1
             ORDER BY d.date_creation ASC, d.datatype_id ASC;",
        )?;
        let mut rows = stmt.query([state.map(CurationState::as_str)])?;
        let mut items = Vec::new();
        while let Some(row) = rows.next()? {
            items.push(parse_summary_row(row)?);
        }
        Ok(items)
    }

    fn count_active_drafts(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM cura_material
             WHERE state IN ('Submitted', 'Curation', 'Pending');",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn count_active_resources(&self) -> RepoResult<u64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*)
             FROM cura_resource r
             JOIN cura_material m ON m.ptr_datatype = r.ptr_datatype
             WHERE m.state IN ('Submitted', 'Curation', 'Pending');",
            [],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as u64)
    }

    fn touch(&self, draft_id: &str) -> RepoResult<()> {
        facets::touch_collection(self.conn, Schema::Draft, draft_id)
    }

    fn set_restricted(&self, draft_id: &str) -> RepoResult<()> {
        facets::set_restricted_flag(self.conn, Schema::Draft, draft_id, true)
    }

    fn publish(&self, draft_id: &str) -> RepoResult<PublishReceipt> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;

        let current = load_material(&tx, draft_id)?
            .ok_or_else(|| RepoError::NotFound(draft_id.to_string()))?;
        if current.state == CurationState::Published {
            return Err(RepoError::AlreadyPublished {
                draft_id: draft_id.to_string(),
                public_id: current.public_id,
            });
        }

        let collection =
            facets::load_collection(&tx, Schema::Draft, draft_id, FacetPolicy::Strict)?
                .ok_or_else(|| RepoError::NotFound(draft_id.to_string()))?;
        collection.validate()?;
        if let Some(conflict) = find_conflict(&tx, &collection, UniquenessScope::Published)? {
            return Err(RepoError::DuplicateName(conflict));
        }

        let mut report = store_published(&tx, &collection)?;
        let public_id = report.target_id.clone();
        report.run("curation_state", || {
            let rows = tx.execute(
                "UPDATE cura_material
                 SET state = ?2,
                     public_id = ?3
                 WHERE ptr_datatype = ?1;",
                params![draft_id, CurationState::Published.as_str(), public_id],
            )?;
            Ok(rows)
        })?;
        tx.commit()?;

        info!(
            "event=draft_publish module=repo status=ok draft_id={} public_id={}",
            draft_id, public_id
        );
        Ok(PublishReceipt {
            draft_id: draft_id.to_string(),
            public_id,
            report,
        })
    }
}

struct MaterialRow {
    comment: String,
    state: CurationState,
    sub_info: String,
    public_id: Option<String>,
}

impl Default for MaterialRow {
    fn default() -> Self {
        Self {
            comment: String::new(),
            state: CurationState::Submitted,
            sub_info: String::new(),
            public_id: None,
        }
    }
}

fn load_material(conn: &Connection, draft_id: &str) -> RepoResult<Option<MaterialRow>> {
    conn.query_row(MATERIAL_SELECT_SQL, [draft_id], parse_material_row)
        .optional()?
        .transpose()
}

/// Outer error is SQLite, inner error is a corrupt state value.
fn parse_material_row(row: &Row<'_>) -> rusqlite::Result<RepoResult<MaterialRow>> {
    let comment: String = row.get(0)?;
    let state: String = row.get(1)?;
    let sub_info: String = row.get(2)?;
    let public_id: String = row.get(3)?;
    Ok(parse_state(&state).map(|state| MaterialRow {
        comment,
        state,
        sub_info,
        public_id: Some(public_id).filter(|value| !value.is_empty()),
    }))
}

fn load_state(conn: &Connection, draft_id: &str) -> RepoResult<Option<CurationState>> {
    let state: Option<String> = conn
        .query_row(
            "SELECT state FROM cura_material WHERE ptr_datatype = ?1;",
            [draft_id],
            |row| row.get(0),
        )
        .optional()?;
    state.as_deref().map(parse_state).transpose()
}

fn parse_state(value: &str) -> RepoResult<CurationState> {
    CurationState::parse(value)
        .ok_or_else(|| RepoError::InvalidData(format!("invalid curation state: {value}")))
}

fn parse_summary_row(row: &Row<'_>) -> RepoResult<DraftSummary> {
    let state: String = row.get(3)?;
    let public_id: String = row.get(5)?;
    Ok(DraftSummary {
        id: row.get(0)?,
        name: row.get(1)?,
        definition: row.get(2)?,
        state: parse_state(&state)?,
        submitted_at: row.get(4)?,
        public_id: Some(public_id).filter(|value| !value.is_empty()),
    })
}
