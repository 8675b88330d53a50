//! Registry-wide uniqueness of collection names, synonyms and URIs.
//!
//! # Responsibility
//! - Run the six collision checks of a candidate collection against one or
//!   both schemas.
//!
//! # Invariants
//! - Names, synonyms and URIs compare exactly (case-sensitive). Names and
//!   synonyms are trimmed first, the way storage writes them.
//! - A candidate never collides with rows of its own id in the same schema.
//! - Checks run in a fixed order and report the first collision.

use super::error::RepoResult;
use super::schema::Schema;
use crate::model::collection::{non_blank, DataCollection};
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Which schemas a uniqueness check covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniquenessScope {
    Draft,
    Published,
    /// Both drafts and published collections.
    Registry,
}

impl UniquenessScope {
    pub fn schemas(self) -> &'static [Schema] {
        match self {
            Self::Draft => &[Schema::Draft],
            Self::Published => &[Schema::Published],
            Self::Registry => &[Schema::Published, Schema::Draft],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictKind {
    NameMatchesName,
    NameMatchesSynonym,
    SynonymMatchesName,
    SynonymMatchesSynonym,
    UriInUse,
    DeprecatedUriInUse,
}

/// First collision found for a candidate collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniquenessConflict {
    pub kind: ConflictKind,
    /// Candidate value that collided.
    pub value: String,
    pub schema: Schema,
    /// Collection already holding the value.
    pub existing_id: String,
}

impl Display for UniquenessConflict {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let what = match self.kind {
            ConflictKind::NameMatchesName => "name is already the name of",
            ConflictKind::NameMatchesSynonym => "name is already a synonym of",
            ConflictKind::SynonymMatchesName => "synonym is already the name of",
            ConflictKind::SynonymMatchesSynonym => "synonym is already a synonym of",
            ConflictKind::UriInUse => "URI is already used by",
            ConflictKind::DeprecatedUriInUse => "deprecated URI is already used by",
        };
        write!(
            f,
            "`{}` {what} {} collection {}",
            self.value, self.schema, self.existing_id
        )
    }
}

/// Returns the first collision of `candidate` within `scope`.
pub fn find_conflict(
    conn: &Connection,
    candidate: &DataCollection,
    scope: UniquenessScope,
) -> RepoResult<Option<UniquenessConflict>> {
    let own_id = candidate.id.as_deref().unwrap_or("");

    for schema in scope.schemas() {
        let tables = schema.tables();
        let conflict = |kind: ConflictKind, value: &str, existing_id: String| UniquenessConflict {
            kind,
            value: value.to_string(),
            schema: *schema,
            existing_id,
        };

        let name_sql = format!(
            "SELECT datatype_id FROM {} WHERE name = ?1 AND datatype_id <> ?2 LIMIT 1;",
            tables.datatype
        );
        let synonym_sql = format!(
            "SELECT ptr_datatype FROM {} WHERE name = ?1 AND ptr_datatype <> ?2 LIMIT 1;",
            tables.synonym
        );
        let uri_sql = format!(
            "SELECT ptr_datatype FROM {} WHERE uri = ?1 AND ptr_datatype <> ?2 LIMIT 1;",
            tables.uri
        );

        let name = candidate.name.trim();
        if let Some(existing) = lookup(conn, &name_sql, name, own_id)? {
            return Ok(Some(conflict(ConflictKind::NameMatchesName, name, existing)));
        }
        if let Some(existing) = lookup(conn, &synonym_sql, name, own_id)? {
            return Ok(Some(conflict(ConflictKind::NameMatchesSynonym, name, existing)));
        }

        let synonyms = candidate.synonyms.iter().map(|value| value.trim());
        for synonym in synonyms.clone() {
            if let Some(existing) = lookup(conn, &name_sql, synonym, own_id)? {
                return Ok(Some(conflict(ConflictKind::SynonymMatchesName, synonym, existing)));
            }
        }
        for synonym in synonyms {
            if let Some(existing) = lookup(conn, &synonym_sql, synonym, own_id)? {
                return Ok(Some(conflict(
                    ConflictKind::SynonymMatchesSynonym,
                    synonym,
                    existing,
                )));
            }
        }

        let official = non_blank(candidate.url.as_deref())
            .into_iter()
            .chain(non_blank(candidate.urn.as_deref()));
        for uri in official {
            if let Some(existing) = lookup(conn, &uri_sql, uri, own_id)? {
                return Ok(Some(conflict(ConflictKind::UriInUse, uri, existing)));
            }
        }
        for deprecated in &candidate.deprecated_uris {
            if let Some(existing) = lookup(conn, &uri_sql, &deprecated.uri, own_id)? {
                return Ok(Some(conflict(
                    ConflictKind::DeprecatedUriInUse,
                    &deprecated.uri,
                    existing,
                )));
            }
        }
    }

    Ok(None)
}

fn lookup(conn: &Connection, sql: &str, value: &str, own_id: &str) -> RepoResult<Option<String>> {
    if value.is_empty() {
        return Ok(None);
    }
    let existing = conn
        .query_row(sql, params![value, own_id], |row| row.get::<_, String>(0))
        .optional()?;
    Ok(existing)
}
