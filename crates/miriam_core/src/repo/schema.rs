//! Table layout of the two parallel registry schemas.

use crate::model::identifier::IdKind;
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Which copy of the registry an operation targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Schema {
    /// Publicly visible collections (`mir_*`).
    Published,
    /// Collections in curation (`cura_*`).
    Draft,
}

/// Table names of one schema. Column shapes are identical across schemas.
#[derive(Debug)]
pub struct SchemaTables {
    pub datatype: &'static str,
    pub synonym: &'static str,
    pub uri: &'static str,
    pub resource: &'static str,
    pub doc: &'static str,
    pub restriction: &'static str,
}

const PUBLISHED_TABLES: SchemaTables = SchemaTables {
    datatype: "mir_datatype",
    synonym: "mir_synonym",
    uri: "mir_uri",
    resource: "mir_resource",
    doc: "mir_doc",
    restriction: "mir_restriction",
};

const DRAFT_TABLES: SchemaTables = SchemaTables {
    datatype: "cura_datatype",
    synonym: "cura_synonym",
    uri: "cura_uri",
    resource: "cura_resource",
    doc: "cura_doc",
    restriction: "cura_restriction",
};

impl Schema {
    pub fn tables(self) -> &'static SchemaTables {
        match self {
            Self::Published => &PUBLISHED_TABLES,
            Self::Draft => &DRAFT_TABLES,
        }
    }

    pub fn collection_kind(self) -> IdKind {
        match self {
            Self::Published => IdKind::Collection,
            Self::Draft => IdKind::DraftCollection,
        }
    }

    pub fn resource_kind(self) -> IdKind {
        match self {
            Self::Published => IdKind::Resource,
            Self::Draft => IdKind::DraftResource,
        }
    }
}

impl Display for Schema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Published => f.write_str("published"),
            Self::Draft => f.write_str("draft"),
        }
    }
}
