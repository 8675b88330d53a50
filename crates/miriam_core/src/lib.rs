//! Persistence tier of the MIRIAM identifier registry.
//! This crate is the single source of truth for registry invariants.

pub mod db;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;

pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::collection::{
    CollectionValidationError, DataCollection, DeprecatedUri, DocumentationId, UriKind,
};
pub use model::collection_diff::{diff_collections, CollectionChange, CollectionDiff};
pub use model::curation::{CuraDataType, CurationState, DraftSummary};
pub use model::health::{CheckReport, HealthCalendar, HealthState, ResourceCheckDetails};
pub use model::identifier::{CollectionId, IdKind, ResourceId};
pub use model::resource::{diff_resources, Resource, ResourceDiff};
pub use model::restriction::{Restriction, RestrictionKind, RestrictionType};
pub use repo::collection_repo::{
    CollectionListQuery, CollectionRepository, CollectionSummary, ObsoleteFilter,
    SqliteCollectionRepository,
};
pub use repo::curation_repo::{CurationRepository, PublishReceipt, SqliteCurationRepository};
pub use repo::error::{RepoError, RepoResult, WriteReport, WriteStep};
pub use repo::health_repo::{HealthRepository, SqliteHealthRepository};
pub use repo::restriction_repo::{RestrictionRepository, SqliteRestrictionRepository};
pub use repo::schema::Schema;
pub use repo::uniqueness::{ConflictKind, UniquenessConflict, UniquenessScope};
pub use service::curation_service::{CurationService, CurationServiceError};
pub use service::health_service::ResourceHealthService;
pub use service::registry_service::RegistryService;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::core_version;

    #[test]
    fn version_is_not_empty() {
        assert!(!core_version().is_empty());
    }
}
