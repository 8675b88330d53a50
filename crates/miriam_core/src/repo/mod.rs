//! Repository layer over the registry database.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts for published
//!   collections, curation drafts, restrictions and resource health.
//! - Keep SQL details out of the service layer.
//!
//! # Invariants
//! - Multi-table writes run in one IMMEDIATE transaction and either fully
//!   commit or leave no trace.
//! - Repository APIs return semantic errors (`NotFound`, `DuplicateName`,
//!   `IdentifierExhausted`, `WriteFailed`) in addition to transport errors.

pub mod collection_repo;
pub mod curation_repo;
pub mod error;
pub mod facets;
pub mod health_repo;
pub mod id_generator;
pub mod restriction_repo;
pub mod schema;
pub mod uniqueness;
