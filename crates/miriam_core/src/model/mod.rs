//! Registry domain model.
//!
//! # Responsibility
//! - Define the value types shared by the published registry, the curation
//!   pipeline and resource health tracking.
//! - Keep validation and comparison rules free of storage concerns.
//!
//! # Invariants
//! - Published and draft collections share one shape (`DataCollection`);
//!   curation metadata is attached by composition (`CuraDataType`).

pub mod account;
pub mod collection;
pub mod collection_diff;
pub mod curation;
pub mod health;
pub mod identifier;
pub mod resource;
pub mod restriction;
pub mod web_service;
