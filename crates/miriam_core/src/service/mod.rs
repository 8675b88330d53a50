//! Registry use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into curator and checker workflows.
//! - Hold the rules that span several repository calls (uniqueness before
//!   insert, state machine, promotion guard).

pub mod curation_service;
pub mod health_service;
pub mod registry_service;
