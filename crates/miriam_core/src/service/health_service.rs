//! Facade for the external link checker.

use crate::model::health::{CheckReport, HealthCalendar, ResourceCheckDetails};
use crate::repo::error::{RepoError, RepoResult};
use crate::repo::health_repo::HealthRepository;
use log::info;

pub struct ResourceHealthService<R: HealthRepository> {
    repo: R,
}

impl<R: HealthRepository> ResourceHealthService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Records one check result and returns the updated aggregate.
    ///
    /// The aggregate record is created on the first check of a resource.
    pub fn submit_check(&self, report: &CheckReport) -> RepoResult<ResourceCheckDetails> {
        if self.repo.ensure_check_record(&report.resource_id)? {
            info!(
                "event=health_record_create module=service status=ok resource_id={}",
                report.resource_id
            );
        }
        self.repo.record_check(report)?;
        self.repo
            .check_details(&report.resource_id)?
            .ok_or_else(|| RepoError::NotFound(report.resource_id.clone()))
    }

    pub fn reliability(&self, resource_id: &str) -> RepoResult<u8> {
        self.repo.reliability(resource_id)
    }

    pub fn calendar(&self, resource_id: &str) -> RepoResult<HealthCalendar> {
        self.repo.history(resource_id)
    }
}
