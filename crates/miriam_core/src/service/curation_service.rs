//! Curation workflow service.
//!
//! # Responsibility
//! - Validate and de-duplicate submissions before they enter the pipeline.
//! - Enforce the curation state machine on curator updates.
//! - Promote curated drafts into the published registry.
//!
//! # Invariants
//! - New submissions are unique across drafts and published collections.
//! - Published drafts are frozen: no edits, no state change, no second
//!   promotion.
//! - Promotion requires a valid collection whose name, synonyms and URIs are
//!   free in the published registry.

use crate::model::collection::{CollectionValidationError, DataCollection};
use crate::model::collection_diff::{diff_collections, CollectionDiff};
use crate::model::curation::{CuraDataType, CurationState, DraftSummary};
use crate::repo::curation_repo::{CurationRepository, PublishReceipt};
use crate::repo::error::{RepoError, WriteReport};
use crate::repo::uniqueness::UniquenessConflict;
use log::{info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};

#[derive(Debug)]
pub enum CurationServiceError {
    DraftNotFound(String),
    AlreadyPublished {
        draft_id: String,
        public_id: Option<String>,
    },
    InvalidTransition {
        from: CurationState,
        to: CurationState,
    },
    Duplicate(UniquenessConflict),
    Validation(CollectionValidationError),
    Repo(RepoError),
}

impl Display for CurationServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DraftNotFound(id) => write!(f, "draft not found: {id}"),
            Self::AlreadyPublished {
                draft_id,
                public_id,
            } => write!(
                f,
                "draft {draft_id} is already published as {}",
                public_id.as_deref().unwrap_or("(unknown)")
            ),
            Self::InvalidTransition { from, to } => {
                write!(f, "cannot move draft from {from} to {to}")
            }
            Self::Duplicate(conflict) => write!(f, "duplicate: {conflict}"),
            Self::Validation(err) => write!(f, "invalid collection: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for CurationServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for CurationServiceError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::Validation(err) => Self::Validation(err),
            RepoError::DuplicateName(conflict) => Self::Duplicate(conflict),
            RepoError::AlreadyPublished {
                draft_id,
                public_id,
            } => Self::AlreadyPublished {
                draft_id,
                public_id,
            },
            other => Self::Repo(other),
        }
    }
}

impl From<CollectionValidationError> for CurationServiceError {
    fn from(value: CollectionValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type CurationResult<T> = Result<T, CurationServiceError>;

/// Curation workflow facade.
pub struct CurationService<R: CurationRepository> {
    repo: R,
}

impl<R: CurationRepository> CurationService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    /// Stores a new submission after validation and registry-wide
    /// uniqueness checks.
    pub fn submit(&self, collection: &DataCollection, sub_info: &str) -> CurationResult<WriteReport> {
        collection.validate()?;
        match self.repo.submit(collection, sub_info) {
            Ok(report) => Ok(report),
            Err(RepoError::DuplicateName(conflict)) => {
                warn!(
                    "event=draft_submit module=service status=rejected reason=duplicate kind={:?}",
                    conflict.kind
                );
                Err(CurationServiceError::Duplicate(conflict))
            }
            Err(err) => Err(err.into()),
        }
    }

    pub fn get_draft(&self, draft_id: &str) -> CurationResult<CuraDataType> {
        self.repo
            .retrieve(draft_id)?
            .ok_or_else(|| CurationServiceError::DraftNotFound(draft_id.to_string()))
    }

    pub fn queue(&self, state: Option<CurationState>) -> CurationResult<Vec<DraftSummary>> {
        Ok(self.repo.list_drafts(state)?)
    }

    /// Saves a curator edit of an unpublished draft.
    ///
    /// A state change carried by the edit must be a legal transition.
    pub fn update_draft(&self, draft: &CuraDataType) -> CurationResult<WriteReport> {
        let draft_id = draft
            .draft_id()
            .ok_or_else(|| {
                CurationServiceError::Repo(RepoError::InvalidData("draft has no id".to_string()))
            })?;
        let current = self.get_draft(draft_id)?;
        ensure_unpublished(&current)?;
        if draft.state != current.state && !current.state.can_transition_to(draft.state) {
            return Err(CurationServiceError::InvalidTransition {
                from: current.state,
                to: draft.state,
            });
        }
        draft.collection.validate()?;
        Ok(self.repo.update(draft, &current)?)
    }

    /// Moves a draft to `target`, optionally replacing the curator comment.
    pub fn transition(
        &self,
        draft_id: &str,
        target: CurationState,
        comment: Option<&str>,
    ) -> CurationResult<()> {
        let current = self
            .repo
            .state(draft_id)?
            .ok_or_else(|| CurationServiceError::DraftNotFound(draft_id.to_string()))?;
        if current == CurationState::Published {
            let draft = self.get_draft(draft_id)?;
            return Err(CurationServiceError::AlreadyPublished {
                draft_id: draft_id.to_string(),
                public_id: draft.public_id,
            });
        }
        if !current.can_transition_to(target) {
            return Err(CurationServiceError::InvalidTransition {
                from: current,
                to: target,
            });
        }
        Ok(self.repo.set_state(draft_id, target, comment)?)
    }

    /// Changes a proposed edit would make to the stored draft.
    pub fn diff(&self, draft_id: &str, proposed: &DataCollection) -> CurationResult<CollectionDiff> {
        let current = self.get_draft(draft_id)?;
        Ok(diff_collections(&current.collection, proposed))
    }

    /// Promotes a draft into the published registry.
    ///
    /// # Errors
    /// - [`CurationServiceError::AlreadyPublished`] on a second promotion.
    /// - [`CurationServiceError::InvalidTransition`] for canceled drafts.
    /// - [`CurationServiceError::Duplicate`] when the published registry
    ///   already holds the name, a synonym or a URI.
    pub fn publish(&self, draft_id: &str) -> CurationResult<PublishReceipt> {
        let draft = self.get_draft(draft_id)?;
        ensure_unpublished(&draft)?;
        if draft.state == CurationState::Canceled {
            return Err(CurationServiceError::InvalidTransition {
                from: CurationState::Canceled,
                to: CurationState::Published,
            });
        }

        let receipt = self.repo.publish(draft_id)?;
        info!(
            "event=draft_publish module=service status=ok draft_id={} public_id={} steps={}",
            receipt.draft_id,
            receipt.public_id,
            receipt.report.steps.len()
        );
        Ok(receipt)
    }

    /// Open curation work: active drafts and their resources.
    pub fn workload(&self) -> CurationResult<(u64, u64)> {
        Ok((
            self.repo.count_active_drafts()?,
            self.repo.count_active_resources()?,
        ))
    }
}

fn ensure_unpublished(draft: &CuraDataType) -> CurationResult<()> {
    if draft.is_published() {
        return Err(CurationServiceError::AlreadyPublished {
            draft_id: draft.draft_id().unwrap_or_default().to_string(),
            public_id: draft.public_id.clone(),
        });
    }
    Ok(())
}
