//! Draft collections flowing through the curation pipeline.
//!
//! # Responsibility
//! - Pair a collection with its curation metadata.
//! - Define the curation state machine.
//!
//! # Invariants
//! - New submissions start in `Submitted`.
//! - `Published` is terminal and is only reached through promotion.
//! - `public_id` is set exactly when the state is `Published`.

use super::collection::DataCollection;
use super::identifier::CollectionId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

pub const NEW_SUBMISSION_COMMENT: &str = "New submission";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CurationState {
    Submitted,
    Curation,
    Pending,
    Canceled,
    Published,
}

impl CurationState {
    pub const ALL: [CurationState; 5] = [
        Self::Submitted,
        Self::Curation,
        Self::Pending,
        Self::Canceled,
        Self::Published,
    ];

    /// States counted as open work for curators.
    pub const ACTIVE: [CurationState; 3] = [Self::Submitted, Self::Curation, Self::Pending];

    /// Stored form in `cura_material.state`.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Submitted => "Submitted",
            Self::Curation => "Curation",
            Self::Pending => "Pending",
            Self::Canceled => "Canceled",
            Self::Published => "Published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_str().eq_ignore_ascii_case(value.trim()))
    }

    pub fn is_active(self) -> bool {
        Self::ACTIVE.contains(&self)
    }

    /// Whether a curator may move a draft from `self` to `target` by a plain
    /// state update. Promotion to `Published` is never a plain update.
    pub fn can_transition_to(self, target: CurationState) -> bool {
        match (self, target) {
            (Self::Published, _) | (_, Self::Published) | (_, Self::Submitted) => false,
            (from, to) => from != to,
        }
    }
}

impl Display for CurationState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A draft collection with its curation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CuraDataType {
    pub collection: DataCollection,
    pub state: CurationState,
    pub comment: String,
    /// Free-text information about the submitter.
    pub sub_info: String,
    /// Published collection id once promoted.
    pub public_id: Option<CollectionId>,
}

impl CuraDataType {
    /// Wraps a collection as a fresh submission.
    pub fn submitted(collection: DataCollection, sub_info: impl Into<String>) -> Self {
        Self {
            collection,
            state: CurationState::Submitted,
            comment: NEW_SUBMISSION_COMMENT.to_string(),
            sub_info: sub_info.into(),
            public_id: None,
        }
    }

    pub fn draft_id(&self) -> Option<&str> {
        self.collection.id.as_deref()
    }

    pub fn is_published(&self) -> bool {
        self.state == CurationState::Published || self.public_id.is_some()
    }
}

/// Listing row for the curation queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DraftSummary {
    pub id: CollectionId,
    pub name: String,
    pub definition: String,
    pub state: CurationState,
    /// Epoch ms of submission.
    pub submitted_at: i64,
    pub public_id: Option<CollectionId>,
}
