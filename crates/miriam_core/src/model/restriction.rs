//! Usage restrictions attached to collections.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Restriction categories seeded in `mir_restriction_type`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestrictionKind {
    NonStandardIdentifier,
    Registration,
    AccessRestriction,
    Licence,
    Aggregation,
}

impl RestrictionKind {
    pub const ALL: [RestrictionKind; 5] = [
        Self::NonStandardIdentifier,
        Self::Registration,
        Self::AccessRestriction,
        Self::Licence,
        Self::Aggregation,
    ];

    /// Primary key in `mir_restriction_type`.
    pub fn code(self) -> i64 {
        match self {
            Self::NonStandardIdentifier => 1,
            Self::Registration => 2,
            Self::AccessRestriction => 3,
            Self::Licence => 4,
            Self::Aggregation => 5,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.code() == code)
    }
}

impl Display for RestrictionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            Self::NonStandardIdentifier => "non-standard identifier",
            Self::Registration => "registration",
            Self::AccessRestriction => "access restriction",
            Self::Licence => "licence",
            Self::Aggregation => "aggregation",
        };
        f.write_str(label)
    }
}

/// One row of the restriction category vocabulary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestrictionType {
    pub id: i64,
    pub short_desc: String,
    pub long_desc: String,
}

/// A restriction applying to one collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Restriction {
    /// Storage id, `None` before insertion.
    #[serde(default)]
    pub id: Option<i64>,
    pub kind: RestrictionKind,
    #[serde(default)]
    pub info: String,
    #[serde(default)]
    pub link: Option<String>,
    #[serde(default)]
    pub link_text: Option<String>,
}

impl Restriction {
    pub fn new(kind: RestrictionKind, info: impl Into<String>) -> Self {
        Self {
            id: None,
            kind,
            info: info.into(),
            link: None,
            link_text: None,
        }
    }

    /// Compares everything but the storage id.
    pub fn has_same_content(&self, other: &Restriction) -> bool {
        self.kind == other.kind
            && self.info == other.info
            && self.link == other.link
            && self.link_text == other.link_text
    }
}

#[cfg(test)]
mod tests {
    use super::RestrictionKind;

    #[test]
    fn codes_round_trip_through_vocabulary() {
        for kind in RestrictionKind::ALL {
            assert_eq!(RestrictionKind::from_code(kind.code()), Some(kind));
        }
        assert_eq!(RestrictionKind::from_code(0), None);
        assert_eq!(RestrictionKind::AccessRestriction.code(), 3);
    }
}
