//! Resource model and differencing.
//!
//! # Responsibility
//! - Describe one physical access point of a data collection.
//! - Classify resources of an edited collection into unchanged, added and
//!   removed sets.
//!
//! # Invariants
//! - Two resources are the same entity only when both carry the same id.
//! - A resource without id is new; it never matches a stored resource.
//! - `reliability` is computed from health counters and never persisted.

use super::identifier::ResourceId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Minimum number of matching attributes for two resources to be considered
/// the same physical resource when ids cannot be compared.
pub const SIMILARITY_THRESHOLD: usize = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Resource {
    /// `None` until the repository allocates an identifier.
    pub id: Option<ResourceId>,
    /// Text placed before the entity identifier in access URLs.
    pub url_prefix: String,
    /// Text placed after the entity identifier in access URLs.
    pub url_suffix: String,
    /// Home page of the resource.
    pub url_root: String,
    pub info: String,
    pub institution: String,
    pub location: String,
    /// Sample entity identifier valid for this resource.
    pub example: String,
    pub obsolete: bool,
    /// Preferred resource of its collection.
    pub primary: bool,
    /// Uptime percentage, filled on published reads only.
    #[serde(skip_deserializing)]
    pub reliability: Option<u8>,
}

impl Resource {
    /// Builds an unsaved resource from its access URL parts.
    pub fn new(
        url_prefix: impl Into<String>,
        url_suffix: impl Into<String>,
        url_root: impl Into<String>,
    ) -> Self {
        Self {
            url_prefix: url_prefix.into(),
            url_suffix: url_suffix.into(),
            url_root: url_root.into(),
            ..Self::default()
        }
    }

    /// Identity comparison by id.
    pub fn is_same(&self, other: &Resource) -> bool {
        matches!((&self.id, &other.id), (Some(left), Some(right)) if left == right)
    }

    /// Full attribute comparison, including id and excluding `reliability`.
    pub fn has_same_content(&self, other: &Resource) -> bool {
        self.id == other.id
            && self.url_prefix == other.url_prefix
            && self.url_suffix == other.url_suffix
            && self.url_root == other.url_root
            && self.info == other.info
            && self.institution == other.institution
            && self.location == other.location
            && self.example == other.example
            && self.obsolete == other.obsolete
            && self.primary == other.primary
    }

    /// Heuristic match used when ids are not comparable.
    ///
    /// Counts equal attributes among prefix, suffix, root URL, info,
    /// institution, location and obsolete flag.
    pub fn could_be_similar(&self, other: &Resource) -> bool {
        let matches = [
            self.url_prefix == other.url_prefix,
            self.url_suffix == other.url_suffix,
            self.url_root == other.url_root,
            self.info == other.info,
            self.institution == other.institution,
            self.location == other.location,
            self.obsolete == other.obsolete,
        ]
        .into_iter()
        .filter(|matched| *matched)
        .count();
        matches >= SIMILARITY_THRESHOLD
    }

    /// Access URL for one entity identifier.
    pub fn access_url(&self, entity_id: &str) -> String {
        format!("{}{}{}", self.url_prefix, entity_id, self.url_suffix)
    }

    /// Has the minimum fields required for a valid collection.
    pub fn is_complete(&self) -> bool {
        !self.url_prefix.trim().is_empty() && !self.url_root.trim().is_empty()
    }
}

impl Display for Resource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Resource {}", self.id.as_deref().unwrap_or("(new)"))?;
        writeln!(f, "  prefix: {}", self.url_prefix)?;
        writeln!(f, "  suffix: {}", self.url_suffix)?;
        writeln!(f, "  root: {}", self.url_root)?;
        writeln!(f, "  info: {}", self.info)?;
        writeln!(f, "  institution: {}", self.institution)?;
        writeln!(f, "  location: {}", self.location)?;
        writeln!(f, "  example: {}", self.example)?;
        writeln!(f, "  obsolete: {}", self.obsolete)?;
        write!(f, "  primary: {}", self.primary)
    }
}

/// Classification of a resource list edit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResourceDiff {
    /// Resources of the new list that already carry an id, kept in new-list order.
    pub unchanged: Vec<Resource>,
    /// Resources of the new list without id.
    pub added: Vec<Resource>,
    /// Resources of the old list whose id is absent from the new list.
    pub removed: Vec<Resource>,
}

impl ResourceDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Splits `new` into kept and added resources, and collects `old` resources
/// that disappeared.
pub fn diff_resources(old: &[Resource], new: &[Resource]) -> ResourceDiff {
    let (unchanged, added): (Vec<Resource>, Vec<Resource>) =
        new.iter().cloned().partition(|resource| resource.id.is_some());

    let removed = old
        .iter()
        .filter(|previous| !new.iter().any(|candidate| candidate.is_same(previous)))
        .cloned()
        .collect();

    ResourceDiff {
        unchanged,
        added,
        removed,
    }
}

#[cfg(test)]
mod tests {
    use super::{diff_resources, Resource};

    fn stored(id: &str, prefix: &str) -> Resource {
        Resource {
            id: Some(id.to_string()),
            ..Resource::new(prefix, "", "http://root/")
        }
    }

    #[test]
    fn identity_requires_both_ids() {
        let a = stored("MIR:00100001", "http://a/");
        let b = Resource::new("http://a/", "", "http://root/");
        assert!(a.is_same(&a.clone()));
        assert!(!a.is_same(&b));
        assert!(!b.is_same(&b.clone()));
    }

    #[test]
    fn similarity_needs_four_matching_attributes() {
        let base = Resource {
            info: "info".into(),
            institution: "EBI".into(),
            location: "UK".into(),
            ..Resource::new("http://a/", ".html", "http://a.org/")
        };

        let mut close = base.clone();
        close.url_prefix = "http://b/".into();
        close.url_suffix = String::new();
        close.url_root = "http://b.org/".into();
        assert!(base.could_be_similar(&close));

        close.info = "other".into();
        assert!(!base.could_be_similar(&close));
    }

    #[test]
    fn same_content_ignores_reliability() {
        let a = stored("MIR:00100001", "http://a/");
        let mut b = a.clone();
        b.reliability = Some(80);
        assert!(a.has_same_content(&b));
        b.example = "42".into();
        assert!(!a.has_same_content(&b));
    }

    #[test]
    fn diff_classifies_kept_added_and_removed() {
        let old = vec![stored("MIR:00100001", "http://a/"), stored("MIR:00100002", "http://b/")];
        let mut kept = old[0].clone();
        kept.info = "edited".into();
        let fresh = Resource::new("http://c/", "", "http://c.org/");

        let diff = diff_resources(&old, &[kept.clone(), fresh.clone()]);

        assert_eq!(diff.unchanged, vec![kept]);
        assert_eq!(diff.added, vec![fresh]);
        assert_eq!(diff.removed, vec![old[1].clone()]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn access_url_wraps_identifier() {
        let resource = Resource::new("http://x/", ".xml", "http://x/");
        assert_eq!(resource.access_url("42"), "http://x/42.xml");
    }
}
