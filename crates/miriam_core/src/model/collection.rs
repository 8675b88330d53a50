//! Data collection aggregate.
//!
//! # Responsibility
//! - Define the shared shape of published and draft collections.
//! - Enforce the completeness rules a collection must meet before it is
//!   stored or promoted.
//!
//! # Invariants
//! - A valid collection has a name, definition and pattern, at least one of
//!   official URL/URN, and at least one resource with prefix and root.
//! - Patterns are stored verbatim; they may use syntax the `regex` crate
//!   cannot compile, such as look-around.
//! - A replacement id is only meaningful on an obsolete collection.
//! - Each URI (official or deprecated) identifies at most one collection; the
//!   repository layer enforces this across the registry.

use super::identifier::CollectionId;
use super::resource::Resource;
use super::restriction::{Restriction, RestrictionKind};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Kind of a collection-level URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UriKind {
    Url,
    Urn,
}

impl UriKind {
    /// Infers the kind from the URI text.
    pub fn classify(uri: &str) -> Self {
        if uri.trim_start().to_ascii_lowercase().starts_with("urn:") {
            Self::Urn
        } else {
            Self::Url
        }
    }
}

/// Former URI of a collection, kept resolvable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeprecatedUri {
    pub uri: String,
    pub kind: UriKind,
}

impl DeprecatedUri {
    pub fn new(uri: impl Into<String>) -> Self {
        let uri = uri.into();
        let kind = UriKind::classify(&uri);
        Self { uri, kind }
    }
}

/// Typed documentation reference such as a PubMed or DOI identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentationId {
    pub id: String,
    /// Identifier scheme, e.g. `PMID` or `DOI`.
    pub id_type: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataCollection {
    /// `None` until the repository allocates an identifier.
    pub id: Option<CollectionId>,
    pub name: String,
    pub synonyms: Vec<String>,
    /// Official URL form of the collection URI.
    pub url: Option<String>,
    /// Official URN form of the collection URI.
    pub urn: Option<String>,
    pub deprecated_uris: Vec<DeprecatedUri>,
    pub definition: String,
    /// Regular expression every entity identifier must match.
    pub pattern: String,
    pub resources: Vec<Resource>,
    pub documentation_urls: Vec<String>,
    pub documentation_ids: Vec<DocumentationId>,
    pub restrictions: Vec<Restriction>,
    pub obsolete: bool,
    pub obsolete_comment: Option<String>,
    pub replaced_by: Option<CollectionId>,
    /// Set once any restriction was recorded for the collection.
    pub restricted: bool,
    /// Epoch ms, assigned by storage.
    #[serde(skip_deserializing)]
    pub date_creation: Option<i64>,
    /// Epoch ms, assigned by storage.
    #[serde(skip_deserializing)]
    pub date_modification: Option<i64>,
}

impl DataCollection {
    pub fn new(
        name: impl Into<String>,
        definition: impl Into<String>,
        pattern: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            definition: definition.into(),
            pattern: pattern.into(),
            ..Self::default()
        }
    }

    /// Checks completeness rules.
    ///
    /// # Errors
    /// Returns the first failing rule.
    pub fn validate(&self) -> Result<(), CollectionValidationError> {
        if self.name.trim().is_empty() {
            return Err(CollectionValidationError::MissingName);
        }
        if self.definition.trim().is_empty() {
            return Err(CollectionValidationError::MissingDefinition);
        }
        if self.pattern.trim().is_empty() {
            return Err(CollectionValidationError::MissingPattern);
        }
        if non_blank(self.url.as_deref()).is_none() && non_blank(self.urn.as_deref()).is_none() {
            return Err(CollectionValidationError::MissingUri);
        }
        if !self.resources.iter().any(Resource::is_complete) {
            return Err(CollectionValidationError::MissingResource);
        }
        if self.replaced_by.is_some() && !self.obsolete {
            return Err(CollectionValidationError::ReplacementWithoutObsolete);
        }
        Ok(())
    }

    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// At least one resource is still served.
    pub fn has_official_resource(&self) -> bool {
        self.resources.iter().any(|resource| !resource.obsolete)
    }

    /// Preferred resource, falling back to the first live one.
    pub fn primary_resource(&self) -> Option<&Resource> {
        self.resources
            .iter()
            .find(|resource| resource.primary && !resource.obsolete)
            .or_else(|| self.resources.iter().find(|resource| !resource.obsolete))
    }

    pub fn has_access_restriction(&self) -> bool {
        self.restrictions
            .iter()
            .any(|restriction| restriction.kind == RestrictionKind::AccessRestriction)
    }

    /// Every URI that identifies this collection, official ones first.
    pub fn all_uris(&self) -> impl Iterator<Item = &str> {
        non_blank(self.url.as_deref())
            .into_iter()
            .chain(non_blank(self.urn.as_deref()))
            .chain(self.deprecated_uris.iter().map(|uri| uri.uri.as_str()))
    }

    /// Checks an entity identifier against the collection pattern.
    ///
    /// An uncompilable pattern matches nothing.
    pub fn matches_identifier(&self, entity_id: &str) -> bool {
        Regex::new(&self.pattern).is_ok_and(|pattern| pattern.is_match(entity_id))
    }
}

/// Returns `value` trimmed, or `None` when absent or blank.
pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|value| !value.is_empty())
}

/// Completeness rule violations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionValidationError {
    MissingName,
    MissingDefinition,
    MissingPattern,
    /// Neither official URL nor URN is set.
    MissingUri,
    /// No resource carries both URL prefix and root URL.
    MissingResource,
    ReplacementWithoutObsolete,
}

impl Display for CollectionValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingName => write!(f, "collection name is required"),
            Self::MissingDefinition => write!(f, "collection definition is required"),
            Self::MissingPattern => write!(f, "identifier pattern is required"),
            Self::MissingUri => write!(f, "an official URL or URN is required"),
            Self::MissingResource => {
                write!(f, "at least one resource with URL prefix and root URL is required")
            }
            Self::ReplacementWithoutObsolete => {
                write!(f, "only an obsolete collection can name a replacement")
            }
        }
    }
}

impl Error for CollectionValidationError {}

#[cfg(test)]
mod tests {
    use super::{CollectionValidationError, DataCollection, DeprecatedUri, UriKind};
    use crate::model::resource::Resource;

    fn valid() -> DataCollection {
        let mut collection = DataCollection::new("TestDB", "test", "^\\d+$");
        collection.url = Some("http://testdb.org/".into());
        collection.resources = vec![Resource::new("http://x/", "", "http://x/")];
        collection
    }

    #[test]
    fn complete_collection_is_valid() {
        assert_eq!(valid().validate(), Ok(()));
    }

    #[test]
    fn urn_alone_satisfies_uri_rule() {
        let mut collection = valid();
        collection.url = None;
        collection.urn = Some("urn:miriam:testdb".into());
        assert!(collection.is_valid());
    }

    #[test]
    fn reports_first_missing_field() {
        let mut collection = valid();
        collection.definition = " ".into();
        assert_eq!(
            collection.validate(),
            Err(CollectionValidationError::MissingDefinition)
        );

        let mut collection = valid();
        collection.url = Some(String::new());
        assert_eq!(collection.validate(), Err(CollectionValidationError::MissingUri));

        let mut collection = valid();
        collection.resources[0].url_root.clear();
        assert_eq!(
            collection.validate(),
            Err(CollectionValidationError::MissingResource)
        );
    }

    #[test]
    fn pattern_and_urn_syntax_are_not_checked() {
        let mut collection = valid();
        collection.pattern = "^(?!0)\\d+$".into();
        assert_eq!(collection.validate(), Ok(()));
        assert!(!collection.matches_identifier("42"));

        collection.url = None;
        collection.urn = Some("MIR:00000008".into());
        assert_eq!(collection.validate(), Ok(()));
    }

    #[test]
    fn replacement_requires_obsolete_flag() {
        let mut collection = valid();
        collection.replaced_by = Some("MIR:00000002".into());
        assert_eq!(
            collection.validate(),
            Err(CollectionValidationError::ReplacementWithoutObsolete)
        );
        collection.obsolete = true;
        assert!(collection.is_valid());
    }

    #[test]
    fn official_resource_ignores_obsolete_ones() {
        let mut collection = valid();
        assert!(collection.has_official_resource());
        collection.resources[0].obsolete = true;
        assert!(!collection.has_official_resource());
        assert!(collection.primary_resource().is_none());
    }

    #[test]
    fn deprecated_uri_kind_follows_scheme() {
        assert_eq!(DeprecatedUri::new("urn:miriam:old").kind, UriKind::Urn);
        assert_eq!(DeprecatedUri::new("http://old.org/").kind, UriKind::Url);
    }

    #[test]
    fn all_uris_lists_official_then_deprecated() {
        let mut collection = valid();
        collection.urn = Some("urn:miriam:testdb".into());
        collection.deprecated_uris = vec![DeprecatedUri::new("http://old.org/")];
        let uris: Vec<&str> = collection.all_uris().collect();
        assert_eq!(
            uris,
            vec!["http://testdb.org/", "urn:miriam:testdb", "http://old.org/"]
        );
    }
}
