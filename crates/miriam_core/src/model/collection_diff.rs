//! Field-level comparison of two versions of a collection.
//!
//! Used by curators to review what a draft edit changes before it is saved
//! or published. Resources are paired by id when both sides carry one, and
//! by the similarity heuristic otherwise.

use super::collection::{DataCollection, DeprecatedUri, DocumentationId};
use super::resource::Resource;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionChange {
    Id {
        old: Option<String>,
        new: Option<String>,
    },
    Name {
        old: String,
        new: String,
    },
    SynonymAdded(String),
    SynonymRemoved(String),
    Url {
        old: Option<String>,
        new: Option<String>,
    },
    Urn {
        old: Option<String>,
        new: Option<String>,
    },
    DeprecatedUriAdded(DeprecatedUri),
    DeprecatedUriRemoved(DeprecatedUri),
    Definition {
        old: String,
        new: String,
    },
    Pattern {
        old: String,
        new: String,
    },
    Obsolete {
        old: bool,
        new: bool,
    },
    ResourceAdded(Resource),
    ResourceRemoved(Resource),
    ResourceModified {
        old: Resource,
        new: Resource,
    },
    DocumentationUrlAdded(String),
    DocumentationUrlRemoved(String),
    DocumentationIdAdded(DocumentationId),
    DocumentationIdRemoved(DocumentationId),
}

/// Ordered list of changes between two collection versions.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CollectionDiff {
    pub changes: Vec<CollectionChange>,
}

impl CollectionDiff {
    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Compares `old` against `new`.
pub fn diff_collections(old: &DataCollection, new: &DataCollection) -> CollectionDiff {
    let mut changes = Vec::new();

    if old.id != new.id {
        changes.push(CollectionChange::Id {
            old: old.id.clone(),
            new: new.id.clone(),
        });
    }
    if old.name != new.name {
        changes.push(CollectionChange::Name {
            old: old.name.clone(),
            new: new.name.clone(),
        });
    }
    push_list_changes(
        &mut changes,
        &old.synonyms,
        &new.synonyms,
        CollectionChange::SynonymAdded,
        CollectionChange::SynonymRemoved,
    );
    if old.url != new.url {
        changes.push(CollectionChange::Url {
            old: old.url.clone(),
            new: new.url.clone(),
        });
    }
    if old.urn != new.urn {
        changes.push(CollectionChange::Urn {
            old: old.urn.clone(),
            new: new.urn.clone(),
        });
    }
    push_list_changes(
        &mut changes,
        &old.deprecated_uris,
        &new.deprecated_uris,
        CollectionChange::DeprecatedUriAdded,
        CollectionChange::DeprecatedUriRemoved,
    );
    if old.definition != new.definition {
        changes.push(CollectionChange::Definition {
            old: old.definition.clone(),
            new: new.definition.clone(),
        });
    }
    if old.pattern != new.pattern {
        changes.push(CollectionChange::Pattern {
            old: old.pattern.clone(),
            new: new.pattern.clone(),
        });
    }
    if old.obsolete != new.obsolete {
        changes.push(CollectionChange::Obsolete {
            old: old.obsolete,
            new: new.obsolete,
        });
    }
    push_resource_changes(&mut changes, &old.resources, &new.resources);
    push_list_changes(
        &mut changes,
        &old.documentation_urls,
        &new.documentation_urls,
        CollectionChange::DocumentationUrlAdded,
        CollectionChange::DocumentationUrlRemoved,
    );
    push_list_changes(
        &mut changes,
        &old.documentation_ids,
        &new.documentation_ids,
        CollectionChange::DocumentationIdAdded,
        CollectionChange::DocumentationIdRemoved,
    );

    CollectionDiff { changes }
}

fn push_list_changes<T: Clone + PartialEq>(
    changes: &mut Vec<CollectionChange>,
    old: &[T],
    new: &[T],
    added: impl Fn(T) -> CollectionChange,
    removed: impl Fn(T) -> CollectionChange,
) {
    changes.extend(
        old.iter()
            .filter(|item| !new.contains(item))
            .cloned()
            .map(removed),
    );
    changes.extend(
        new.iter()
            .filter(|item| !old.contains(item))
            .cloned()
            .map(added),
    );
}

fn push_resource_changes(changes: &mut Vec<CollectionChange>, old: &[Resource], new: &[Resource]) {
    let mut matched = vec![false; old.len()];

    for candidate in new {
        let by_id = old
            .iter()
            .enumerate()
            .position(|(index, previous)| !matched[index] && previous.is_same(candidate));
        let pair = by_id.or_else(|| {
            if candidate.id.is_some() {
                return None;
            }
            old.iter().enumerate().position(|(index, previous)| {
                !matched[index] && previous.could_be_similar(candidate)
            })
        });

        match pair {
            Some(index) => {
                matched[index] = true;
                let previous = &old[index];
                let mut aligned = candidate.clone();
                aligned.id = previous.id.clone();
                if !previous.has_same_content(&aligned) {
                    changes.push(CollectionChange::ResourceModified {
                        old: previous.clone(),
                        new: candidate.clone(),
                    });
                }
            }
            None => changes.push(CollectionChange::ResourceAdded(candidate.clone())),
        }
    }

    changes.extend(
        old.iter()
            .zip(matched)
            .filter(|(_, matched)| !matched)
            .map(|(previous, _)| CollectionChange::ResourceRemoved(previous.clone())),
    );
}

fn or_none(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("(none)")
}

impl Display for CollectionChange {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Id { old, new } => {
                write!(f, "Id:\n\t< {}\n\t> {}", or_none(old), or_none(new))
            }
            Self::Name { old, new } => write!(f, "Name:\n\t< {old}\n\t> {new}"),
            Self::SynonymAdded(value) => write!(f, "Synonyms:\n\t> {value}"),
            Self::SynonymRemoved(value) => write!(f, "Synonyms:\n\t< {value}"),
            Self::Url { old, new } => write!(
                f,
                "Official URL:\n\t< {}\n\t> {}",
                or_none(old),
                or_none(new)
            ),
            Self::Urn { old, new } => write!(
                f,
                "MIRIAM URN:\n\t< {}\n\t> {}",
                or_none(old),
                or_none(new)
            ),
            Self::DeprecatedUriAdded(uri) => write!(f, "Deprecated URIs:\n\t> {}", uri.uri),
            Self::DeprecatedUriRemoved(uri) => write!(f, "Deprecated URIs:\n\t< {}", uri.uri),
            Self::Definition { old, new } => write!(f, "Definition:\n\t< {old}\n\t> {new}"),
            Self::Pattern { old, new } => {
                write!(f, "Regular expression:\n\t< {old}\n\t> {new}")
            }
            Self::Obsolete { old, new } => write!(f, "Obsolete:\n\t< {old}\n\t> {new}"),
            Self::ResourceAdded(resource) => write!(f, "Resources:\n> {resource}"),
            Self::ResourceRemoved(resource) => write!(f, "Resources:\n< {resource}"),
            Self::ResourceModified { old, new } => {
                write!(f, "Resources:\n<< {old}\n>> {new}")
            }
            Self::DocumentationUrlAdded(url) => write!(f, "Documentation URLs:\n\t> {url}"),
            Self::DocumentationUrlRemoved(url) => write!(f, "Documentation URLs:\n\t< {url}"),
            Self::DocumentationIdAdded(doc) => {
                write!(f, "Documentation IDs:\n\t> {} ({})", doc.id, doc.id_type)
            }
            Self::DocumentationIdRemoved(doc) => {
                write!(f, "Documentation IDs:\n\t< {} ({})", doc.id, doc.id_type)
            }
        }
    }
}

impl Display for CollectionDiff {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.changes.is_empty() {
            return f.write_str("No changes.");
        }
        for (index, change) in self.changes.iter().enumerate() {
            if index > 0 {
                writeln!(f)?;
            }
            write!(f, "{change}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::{diff_collections, CollectionChange};
    use crate::model::collection::DataCollection;
    use crate::model::resource::Resource;

    fn base() -> DataCollection {
        let mut collection = DataCollection::new("TestDB", "test", "^\\d+$");
        collection.id = Some("MIR:00900001".into());
        collection.url = Some("http://testdb.org/".into());
        collection.synonyms = vec!["TDB".into()];
        let mut resource = Resource::new("http://x/", "", "http://x/");
        resource.id = Some("MIR:00100001".into());
        resource.institution = "EBI".into();
        collection.resources = vec![resource];
        collection
    }

    #[test]
    fn identical_versions_have_no_changes() {
        let diff = diff_collections(&base(), &base());
        assert!(diff.is_empty());
        assert_eq!(diff.to_string(), "No changes.");
    }

    #[test]
    fn reports_scalar_and_list_changes() {
        let old = base();
        let mut new = base();
        new.name = "TestDB2".into();
        new.synonyms = vec!["TDB2".into()];

        let diff = diff_collections(&old, &new);
        assert_eq!(
            diff.changes,
            vec![
                CollectionChange::Name {
                    old: "TestDB".into(),
                    new: "TestDB2".into()
                },
                CollectionChange::SynonymRemoved("TDB".into()),
                CollectionChange::SynonymAdded("TDB2".into()),
            ]
        );
        assert!(diff.to_string().contains("\t< TestDB\n\t> TestDB2"));
    }

    #[test]
    fn pairs_resources_by_id_then_similarity() {
        let old = base();
        let mut new = base();
        new.resources[0].example = "42".into();
        let mut anonymous = old.resources[0].clone();
        anonymous.id = None;
        anonymous.url_root = "http://mirror/".into();
        new.resources.push(anonymous);

        let diff = diff_collections(&old, &new);
        assert!(matches!(
            &diff.changes[..],
            [CollectionChange::ResourceModified { .. }, CollectionChange::ResourceAdded(_)]
        ));
    }

    #[test]
    fn similar_resource_without_id_counts_as_modification() {
        let old = base();
        let mut new = base();
        new.resources[0].id = None;
        new.resources[0].info = "moved".into();

        let diff = diff_collections(&old, &new);
        assert!(matches!(
            &diff.changes[..],
            [CollectionChange::ResourceModified { .. }]
        ));
    }

    #[test]
    fn dropped_resource_is_removed() {
        let old = base();
        let mut new = base();
        new.resources.clear();
        let diff = diff_collections(&old, &new);
        assert!(matches!(
            &diff.changes[..],
            [CollectionChange::ResourceRemoved(_)]
        ));
    }
}
