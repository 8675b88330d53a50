//! Published registry maintenance.
//!
//! # Invariants
//! - Edits keep the collection valid and unique among published collections.
//! - A deprecated collection may only point to another existing collection.

use crate::model::collection::DataCollection;
use crate::repo::collection_repo::CollectionRepository;
use crate::repo::error::{RepoError, RepoResult, WriteReport};

pub struct RegistryService<R: CollectionRepository> {
    repo: R,
}

impl<R: CollectionRepository> RegistryService<R> {
    pub fn new(repo: R) -> Self {
        Self { repo }
    }

    pub fn repo(&self) -> &R {
        &self.repo
    }

    /// Loads a collection, failing with `NotFound` when absent.
    pub fn get(&self, id: &str) -> RepoResult<DataCollection> {
        self.repo
            .get_collection(id)?
            .ok_or_else(|| RepoError::NotFound(id.to_string()))
    }

    /// Replaces the stored content of `collection` (matched by id).
    pub fn edit(&self, collection: &DataCollection) -> RepoResult<WriteReport> {
        let id = collection
            .id
            .as_deref()
            .ok_or_else(|| RepoError::InvalidData("collection to edit has no id".to_string()))?;
        let current = self.get(id)?;
        self.repo.update_collection(collection, &current)
    }

    /// Retires a collection, optionally naming its successor.
    pub fn deprecate(&self, id: &str, comment: &str, replaced_by: Option<&str>) -> RepoResult<()> {
        if let Some(replacement) = replaced_by {
            if replacement == id {
                return Err(RepoError::InvalidData(format!(
                    "collection {id} cannot replace itself"
                )));
            }
            if !self.repo.collection_exists(replacement)? {
                return Err(RepoError::NotFound(replacement.to_string()));
            }
        }
        self.repo.deprecate(id, comment, replaced_by)
    }

    /// Follows replacement links from `id` to the live successor.
    ///
    /// Stops at the first collection without a replacement and reports it,
    /// even when it is itself obsolete. Cycles end the walk.
    pub fn resolve_replacement(&self, id: &str) -> RepoResult<String> {
        let mut current = id.to_string();
        let mut seen = vec![current.clone()];
        while let Some(info) = self.repo.obsolete_info(&current)? {
            match info.replaced_by {
                Some(next) if info.obsolete && !seen.contains(&next) => {
                    seen.push(next.clone());
                    current = next;
                }
                _ => break,
            }
        }
        if seen.len() == 1 && !self.repo.collection_exists(id)? {
            return Err(RepoError::NotFound(id.to_string()));
        }
        Ok(current)
    }
}
