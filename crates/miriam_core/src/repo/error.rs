//! Repository error taxonomy and write step reporting.

use crate::db::DbError;
use crate::model::collection::CollectionValidationError;
use crate::model::identifier::IdKind;
use crate::repo::uniqueness::UniquenessConflict;
use log::error;
use serde::Serialize;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Result type used by registry repository operations.
pub type RepoResult<T> = Result<T, RepoError>;

#[derive(Debug)]
pub enum RepoError {
    /// Underlying SQLite/bootstrap error outside a multi-step write.
    Db(DbError),
    Validation(CollectionValidationError),
    /// No record with this id.
    NotFound(String),
    /// Name, synonym or URI already identifies another collection.
    DuplicateName(UniquenessConflict),
    /// One step of a multi-step write failed; nothing was committed.
    WriteFailed {
        step: &'static str,
        source: DbError,
    },
    /// Every five-digit sequence of this kind is in use.
    IdentifierExhausted(IdKind),
    AlreadyPublished {
        draft_id: String,
        public_id: Option<String>,
    },
    /// Persisted data cannot be converted to a valid read model.
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "invalid collection: {err}"),
            Self::NotFound(id) => write!(f, "record not found: {id}"),
            Self::DuplicateName(conflict) => write!(f, "duplicate: {conflict}"),
            Self::WriteFailed { step, source } => {
                write!(f, "write failed at step `{step}`: {source}")
            }
            Self::IdentifierExhausted(kind) => {
                write!(f, "no identifier left for kind `{kind}`")
            }
            Self::AlreadyPublished {
                draft_id,
                public_id,
            } => write!(
                f,
                "draft {draft_id} is already published as {}",
                public_id.as_deref().unwrap_or("(unknown)")
            ),
            Self::InvalidData(message) => write!(f, "invalid registry data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::WriteFailed { source, .. } => Some(source),
            Self::NotFound(_)
            | Self::DuplicateName(_)
            | Self::IdentifierExhausted(_)
            | Self::AlreadyPublished { .. }
            | Self::InvalidData(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<CollectionValidationError> for RepoError {
    fn from(value: CollectionValidationError) -> Self {
        Self::Validation(value)
    }
}

/// Rows touched by one step of a multi-step write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteStep {
    pub step: &'static str,
    pub rows: usize,
}

/// Outcome of a committed multi-step write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WriteReport {
    /// Identifier of the written collection.
    pub target_id: String,
    pub steps: Vec<WriteStep>,
}

impl WriteReport {
    pub fn new(target_id: impl Into<String>) -> Self {
        Self {
            target_id: target_id.into(),
            steps: Vec::new(),
        }
    }

    /// Rows touched by `step`, if it ran.
    pub fn rows(&self, step: &str) -> Option<usize> {
        self.steps
            .iter()
            .find(|entry| entry.step == step)
            .map(|entry| entry.rows)
    }

    /// Runs one step, recording its row count or tagging its failure.
    ///
    /// SQLite failures become [`RepoError::WriteFailed`]; semantic errors
    /// pass through untouched.
    pub(crate) fn run(
        &mut self,
        step: &'static str,
        action: impl FnOnce() -> RepoResult<usize>,
    ) -> RepoResult<()> {
        match action() {
            Ok(rows) => {
                self.steps.push(WriteStep { step, rows });
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=registry_write module=repo status=error target_id={} step={} error={}",
                    self.target_id, step, err
                );
                Err(match err {
                    RepoError::Db(source) => RepoError::WriteFailed { step, source },
                    other => other,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{RepoError, WriteReport};
    use crate::db::DbError;

    #[test]
    fn run_records_rows_per_step() {
        let mut report = WriteReport::new("MIR:00900001");
        report.run("synonyms", || Ok(2)).unwrap();
        report.run("uris", || Ok(1)).unwrap();
        assert_eq!(report.rows("synonyms"), Some(2));
        assert_eq!(report.rows("documentation"), None);
    }

    #[test]
    fn run_tags_sqlite_failures_with_step() {
        let mut report = WriteReport::new("MIR:00900001");
        let err = report
            .run("resources", || {
                Err(RepoError::Db(DbError::Sqlite(
                    rusqlite::Error::QueryReturnedNoRows,
                )))
            })
            .unwrap_err();
        assert!(matches!(
            err,
            RepoError::WriteFailed {
                step: "resources",
                ..
            }
        ));

        let err = report
            .run("resources", || Err(RepoError::NotFound("MIR:00100009".into())))
            .unwrap_err();
        assert!(matches!(err, RepoError::NotFound(_)));
        assert!(report.steps.is_empty());
    }
}
