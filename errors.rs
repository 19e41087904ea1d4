use thiserror::Error;

use crate::index::Discipline;

/// Failures surfaced by ingestion and session operations.
///
/// Lookups never fail; an absent key reads as a count of zero.
#[derive(Debug, Error)]
pub enum CountError {
    #[error("record source '{origin}' is unavailable: {reason}")]
    SourceUnavailable { origin: String, reason: String },
    #[error("record source '{origin}' has no header row")]
    MissingHeader { origin: String },
    #[error("field '{field}' not found in header")]
    FieldNotFound { field: String },
    #[error("row {line} has {found} field(s); '{field}' is at position {position}")]
    MalformedRow {
        line: usize,
        found: usize,
        position: usize,
        field: String,
    },
    #[error("the {discipline} index for '{field}' has already been built")]
    AlreadyBuilt { field: String, discipline: Discipline },
    #[error("the {discipline} index for '{field}' has not been built yet")]
    NotBuilt { field: String, discipline: Discipline },
}

impl CountError {
    pub(crate) fn unavailable(origin: impl Into<String>, err: impl std::fmt::Display) -> Self {
        CountError::SourceUnavailable {
            origin: origin.into(),
            reason: err.to_string(),
        }
    }
}
