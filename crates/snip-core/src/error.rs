use crate::record::UrlRecord;
use thiserror::Error;

/// Result type for repository operations.
pub type Result<T> = std::result::Result<T, StorageError>;

#[derive(Debug, Clone, Error)]
pub enum CoreError {
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
}

/// Errors surfaced at the storage boundary.
///
/// `NotFound`, `Gone` and `Conflict` are expected outcomes that callers
/// translate into responses. The remaining variants are failures.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// No record was ever stored under this code.
    #[error("short code not found: {0}")]
    NotFound(String),
    /// The record exists but has been soft-deleted.
    #[error("short code was deleted: {0}")]
    Gone(String),
    /// The original URL is already mapped; carries the existing record.
    #[error("original url already exists: {}", .0.original_url)]
    Conflict(Box<UrlRecord>),
    /// A batch write hit an original URL that is stored or repeated.
    #[error("duplicate original url in batch: {0}")]
    DuplicateUrl(String),
    /// A derived code is already bound to a different original URL.
    #[error("short code collision: {0}")]
    CodeCollision(String),
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),
    #[error("storage operation timed out: {0}")]
    Timeout(String),
    #[error("storage query failed: {0}")]
    Query(String),
    #[error("stored data is invalid: {0}")]
    InvalidData(String),
}

impl StorageError {
    /// Returns the existing record when this is a [`StorageError::Conflict`].
    pub fn conflicting_record(&self) -> Option<&UrlRecord> {
        match self {
            StorageError::Conflict(record) => Some(record),
            _ => None,
        }
    }

    /// Whether the error is an expected outcome rather than a backend failure.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            StorageError::NotFound(_) | StorageError::Gone(_) | StorageError::Conflict(_)
        )
    }
}
