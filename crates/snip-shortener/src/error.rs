use snip_core::{CoreError, StorageError, UrlRecord};
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ShortenerError>;

/// Rejections from [`DeletionQueue::enqueue`](crate::deletion::DeletionQueue::enqueue).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeletionError {
    #[error("owner id is required")]
    MissingOwner,
    #[error("no short codes provided for deletion")]
    EmptyBatch,
    #[error("deletion worker has stopped")]
    Closed,
}

#[derive(Debug, Clone, Error)]
pub enum ShortenerError {
    #[error("invalid url: {0}")]
    InvalidUrl(String),
    #[error("invalid short code: {0}")]
    InvalidShortCode(String),
    #[error("owner id is required")]
    MissingOwner,
    #[error("batch is empty")]
    EmptyBatch,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Deletion(#[from] DeletionError),
}

impl ShortenerError {
    /// The existing record when a shorten call hit an already mapped URL.
    pub fn conflicting_record(&self) -> Option<&UrlRecord> {
        match self {
            ShortenerError::Storage(err) => err.conflicting_record(),
            _ => None,
        }
    }
}

impl From<CoreError> for ShortenerError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidShortCode(message) => Self::InvalidShortCode(message),
        }
    }
}
