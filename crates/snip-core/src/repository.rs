use crate::error::Result;
use crate::record::{BatchItem, Stats, UrlRecord};
use crate::shortcode::ShortCode;
use async_trait::async_trait;

/// A read-only view of a repository.
///
/// Dropping a returned future abandons the call; backends backed by a
/// network connection abort the in-flight query.
#[async_trait]
pub trait ReadRepository: Send + Sync + 'static {
    /// Resolves a short code to its original URL.
    ///
    /// Returns `Err(NotFound)` if the code was never stored and
    /// `Err(Gone)` if it was soft-deleted.
    async fn get(&self, code: &ShortCode) -> Result<String>;

    /// Lists the live records created by `owner_id`.
    ///
    /// Returns an empty vector when the owner has none, or when `owner_id` is empty.
    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>>;

    /// Counts stored records and distinct owners.
    async fn stats(&self) -> Result<Stats>;

    /// Checks that the backend is reachable.
    async fn ping(&self) -> Result<()>;
}

#[async_trait]
pub trait Repository: ReadRepository {
    /// Stores `original_url` for `owner_id`.
    ///
    /// Idempotent per original URL: if a mapping already exists the call
    /// returns `Err(Conflict)` carrying the existing record.
    async fn set(&self, original_url: &str, owner_id: &str) -> Result<UrlRecord>;

    /// Stores every item or none of them.
    ///
    /// Returns `Err(DuplicateUrl)` if any original URL is already stored or
    /// appears twice in `items`. Results keep the order of `items`.
    async fn set_batch(&self, items: &[BatchItem], owner_id: &str) -> Result<Vec<UrlRecord>>;

    /// Soft-deletes the listed codes that belong to `owner_id`.
    ///
    /// Codes that are unknown or owned by someone else are ignored.
    async fn batch_delete(&self, owner_id: &str, codes: &[ShortCode]) -> Result<()>;

    /// Releases backend resources on shutdown.
    async fn close(&self) {}
}
