use crate::deletion::DeletionQueue;
use crate::error::{Result, ShortenerError};
use snip_core::{BatchItem, ReadRepository, Repository, ShortCode, Stats, UrlRecord};
use std::sync::Arc;
use tracing::debug;

/// Caller-facing operations on top of the selected storage backend.
///
/// This service wraps a shared `Repository` and the deletion queue to handle:
/// - URL and owner validation
/// - Short code parsing
/// - Handing deletions to the background worker
///
/// Expected storage outcomes (`Conflict`, `NotFound`, `Gone`) pass through
/// unchanged inside [`ShortenerError::Storage`].
#[derive(Clone)]
pub struct UrlService {
    repository: Arc<dyn Repository>,
    deletions: DeletionQueue,
    base_url: String,
}

impl UrlService {
    pub fn new(
        repository: Arc<dyn Repository>,
        deletions: DeletionQueue,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            repository,
            deletions,
            base_url: base_url.into(),
        }
    }

    /// Validates that the URL has a valid format (has a scheme and host).
    fn validate_url(url: &str) -> Result<()> {
        if url.is_empty() {
            return Err(ShortenerError::InvalidUrl("URL cannot be empty".to_string()));
        }

        let Some((scheme, rest)) = url.split_once("://") else {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        };
        if scheme.is_empty() || rest.is_empty() {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL must have a valid scheme and host: {}",
                url
            )));
        }

        let scheme = scheme.to_lowercase();
        if scheme != "http" && scheme != "https" {
            return Err(ShortenerError::InvalidUrl(format!(
                "URL scheme must be http or https: {}",
                scheme
            )));
        }

        Ok(())
    }

    /// Full short URL for `record` under the configured base URL.
    pub fn short_url(&self, record: &UrlRecord) -> String {
        record.short_code.to_url(&self.base_url)
    }

    /// Shortens `original_url` for `owner_id`.
    ///
    /// An already shortened URL fails with a conflict carrying the existing
    /// record; see [`ShortenerError::conflicting_record`].
    pub async fn shorten(&self, original_url: &str, owner_id: &str) -> Result<UrlRecord> {
        Self::validate_url(original_url)?;
        let record = self.repository.set(original_url, owner_id).await?;
        debug!(code = %record.short_code, owner = %owner_id, "shortened url");
        Ok(record)
    }

    /// Shortens every item or none of them.
    pub async fn shorten_batch(
        &self,
        items: &[BatchItem],
        owner_id: &str,
    ) -> Result<Vec<UrlRecord>> {
        if items.is_empty() {
            return Err(ShortenerError::EmptyBatch);
        }
        for item in items {
            Self::validate_url(&item.original_url)?;
        }

        let records = self.repository.set_batch(items, owner_id).await?;
        debug!(count = records.len(), owner = %owner_id, "shortened url batch");
        Ok(records)
    }

    /// Resolves a caller-supplied short code to its original URL.
    pub async fn resolve(&self, code: &str) -> Result<String> {
        let code = ShortCode::new(code)?;
        Ok(self.repository.get(&code).await?)
    }

    /// Lists the live URLs of `owner_id`.
    pub async fn user_urls(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        if owner_id.is_empty() {
            return Err(ShortenerError::MissingOwner);
        }
        Ok(self.repository.get_by_owner(owner_id).await?)
    }

    /// Schedules `codes` for deletion on behalf of `owner_id`.
    ///
    /// Returns once the request is queued; the records turn `Gone` when the
    /// worker gets to it.
    pub async fn delete_urls<I, S>(&self, owner_id: &str, codes: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        if owner_id.is_empty() {
            return Err(ShortenerError::MissingOwner);
        }

        let codes = codes
            .into_iter()
            .map(ShortCode::new)
            .collect::<std::result::Result<Vec<_>, _>>()?;

        self.deletions.enqueue(owner_id, codes).await?;
        Ok(())
    }

    pub async fn stats(&self) -> Result<Stats> {
        Ok(self.repository.stats().await?)
    }

    pub async fn ping(&self) -> Result<()> {
        Ok(self.repository.ping().await?)
    }
}
