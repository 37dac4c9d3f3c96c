use crate::shortcode::ShortCode;
use serde::{Deserialize, Serialize};

/// A stored URL mapping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UrlRecord {
    /// Internal identifier assigned by the backend, or the caller's
    /// correlation id for records written through a batch.
    pub id: String,
    /// The derived lookup key.
    pub short_code: ShortCode,
    /// The original URL that was shortened.
    pub original_url: String,
    /// Identity of the caller that created the record. Empty for anonymous writes.
    pub owner_id: String,
    /// Soft-delete flag. Once set it is never cleared.
    pub deleted: bool,
}

impl UrlRecord {
    /// Builds a fresh, undeleted record for `original_url`.
    pub fn new(id: impl Into<String>, original_url: impl Into<String>, owner_id: &str) -> Self {
        let original_url = original_url.into();
        Self {
            id: id.into(),
            short_code: ShortCode::derive(&original_url),
            original_url,
            owner_id: owner_id.to_owned(),
            deleted: false,
        }
    }

    /// Whether `owner_id` may see or delete this record.
    ///
    /// The empty owner never matches, so anonymous records cannot be
    /// deleted or listed by anyone.
    pub fn is_owned_by(&self, owner_id: &str) -> bool {
        !owner_id.is_empty() && self.owner_id == owner_id
    }
}

/// One element of a batch write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchItem {
    /// Caller-chosen handle echoed back as the record id.
    pub correlation_id: String,
    pub original_url: String,
}

impl BatchItem {
    pub fn new(correlation_id: impl Into<String>, original_url: impl Into<String>) -> Self {
        Self {
            correlation_id: correlation_id.into(),
            original_url: original_url.into(),
        }
    }
}

/// Aggregate counts over everything a backend stores.
///
/// Soft-deleted records are still stored, so they are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stats {
    /// Number of stored URL records.
    pub urls: u64,
    /// Number of distinct owner ids across those records.
    pub owners: u64,
}
