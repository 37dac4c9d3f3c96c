use crate::index::UrlIndex;
use async_trait::async_trait;
use parking_lot::RwLock;
use snip_core::error::Result;
use snip_core::{BatchItem, ReadRepository, Repository, ShortCode, Stats, UrlRecord};
use tracing::{debug, trace};
use uuid::Uuid;

/// In-memory implementation of the repository contract.
///
/// A single reader/writer lock guards the whole record set: lookups,
/// listings and stats share the read lock, every write takes the write
/// lock. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    index: RwLock<UrlIndex>,
}

impl InMemoryRepository {
    /// Creates a new in-memory repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a new in-memory repository with the specified capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            index: RwLock::new(UrlIndex::with_capacity(capacity)),
        }
    }

    /// Number of stored records, deleted ones included.
    pub fn len(&self) -> usize {
        self.index.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ReadRepository for InMemoryRepository {
    async fn get(&self, code: &ShortCode) -> Result<String> {
        trace!(code = %code, "resolving short code");
        self.index.read().get(code)
    }

    async fn get_by_owner(&self, owner_id: &str) -> Result<Vec<UrlRecord>> {
        Ok(self.index.read().by_owner(owner_id))
    }

    async fn stats(&self) -> Result<Stats> {
        Ok(self.index.read().stats())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn set(&self, original_url: &str, owner_id: &str) -> Result<UrlRecord> {
        let record = UrlRecord::new(Uuid::new_v4().to_string(), original_url, owner_id);

        let mut index = self.index.write();
        index.check_new(&record)?;
        index.insert(record.clone());

        debug!(code = %record.short_code, owner = %owner_id, "stored url");
        Ok(record)
    }

    async fn set_batch(&self, items: &[BatchItem], owner_id: &str) -> Result<Vec<UrlRecord>> {
        let mut index = self.index.write();
        let records = index.prepare_batch(items, owner_id)?;

        for record in &records {
            index.insert(record.clone());
        }

        debug!(count = records.len(), owner = %owner_id, "stored url batch");
        Ok(records)
    }

    async fn batch_delete(&self, owner_id: &str, codes: &[ShortCode]) -> Result<()> {
        let mut index = self.index.write();
        let positions = index.deletable(owner_id, codes);
        index.mark_deleted(&positions);

        debug!(
            requested = codes.len(),
            deleted = positions.len(),
            owner = %owner_id,
            "soft-deleted urls"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use snip_core::StorageError;
    use std::sync::Arc;

    #[tokio::test]
    async fn set_and_get() {
        let repo = InMemoryRepository::new();

        let record = repo.set("https://example.com", "alice").await.unwrap();
        assert_eq!(record.short_code.as_str(), "EAaArVRs");
        assert_eq!(record.owner_id, "alice");
        assert!(!record.deleted);

        let url = repo.get(&record.short_code).await.unwrap();
        assert_eq!(url, "https://example.com");
    }

    #[tokio::test]
    async fn get_nonexistent() {
        let repo = InMemoryRepository::new();

        let err = repo.get(&ShortCode::derive("nope")).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn repeated_set_reports_conflict_with_same_code() {
        let repo = InMemoryRepository::new();

        let first = repo.set("https://example.com", "alice").await.unwrap();
        let err = repo.set("https://example.com", "alice").await.unwrap_err();

        let existing = err.conflicting_record().expect("conflict");
        assert_eq!(existing.short_code, first.short_code);
        assert_eq!(existing.id, first.id);
        assert_eq!(repo.len(), 1);
    }

    #[tokio::test]
    async fn set_accepts_anonymous_owner() {
        let repo = InMemoryRepository::new();

        let record = repo.set("https://example.com", "").await.unwrap();
        assert_eq!(repo.get(&record.short_code).await.unwrap(), "https://example.com");
        assert!(repo.get_by_owner("").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_delete_marks_gone() {
        let repo = InMemoryRepository::new();
        let record = repo.set("https://example.com", "alice").await.unwrap();

        repo.batch_delete("alice", &[record.short_code.clone()])
            .await
            .unwrap();

        let err = repo.get(&record.short_code).await.unwrap_err();
        assert!(matches!(err, StorageError::Gone(_)));
    }

    #[tokio::test]
    async fn batch_delete_ignores_other_owners() {
        let repo = InMemoryRepository::new();
        let record = repo.set("https://example.com", "alice").await.unwrap();

        repo.batch_delete("bob", &[record.short_code.clone()])
            .await
            .unwrap();

        assert_eq!(repo.get(&record.short_code).await.unwrap(), "https://example.com");
    }

    #[tokio::test]
    async fn batch_delete_on_empty_store_is_ok() {
        let repo = InMemoryRepository::new();

        repo.batch_delete("alice", &[ShortCode::derive("https://example.com")])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn deleted_url_still_conflicts() {
        let repo = InMemoryRepository::new();
        let record = repo.set("https://example.com", "alice").await.unwrap();
        repo.batch_delete("alice", &[record.short_code.clone()])
            .await
            .unwrap();

        let err = repo.set("https://example.com", "alice").await.unwrap_err();
        assert!(err.conflicting_record().unwrap().deleted);
    }

    #[tokio::test]
    async fn get_by_owner_lists_live_records_in_insertion_order() {
        let repo = InMemoryRepository::new();
        let a = repo.set("https://a.example", "alice").await.unwrap();
        let b = repo.set("https://b.example", "alice").await.unwrap();
        let c = repo.set("https://c.example", "alice").await.unwrap();
        repo.set("https://d.example", "bob").await.unwrap();

        repo.batch_delete("alice", &[b.short_code.clone()])
            .await
            .unwrap();

        let records = repo.get_by_owner("alice").await.unwrap();
        assert_eq!(records, vec![a, c]);
        assert!(repo.get_by_owner("carol").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn set_batch_stores_all_items_with_correlation_ids() {
        let repo = InMemoryRepository::new();
        let items = vec![
            BatchItem::new("c1", "https://a.example"),
            BatchItem::new("c2", "https://b.example"),
        ];

        let records = repo.set_batch(&items, "alice").await.unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].id, "c1");
        assert_eq!(records[1].id, "c2");
        assert_eq!(repo.get(&records[1].short_code).await.unwrap(), "https://b.example");
    }

    #[tokio::test]
    async fn set_batch_is_all_or_nothing() {
        let repo = InMemoryRepository::new();
        let items = vec![
            BatchItem::new("c1", "https://a.example"),
            BatchItem::new("c2", "https://b.example"),
            BatchItem::new("c3", "https://a.example"),
        ];

        let err = repo.set_batch(&items, "alice").await.unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUrl(_)));
        assert!(repo.is_empty());

        let err = repo
            .get(&ShortCode::derive("https://b.example"))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[tokio::test]
    async fn stats_counts_urls_and_owners() {
        let repo = InMemoryRepository::new();
        repo.set("https://a.example", "alice").await.unwrap();
        repo.set("https://b.example", "alice").await.unwrap();
        repo.set("https://c.example", "bob").await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats, Stats { urls: 3, owners: 2 });
    }

    #[tokio::test]
    async fn concurrent_access() {
        let repo = Arc::new(InMemoryRepository::new());
        let mut handles = vec![];

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                repo.set(&format!("https://example{i}.com"), "alice")
                    .await
                    .unwrap();
            }));
        }

        for i in 0..10u64 {
            let repo = Arc::clone(&repo);
            handles.push(tokio::spawn(async move {
                let _ = repo
                    .get(&ShortCode::derive(&format!("https://example{i}.com")))
                    .await;
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        for i in 0..10u64 {
            let url = format!("https://example{i}.com");
            assert_eq!(repo.get(&ShortCode::derive(&url)).await.unwrap(), url);
        }
        assert_eq!(repo.get_by_owner("alice").await.unwrap().len(), 10);
    }
}
