use snip_core::error::{Result, StorageError};
use snip_core::{BatchItem, ShortCode, Stats, UrlRecord};
use std::collections::{HashMap, HashSet};

/// In-memory record set shared by the memory and file backends.
///
/// Records are kept in insertion order and never removed. Two hash
/// indexes point into the record list: one by short code (the lookup key)
/// and one by original URL (for conflict detection on writes).
#[derive(Debug, Default)]
pub(crate) struct UrlIndex {
    records: Vec<UrlRecord>,
    by_code: HashMap<ShortCode, usize>,
    by_url: HashMap<String, usize>,
}

impl UrlIndex {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            records: Vec::with_capacity(capacity),
            by_code: HashMap::with_capacity(capacity),
            by_url: HashMap::with_capacity(capacity),
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn get(&self, code: &ShortCode) -> Result<String> {
        let Some(&pos) = self.by_code.get(code) else {
            return Err(StorageError::NotFound(code.to_string()));
        };

        let record = &self.records[pos];
        if record.deleted {
            return Err(StorageError::Gone(code.to_string()));
        }

        Ok(record.original_url.clone())
    }

    pub(crate) fn by_owner(&self, owner_id: &str) -> Vec<UrlRecord> {
        self.records
            .iter()
            .filter(|record| record.is_owned_by(owner_id) && !record.deleted)
            .cloned()
            .collect()
    }

    pub(crate) fn stats(&self) -> Stats {
        let owners: HashSet<&str> = self
            .records
            .iter()
            .map(|record| record.owner_id.as_str())
            .collect();

        Stats {
            urls: self.records.len() as u64,
            owners: owners.len() as u64,
        }
    }

    /// Checks that `record` can be inserted as a new mapping.
    pub(crate) fn check_new(&self, record: &UrlRecord) -> Result<()> {
        if let Some(&pos) = self.by_url.get(&record.original_url) {
            return Err(StorageError::Conflict(Box::new(self.records[pos].clone())));
        }

        if self.by_code.contains_key(&record.short_code) {
            return Err(StorageError::CodeCollision(record.short_code.to_string()));
        }

        Ok(())
    }

    /// Builds the records for a batch without touching the index.
    ///
    /// Fails if any URL is already stored or appears twice in `items`.
    pub(crate) fn prepare_batch(
        &self,
        items: &[BatchItem],
        owner_id: &str,
    ) -> Result<Vec<UrlRecord>> {
        let mut urls = HashSet::with_capacity(items.len());
        let mut codes = HashSet::with_capacity(items.len());
        let mut records = Vec::with_capacity(items.len());

        for item in items {
            let record = UrlRecord::new(
                item.correlation_id.clone(),
                item.original_url.clone(),
                owner_id,
            );

            if self.by_url.contains_key(&record.original_url)
                || !urls.insert(record.original_url.clone())
            {
                return Err(StorageError::DuplicateUrl(record.original_url));
            }

            if self.by_code.contains_key(&record.short_code)
                || !codes.insert(record.short_code.clone())
            {
                return Err(StorageError::CodeCollision(record.short_code.to_string()));
            }

            records.push(record);
        }

        Ok(records)
    }

    /// Inserts a record that already passed [`UrlIndex::check_new`] or
    /// [`UrlIndex::prepare_batch`].
    pub(crate) fn insert(&mut self, record: UrlRecord) {
        let pos = self.records.len();
        self.by_code.insert(record.short_code.clone(), pos);
        self.by_url.insert(record.original_url.clone(), pos);
        self.records.push(record);
    }

    /// Applies one replayed log record.
    ///
    /// The first record seen for a code wins. A later record for the same
    /// code only contributes its deletion flag, and only if it comes from
    /// the same owner. Returns `true` if the index changed.
    pub(crate) fn replay(&mut self, record: UrlRecord) -> bool {
        if let Some(&pos) = self.by_code.get(&record.short_code) {
            let existing = &mut self.records[pos];
            if record.deleted && !existing.deleted && existing.owner_id == record.owner_id {
                existing.deleted = true;
                return true;
            }
            return false;
        }

        if self.by_url.contains_key(&record.original_url) {
            return false;
        }

        self.insert(record);
        true
    }

    /// Positions of the live records among `codes` that `owner_id` may delete.
    pub(crate) fn deletable(&self, owner_id: &str, codes: &[ShortCode]) -> Vec<usize> {
        let mut seen = HashSet::with_capacity(codes.len());

        codes
            .iter()
            .filter_map(|code| self.by_code.get(code).copied())
            .filter(|&pos| {
                let record = &self.records[pos];
                record.is_owned_by(owner_id) && !record.deleted
            })
            .filter(|&pos| seen.insert(pos))
            .collect()
    }

    pub(crate) fn record(&self, pos: usize) -> &UrlRecord {
        &self.records[pos]
    }

    pub(crate) fn mark_deleted(&mut self, positions: &[usize]) {
        for &pos in positions {
            self.records[pos].deleted = true;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, url: &str, owner: &str) -> UrlRecord {
        UrlRecord::new(id, url, owner)
    }

    #[test]
    fn get_distinguishes_missing_and_deleted() {
        let mut index = UrlIndex::default();
        let rec = record("1", "https://example.com", "alice");
        let code = rec.short_code.clone();
        index.insert(rec);

        assert_eq!(index.get(&code).unwrap(), "https://example.com");

        let positions = index.deletable("alice", &[code.clone()]);
        index.mark_deleted(&positions);

        assert!(matches!(index.get(&code), Err(StorageError::Gone(_))));
        assert!(matches!(
            index.get(&ShortCode::derive("https://other.example")),
            Err(StorageError::NotFound(_))
        ));
    }

    #[test]
    fn check_new_reports_existing_record() {
        let mut index = UrlIndex::default();
        index.insert(record("1", "https://example.com", "alice"));

        let err = index
            .check_new(&record("2", "https://example.com", "bob"))
            .unwrap_err();
        let existing = err.conflicting_record().expect("conflict carries record");
        assert_eq!(existing.id, "1");
        assert_eq!(existing.owner_id, "alice");
    }

    #[test]
    fn check_new_detects_code_collision() {
        let mut index = UrlIndex::default();
        let mut forged = record("1", "https://one.example", "alice");
        forged.short_code = ShortCode::derive("https://two.example");
        index.insert(forged);

        let err = index
            .check_new(&record("2", "https://two.example", "alice"))
            .unwrap_err();
        assert!(matches!(err, StorageError::CodeCollision(_)));
    }

    #[test]
    fn prepare_batch_rejects_repeated_urls() {
        let index = UrlIndex::default();
        let items = vec![
            BatchItem::new("a", "https://example.com"),
            BatchItem::new("b", "https://example.com"),
        ];

        let err = index.prepare_batch(&items, "alice").unwrap_err();
        assert!(matches!(err, StorageError::DuplicateUrl(url) if url == "https://example.com"));
    }

    #[test]
    fn prepare_batch_rejects_stored_urls() {
        let mut index = UrlIndex::default();
        index.insert(record("1", "https://example.com", "alice"));
        let items = vec![
            BatchItem::new("a", "https://fresh.example"),
            BatchItem::new("b", "https://example.com"),
        ];

        assert!(index.prepare_batch(&items, "alice").is_err());
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn replay_is_first_write_wins() {
        let mut index = UrlIndex::default();
        let first = record("1", "https://example.com", "alice");
        let mut second = first.clone();
        second.id = "2".to_string();
        second.owner_id = "bob".to_string();

        assert!(index.replay(first.clone()));
        assert!(!index.replay(second));
        assert_eq!(index.by_owner("alice"), vec![first]);
        assert!(index.by_owner("bob").is_empty());
    }

    #[test]
    fn replay_applies_deletion_from_same_owner_only() {
        let mut index = UrlIndex::default();
        let original = record("1", "https://example.com", "alice");
        let code = original.short_code.clone();
        index.replay(original.clone());

        let mut foreign = original.clone();
        foreign.owner_id = "mallory".to_string();
        foreign.deleted = true;
        assert!(!index.replay(foreign));
        assert!(index.get(&code).is_ok());

        let mut tombstone = original;
        tombstone.deleted = true;
        assert!(index.replay(tombstone));
        assert!(matches!(index.get(&code), Err(StorageError::Gone(_))));
    }

    #[test]
    fn deletable_skips_foreign_deleted_and_repeated_codes() {
        let mut index = UrlIndex::default();
        let mine = record("1", "https://mine.example", "alice");
        let theirs = record("2", "https://theirs.example", "bob");
        let mine_code = mine.short_code.clone();
        let theirs_code = theirs.short_code.clone();
        index.insert(mine);
        index.insert(theirs);

        let positions = index.deletable(
            "alice",
            &[mine_code.clone(), theirs_code, mine_code.clone()],
        );
        assert_eq!(positions, vec![0]);

        index.mark_deleted(&positions);
        assert!(index.deletable("alice", &[mine_code]).is_empty());
    }

    #[test]
    fn stats_counts_deleted_records_and_distinct_owners() {
        let mut index = UrlIndex::default();
        index.insert(record("1", "https://a.example", "alice"));
        index.insert(record("2", "https://b.example", "alice"));
        index.insert(record("3", "https://c.example", "bob"));
        let positions = index.deletable("bob", &[ShortCode::derive("https://c.example")]);
        index.mark_deleted(&positions);

        assert_eq!(index.stats(), Stats { urls: 3, owners: 2 });
    }
}
