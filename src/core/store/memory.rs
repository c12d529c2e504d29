//! In-memory store backend for testing.

use super::{AssetRecord, AssetStore, GalleryStore, QuarantineRecord, QuarantineStore};
use crate::error::StoreError;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

/// In-memory store backend
///
/// Useful for testing and scenarios where persistence isn't needed.
pub struct InMemoryStore {
    assets: RwLock<HashMap<String, AssetRecord>>,
    quarantine: RwLock<HashMap<i64, QuarantineRecord>>,
    next_id: AtomicI64,
    writes: AtomicI64,
}

impl InMemoryStore {
    /// Create a new in-memory store
    pub fn new() -> Self {
        Self {
            assets: RwLock::new(HashMap::new()),
            quarantine: RwLock::new(HashMap::new()),
            next_id: AtomicI64::new(1),
            writes: AtomicI64::new(0),
        }
    }

    /// Number of asset upserts performed so far
    pub fn upsert_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst) as usize
    }

    fn poisoned() -> StoreError {
        StoreError::Poisoned {
            path: PathBuf::from("memory"),
        }
    }

    fn assets(&self) -> Result<RwLockReadGuard<'_, HashMap<String, AssetRecord>>, StoreError> {
        self.assets.read().map_err(|_| Self::poisoned())
    }

    fn assets_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<String, AssetRecord>>, StoreError> {
        self.assets.write().map_err(|_| Self::poisoned())
    }

    fn quarantine(
        &self,
    ) -> Result<RwLockReadGuard<'_, HashMap<i64, QuarantineRecord>>, StoreError> {
        self.quarantine.read().map_err(|_| Self::poisoned())
    }

    fn quarantine_mut(
        &self,
    ) -> Result<RwLockWriteGuard<'_, HashMap<i64, QuarantineRecord>>, StoreError> {
        self.quarantine.write().map_err(|_| Self::poisoned())
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AssetStore for InMemoryStore {
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<AssetRecord>, StoreError> {
        Ok(self.assets()?.get(identifier).cloned())
    }

    fn upsert(&self, record: &AssetRecord) -> Result<i64, StoreError> {
        let mut assets = self.assets_mut()?;

        let id = match assets.get(&record.identifier).and_then(|existing| existing.id) {
            Some(id) => id,
            None => self.next_id.fetch_add(1, Ordering::SeqCst),
        };

        let mut stored = record.clone();
        stored.id = Some(id);
        assets.insert(stored.identifier.clone(), stored);
        self.writes.fetch_add(1, Ordering::SeqCst);

        Ok(id)
    }

    fn delete_where_identifier_not_in(&self, live: &HashSet<String>) -> Result<usize, StoreError> {
        let mut assets = self.assets_mut()?;
        let before = assets.len();
        assets.retain(|identifier, _| live.contains(identifier));
        Ok(before - assets.len())
    }

    fn delete_by_identifiers(&self, identifiers: &[String]) -> Result<usize, StoreError> {
        let mut assets = self.assets_mut()?;
        Ok(identifiers
            .iter()
            .filter(|identifier| assets.remove(identifier.as_str()).is_some())
            .count())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AssetRecord>, StoreError> {
        let mut records: Vec<AssetRecord> = self.assets()?.values().cloned().collect();
        records.sort_by(|a, b| {
            b.last_scanned_at
                .cmp(&a.last_scanned_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        records.truncate(limit);
        Ok(records)
    }

    fn all(&self) -> Result<Vec<AssetRecord>, StoreError> {
        let mut records: Vec<AssetRecord> = self.assets()?.values().cloned().collect();
        records.sort_by_key(|r| r.id);
        Ok(records)
    }
}

impl QuarantineStore for InMemoryStore {
    fn insert(&self, record: &QuarantineRecord) -> Result<i64, StoreError> {
        let mut quarantine = self.quarantine_mut()?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);

        let mut stored = record.clone();
        stored.id = Some(id);
        quarantine.insert(id, stored);

        Ok(id)
    }

    fn find_by_original_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<QuarantineRecord>, StoreError> {
        Ok(self
            .quarantine()?
            .values()
            .filter(|r| r.original_identifier == identifier)
            .max_by_key(|r| r.id)
            .cloned())
    }

    fn find_by_id(&self, id: i64) -> Result<Option<QuarantineRecord>, StoreError> {
        Ok(self.quarantine()?.get(&id).cloned())
    }

    fn find_expired(&self, now: i64) -> Result<Vec<QuarantineRecord>, StoreError> {
        let mut expired: Vec<QuarantineRecord> = self
            .quarantine()?
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect();
        expired.sort_by_key(|r| r.id);
        Ok(expired)
    }

    fn delete_by_ids(&self, ids: &[i64]) -> Result<usize, StoreError> {
        let mut quarantine = self.quarantine_mut()?;
        Ok(ids.iter().filter(|id| quarantine.remove(id).is_some()).count())
    }

    fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError> {
        let mut records: Vec<QuarantineRecord> = self.quarantine()?.values().cloned().collect();
        records.sort_by(|a, b| b.moved_at.cmp(&a.moved_at).then_with(|| b.id.cmp(&a.id)));
        Ok(records)
    }
}

impl GalleryStore for InMemoryStore {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_support::{quarantine, record};

    #[test]
    fn missing_identifier_returns_none() {
        let store = InMemoryStore::new();
        assert!(store.find_by_identifier("/nope.jpg").unwrap().is_none());
    }

    #[test]
    fn upsert_preserves_row_id() {
        let store = InMemoryStore::new();

        let first = store.upsert(&record("/a.jpg", 100, 1000)).unwrap();
        let second = store.upsert(&record("/a.jpg", 200, 1001)).unwrap();

        assert_eq!(first, second);
        let stored = store.find_by_identifier("/a.jpg").unwrap().unwrap();
        assert_eq!(stored.size_bytes, Some(200));
        assert_eq!(stored.id, Some(first));
    }

    #[test]
    fn delete_not_in_keeps_live_records() {
        let store = InMemoryStore::new();
        for id in ["/a.jpg", "/b.jpg", "/c.jpg"] {
            store.upsert(&record(id, 1, 1)).unwrap();
        }

        let live: HashSet<String> = ["/a.jpg", "/b.jpg"].iter().map(|s| s.to_string()).collect();
        let removed = store.delete_where_identifier_not_in(&live).unwrap();

        assert_eq!(removed, 1);
        assert!(store.find_by_identifier("/c.jpg").unwrap().is_none());
        assert!(store.find_by_identifier("/a.jpg").unwrap().is_some());
    }

    #[test]
    fn recent_orders_by_last_scanned() {
        let store = InMemoryStore::new();
        let mut older = record("/old.jpg", 1, 1);
        older.last_scanned_at = 10;
        let mut newer = record("/new.jpg", 1, 1);
        newer.last_scanned_at = 20;
        store.upsert(&older).unwrap();
        store.upsert(&newer).unwrap();

        let recent = store.recent(1).unwrap();

        assert_eq!(recent.len(), 1);
        assert_eq!(recent[0].identifier, "/new.jpg");
    }

    #[test]
    fn deleting_missing_quarantine_rows_is_ok() {
        let store = InMemoryStore::new();
        let id = store.insert(&quarantine("/a.jpg", 10)).unwrap();

        assert_eq!(store.delete_by_ids(&[id]).unwrap(), 1);
        assert_eq!(store.delete_by_ids(&[id]).unwrap(), 0);
    }

    #[test]
    fn find_expired_includes_deadline() {
        let store = InMemoryStore::new();
        store.insert(&quarantine("/a.jpg", 10)).unwrap();
        store.insert(&quarantine("/b.jpg", 20)).unwrap();

        let expired = store.find_expired(10).unwrap();

        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].original_identifier, "/a.jpg");
    }

    #[test]
    fn stats_are_accurate() {
        let store = InMemoryStore::new();
        let mut blurry = record("/blurry.jpg", 1, 1);
        blurry.is_blurry = Some(true);
        store.upsert(&blurry).unwrap();
        store.upsert(&record("/sharp.jpg", 1, 1)).unwrap();
        store.insert(&quarantine("/gone.jpg", 10)).unwrap();

        let stats = store.stats().unwrap();

        assert_eq!(stats.total_assets, 2);
        assert_eq!(stats.blurry_assets, 1);
        assert_eq!(stats.fingerprinted_assets, 2);
        assert_eq!(stats.quarantined, 1);
    }
}
