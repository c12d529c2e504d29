//! Store trait definitions.

use super::{AssetRecord, QuarantineRecord, StoreStats};
use crate::error::StoreError;
use std::collections::HashSet;

/// Asset record persistence
pub trait AssetStore: Send + Sync {
    /// Look up the record for an identifier
    fn find_by_identifier(&self, identifier: &str) -> Result<Option<AssetRecord>, StoreError>;

    /// Insert a record, or update the existing one with the same identifier.
    ///
    /// The row id of an existing record is preserved. Returns the row id.
    fn upsert(&self, record: &AssetRecord) -> Result<i64, StoreError>;

    /// Delete every record whose identifier is not in `live`.
    ///
    /// Returns the number of records removed.
    fn delete_where_identifier_not_in(&self, live: &HashSet<String>) -> Result<usize, StoreError>;

    /// Delete the records for the given identifiers
    fn delete_by_identifiers(&self, identifiers: &[String]) -> Result<usize, StoreError>;

    /// Most recently scanned records first
    fn recent(&self, limit: usize) -> Result<Vec<AssetRecord>, StoreError>;

    /// Every record, in row id order
    fn all(&self) -> Result<Vec<AssetRecord>, StoreError>;
}

/// Quarantine record persistence
pub trait QuarantineStore: Send + Sync {
    /// Persist a confirmed quarantine. Returns the row id.
    fn insert(&self, record: &QuarantineRecord) -> Result<i64, StoreError>;

    fn find_by_original_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<QuarantineRecord>, StoreError>;

    fn find_by_id(&self, id: i64) -> Result<Option<QuarantineRecord>, StoreError>;

    /// Records whose expiry is at or before `now` (unix millis)
    fn find_expired(&self, now: i64) -> Result<Vec<QuarantineRecord>, StoreError>;

    /// Delete records by row id. Missing ids are ignored.
    fn delete_by_ids(&self, ids: &[i64]) -> Result<usize, StoreError>;

    /// Every record, most recently moved first
    fn list(&self) -> Result<Vec<QuarantineRecord>, StoreError>;
}

/// A store holding both record kinds
pub trait GalleryStore: AssetStore + QuarantineStore {
    /// Dashboard counts
    fn stats(&self) -> Result<StoreStats, StoreError> {
        let assets = self.all()?;
        let quarantined = self.list()?.len();

        Ok(StoreStats {
            total_assets: assets.len(),
            fingerprinted_assets: assets.iter().filter(|a| a.digest.is_some()).count(),
            blurry_assets: assets.iter().filter(|a| a.is_blurry == Some(true)).count(),
            quarantined,
            oldest_scan: assets.iter().map(|a| a.last_scanned_at).min(),
            newest_scan: assets.iter().map(|a| a.last_scanned_at).max(),
        })
    }
}
