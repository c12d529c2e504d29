//! # Store Module
//!
//! Persists asset fingerprints and quarantine records.
//!
//! ## Guarantees
//! - One asset record per identifier; rescans update in place and keep the row id
//! - Every mutation is atomic per record, so concurrent readers never see a
//!   half-written row
//! - Deleting rows that are already gone is a successful no-op
//!
//! ## Backends
//! - `SqliteStore` - Persistent storage using SQLite
//! - `InMemoryStore` - For testing and dry runs

mod memory;
mod sqlite;
mod traits;

pub use memory::InMemoryStore;
pub use sqlite::SqliteStore;
pub use traits::{AssetStore, GalleryStore, QuarantineStore};

use crate::core::fingerprint::Fingerprint;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Stored scan result for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetRecord {
    /// Row id assigned by the store (`None` until persisted)
    pub id: Option<i64>,
    /// Stable, opaque handle of the asset in the collection
    pub identifier: String,
    pub digest: Option<String>,
    pub perceptual_hash: Option<String>,
    pub sharpness: Option<f64>,
    pub is_blurry: Option<bool>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
    /// Modification time as reported by the collection (unix seconds)
    pub modified_at: Option<i64>,
    /// When this record was last written (unix millis)
    pub last_scanned_at: i64,
    /// Fingerprint format version that produced this record
    pub algorithm_version: u32,
}

impl AssetRecord {
    /// The fingerprint, if every part of it was computed
    pub fn fingerprint(&self) -> Option<Fingerprint> {
        Some(Fingerprint {
            digest: self.digest.clone()?,
            perceptual_hash: self.perceptual_hash.clone()?,
            sharpness: self.sharpness?,
            is_blurry: self.is_blurry?,
        })
    }
}

/// Durable record of a confirmed soft delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuarantineRecord {
    /// Row id assigned by the store (`None` until persisted)
    pub id: Option<i64>,
    /// Identifier the asset had before it was removed
    pub original_identifier: String,
    /// The only copy of the bytes
    pub backup_path: PathBuf,
    /// Unix millis
    pub moved_at: i64,
    /// Unix millis
    pub expires_at: i64,
}

impl QuarantineRecord {
    pub fn is_expired(&self, now: i64) -> bool {
        self.expires_at <= now
    }
}

/// Counts for dashboards
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreStats {
    pub total_assets: usize,
    pub fingerprinted_assets: usize,
    pub blurry_assets: usize,
    pub quarantined: usize,
    pub oldest_scan: Option<i64>,
    pub newest_scan: Option<i64>,
}


#[cfg(test)]
mod tests {
    use super::test_support::record;
    use super::*;

    #[test]
    fn fingerprint_requires_every_part() {
        let mut asset = record("a", 1, 1);
        assert!(asset.fingerprint().is_some());

        asset.sharpness = None;
        assert!(asset.fingerprint().is_none());
    }

    #[test]
    fn quarantine_expires_at_deadline() {
        let record = QuarantineRecord {
            id: None,
            original_identifier: "a".to_string(),
            backup_path: PathBuf::from("/backups/a"),
            moved_at: 0,
            expires_at: 100,
        };

        assert!(!record.is_expired(99));
        assert!(record.is_expired(100));
    }
}
