//! # Grouping Module
//!
//! Partitions fingerprinted assets into duplicate groups.
//!
//! ## How It Works
//! 1. Assets sharing a byte digest form exact groups
//! 2. Everything else is clustered around seeds by perceptual-hash distance
//! 3. Whatever is left stands alone
//!
//! ## Distance Guide
//! | Distance | Meaning                          |
//! |----------|----------------------------------|
//! | 0        | Same picture, maybe re-encoded   |
//! | 1-6      | Resized, recompressed or edited  |
//! | 7+       | Probably a different picture     |

mod grouper;

pub use grouper::DuplicateGrouper;

use crate::core::store::AssetRecord;
use serde::{Deserialize, Serialize};

/// How the members of a group matched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchKind {
    /// Identical bytes
    Exact,
    /// Perceptual hashes within the threshold of the group's seed
    NearDuplicate,
    /// Matched nothing
    Unique,
}

impl std::fmt::Display for MatchKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MatchKind::Exact => write!(f, "Exact Match"),
            MatchKind::NearDuplicate => write!(f, "Near Duplicate"),
            MatchKind::Unique => write!(f, "Unique"),
        }
    }
}

/// A set of assets considered the same picture
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub kind: MatchKind,
    /// Members in input order; the first is the seed
    pub assets: Vec<AssetRecord>,
    /// True when the group has two or more members
    pub is_duplicate_set: bool,
}

impl DuplicateGroup {
    pub(crate) fn new(kind: MatchKind, assets: Vec<AssetRecord>) -> Self {
        let is_duplicate_set = assets.len() >= 2;
        let kind = if is_duplicate_set { kind } else { MatchKind::Unique };
        Self {
            kind,
            assets,
            is_duplicate_set,
        }
    }

    pub fn len(&self) -> usize {
        self.assets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assets.is_empty()
    }

    /// The member the others were compared against
    pub fn representative(&self) -> Option<&AssetRecord> {
        self.assets.first()
    }

    /// Members other than the representative
    pub fn duplicates(&self) -> &[AssetRecord] {
        self.assets.get(1..).unwrap_or(&[])
    }

    /// Bytes freed by keeping only the representative
    pub fn reclaimable_bytes(&self) -> u64 {
        self.duplicates().iter().filter_map(|a| a.size_bytes).sum()
    }
}
