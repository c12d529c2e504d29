//! # Change-Detection Oracle
//!
//! Decides whether an asset must be fingerprinted again.
//!
//! Size plus modification time is a cheap proxy for "the bytes changed".
//! Anything unknown counts as changed: an unneeded rescan is cheaper than a
//! stale fingerprint.

use crate::core::store::{AssetRecord, AssetStore};
use crate::error::StoreError;
use serde::{Deserialize, Serialize};

/// Why an asset was (or was not) scheduled for processing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Decision {
    /// Never seen before
    New,
    /// Stored fingerprint was produced by another algorithm version
    VersionChanged,
    /// Stored or observed modification time is unknown
    ModifiedUnknown,
    /// Modification time differs
    Modified,
    /// Stored or observed size is unknown
    SizeUnknown,
    /// Size differs
    SizeChanged,
    /// Nothing changed; reuse the stored fingerprint
    Unchanged,
}

impl Decision {
    /// Decide from the stored record and fresh metadata. First match wins.
    pub fn evaluate(
        existing: Option<&AssetRecord>,
        observed_size: Option<u64>,
        observed_modified_at: Option<i64>,
        current_version: u32,
    ) -> Self {
        let Some(existing) = existing else {
            return Decision::New;
        };

        if existing.algorithm_version != current_version {
            return Decision::VersionChanged;
        }

        match (existing.modified_at, observed_modified_at) {
            (Some(stored), Some(observed)) if stored != observed => return Decision::Modified,
            (Some(_), Some(_)) => {}
            _ => return Decision::ModifiedUnknown,
        }

        match (existing.size_bytes, observed_size) {
            (Some(stored), Some(observed)) if stored != observed => Decision::SizeChanged,
            (Some(_), Some(_)) => Decision::Unchanged,
            _ => Decision::SizeUnknown,
        }
    }

    pub fn needs_processing(&self) -> bool {
        !matches!(self, Decision::Unchanged)
    }
}

impl std::fmt::Display for Decision {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Decision::New => write!(f, "new asset"),
            Decision::VersionChanged => write!(f, "fingerprint version changed"),
            Decision::ModifiedUnknown => write!(f, "modification time unknown"),
            Decision::Modified => write!(f, "modified"),
            Decision::SizeUnknown => write!(f, "size unknown"),
            Decision::SizeChanged => write!(f, "size changed"),
            Decision::Unchanged => write!(f, "unchanged"),
        }
    }
}

/// Store-backed oracle
pub struct ChangeOracle<'a, S: AssetStore + ?Sized> {
    store: &'a S,
}

impl<'a, S: AssetStore + ?Sized> ChangeOracle<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Look up the stored record and decide.
    ///
    /// Returns the record too, so a skipped asset can reuse it without a
    /// second lookup.
    pub fn inspect(
        &self,
        identifier: &str,
        observed_size: Option<u64>,
        observed_modified_at: Option<i64>,
        current_version: u32,
    ) -> Result<(Decision, Option<AssetRecord>), StoreError> {
        let existing = self.store.find_by_identifier(identifier)?;
        let decision = Decision::evaluate(
            existing.as_ref(),
            observed_size,
            observed_modified_at,
            current_version,
        );
        Ok((decision, existing))
    }

    pub fn needs_processing(
        &self,
        identifier: &str,
        observed_size: Option<u64>,
        observed_modified_at: Option<i64>,
        current_version: u32,
    ) -> Result<bool, StoreError> {
        let (decision, _) =
            self.inspect(identifier, observed_size, observed_modified_at, current_version)?;
        Ok(decision.needs_processing())
    }
}
