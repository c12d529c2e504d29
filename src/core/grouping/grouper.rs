//! Seed-based duplicate grouping.
//!
//! Near-duplicate clustering is single link against the seed only: if A is
//! close to B and B is close to C, C joins A's group only when it is also
//! close to A.

use super::{DuplicateGroup, MatchKind};
use crate::config::EngineConfig;
use crate::core::fingerprint::hamming_distance;
use crate::core::store::AssetRecord;
use std::collections::HashMap;

/// Groups asset records into exact and near-duplicate sets
#[derive(Debug, Clone, Copy)]
pub struct DuplicateGrouper {
    threshold: u32,
}

impl DuplicateGrouper {
    /// `threshold` is the largest Hamming distance that still counts as
    /// the same picture
    pub fn new(threshold: u32) -> Self {
        Self { threshold }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.near_duplicate_threshold)
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Partition `assets` into groups.
    ///
    /// Exact groups come first in order of their first member, followed by
    /// the near-duplicate pass in seed order. Every asset lands in exactly
    /// one group.
    pub fn group(&self, assets: &[AssetRecord]) -> Vec<DuplicateGroup> {
        let mut by_digest: HashMap<&str, Vec<usize>> = HashMap::new();
        let mut digest_order: Vec<&str> = Vec::new();

        for (index, asset) in assets.iter().enumerate() {
            if let Some(digest) = asset.digest.as_deref() {
                by_digest
                    .entry(digest)
                    .or_insert_with(|| {
                        digest_order.push(digest);
                        Vec::new()
                    })
                    .push(index);
            }
        }

        let mut grouped = vec![false; assets.len()];
        let mut groups = Vec::new();

        for digest in digest_order {
            let members = &by_digest[digest];
            if members.len() < 2 {
                continue;
            }
            for &index in members {
                grouped[index] = true;
            }
            groups.push(DuplicateGroup::new(
                MatchKind::Exact,
                members.iter().map(|&i| assets[i].clone()).collect(),
            ));
        }

        let exact_groups = groups.len();
        let remaining: Vec<usize> = (0..assets.len()).filter(|&i| !grouped[i]).collect();

        for (position, &seed) in remaining.iter().enumerate() {
            if grouped[seed] {
                continue;
            }
            grouped[seed] = true;
            let mut members = vec![assets[seed].clone()];

            if let Some(seed_hash) = assets[seed].perceptual_hash.as_deref() {
                for &candidate in &remaining[position + 1..] {
                    if grouped[candidate] {
                        continue;
                    }
                    let Some(hash) = assets[candidate].perceptual_hash.as_deref() else {
                        continue;
                    };
                    if hamming_distance(seed_hash, hash) <= self.threshold {
                        grouped[candidate] = true;
                        members.push(assets[candidate].clone());
                    }
                }
            }

            groups.push(DuplicateGroup::new(MatchKind::NearDuplicate, members));
        }

        tracing::debug!(
            "Grouped {} assets into {} exact and {} other groups",
            assets.len(),
            exact_groups,
            groups.len() - exact_groups
        );

        groups
    }
}

impl Default for DuplicateGrouper {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::store::test_support::record;

    fn asset(identifier: &str, digest: Option<&str>, hash: Option<&str>) -> AssetRecord {
        let mut record = record(identifier, 100, 1000);
        record.digest = digest.map(String::from);
        record.perceptual_hash = hash.map(String::from);
        record
    }

    fn identifiers(group: &DuplicateGroup) -> Vec<&str> {
        group.assets.iter().map(|a| a.identifier.as_str()).collect()
    }

    #[test]
    fn empty_input_has_no_groups() {
        assert!(DuplicateGrouper::new(6).group(&[]).is_empty());
    }

    #[test]
    fn equal_digests_form_exact_group() {
        let assets = vec![
            asset("a", Some("d1"), Some("0000000000000000")),
            asset("b", Some("d1"), Some("ffffffffffffffff")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, MatchKind::Exact);
        assert!(groups[0].is_duplicate_set);
        assert_eq!(identifiers(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn unique_digest_falls_through_to_near_pass() {
        let assets = vec![
            asset("a", Some("d1"), Some("0000000000000000")),
            asset("b", Some("d2"), Some("0000000000000001")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].kind, MatchKind::NearDuplicate);
        assert_eq!(identifiers(&groups[0]), vec!["a", "b"]);
    }

    #[test]
    fn three_bits_apart_share_a_group() {
        // 0x7 has three bits set
        let assets = vec![
            asset("a", None, Some("0000000000000000")),
            asset("b", None, Some("0000000000000007")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 1);
        assert!(groups[0].is_duplicate_set);
    }

    #[test]
    fn distance_above_threshold_stays_apart() {
        let assets = vec![
            asset("a", None, Some("0000000000000000")),
            asset("b", None, Some("00000000000000ff")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 2);
        assert!(groups.iter().all(|g| !g.is_duplicate_set));
    }

    #[test]
    fn membership_is_measured_against_seed_only() {
        // a-b: 4 bits, b-c: 4 bits, a-c: 8 bits
        let assets = vec![
            asset("a", None, Some("0000000000000000")),
            asset("b", None, Some("000000000000000f")),
            asset("c", None, Some("00000000000000ff")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 2);
        assert_eq!(identifiers(&groups[0]), vec!["a", "b"]);
        assert_eq!(identifiers(&groups[1]), vec!["c"]);
    }

    #[test]
    fn missing_hash_is_a_singleton() {
        let assets = vec![
            asset("a", None, None),
            asset("b", None, Some("0000000000000000")),
            asset("c", None, Some("0000000000000000")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups.len(), 2);
        assert_eq!(identifiers(&groups[0]), vec!["a"]);
        assert_eq!(identifiers(&groups[1]), vec!["b", "c"]);
    }

    #[test]
    fn exact_groups_come_first_and_every_asset_appears_once() {
        let assets = vec![
            asset("solo", Some("x"), Some("ffffffffffffffff")),
            asset("e1", Some("d"), Some("0000000000000000")),
            asset("near", Some("y"), Some("fffffffffffffffe")),
            asset("e2", Some("d"), Some("0000000000000000")),
        ];

        let groups = DuplicateGrouper::new(6).group(&assets);

        assert_eq!(groups[0].kind, MatchKind::Exact);
        assert_eq!(identifiers(&groups[0]), vec!["e1", "e2"]);
        assert_eq!(identifiers(&groups[1]), vec!["solo", "near"]);

        let total: usize = groups.iter().map(DuplicateGroup::len).sum();
        assert_eq!(total, assets.len());
    }
}
