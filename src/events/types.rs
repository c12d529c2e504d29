//! Event type definitions for scan progress.

use crate::core::fingerprint::Fingerprint;
use crate::core::oracle::Decision;
use serde::{Deserialize, Serialize};

/// Events emitted by the scan driver
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ScanEvent {
    /// A pass has started over `total` enumerated assets
    Started { total: usize },
    /// One asset was visited
    Item(ScanOutcome),
    /// The pass finished and reconciliation ran
    Completed(ScanSummary),
    /// The pass was cancelled; no reconciliation ran
    Cancelled(ScanSummary),
    /// The pass stopped on a storage failure
    Failed { message: String },
}

/// The result of visiting one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScanOutcome {
    /// Identifier of the asset
    pub identifier: String,
    /// Human-readable name from the collection
    pub display_name: Option<String>,
    /// Fingerprint, fresh or reused. `None` if the asset could not be read.
    pub fingerprint: Option<Fingerprint>,
    /// 1-based position in the visitation order
    pub index: usize,
    /// Assets known so far in this pass
    pub total: usize,
    /// Why the oracle did or did not reprocess this asset
    pub decision: Decision,
    /// Per-asset read or decode failure
    pub error: Option<String>,
}

impl ScanOutcome {
    /// The stored fingerprint was reused without touching the media
    pub fn reused(&self) -> bool {
        !self.decision.needs_processing()
    }
}

/// Totals for one pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanSummary {
    /// Assets visited
    pub visited: usize,
    /// Assets fingerprinted and written
    pub processed: usize,
    /// Assets whose stored fingerprint was reused
    pub reused: usize,
    /// Assets skipped because they could not be read
    pub failed: usize,
    /// Records deleted by reconciliation
    pub removed: usize,
    /// Duration in milliseconds
    pub duration_ms: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_are_serializable() {
        let event = ScanEvent::Item(ScanOutcome {
            identifier: "/photos/a.jpg".to_string(),
            display_name: Some("a.jpg".to_string()),
            fingerprint: None,
            index: 1,
            total: 3,
            decision: Decision::New,
            error: Some("decode failed".to_string()),
        });

        let json = serde_json::to_string(&event).unwrap();
        let deserialized: ScanEvent = serde_json::from_str(&json).unwrap();

        match deserialized {
            ScanEvent::Item(outcome) => {
                assert_eq!(outcome.identifier, "/photos/a.jpg");
                assert_eq!(outcome.total, 3);
            }
            _ => panic!("Wrong event type"),
        }
    }

    #[test]
    fn unchanged_outcome_is_reused() {
        let outcome = ScanOutcome {
            identifier: "a".to_string(),
            display_name: None,
            fingerprint: None,
            index: 1,
            total: 1,
            decision: Decision::Unchanged,
            error: None,
        };
        assert!(outcome.reused());
    }
}
