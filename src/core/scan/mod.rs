//! # Scan Module
//!
//! Incremental scanning of a media collection.
//!
//! ## Per-asset flow
//! 1. **Ask the oracle** - skip assets whose stored record is still current
//! 2. **Fingerprint** - decode a thumbnail and hash the bytes (in parallel)
//! 3. **Commit** - upsert the record and publish the outcome, in order
//!
//! After a completed pass, records for assets that no longer exist are
//! deleted. A cancelled pass never deletes anything.

mod driver;

pub use driver::{CancellationToken, ScanDriver, ScanDriverBuilder, ScanReport, ScanStatus};
