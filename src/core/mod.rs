//! # Core Module
//!
//! The host-agnostic gallery engine.
//!
//! ## Modules
//! - `fingerprint` - Byte digests, perceptual hashes and sharpness scores
//! - `oracle` - Decides whether an asset must be fingerprinted again
//! - `store` - Persists asset and quarantine records
//! - `media` - Seams to the host collection, plus filesystem adapters
//! - `scan` - Incremental scan driver
//! - `grouping` - Exact and near-duplicate grouping
//! - `quarantine` - Backup, restore and purge lifecycle

pub mod fingerprint;
pub mod grouping;
pub mod media;
pub mod oracle;
pub mod quarantine;
pub mod scan;
pub mod store;

// Re-export commonly used types
pub use fingerprint::{Fingerprint, Fingerprinter, PixelBuffer};
pub use grouping::{DuplicateGroup, DuplicateGrouper, MatchKind};
pub use media::{AssetDescriptor, CollectionEnumerator, MediaAccess};
pub use oracle::{ChangeOracle, Decision};
pub use quarantine::{PurgeScheduler, QuarantineManager};
pub use scan::{CancellationToken, ScanDriver, ScanStatus};
pub use store::{AssetRecord, GalleryStore, InMemoryStore, QuarantineRecord, SqliteStore};
