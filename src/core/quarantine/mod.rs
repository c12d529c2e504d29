//! # Quarantine Module
//!
//! Reversible deletion with a retention window.
//!
//! ## Lifecycle
//! ```text
//! Live --move_to_backup--> Pending --finalize--> Quarantined --restore--> Live
//!                             |                       |
//!                          discard               purge (expired)
//! ```
//!
//! A backup becomes durable only after the host confirms the original was
//! removed. Purging deletes the backup file first and the record second;
//! files that could not be deleted are picked up by a later orphan sweep.

mod manager;
mod scheduler;

pub use manager::{display_name_of, PendingQuarantine, PurgeReport, QuarantineManager};
pub use scheduler::PurgeScheduler;
