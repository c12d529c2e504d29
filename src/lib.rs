//! # Gallery Keeper
//!
//! Incremental fingerprinting, duplicate detection and reversible deletion
//! for photo collections.
//!
//! ## Core Philosophy
//! - **Only read what changed** - size, modification time and fingerprint
//!   version decide whether an image is decoded again
//! - **Never lose a photo** - deletions go through a quarantine with a
//!   retention window and can be restored until it expires
//! - **Stay observable** - every scan step is published to any number of
//!   subscribers
//!
//! ## Architecture
//! - `core` - fingerprinting, change detection, scanning, grouping, quarantine
//! - `events` - bounded-replay progress broadcast
//! - `config` - engine settings
//! - `error` - error types

pub mod config;
pub mod core;
pub mod error;
pub mod events;

pub use config::EngineConfig;
pub use error::{GalleryError, Result};

use tracing_subscriber::EnvFilter;

/// Initialize tracing for the library.
///
/// Honours `RUST_LOG`, falling back to `info`. Call once from the
/// application entry point; later calls are ignored.
pub fn init_tracing() {
    init_tracing_with_default("info");
}

/// Like [`init_tracing`], with a different fallback filter
pub fn init_tracing_with_default(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
