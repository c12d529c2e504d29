//! # Error Module
//!
//! Error types for the gallery engine.
//!
//! ## Design Principles
//! - **Never panic** on user data - return errors instead
//! - **Include context** - identifiers, paths, what went wrong
//! - **Isolate per-asset failures** - a `MediaError` only ever affects one asset
//! - **Stop on storage failures** - a `StoreError` aborts the current pass

use std::path::PathBuf;
use thiserror::Error;

/// Top-level application error
#[derive(Error, Debug)]
pub enum GalleryError {
    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),

    #[error("Quarantine error: {0}")]
    Quarantine(#[from] QuarantineError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

/// Errors reading or decoding a single asset.
///
/// These are transient from the scan's point of view: the asset is skipped
/// and the pass continues.
#[derive(Error, Debug)]
pub enum MediaError {
    #[error("Asset not found: {identifier}")]
    NotFound { identifier: String },

    #[error("Failed to open {identifier}: {source}")]
    Open {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read {identifier}: {source}")]
    Read {
        identifier: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to decode image {identifier}: {reason}")]
    Decode { identifier: String, reason: String },

    #[error("Path is not valid UTF-8: {}", path.display())]
    NonUtf8Path { path: PathBuf },

    #[error("Failed to enumerate collection at {path}: {reason}")]
    Enumerate { path: PathBuf, reason: String },

    #[error("Failed to write {target}: {source}")]
    Write {
        target: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the persistent store
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Failed to open store at {path}: {reason}")]
    OpenFailed { path: PathBuf, reason: String },

    #[error("Database query failed: {0}")]
    QueryFailed(String),

    #[error("Store lock poisoned at {path}. Restart the process and try again.")]
    Poisoned { path: PathBuf },
}

impl From<rusqlite::Error> for StoreError {
    fn from(error: rusqlite::Error) -> Self {
        StoreError::QueryFailed(error.to_string())
    }
}

/// Errors from the quarantine lifecycle
#[derive(Error, Debug)]
pub enum QuarantineError {
    #[error("Failed to copy {identifier} into quarantine: {reason}")]
    CopyFailed { identifier: String, reason: String },

    #[error("Deletion of {identifier} was not confirmed")]
    ConfirmationDenied { identifier: String },

    #[error("Deletion confirmation for {identifier} failed: {reason}")]
    ConfirmationFailed { identifier: String, reason: String },

    #[error("No quarantine record for {identifier}")]
    NotQuarantined { identifier: String },

    #[error("Backup file missing: {path}")]
    BackupMissing { path: PathBuf },

    #[error("Failed to restore {identifier}: {reason}")]
    RestoreFailed { identifier: String, reason: String },

    #[error("Failed to prepare backup directory {path}: {source}")]
    BackupDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Storage error: {0}")]
    Store(#[from] StoreError),
}

/// Errors loading or validating configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {reason}")]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

/// Convenience Result type alias
pub type Result<T> = std::result::Result<T, GalleryError>;
