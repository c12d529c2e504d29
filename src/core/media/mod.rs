//! # Media Module
//!
//! The seams between the engine and the host's media collection.
//!
//! ## Collaborators
//! - `CollectionEnumerator` - lists live assets in a defined order
//! - `MediaAccess` - decodes downsized pixels and opens raw byte streams
//! - `DeletionConfirmation` - removes a live asset after the user agrees
//! - `RestoreTarget` - writes restored bytes back as a new live asset
//!
//! `fs` provides filesystem implementations of all four.

mod filter;
mod fs;

pub use filter::ImageFilter;
pub use fs::{
    identifier_for, AutoConfirm, FsCollection, FsDeletion, FsRestoreTarget, PromptConfirm,
};

use crate::core::fingerprint::PixelBuffer;
use crate::error::MediaError;
use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

/// One live asset as reported by the collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetDescriptor {
    /// Stable identifier (a path for filesystem collections)
    pub identifier: String,
    pub display_name: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub size_bytes: Option<u64>,
    /// Opaque modification timestamp; only compared for equality
    pub modified_at: Option<i64>,
}

impl AssetDescriptor {
    /// A descriptor with only an identifier known
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            display_name: None,
            width: None,
            height: None,
            size_bytes: None,
            modified_at: None,
        }
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_size(mut self, size_bytes: u64) -> Self {
        self.size_bytes = Some(size_bytes);
        self
    }

    pub fn with_modified_at(mut self, modified_at: i64) -> Self {
        self.modified_at = Some(modified_at);
        self
    }
}

/// Lists the live assets of a collection
pub trait CollectionEnumerator: Send + Sync {
    /// Every live asset, in the order a scan should visit them
    fn enumerate(&self) -> Result<Vec<AssetDescriptor>, MediaError>;
}

/// Reads asset content
pub trait MediaAccess: Send + Sync {
    /// Decode an asset into packed RGB pixels no larger than `max_dimension`
    /// on either side
    fn decode_pixels(&self, identifier: &str, max_dimension: u32)
        -> Result<PixelBuffer, MediaError>;

    /// Open the raw bytes of an asset
    fn open_stream(&self, identifier: &str) -> Result<Box<dyn Read + Send>, MediaError>;
}

/// Removes a live asset once the user agrees.
///
/// `Ok(true)` means the asset is gone. `Ok(false)` means the user declined
/// and nothing was touched.
pub trait DeletionConfirmation {
    fn confirm_deletion(&self, identifier: &str) -> Result<bool, MediaError>;
}

/// Accepts restored bytes as a new live asset
pub trait RestoreTarget {
    /// Write `reader` out and return the identifier of the new asset
    fn write_back(
        &self,
        reader: &mut dyn Read,
        display_name: &str,
        mime_type: &str,
    ) -> Result<String, MediaError>;
}

/// Mime type guessed from a file name's extension
pub fn mime_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase());

    match extension.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("heic") => "image/heic",
        Some("heif") => "image/heif",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mime_type_follows_extension() {
        assert_eq!(mime_type_for("IMG_0001.JPG"), "image/jpeg");
        assert_eq!(mime_type_for("scan.tif"), "image/tiff");
        assert_eq!(mime_type_for("shot.png"), "image/png");
    }

    #[test]
    fn unknown_extension_is_octet_stream() {
        assert_eq!(mime_type_for("notes.txt"), "application/octet-stream");
        assert_eq!(mime_type_for("no_extension"), "application/octet-stream");
    }

    #[test]
    fn descriptor_builder_sets_fields() {
        let descriptor = AssetDescriptor::new("/photos/a.jpg")
            .with_display_name("a.jpg")
            .with_dimensions(640, 480)
            .with_size(1024)
            .with_modified_at(1000);

        assert_eq!(descriptor.display_name.as_deref(), Some("a.jpg"));
        assert_eq!(descriptor.width, Some(640));
        assert_eq!(descriptor.size_bytes, Some(1024));
        assert_eq!(descriptor.modified_at, Some(1000));
    }
}
