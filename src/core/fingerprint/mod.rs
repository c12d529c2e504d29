//! # Fingerprint Module
//!
//! Pure functions that summarize an image:
//! - **Digest** - SHA-256 of the raw bytes, for exact duplicates
//! - **Perceptual hash** - 64-bit dHash of a 9x8 luma grid, for near-duplicates
//! - **Sharpness** - Laplacian edge energy, for blur detection
//!
//! The engine only ever sees already-decoded pixels and open streams;
//! decoding failures belong to the media layer.

mod digest;
mod perceptual;
mod pixels;
mod sharpness;

pub use digest::cryptographic_digest;
pub use perceptual::{hamming_distance, perceptual_hash, EMPTY_HASH, HASH_BITS};
pub use pixels::{luma, pack_rgb, PixelBuffer};
pub use sharpness::{is_blurry, sharpness_score};

use crate::config::EngineConfig;
use serde::{Deserialize, Serialize};
use std::io::{self, Read};

/// Everything computed for one asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fingerprint {
    /// Hex SHA-256 of the raw bytes
    pub digest: String,
    /// Hex 64-bit perceptual hash
    pub perceptual_hash: String,
    /// Laplacian edge energy (higher = sharper)
    pub sharpness: f64,
    /// `sharpness < blur_threshold`
    pub is_blurry: bool,
}

/// Applies the fingerprint functions with deployment-specific tuning
#[derive(Debug, Clone)]
pub struct Fingerprinter {
    blur_threshold: f64,
    sharpness_stride: u32,
}

impl Fingerprinter {
    pub fn new(blur_threshold: f64, sharpness_stride: u32) -> Self {
        Self {
            blur_threshold,
            sharpness_stride: sharpness_stride.max(1),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.blur_threshold, config.sharpness_stride)
    }

    pub fn blur_threshold(&self) -> f64 {
        self.blur_threshold
    }

    /// Fingerprint a decoded thumbnail and the matching byte stream
    pub fn fingerprint<R: Read>(&self, image: &PixelBuffer, stream: R) -> io::Result<Fingerprint> {
        let digest = cryptographic_digest(stream)?;
        let perceptual_hash = perceptual_hash(&image.pixels, image.width, image.height);
        let sharpness = sharpness_score(
            &image.pixels,
            image.width,
            image.height,
            self.sharpness_stride,
        );

        Ok(Fingerprint {
            digest,
            perceptual_hash,
            sharpness,
            is_blurry: is_blurry(sharpness, self.blur_threshold),
        })
    }
}

impl Default for Fingerprinter {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn uniform_image_is_blurry() {
        let image = PixelBuffer::from_fn(32, 32, |_, _| pack_rgb(90, 90, 90));
        let fingerprint = Fingerprinter::new(100.0, 4)
            .fingerprint(&image, Cursor::new(b"bytes".to_vec()))
            .unwrap();

        assert_eq!(fingerprint.sharpness, 0.0);
        assert!(fingerprint.is_blurry);
        assert_eq!(fingerprint.digest.len(), 64);
        assert_eq!(fingerprint.perceptual_hash, EMPTY_HASH);
    }

    #[test]
    fn threshold_is_caller_supplied() {
        let image = PixelBuffer::from_fn(32, 32, |x, y| {
            if (x + y) % 2 == 0 {
                pack_rgb(0, 0, 0)
            } else {
                pack_rgb(255, 255, 255)
            }
        });

        let strict = Fingerprinter::new(f64::MAX, 1)
            .fingerprint(&image, Cursor::new(Vec::new()))
            .unwrap();
        let lenient = Fingerprinter::new(50.0, 1)
            .fingerprint(&image, Cursor::new(Vec::new()))
            .unwrap();

        assert!(strict.is_blurry);
        assert!(!lenient.is_blurry);
    }

    #[test]
    fn degenerate_image_still_fingerprints() {
        let image = PixelBuffer::new(0, 0, Vec::new());
        let fingerprint = Fingerprinter::default()
            .fingerprint(&image, Cursor::new(b"x".to_vec()))
            .unwrap();

        assert_eq!(fingerprint.perceptual_hash, EMPTY_HASH);
        assert_eq!(fingerprint.sharpness, 0.0);
    }
}
