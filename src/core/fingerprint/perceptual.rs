//! Difference hash (dHash) and Hamming distance over hex hashes.
//!
//! The image is reduced to a 9x8 luma grid and each cell is compared with
//! its right neighbour, giving 64 bits. The hash survives re-encoding and
//! uniform noise but not crops or heavy edits.

use super::pixels::{downsample_luma, has_pixels};

/// Grid width (one extra column so every row yields 8 comparisons)
pub const GRID_WIDTH: usize = 9;
/// Grid height
pub const GRID_HEIGHT: usize = 8;
/// Bits in a perceptual hash
pub const HASH_BITS: u32 = 64;

/// Hash emitted for images with no pixels
pub const EMPTY_HASH: &str = "0000000000000000";

/// Compute the 64-bit difference hash as 16 lowercase hex digits.
///
/// Bit `i` (counting from the least significant bit) is set when the `i`-th
/// comparison, in row-major order, finds the left cell brighter than the
/// right one.
pub fn perceptual_hash(pixels: &[u32], width: u32, height: u32) -> String {
    if !has_pixels(pixels, width, height) {
        return EMPTY_HASH.to_string();
    }

    let grid = downsample_luma(pixels, width, height, GRID_WIDTH, GRID_HEIGHT);

    let mut hash: u64 = 0;
    let mut bit = 0;
    for y in 0..GRID_HEIGHT {
        for x in 0..GRID_WIDTH - 1 {
            let left = grid[y * GRID_WIDTH + x];
            let right = grid[y * GRID_WIDTH + x + 1];
            if left > right {
                hash |= 1 << bit;
            }
            bit += 1;
        }
    }

    format!("{:016x}", hash)
}

/// Count differing bits between two hex hashes.
///
/// Only the common prefix is compared, so hashes of different widths
/// never panic. Non-hex characters count as zero.
pub fn hamming_distance(a: &str, b: &str) -> u32 {
    a.chars()
        .zip(b.chars())
        .map(|(ca, cb)| {
            let na = ca.to_digit(16).unwrap_or(0);
            let nb = cb.to_digit(16).unwrap_or(0);
            (na ^ nb).count_ones()
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::fingerprint::pixels::{pack_rgb, PixelBuffer};

    fn gradient(width: u32, height: u32, left_to_right: bool) -> PixelBuffer {
        PixelBuffer::from_fn(width, height, |x, _| {
            let step = (x * 255 / (width - 1)) as u8;
            let v = if left_to_right { step } else { 255 - step };
            pack_rgb(v, v, v)
        })
    }

    #[test]
    fn hash_is_sixteen_hex_digits() {
        let image = gradient(64, 64, false);
        let hash = perceptual_hash(&image.pixels, image.width, image.height);
        assert_eq!(hash.len(), 16);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn brightening_gradient_sets_no_bits() {
        let image = gradient(90, 80, true);
        assert_eq!(
            perceptual_hash(&image.pixels, image.width, image.height),
            "0000000000000000"
        );
    }

    #[test]
    fn darkening_gradient_sets_every_bit() {
        let image = gradient(90, 80, false);
        assert_eq!(
            perceptual_hash(&image.pixels, image.width, image.height),
            "ffffffffffffffff"
        );
    }

    #[test]
    fn hash_depends_only_on_pixels() {
        let a = gradient(120, 100, false);
        let b = gradient(120, 100, false);
        assert_eq!(
            perceptual_hash(&a.pixels, a.width, a.height),
            perceptual_hash(&b.pixels, b.width, b.height)
        );
    }

    #[test]
    fn degenerate_input_yields_empty_hash() {
        assert_eq!(perceptual_hash(&[], 0, 0), EMPTY_HASH);
        assert_eq!(perceptual_hash(&[0; 2], 10, 10), EMPTY_HASH);
    }

    #[test]
    fn distance_to_self_is_zero() {
        assert_eq!(hamming_distance("deadbeefcafebabe", "deadbeefcafebabe"), 0);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = "ff00ff00ff00ff00";
        let b = "0f0f0f0f0f0f0f0f";
        assert_eq!(hamming_distance(a, b), hamming_distance(b, a));
    }

    #[test]
    fn distance_counts_differing_bits() {
        assert_eq!(hamming_distance("ffffffffffffffff", "0000000000000000"), 64);
        assert_eq!(hamming_distance("0000000000000007", "0000000000000000"), 3);
    }

    #[test]
    fn distance_uses_shorter_prefix() {
        assert_eq!(hamming_distance("ff", "f0aa"), 4);
    }
}
