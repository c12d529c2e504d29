//! Decoded pixel buffers and luma helpers.

use serde::{Deserialize, Serialize};

/// A decoded image as packed `0xRRGGBB` values in row-major order.
///
/// The top byte is ignored, so ARGB buffers can be passed as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PixelBuffer {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u32>,
}

impl PixelBuffer {
    /// Create a buffer from packed pixels
    pub fn new(width: u32, height: u32, pixels: Vec<u32>) -> Self {
        Self {
            width,
            height,
            pixels,
        }
    }

    /// Build a buffer by evaluating `f(x, y)` for every pixel
    pub fn from_fn<F>(width: u32, height: u32, mut f: F) -> Self
    where
        F: FnMut(u32, u32) -> u32,
    {
        let mut pixels = Vec::with_capacity(width as usize * height as usize);
        for y in 0..height {
            for x in 0..width {
                pixels.push(f(x, y));
            }
        }
        Self::new(width, height, pixels)
    }

    /// True when there is nothing to measure
    pub fn is_degenerate(&self) -> bool {
        !has_pixels(&self.pixels, self.width, self.height)
    }
}

/// Pack an RGB triple
pub fn pack_rgb(r: u8, g: u8, b: u8) -> u32 {
    (u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)
}

/// Standard luminance (0.299 R + 0.587 G + 0.114 B) of a packed pixel,
/// truncated to an integer. Integer weights keep it exact across platforms.
pub fn luma(pixel: u32) -> i32 {
    let r = ((pixel >> 16) & 0xFF) as i32;
    let g = ((pixel >> 8) & 0xFF) as i32;
    let b = (pixel & 0xFF) as i32;
    (299 * r + 587 * g + 114 * b) / 1000
}

/// Whether `pixels` covers a non-empty `width x height` grid
pub(crate) fn has_pixels(pixels: &[u32], width: u32, height: u32) -> bool {
    width > 0 && height > 0 && pixels.len() >= width as usize * height as usize
}

/// Box-average the luma of `pixels` down to `dst_w x dst_h`.
///
/// Each destination cell averages the source block starting at its scaled
/// origin. When the source is smaller than the destination a single source
/// pixel is sampled per cell. Callers must check `has_pixels` first.
pub(crate) fn downsample_luma(
    pixels: &[u32],
    width: u32,
    height: u32,
    dst_w: usize,
    dst_h: usize,
) -> Vec<i32> {
    let src_w = width as usize;
    let src_h = height as usize;
    let x_ratio = src_w as f64 / dst_w as f64;
    let y_ratio = src_h as f64 / dst_h as f64;
    let block_w = (x_ratio.ceil() as usize).max(1);
    let block_h = (y_ratio.ceil() as usize).max(1);

    let mut out = vec![0; dst_w * dst_h];
    for j in 0..dst_h {
        let y0 = ((j as f64 * y_ratio) as usize).min(src_h - 1);
        for i in 0..dst_w {
            let x0 = ((i as f64 * x_ratio) as usize).min(src_w - 1);
            let mut sum = 0i64;
            let mut count = 0i64;
            for yy in y0..(y0 + block_h).min(src_h) {
                for xx in x0..(x0 + block_w).min(src_w) {
                    sum += i64::from(luma(pixels[yy * src_w + xx]));
                    count += 1;
                }
            }
            out[j * dst_w + i] = if count > 0 { (sum / count) as i32 } else { 0 };
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn luma_of_white_and_black() {
        assert_eq!(luma(pack_rgb(255, 255, 255)), 255);
        assert_eq!(luma(pack_rgb(0, 0, 0)), 0);
    }

    #[test]
    fn alpha_byte_is_ignored() {
        assert_eq!(luma(0xFF80_8080), luma(0x0080_8080));
    }

    #[test]
    fn downsample_averages_blocks() {
        // 2x1 source: black then white, averaged into a single cell
        let pixels = vec![pack_rgb(0, 0, 0), pack_rgb(255, 255, 255)];
        let out = downsample_luma(&pixels, 2, 1, 1, 1);
        assert_eq!(out, vec![127]);
    }

    #[test]
    fn short_buffer_is_degenerate() {
        let buffer = PixelBuffer::new(4, 4, vec![0; 3]);
        assert!(buffer.is_degenerate());
        assert!(PixelBuffer::new(0, 0, Vec::new()).is_degenerate());
    }
}
