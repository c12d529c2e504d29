//! Laplacian edge energy as a sharpness measure.

use super::pixels::{has_pixels, luma};

/// Mean squared 4-neighbour Laplacian of luma, sampled every `stride` pixels.
///
/// Border pixels are skipped. Images smaller than 3x3 score 0.0.
/// Higher means more edge energy, i.e. sharper.
pub fn sharpness_score(pixels: &[u32], width: u32, height: u32, stride: u32) -> f64 {
    if !has_pixels(pixels, width, height) || width < 3 || height < 3 {
        return 0.0;
    }

    let w = width as usize;
    let h = height as usize;
    let step = stride.max(1) as usize;
    let at = |x: usize, y: usize| luma(pixels[y * w + x]);

    let mut sum = 0.0;
    let mut count = 0usize;
    for y in (1..h - 1).step_by(step) {
        for x in (1..w - 1).step_by(step) {
            let laplacian =
                at(x - 1, y) + at(x + 1, y) + at(x, y - 1) + at(x, y + 1) - 4 * at(x, y);
            sum += f64::from(laplacian * laplacian);
            count += 1;
        }
    }

    if count == 0 {
        0.0
    } else {
        sum / count as f64
    }
}

/// A score under the threshold is blurry
pub fn is_blurry(score: f64, threshold: f64) -> bool {
    score < threshold
}
