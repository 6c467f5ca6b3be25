//! Gaussian feathering of single-channel alpha masks.
//!
//! The mask is a flat row-major `Vec<f32>` of coverage values in `[0, 1]`.
//! Blurring is separable (horizontal pass, then vertical pass) and treats
//! everything outside the canvas as transparent, so a rectangle touching the
//! border fades out there as well.

use std::f64::consts::PI;

use rayon::prelude::*;

/// Share of a Gaussian's mass within three standard deviations, `erf(3 / sqrt(2))`.
const THREE_SIGMA_MASS: f64 = 0.997_300_203_936_739_8;

/// Largest half-width whose normalizing sum is still added up tap by tap.
const EXACT_SUM_LIMIT: f64 = 65_536.0;

fn gaussian_weight(offset: f64, sigma: f64) -> f64 {
    (-offset * offset / (2.0 * sigma * sigma)).exp()
}

/// Sum of all taps of the untruncated-by-canvas kernel of half-width `full_half`.
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
fn full_kernel_sum(sigma: f64, full_half: f64) -> f64 {
    if full_half <= EXACT_SUM_LIMIT {
        let half = full_half as usize;
        1.0 + 2.0 * (1..=half).map(|i| gaussian_weight(i as f64, sigma)).sum::<f64>()
    } else {
        sigma * (2.0 * PI).sqrt() * THREE_SIGMA_MASS
    }
}

/// Build a normalized 1D Gaussian kernel for standard deviation `sigma`.
///
/// The kernel spans `ceil(3 * sigma)` taps on each side, but never more than
/// `max_half`. A kernel cut short by `max_half` keeps the weights of the full
/// one, so it sums to less than one. A non-positive or NaN sigma returns the
/// identity kernel `[1.0]`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss, clippy::cast_precision_loss)]
pub fn gaussian_kernel(sigma: f32, max_half: usize) -> Vec<f32> {
    if sigma.is_nan() || sigma <= 0.0 {
        return vec![1.0];
    }
    let sigma = f64::from(sigma);

    let full_half = (sigma * 3.0).ceil();
    let half = full_half.min(max_half as f64) as usize;

    let mut kernel: Vec<f64> = (0..=half.saturating_mul(2))
        .map(|i| gaussian_weight(i as f64 - half as f64, sigma))
        .collect();

    let sum = if full_half <= half as f64 {
        kernel.iter().sum()
    } else {
        full_kernel_sum(sigma, full_half)
    };
    for v in &mut kernel {
        *v /= sum;
    }
    kernel.into_iter().map(|v| v as f32).collect()
}

/// Blur a `width x height` mask in place with a Gaussian of standard deviation `radius`.
///
/// `radius` matches the CSS `blur()` convention: it is the standard deviation,
/// not the kernel half-width. A radius of zero (or less) leaves the mask untouched.
/// Taps further than the canvas extent only ever see zero padding, so the
/// kernel is cut at `max(width, height) - 1` and any finite or infinite radius
/// costs at most that much.
///
/// # Panics
///
/// Panics if `mask.len() != width * height`.
#[allow(clippy::cast_possible_truncation)]
pub fn feather_mask(mask: &mut [f32], width: usize, height: usize, radius: f64) {
    assert_eq!(mask.len(), width * height, "mask size mismatch");
    if radius.is_nan() || radius <= 0.0 || width == 0 || height == 0 {
        return;
    }

    let kernel = gaussian_kernel(radius as f32, width.max(height) - 1);
    let half = kernel.len() / 2;

    // Horizontal pass
    let mut temp = vec![0.0_f32; mask.len()];
    temp.par_chunks_mut(width)
        .zip(mask.par_chunks(width))
        .for_each(|(out_row, in_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                *out = convolve_at(&kernel, half, x, width, |i| in_row[i]);
            }
        });

    // Vertical pass
    mask.par_chunks_mut(width)
        .enumerate()
        .for_each(|(y, out_row)| {
            for (x, out) in out_row.iter_mut().enumerate() {
                *out = convolve_at(&kernel, half, y, height, |i| temp[i * width + x]);
            }
        });
}

/// Convolve around position `pos` of a line of length `len`, zero outside.
fn convolve_at(
    kernel: &[f32],
    half: usize,
    pos: usize,
    len: usize,
    sample: impl Fn(usize) -> f32,
) -> f32 {
    let start = pos.saturating_sub(half);
    let end = pos.saturating_add(half).min(len - 1);
    let mut sum = 0.0_f32;
    for i in start..=end {
        // i - pos + half is always within the kernel since |i - pos| <= half
        sum += kernel[i + half - pos] * sample(i);
    }
    sum.clamp(0.0, 1.0)
}
