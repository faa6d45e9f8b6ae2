//! Kernel design for the magnitude-domain effects
//!
//! The "image" filters act on one spectral column, so each is a short 1-D
//! kernel over the bin axis.

/// Blur spread in bins at full intensity (Gaussian sigma)
pub const BLUR_SIGMA_SCALE: f64 = 12.0;

/// Gaussian support in sigmas on each side
const GAUSSIAN_SUPPORT: f64 = 3.0;

/// Largest blur radius in bins (support at full intensity)
pub const MAX_BLUR_RADIUS: usize = 36;

/// Sobel-style smoothed first derivative, normalized so a unit ramp gives 1
pub const SOBEL_TAPS: [f64; 5] = [-1.0 / 8.0, -2.0 / 8.0, 0.0, 2.0 / 8.0, 1.0 / 8.0];

/// Directional emboss: lower neighbour subtracted, centre and upper neighbour kept
///
/// Sums to 1, so flat regions pass unchanged.
pub const EMBOSS_TAPS: [f64; 3] = [-1.0, 1.0, 1.0];

/// Design a normalized Gaussian blur kernel into `taps`
///
/// # Arguments
/// * `intensity` - Blur amount in [0, 1]; sigma = intensity × 12 bins
/// * `taps` - Output buffer; cleared and refilled (2r+1 taps, r ≤ 36)
///
/// Reuses `taps`' allocation; pre-size it with [`blur_kernel_capacity`].
pub fn design_gaussian(intensity: f64, taps: &mut Vec<f64>) {
    taps.clear();

    let sigma = intensity.clamp(0.0, 1.0) * BLUR_SIGMA_SCALE;
    if sigma <= f64::EPSILON {
        taps.push(1.0);
        return;
    }

    let radius = ((GAUSSIAN_SUPPORT * sigma).ceil() as usize).clamp(1, MAX_BLUR_RADIUS);
    let denom = 2.0 * sigma * sigma;

    for j in 0..=2 * radius {
        let x = j as f64 - radius as f64;
        taps.push((-x * x / denom).exp());
    }

    let sum: f64 = taps.iter().sum();
    for tap in taps.iter_mut() {
        *tap /= sum;
    }
}

/// Capacity needed by [`design_gaussian`] at full intensity
pub fn blur_kernel_capacity() -> usize {
    2 * MAX_BLUR_RADIUS + 1
}

/// 3-tap unsharp kernel [-a, 1 + 2a, -a] with a = intensity
pub fn sharpen_taps(intensity: f64) -> [f64; 3] {
    let a = intensity.clamp(0.0, 1.0);
    [-a, 1.0 + 2.0 * a, -a]
}
