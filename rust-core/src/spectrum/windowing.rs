//! Analysis/synthesis windows for the STFT
//!
//! All windows here are periodic (DFT-even): w[n] uses 2πn/N rather than
//! 2πn/(N-1), which is what makes the overlap-add sums exact.

use std::f64::consts::PI;

/// Window function types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WindowType {
    /// Square-root Hann: w[n] = sqrt(0.5·(1 - cos(2πn/N)))
    /// Used for both analysis and synthesis; w² is a Hann window, which
    /// overlap-adds to a constant at hop N/2.
    #[default]
    SqrtHann,

    /// Hann window: w[n] = 0.5 - 0.5·cos(2πn/N)
    Hann,

    /// Rectangular window (no windowing)
    Rectangular,
}

/// Generate periodic window coefficients
///
/// # Arguments
/// * `window_type` - Type of window function
/// * `length` - Number of samples (N)
///
/// # Returns
/// Vector of window coefficients w[n] for n = 0..N-1
pub fn generate_window(window_type: WindowType, length: usize) -> Vec<f64> {
    let n_len = length.max(1) as f64;

    (0..length)
        .map(|n| {
            let angle = 2.0 * PI * n as f64 / n_len;
            match window_type {
                WindowType::SqrtHann => (0.5 * (1.0 - angle.cos())).max(0.0).sqrt(),
                WindowType::Hann => 0.5 - 0.5 * angle.cos(),
                WindowType::Rectangular => 1.0,
            }
        })
        .collect()
}

/// Multiply a signal by a window in-place
pub fn apply_window_inplace(signal: &mut [f64], window: &[f64]) {
    for (s, w) in signal.iter_mut().zip(window.iter()) {
        *s *= w;
    }
}

/// Overlap-added sum of the squared window at a given hop
///
/// For a window applied at both analysis and synthesis, reconstruction
/// gain is Σ_m w²[n + mH]. This evaluates that sum at n = 0; for COLA
/// window/hop pairs it is the same for every n.
///
/// # Returns
/// Overlap-add gain (1.0 for sqrt-Hann at hop N/2)
pub fn cola_gain(window: &[f64], hop: usize) -> f64 {
    if hop == 0 || window.is_empty() {
        return 1.0;
    }

    window
        .iter()
        .step_by(hop)
        .map(|&w| w * w)
        .sum()
}

/// Largest deviation of the overlap-added squared window from its mean
///
/// Zero (to rounding) when the window/hop pair satisfies COLA.
pub fn cola_ripple(window: &[f64], hop: usize) -> f64 {
    if hop == 0 || window.is_empty() {
        return 0.0;
    }

    let sums: Vec<f64> = (0..hop)
        .map(|offset| cola_gain(&window[offset..], hop))
        .collect();
    let mean = sums.iter().sum::<f64>() / sums.len() as f64;

    sums.iter()
        .map(|s| (s - mean).abs())
        .fold(0.0, f64::max)
}
