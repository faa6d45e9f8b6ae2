//! Spectral effect pipeline
//!
//! Applies the seven magnitude effects in a fixed order (blur, sharpen, edge,
//! emboss, gate, mirror, stretch). Each effect builds a full-length candidate
//! from the current magnitudes, then the result is blended bin by bin:
//!
//! result[k] = current[k]·(1 - w[k]) + candidate[k]·w[k]
//!
//! where w is the mask weight (or 1 when the mask is off). The blend comes
//! after the effect, not before, because the convolutional effects need the
//! whole spectrum even for bins outside the painted band.

use super::convolve::{convolve_centered, resample_linear};
use super::kernels::{blur_kernel_capacity, design_gaussian, sharpen_taps, EMBOSS_TAPS, SOBEL_TAPS};
use crate::config::GatePolicy;

/// Smallest magnitude leaving the pipeline
pub const MAGNITUDE_FLOOR: f64 = 1e-6;

/// Stretch factor distance from 1.0 treated as no stretch
pub const STRETCH_EPSILON: f64 = 1e-3;

/// Effect amounts for one channel, each in [0, 1]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectIntensities {
    pub blur: f64,
    pub sharpen: f64,
    pub edge: f64,
    pub emboss: f64,
    pub gate: f64,
    pub mirror: f64,
    /// Frequency-axis resample factor 0.5 + stretch; 0.5 is neutral
    pub stretch: f64,
}

impl EffectIntensities {
    /// All effects off (stretch at its neutral midpoint)
    pub const fn neutral() -> Self {
        Self {
            blur: 0.0,
            sharpen: 0.0,
            edge: 0.0,
            emboss: 0.0,
            gate: 0.0,
            mirror: 0.0,
            stretch: 0.5,
        }
    }

    /// Copy with every value clamped to [0, 1] (NaN -> neutral value)
    pub fn clamped(&self) -> Self {
        let neutral = Self::neutral();
        let clamp = |v: f64, fallback: f64| if v.is_nan() { fallback } else { v.clamp(0.0, 1.0) };
        Self {
            blur: clamp(self.blur, neutral.blur),
            sharpen: clamp(self.sharpen, neutral.sharpen),
            edge: clamp(self.edge, neutral.edge),
            emboss: clamp(self.emboss, neutral.emboss),
            gate: clamp(self.gate, neutral.gate),
            mirror: clamp(self.mirror, neutral.mirror),
            stretch: clamp(self.stretch, neutral.stretch),
        }
    }

    /// Frequency stretch factor in [0.5, 1.5]
    pub fn stretch_factor(&self) -> f64 {
        0.5 + self.stretch.clamp(0.0, 1.0)
    }
}

impl Default for EffectIntensities {
    fn default() -> Self {
        Self::neutral()
    }
}

/// Magnitude-domain effect chain, one instance shared by all channels
pub struct EffectPipeline {
    num_bins: usize,
    gate_policy: GatePolicy,

    /// Per-channel gate reference for `GatePolicy::SmoothedPeak`
    gate_peaks: Vec<f64>,

    candidate: Vec<f64>,
    stretch_buffer: Vec<f64>,
    blur_taps: Vec<f64>,
}

impl EffectPipeline {
    /// Create a pipeline for `num_bins` bins and `channels` channels
    pub fn new(num_bins: usize, channels: usize, gate_policy: GatePolicy) -> Self {
        let num_bins = num_bins.max(1);
        // Largest stretch is 1.5 × K
        let stretch_capacity = (num_bins as f64 * 1.5).ceil() as usize + 2;

        Self {
            num_bins,
            gate_policy,
            gate_peaks: vec![0.0; channels.max(1)],
            candidate: vec![0.0; num_bins],
            stretch_buffer: vec![0.0; stretch_capacity],
            blur_taps: Vec::with_capacity(blur_kernel_capacity()),
        }
    }

    /// Clear per-channel gate history
    pub fn reset(&mut self) {
        self.gate_peaks.fill(0.0);
    }

    /// Run the effect chain in-place on one channel's magnitudes
    ///
    /// # Arguments
    /// * `ch` - Channel index (clamped), selects gate history
    /// * `magnitude` - Analysed magnitudes (K values), overwritten with the result
    /// * `intensities` - Effect amounts for this hop
    /// * `weights` - Per-bin mask weights (K values, all 1.0 when the mask is off)
    pub fn process(
        &mut self,
        ch: usize,
        magnitude: &mut [f64],
        intensities: &EffectIntensities,
        weights: &[f64],
    ) {
        let bins = self.num_bins.min(magnitude.len()).min(weights.len());
        let magnitude = &mut magnitude[..bins];
        let weights = &weights[..bins];
        let candidate = &mut self.candidate[..bins];
        let fx = intensities.clamped();

        if fx.blur > 0.0 {
            design_gaussian(fx.blur, &mut self.blur_taps);
            convolve_centered(magnitude, &self.blur_taps, candidate);
            blend(magnitude, candidate, weights);
        }

        if fx.sharpen > 0.0 {
            convolve_centered(magnitude, &sharpen_taps(fx.sharpen), candidate);
            blend(magnitude, candidate, weights);
        }

        if fx.edge > 0.0 {
            convolve_centered(magnitude, &SOBEL_TAPS, candidate);
            for (c, &m) in candidate.iter_mut().zip(magnitude.iter()) {
                *c = m * (1.0 - fx.edge) + c.abs() * fx.edge;
            }
            blend(magnitude, candidate, weights);
        }

        if fx.emboss > 0.0 {
            convolve_centered(magnitude, &EMBOSS_TAPS, candidate);
            for (c, &m) in candidate.iter_mut().zip(magnitude.iter()) {
                *c = m * (1.0 - fx.emboss) + *c * fx.emboss;
            }
            blend(magnitude, candidate, weights);
        }

        // The follower tracks every hop so it is warm when the gate opens
        let frame_peak = magnitude.iter().cloned().fold(0.0, f64::max);
        let gate_peak = gate_reference(self.gate_policy, &mut self.gate_peaks, ch, frame_peak);
        if fx.gate > 0.0 {
            let threshold = fx.gate * gate_peak;
            for (c, &m) in candidate.iter_mut().zip(magnitude.iter()) {
                // Blended with w this becomes m·(1 - gate·w)
                *c = if m < threshold { m * (1.0 - fx.gate) } else { m };
            }
            blend(magnitude, candidate, weights);
        }

        if fx.mirror > 0.0 {
            for (k, c) in candidate.iter_mut().enumerate() {
                *c = magnitude[k] * (1.0 - fx.mirror) + magnitude[bins - 1 - k] * fx.mirror;
            }
            blend(magnitude, candidate, weights);
        }

        let factor = fx.stretch_factor();
        if (factor - 1.0).abs() >= STRETCH_EPSILON && bins > 1 {
            let stretched_len = ((bins as f64 * factor).round() as usize)
                .clamp(2, self.stretch_buffer.len());
            let stretched = &mut self.stretch_buffer[..stretched_len];
            resample_linear(magnitude, stretched);

            // Back to K bins by truncating or edge-padding, so bin k moves to k·factor
            let kept = stretched_len.min(bins);
            candidate[..kept].copy_from_slice(&stretched[..kept]);
            candidate[kept..].fill(stretched[stretched_len - 1]);
            blend(magnitude, candidate, weights);
        }

        for m in magnitude.iter_mut() {
            // f64::max drops NaN in favour of the floor
            *m = m.max(0.0).max(MAGNITUDE_FLOOR);
        }
    }

    /// Number of bins (K)
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }
}

/// Gate threshold reference for this hop, updating the channel's follower
fn gate_reference(policy: GatePolicy, peaks: &mut [f64], ch: usize, frame_peak: f64) -> f64 {
    match policy {
        GatePolicy::InstantPeak => frame_peak,
        GatePolicy::SmoothedPeak { release } => {
            let ch = ch.min(peaks.len() - 1);
            let peak = frame_peak.max(peaks[ch] * release);
            peaks[ch] = peak;
            peak
        }
    }
}

/// result[k] = current[k]·(1 - w) + candidate[k]·w
#[inline]
fn blend(current: &mut [f64], candidate: &[f64], weights: &[f64]) {
    for ((m, &c), &w) in current.iter_mut().zip(candidate.iter()).zip(weights.iter()) {
        *m = *m * (1.0 - w) + c * w;
    }
}
