//! Phase reconstruction for resynthesis
//!
//! Three modes share one per-(channel, bin) history of analysis and
//! synthesis phase:
//!
//! - `Raw`: reuse the analysis phase as-is.
//! - `Pv`: classic phase vocoder. Estimates each bin's instantaneous
//!   frequency from the analysis phase difference and accumulates synthesis
//!   phase from it, so synthesis stays continuous after the magnitudes have
//!   been modified.
//! - `PvLock`: identity phase locking. Runs `Pv`, then ties every non-peak
//!   bin's phase to the nearest lower spectral peak.
//!
//! Switching modes between hops is always safe: every mode leaves the
//! history consistent for the others.

use num_complex::Complex;
use std::f64::consts::{PI, TAU};
use thiserror::Error;

/// Default PvLock peak threshold, relative to the frame's largest magnitude
pub const DEFAULT_PEAK_THRESHOLD: f64 = 0.001;

/// Phase reconstruction mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PhaseMode {
    /// Analysis phase passed straight through
    #[default]
    Raw = 0,
    /// Phase vocoder
    Pv = 1,
    /// Phase vocoder with identity phase locking
    PvLock = 2,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Unknown phase mode index {0} (expected 0 = RAW, 1 = PV, 2 = PV_LOCK)")]
pub struct PhaseModeError(pub i32);

impl PhaseMode {
    /// Mode from a control index, clamping out-of-range values
    pub fn from_index(index: i32) -> Self {
        match index {
            i32::MIN..=0 => PhaseMode::Raw,
            1 => PhaseMode::Pv,
            _ => PhaseMode::PvLock,
        }
    }

    /// Control index of this mode
    pub fn index(self) -> i32 {
        self as i32
    }
}

impl TryFrom<i32> for PhaseMode {
    type Error = PhaseModeError;

    fn try_from(index: i32) -> Result<Self, Self::Error> {
        match index {
            0 => Ok(PhaseMode::Raw),
            1 => Ok(PhaseMode::Pv),
            2 => Ok(PhaseMode::PvLock),
            other => Err(PhaseModeError(other)),
        }
    }
}

/// Principal argument: wrap any angle into (-π, π]
#[inline]
pub fn principal_arg(x: f64) -> f64 {
    let wrapped = (x + PI).rem_euclid(TAU) - PI;
    if wrapped <= -PI {
        wrapped + TAU
    } else {
        wrapped
    }
}

/// Stateful phase reconstruction engine
pub struct PhaseEngine {
    channels: usize,
    num_bins: usize,
    hop_size: usize,

    /// Expected phase advance per hop for each bin: 2πkH/N
    expected_advance: Vec<f64>,

    prev_analysis_phase: Vec<Vec<f64>>,
    prev_synth_phase: Vec<Vec<f64>>,

    /// PvLock working buffers
    pv_phase: Vec<f64>,
    locked_phase: Vec<f64>,
    is_peak: Vec<bool>,

    peak_threshold: f64,
}

impl PhaseEngine {
    /// Create a phase engine
    ///
    /// # Arguments
    /// * `channels` - Number of channels (at least 1)
    /// * `fft_size` - Transform size N
    /// * `hop_size` - Hop H in samples
    pub fn new(channels: usize, fft_size: usize, hop_size: usize) -> Self {
        let channels = channels.max(1);
        let fft_size = fft_size.max(2);
        let hop_size = hop_size.max(1);
        let num_bins = fft_size / 2 + 1;

        let expected_advance = (0..num_bins)
            .map(|k| TAU * k as f64 * hop_size as f64 / fft_size as f64)
            .collect();

        Self {
            channels,
            num_bins,
            hop_size,
            expected_advance,
            prev_analysis_phase: vec![vec![0.0; num_bins]; channels],
            prev_synth_phase: vec![vec![0.0; num_bins]; channels],
            pv_phase: vec![0.0; num_bins],
            locked_phase: vec![0.0; num_bins],
            is_peak: vec![false; num_bins],
            peak_threshold: DEFAULT_PEAK_THRESHOLD,
        }
    }

    /// Set the PvLock peak threshold (fraction of the frame maximum)
    pub fn set_peak_threshold(&mut self, threshold: f64) {
        self.peak_threshold = threshold.clamp(0.0, 1.0);
    }

    /// Clear phase history for every channel
    ///
    /// Needed after any change of N/H or a transport discontinuity.
    pub fn reset(&mut self) {
        for history in self
            .prev_analysis_phase
            .iter_mut()
            .chain(self.prev_synth_phase.iter_mut())
        {
            history.fill(0.0);
        }
    }

    /// Rebuild one frame's synthesis spectrum
    ///
    /// # Arguments
    /// * `ch` - Channel index (clamped)
    /// * `mode` - Reconstruction mode for this hop
    /// * `magnitude` - Processed magnitudes (K values, ≥ 0)
    /// * `phase_in` - Analysis phase of the current frame (K values)
    /// * `out` - Synthesis spectrum, m·e^{iφ}
    pub fn process_frame(
        &mut self,
        ch: usize,
        mode: PhaseMode,
        magnitude: &[f64],
        phase_in: &[f64],
        out: &mut [Complex<f64>],
    ) {
        let ch = ch.min(self.channels - 1);
        let bins = self
            .num_bins
            .min(magnitude.len())
            .min(phase_in.len())
            .min(out.len());

        match mode {
            PhaseMode::Raw => {
                for k in 0..bins {
                    out[k] = polar(magnitude[k], phase_in[k]);
                }
                self.prev_analysis_phase[ch][..bins].copy_from_slice(&phase_in[..bins]);
                self.prev_synth_phase[ch][..bins].copy_from_slice(&phase_in[..bins]);
            }
            PhaseMode::Pv => {
                self.advance_vocoder(ch, phase_in, bins);
                for k in 0..bins {
                    out[k] = polar(magnitude[k], self.pv_phase[k]);
                }
            }
            PhaseMode::PvLock => {
                self.advance_vocoder(ch, phase_in, bins);
                self.detect_peaks(magnitude, bins);

                for k in 0..bins {
                    self.locked_phase[k] = if k == 0 || self.is_peak[k] {
                        self.pv_phase[k]
                    } else {
                        self.locked_phase[k - 1]
                            + principal_arg(self.pv_phase[k] - self.pv_phase[k - 1])
                    };
                }
                for k in 0..bins {
                    out[k] = polar(magnitude[k], self.locked_phase[k]);
                }
            }
        }
    }

    /// Phase-vocoder step for every bin; writes `pv_phase` and both histories
    fn advance_vocoder(&mut self, ch: usize, phase_in: &[f64], bins: usize) {
        let hop = self.hop_size as f64;
        let prev_analysis = &mut self.prev_analysis_phase[ch];
        let prev_synth = &mut self.prev_synth_phase[ch];

        for k in 0..bins {
            let expected = self.expected_advance[k];
            let deviation = principal_arg((phase_in[k] - prev_analysis[k]) - expected);
            let inst_freq = (expected + deviation) / hop;
            let synth = principal_arg(prev_synth[k] + inst_freq * hop);

            prev_analysis[k] = phase_in[k];
            prev_synth[k] = synth;
            self.pv_phase[k] = synth;
        }
    }

    /// Mark local maxima above the relative threshold
    ///
    /// Strictly greater than the left neighbour, greater-or-equal to the
    /// right one, so a flat-topped peak locks to its leftmost bin.
    fn detect_peaks(&mut self, magnitude: &[f64], bins: usize) {
        self.is_peak[..bins].fill(false);
        if bins < 3 {
            return;
        }

        let max_mag = magnitude[..bins].iter().cloned().fold(0.0, f64::max);
        let threshold = self.peak_threshold * max_mag;

        for k in 1..bins - 1 {
            let m = magnitude[k];
            self.is_peak[k] = m > threshold && m > magnitude[k - 1] && m >= magnitude[k + 1];
        }
    }

    /// Previous synthesis phase of a channel
    pub fn last_synthesis_phase(&self, ch: usize) -> &[f64] {
        &self.prev_synth_phase[ch.min(self.channels - 1)]
    }

    /// Previous analysis phase of a channel
    pub fn last_analysis_phase(&self, ch: usize) -> &[f64] {
        &self.prev_analysis_phase[ch.min(self.channels - 1)]
    }

    /// Number of bins (K)
    pub fn num_bins(&self) -> usize {
        self.num_bins
    }
}

#[inline]
fn polar(magnitude: f64, phase: f64) -> Complex<f64> {
    Complex::new(magnitude * phase.cos(), magnitude * phase.sin())
}

#[cfg(test)]
mod tests {
    use super::*;

    const N: usize = 1024;
    const H: usize = 512;
    const K: usize = N / 2 + 1;

    fn test_vectors() -> (Vec<f64>, Vec<f64>) {
        let magnitude = (0..K).map(|k| 0.5 + ((k * 37) % 11) as f64).collect();
        let phase = (0..K)
            .map(|k| principal_arg(k as f64 * 1.234 - 2.0))
            .collect();
        (magnitude, phase)
    }

    #[test]
    fn test_principal_arg_range() {
        assert!((principal_arg(PI) - PI).abs() < 1e-12);
        assert!((principal_arg(-PI) - PI).abs() < 1e-12);
        assert!((principal_arg(3.0 * PI - 0.5) - (PI - 0.5)).abs() < 1e-9);
        assert!((principal_arg(0.5 + 4.0 * TAU) - 0.5).abs() < 1e-9);
        assert!((principal_arg(-0.5 - 3.0 * TAU) + 0.5).abs() < 1e-9);

        for i in -100..100 {
            let y = principal_arg(i as f64 * 0.77);
            assert!(y > -PI && y <= PI);
        }
    }

    #[test]
    fn test_mode_from_index() {
        assert_eq!(PhaseMode::try_from(0), Ok(PhaseMode::Raw));
        assert_eq!(PhaseMode::try_from(1), Ok(PhaseMode::Pv));
        assert_eq!(PhaseMode::try_from(2), Ok(PhaseMode::PvLock));
        assert_eq!(PhaseMode::try_from(3), Err(PhaseModeError(3)));

        assert_eq!(PhaseMode::from_index(-4), PhaseMode::Raw);
        assert_eq!(PhaseMode::from_index(9), PhaseMode::PvLock);
        assert_eq!(PhaseMode::PvLock.index(), 2);
    }

    #[test]
    fn test_raw_is_exact() {
        let mut engine = PhaseEngine::new(2, N, H);
        let (magnitude, phase) = test_vectors();
        let mut out = vec![Complex::new(0.0, 0.0); K];

        engine.process_frame(1, PhaseMode::Raw, &magnitude, &phase, &mut out);

        for k in 0..K {
            assert_eq!(out[k].re, magnitude[k] * phase[k].cos());
            assert_eq!(out[k].im, magnitude[k] * phase[k].sin());
        }
        assert_eq!(engine.last_analysis_phase(1), &phase[..]);
        assert_eq!(engine.last_synthesis_phase(1), &phase[..]);
    }

    #[test]
    fn test_pv_steady_tone() {
        let mut engine = PhaseEngine::new(1, N, H);
        let tone_bin = 41;
        let advance = TAU * tone_bin as f64 * H as f64 / N as f64;
        let magnitude = vec![1.0; K];
        let mut phase = vec![0.0; K];
        let mut out = vec![Complex::new(0.0, 0.0); K];

        // First frame seeds the history
        phase[tone_bin] = 0.3;
        engine.process_frame(0, PhaseMode::Raw, &magnitude, &phase, &mut out);

        for frame in 1..50 {
            let prev_synth = engine.last_synthesis_phase(0)[tone_bin];
            phase[tone_bin] = principal_arg(0.3 + frame as f64 * advance);
            engine.process_frame(0, PhaseMode::Pv, &magnitude, &phase, &mut out);

            let synth = engine.last_synthesis_phase(0)[tone_bin];
            let step_error = principal_arg(synth - prev_synth - advance);
            assert!(step_error.abs() < 1e-9, "frame {frame}: {step_error}");
        }
    }

    #[test]
    fn test_pv_tracks_off_center_frequency() {
        let mut engine = PhaseEngine::new(1, N, H);
        let magnitude = vec![1.0; K];
        let mut out = vec![Complex::new(0.0, 0.0); K];

        // Bin 10 carrying a tone a quarter bin above centre
        let k = 10;
        let true_advance = TAU * (k as f64 + 0.25) * H as f64 / N as f64;
        let mut phase = vec![0.0; K];
        engine.process_frame(0, PhaseMode::Pv, &magnitude, &phase, &mut out);

        let before = engine.last_synthesis_phase(0)[k];
        phase[k] = principal_arg(true_advance);
        engine.process_frame(0, PhaseMode::Pv, &magnitude, &phase, &mut out);
        let after = engine.last_synthesis_phase(0)[k];

        assert!(principal_arg(after - before - true_advance).abs() < 1e-9);
    }

    #[test]
    fn test_pv_lock_single_peak() {
        let peak_bin = 40;
        let mut magnitude = vec![1e-3; K];
        magnitude[peak_bin] = 1.0;
        let (_, phase) = test_vectors();

        // Reference PV phases from an engine with identical history
        let mut pv_engine = PhaseEngine::new(1, N, H);
        let mut pv_out = vec![Complex::new(0.0, 0.0); K];
        pv_engine.process_frame(0, PhaseMode::Pv, &magnitude, &phase, &mut pv_out);
        let pv: Vec<f64> = pv_out.iter().map(|c| c.arg()).collect();

        let mut engine = PhaseEngine::new(1, N, H);
        let mut out = vec![Complex::new(0.0, 0.0); K];
        engine.process_frame(0, PhaseMode::PvLock, &magnitude, &phase, &mut out);
        let locked: Vec<f64> = out.iter().map(|c| c.arg()).collect();

        assert!(principal_arg(locked[0] - pv[0]).abs() < 1e-9);
        assert!(principal_arg(locked[peak_bin] - pv[peak_bin]).abs() < 1e-9);

        for k in 1..K {
            if k == peak_bin {
                continue;
            }
            let expected = locked[k - 1] + principal_arg(pv[k] - pv[k - 1]);
            assert!(
                principal_arg(locked[k] - expected).abs() < 1e-9,
                "bin {k} not locked"
            );
        }

        // Histories still carry the plain PV result
        for k in 0..K {
            assert!(principal_arg(engine.last_synthesis_phase(0)[k] - pv[k]).abs() < 1e-9);
        }
    }

    #[test]
    fn test_peak_detection_rules() {
        let mut engine = PhaseEngine::new(1, 16, 8);
        let bins = engine.num_bins();
        let mut magnitude = vec![0.0; bins];

        // Plateau: 2,2 -> only the left bin counts
        magnitude[2] = 2.0;
        magnitude[3] = 2.0;
        // Below threshold relative to the 10.0 peak
        engine.set_peak_threshold(0.5);
        magnitude[6] = 10.0;

        engine.detect_peaks(&magnitude, bins);
        assert!(!engine.is_peak[2]);
        assert!(engine.is_peak[6]);

        engine.set_peak_threshold(0.1);
        engine.detect_peaks(&magnitude, bins);
        assert!(engine.is_peak[2]);
        assert!(!engine.is_peak[3]);
        assert!(!engine.is_peak[0]);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut engine = PhaseEngine::new(2, N, H);
        let (magnitude, phase) = test_vectors();
        let mut out = vec![Complex::new(0.0, 0.0); K];

        engine.process_frame(0, PhaseMode::Pv, &magnitude, &phase, &mut out);
        engine.process_frame(1, PhaseMode::Raw, &magnitude, &phase, &mut out);
        engine.reset();

        for ch in 0..2 {
            assert!(engine.last_analysis_phase(ch).iter().all(|&p| p == 0.0));
            assert!(engine.last_synthesis_phase(ch).iter().all(|&p| p == 0.0));
        }
    }

    #[test]
    fn test_out_of_range_channel_is_clamped() {
        let mut engine = PhaseEngine::new(1, N, H);
        let (magnitude, phase) = test_vectors();
        let mut out = vec![Complex::new(0.0, 0.0); K];

        engine.process_frame(7, PhaseMode::Raw, &magnitude, &phase, &mut out);
        assert_eq!(engine.last_analysis_phase(0), &phase[..]);
    }
}
