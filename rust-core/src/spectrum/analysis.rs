//! Per-hop spectral analysis: forward transform plus magnitude/phase split

use super::fft::FftEngine;
use crate::phase::principal_arg;
use num_complex::Complex;

/// One channel's analysed frame
#[derive(Debug, Clone)]
pub struct SpectralFrame {
    /// Complex bins X[k], k = 0..K-1
    pub bins: Vec<Complex<f64>>,

    /// |X[k]|
    pub magnitude: Vec<f64>,

    /// arg X[k], wrapped to (-π, π]
    pub phase: Vec<f64>,
}

impl SpectralFrame {
    /// Allocate a zeroed frame with `num_bins` bins
    pub fn new(num_bins: usize) -> Self {
        Self {
            bins: vec![Complex::new(0.0, 0.0); num_bins],
            magnitude: vec![0.0; num_bins],
            phase: vec![0.0; num_bins],
        }
    }

    /// Number of bins (K)
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }
}

/// Spectral analyzer
///
/// Owns the FFT engine for both directions so the processor only has one
/// transform object per configuration.
pub struct SpectralAnalyzer {
    fft_engine: FftEngine,
}

impl SpectralAnalyzer {
    /// Create new spectral analyzer for frames of `fft_size` samples
    pub fn new(fft_size: usize) -> Self {
        Self {
            fft_engine: FftEngine::new(fft_size),
        }
    }

    /// Analyze an already-windowed frame into `frame`
    pub fn analyze(&mut self, windowed: &[f64], frame: &mut SpectralFrame) {
        self.fft_engine.forward(windowed, &mut frame.bins);

        for ((bin, mag), phase) in frame
            .bins
            .iter()
            .zip(frame.magnitude.iter_mut())
            .zip(frame.phase.iter_mut())
        {
            *mag = bin.norm();
            *phase = principal_arg(bin.im.atan2(bin.re));
        }
    }

    /// Inverse transform of a synthesis spectrum (unnormalized)
    pub fn synthesize(&mut self, spectrum: &[Complex<f64>], signal: &mut [f64]) {
        self.fft_engine.inverse(spectrum, signal);
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_engine.fft_size()
    }

    /// Get number of frequency bins
    pub fn num_bins(&self) -> usize {
        self.fft_engine.num_bins()
    }
}
