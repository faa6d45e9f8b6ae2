//! FFT engine using realfft for real-valued signals
//!
//! Plans forward and inverse transforms once and keeps scratch space around,
//! so per-hop processing never allocates.

use num_complex::Complex;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use std::sync::Arc;

/// Forward/inverse FFT engine for real-valued frames
pub struct FftEngine {
    /// FFT size (number of samples)
    fft_size: usize,

    /// Real-to-complex processor
    r2c: Arc<dyn RealToComplex<f64>>,

    /// Complex-to-real processor
    c2r: Arc<dyn ComplexToReal<f64>>,

    /// Reusable time-domain buffer (realfft clobbers its input)
    time_buffer: Vec<f64>,

    /// Reusable spectrum buffer
    spectrum_buffer: Vec<Complex<f64>>,

    forward_scratch: Vec<Complex<f64>>,
    inverse_scratch: Vec<Complex<f64>>,
}

impl FftEngine {
    /// Create new FFT engine
    ///
    /// # Arguments
    /// * `fft_size` - FFT size (number of samples, even)
    pub fn new(fft_size: usize) -> Self {
        let mut planner = RealFftPlanner::<f64>::new();
        let r2c = planner.plan_fft_forward(fft_size);
        let c2r = planner.plan_fft_inverse(fft_size);

        let forward_scratch = r2c.make_scratch_vec();
        let inverse_scratch = c2r.make_scratch_vec();

        Self {
            fft_size,
            r2c,
            c2r,
            time_buffer: vec![0.0; fft_size],
            spectrum_buffer: vec![Complex::new(0.0, 0.0); fft_size / 2 + 1],
            forward_scratch,
            inverse_scratch,
        }
    }

    /// Forward transform of a real frame
    ///
    /// # Arguments
    /// * `signal` - Input frame (zero-padded if shorter than fft_size)
    /// * `spectrum` - Output bins X[k] for k = 0..fft_size/2
    pub fn forward(&mut self, signal: &[f64], spectrum: &mut [Complex<f64>]) {
        let copy_len = signal.len().min(self.fft_size);
        self.time_buffer[..copy_len].copy_from_slice(&signal[..copy_len]);
        self.time_buffer[copy_len..].fill(0.0);

        let result = self.r2c.process_with_scratch(
            &mut self.time_buffer,
            &mut self.spectrum_buffer,
            &mut self.forward_scratch,
        );
        if result.is_err() {
            self.spectrum_buffer.fill(Complex::new(0.0, 0.0));
        }

        let bins = spectrum.len().min(self.spectrum_buffer.len());
        spectrum[..bins].copy_from_slice(&self.spectrum_buffer[..bins]);
    }

    /// Inverse transform back to a real frame (unnormalized: scaled by fft_size)
    ///
    /// The imaginary parts of the DC and Nyquist bins are dropped; a real
    /// signal has none there.
    pub fn inverse(&mut self, spectrum: &[Complex<f64>], signal: &mut [f64]) {
        let bins = spectrum.len().min(self.spectrum_buffer.len());
        self.spectrum_buffer[..bins].copy_from_slice(&spectrum[..bins]);
        self.spectrum_buffer[bins..].fill(Complex::new(0.0, 0.0));

        self.spectrum_buffer[0].im = 0.0;
        if self.fft_size % 2 == 0 {
            if let Some(nyquist) = self.spectrum_buffer.last_mut() {
                nyquist.im = 0.0;
            }
        }

        let result = self.c2r.process_with_scratch(
            &mut self.spectrum_buffer,
            &mut self.time_buffer,
            &mut self.inverse_scratch,
        );
        if result.is_err() {
            self.time_buffer.fill(0.0);
        }

        let len = signal.len().min(self.fft_size);
        signal[..len].copy_from_slice(&self.time_buffer[..len]);
    }

    /// Get FFT size
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Get number of frequency bins (fft_size/2 + 1 for real FFT)
    pub fn num_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }
}
