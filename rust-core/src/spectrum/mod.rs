//! Spectral analysis with FFT

pub mod fft;
pub mod windowing;
pub mod analysis;
pub mod display;

pub use fft::FftEngine;
pub use windowing::{WindowType, generate_window, cola_gain};
pub use analysis::{SpectralAnalyzer, SpectralFrame};
pub use display::{spectrogram_channel, SpectrogramConsumer, SpectrogramProducer};
