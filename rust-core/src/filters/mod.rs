//! Magnitude-domain spectral effects

pub mod kernels;
pub mod convolve;
pub mod pipeline;

pub use convolve::{convolve_centered, resample_linear};
pub use pipeline::{EffectIntensities, EffectPipeline, MAGNITUDE_FLOOR};
