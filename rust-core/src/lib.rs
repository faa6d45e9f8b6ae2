//! SpectroFX - real-time spectral audio effects
//!
//! Short-time spectral frames are shaped by image-style magnitude filters
//! under a painted time/frequency mask, given phase by one of three
//! reconstruction modes, and resynthesized by windowed overlap-add.

pub mod audio;
pub mod config;
pub mod filters;
pub mod mask;
pub mod phase;
pub mod spectrum;

pub use audio::{ProcessParams, SpectralProcessor};
pub use config::{ConfigError, EngineConfig, GatePolicy};
pub use filters::EffectIntensities;
pub use mask::{MaskEditor, TimeFrequencyMask};
pub use phase::PhaseMode;
pub use spectrum::{SpectrogramConsumer, WindowType};
