//! Sample-stream side of the engine: framing, overlap-add, conditioning

pub mod buffer;
pub mod conditioner;
pub mod processor;
pub mod synth;

pub use buffer::AnalysisRing;
pub use conditioner::OutputConditioner;
pub use processor::{ProcessParams, SpectralProcessor};
pub use synth::OverlapAddSynth;
