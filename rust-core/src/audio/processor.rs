//! Spectral effects processor - the per-sample engine façade
//!
//! Owns every piece of per-hop state (analysis rings, transforms, effect
//! pipeline, phase histories, overlap-add rings) and exposes a push/pull
//! interface: one sample per channel in, one sample per channel out, fixed
//! latency of N samples. The only state shared with other threads is the
//! mask (through [`MaskEditor`]) and the optional spectrogram tap.

use crate::audio::buffer::AnalysisRing;
use crate::audio::conditioner::OutputConditioner;
use crate::audio::synth::OverlapAddSynth;
use crate::config::{ConfigError, EngineConfig, MAX_CHANNELS};
use crate::filters::{EffectIntensities, EffectPipeline};
use crate::mask::{MaskEditor, TimeFrequencyMask};
use crate::phase::{PhaseEngine, PhaseMode};
use crate::spectrum::{spectrogram_channel, SpectralAnalyzer, SpectralFrame, SpectrogramConsumer, SpectrogramProducer};
use log::{debug, info};
use num_complex::Complex;

/// Controls read once per hop
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ProcessParams {
    /// Phase reconstruction mode
    pub mode: PhaseMode,

    /// Effect amounts per channel
    pub intensities: [EffectIntensities; MAX_CHANNELS],
}

impl ProcessParams {
    /// Same intensities on every channel
    pub fn uniform(mode: PhaseMode, intensities: EffectIntensities) -> Self {
        Self {
            mode,
            intensities: [intensities; MAX_CHANNELS],
        }
    }
}

/// Per-channel buffers, all sized at construction
struct ChannelState {
    ring: AnalysisRing,
    synth: OverlapAddSynth,
    conditioner: OutputConditioner,

    /// Analysed spectrum of the latest frame
    frame: SpectralFrame,

    /// Windowed input frame, reused for the inverse-transform output
    time_buffer: Vec<f64>,

    /// Synthesis spectrum handed to the inverse transform
    spectrum: Vec<Complex<f64>>,

    /// Magnitudes after the effect pipeline
    processed: Vec<f64>,
}

impl ChannelState {
    fn new(config: &EngineConfig) -> Self {
        let fft_size = config.fft_size;
        let num_bins = config.num_bins();

        Self {
            ring: AnalysisRing::new(fft_size, config.hop_size),
            synth: OverlapAddSynth::new(fft_size, config.hop_size),
            conditioner: OutputConditioner::new(&config.conditioning),
            frame: SpectralFrame::new(num_bins),
            time_buffer: vec![0.0; fft_size],
            spectrum: vec![Complex::new(0.0, 0.0); num_bins],
            processed: vec![0.0; num_bins],
        }
    }

    fn reset(&mut self) {
        self.ring.reset();
        self.synth.reset();
        self.conditioner.reset();
        self.processed.fill(0.0);
    }
}

/// Real-time spectral effects engine
pub struct SpectralProcessor {
    config: EngineConfig,
    channels: Vec<ChannelState>,
    analyzer: SpectralAnalyzer,
    pipeline: EffectPipeline,
    phase: PhaseEngine,
    mask: TimeFrequencyMask,

    /// Mask weights for the current hop
    weights: Vec<f64>,

    /// Display feed (channel 0 processed magnitude)
    tap: Option<SpectrogramProducer>,
}

impl SpectralProcessor {
    /// Create a processor; every buffer is allocated here
    pub fn new(config: EngineConfig) -> Result<Self, ConfigError> {
        config.validate()?;

        let num_bins = config.num_bins();
        let mut phase = PhaseEngine::new(config.channels, config.fft_size, config.hop_size);
        phase.set_peak_threshold(config.phase_lock_threshold);

        let processor = Self {
            channels: (0..config.channels).map(|_| ChannelState::new(&config)).collect(),
            analyzer: SpectralAnalyzer::new(config.fft_size),
            pipeline: EffectPipeline::new(num_bins, config.channels, config.gate_policy),
            phase,
            mask: TimeFrequencyMask::setup(config.mask_columns, num_bins),
            weights: vec![1.0; num_bins],
            tap: None,
            config,
        };

        info!(
            "Spectral processor ready: N={}, H={}, {} channel(s)",
            processor.config.fft_size, processor.config.hop_size, processor.config.channels
        );
        debug!(
            "Bins: {}, latency: {} samples, gate: {:?}, conditioning: {:?}",
            num_bins,
            processor.latency_samples(),
            processor.config.gate_policy,
            processor.config.conditioning
        );

        Ok(processor)
    }

    /// Process one sample per channel
    ///
    /// # Arguments
    /// * `input` - One sample per channel; missing channels read as silence
    /// * `params` - Mode and intensities, used only if a hop completes here
    /// * `output` - One sample per channel; extra slots are left untouched
    pub fn process(&mut self, input: &[f64], params: &ProcessParams, output: &mut [f64]) {
        self.process_with_dry(input, params, output, &mut []);
    }

    /// [`process`](Self::process) plus the unprocessed input, delayed by the
    /// same N samples so both streams line up for A/B comparison
    ///
    /// `dry` takes one sample per channel; extra slots are left untouched.
    pub fn process_with_dry(
        &mut self,
        input: &[f64],
        params: &ProcessParams,
        output: &mut [f64],
        dry: &mut [f64],
    ) {
        let mut block_due = false;
        for (ch, state) in self.channels.iter_mut().enumerate() {
            let sample = input.get(ch).copied().filter(|x| x.is_finite()).unwrap_or(0.0);
            // All rings share the same hop phase
            block_due = state.ring.push(sample);
        }

        if block_due {
            self.run_block(params);
        }

        for (state, out) in self.channels.iter_mut().zip(output.iter_mut()) {
            *out = state.conditioner.process_sample(state.synth.read());
        }

        let latency = self.config.fft_size;
        for (state, out) in self.channels.iter().zip(dry.iter_mut()) {
            *out = state.ring.delayed(latency);
        }
    }

    /// One analysis → effects → phase → synthesis pass over every channel
    fn run_block(&mut self, params: &ProcessParams) {
        self.mask.swap_if_dirty();
        self.mask.advance_head();
        self.mask.weights_now(&mut self.weights);

        for (ch, state) in self.channels.iter_mut().enumerate() {
            state.ring.frame_into(&mut state.time_buffer);
            self.analyzer.analyze(&state.time_buffer, &mut state.frame);

            state.processed.copy_from_slice(&state.frame.magnitude);
            let intensities = &params.intensities[ch.min(MAX_CHANNELS - 1)];
            self.pipeline.process(ch, &mut state.processed, intensities, &self.weights);

            self.phase.process_frame(
                ch,
                params.mode,
                &state.processed,
                &state.frame.phase,
                &mut state.spectrum,
            );

            self.analyzer.synthesize(&state.spectrum, &mut state.time_buffer);
            state.synth.accumulate(&state.time_buffer);
        }

        if let (Some(tap), Some(first)) = (self.tap.as_mut(), self.channels.first()) {
            tap.push_column(&first.processed);
        }
    }

    /// Controller handle for painting the mask
    pub fn mask_editor(&self) -> MaskEditor {
        self.mask.editor()
    }

    /// Processing-side mask state (front buffer, head, bounds)
    pub fn mask(&self) -> &TimeFrequencyMask {
        &self.mask
    }

    /// Magnitudes of the latest hop after the effect pipeline (channel clamped)
    pub fn processed_magnitude(&self, ch: usize) -> &[f64] {
        let ch = ch.min(self.channels.len() - 1);
        &self.channels[ch].processed
    }

    /// Input-to-output delay in samples (N)
    pub fn latency_samples(&self) -> usize {
        self.config.fft_size
    }

    /// Clear all signal history
    ///
    /// Rings, overlap-add buffers, phase histories, conditioners and gate
    /// followers go back to silence. The mask is left as painted.
    pub fn reset(&mut self) {
        for state in self.channels.iter_mut() {
            state.reset();
        }
        self.phase.reset();
        self.pipeline.reset();
        info!("Spectral processor reset");
    }

    /// Apply a new configuration
    ///
    /// On error the current configuration stays in place. The mask survives
    /// when its dimensions are unchanged; otherwise it is rebuilt and existing
    /// [`MaskEditor`] handles stop affecting the processor. The spectrogram
    /// tap is dropped when the bin count changes.
    pub fn reconfigure(&mut self, config: EngineConfig) -> Result<(), ConfigError> {
        config.validate()?;

        let num_bins = config.num_bins();
        let mask_changed = num_bins != self.mask.bins() || config.mask_columns != self.mask.columns();

        let mut phase = PhaseEngine::new(config.channels, config.fft_size, config.hop_size);
        phase.set_peak_threshold(config.phase_lock_threshold);

        self.channels = (0..config.channels).map(|_| ChannelState::new(&config)).collect();
        self.analyzer = SpectralAnalyzer::new(config.fft_size);
        self.pipeline = EffectPipeline::new(num_bins, config.channels, config.gate_policy);
        self.phase = phase;
        self.weights = vec![1.0; num_bins];

        if mask_changed {
            self.mask = TimeFrequencyMask::setup(config.mask_columns, num_bins);
            info!("Mask rebuilt for {} bins; previous editors are detached", num_bins);
        }
        if self.tap.as_ref().is_some_and(|tap| tap.bins() != num_bins) {
            self.tap = None;
            info!("Spectrogram tap dropped after bin count change");
        }

        info!(
            "Spectral processor reconfigured: N={}, H={}, {} channel(s)",
            config.fft_size, config.hop_size, config.channels
        );
        self.config = config;
        Ok(())
    }

    /// Open a spectrogram feed holding up to `columns` columns
    ///
    /// Replaces any previous tap.
    pub fn spectrogram_tap(&mut self, columns: usize) -> SpectrogramConsumer {
        let (producer, consumer) = spectrogram_channel(self.config.num_bins(), columns);
        self.tap = Some(producer);
        debug!("Spectrogram tap opened: {} columns", columns);
        consumer
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn num_channels(&self) -> usize {
        self.channels.len()
    }

    pub fn num_bins(&self) -> usize {
        self.config.num_bins()
    }
}
