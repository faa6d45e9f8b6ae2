//! Analysis ring buffer
//!
//! Collects input one sample at a time and hands out windowed frames of the
//! N most recent samples every H samples. Owned by the processing thread;
//! fixed size, no allocations after construction.

use crate::spectrum::windowing::{apply_window_inplace, generate_window, WindowType};

/// Circular input store with hop-synchronous frame extraction
pub struct AnalysisRing {
    /// Sample store, 2N long
    buffer: Vec<f64>,

    /// Next write position
    cursor: usize,

    /// Frame length N
    frame_size: usize,

    /// Hop H
    hop_size: usize,

    /// Samples written since the last frame was due
    since_block: usize,

    /// Analysis window (sqrt-Hann)
    window: Vec<f64>,
}

impl AnalysisRing {
    /// Create a ring for frames of `frame_size` samples every `hop_size` samples
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        let hop_size = hop_size.clamp(1, frame_size);

        Self {
            buffer: vec![0.0; 2 * frame_size],
            cursor: 0,
            frame_size,
            hop_size,
            since_block: 0,
            window: generate_window(WindowType::SqrtHann, frame_size),
        }
    }

    /// Write one sample
    ///
    /// # Returns
    /// `true` when H samples have arrived since the last frame, i.e. a full
    /// analysis/synthesis block is due now
    #[inline]
    pub fn push(&mut self, sample: f64) -> bool {
        self.buffer[self.cursor] = sample;
        self.cursor = (self.cursor + 1) % self.buffer.len();

        self.since_block += 1;
        if self.since_block >= self.hop_size {
            self.since_block = 0;
            true
        } else {
            false
        }
    }

    /// Copy the N most recent samples, windowed, into `frame`
    ///
    /// `frame[0]` is the oldest sample, `frame[N-1]` the one just pushed.
    pub fn frame_into(&self, frame: &mut [f64]) {
        let len = self.buffer.len();
        let start = (self.cursor + len - self.frame_size) % len;

        for (i, out) in frame.iter_mut().take(self.frame_size).enumerate() {
            *out = self.buffer[(start + i) % len];
        }
        apply_window_inplace(frame, &self.window);
    }

    /// The sample pushed `delay` calls ago (0 = the latest), up to 2N - 1 back
    #[inline]
    pub fn delayed(&self, delay: usize) -> f64 {
        let len = self.buffer.len();
        let delay = delay.min(len - 1);
        self.buffer[(self.cursor + len - 1 - delay) % len]
    }

    /// Clear stored samples and the hop counter
    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.cursor = 0;
        self.since_block = 0;
    }

    /// The analysis/synthesis window
    pub fn window(&self) -> &[f64] {
        &self.window
    }

    /// Frame length N
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Hop H
    pub fn hop_size(&self) -> usize {
        self.hop_size
    }
}
