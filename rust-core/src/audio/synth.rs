//! Overlap-add synthesis ring
//!
//! Inverse-transformed blocks are windowed a second time, scaled, and summed
//! into a 2N output ring. The first block lands one hop ahead of the read
//! cursor, which makes the round trip exactly N samples long.

use crate::spectrum::windowing::{cola_gain, cola_ripple, generate_window, WindowType};
use log::debug;

/// Windowed overlap-add accumulator with a per-sample read cursor
pub struct OverlapAddSynth {
    /// Accumulation ring, 2N long
    buffer: Vec<f64>,

    /// Next sample handed out by `read`
    read_pos: usize,

    /// Where the next block starts
    write_pos: usize,

    frame_size: usize,
    hop_size: usize,

    /// Synthesis window (sqrt-Hann)
    window: Vec<f64>,

    /// 1 / (N · cola_gain): undoes the unnormalized inverse FFT and the window overlap
    scale: f64,
}

impl OverlapAddSynth {
    pub fn new(frame_size: usize, hop_size: usize) -> Self {
        let frame_size = frame_size.max(1);
        let hop_size = hop_size.clamp(1, frame_size);
        let window = generate_window(WindowType::SqrtHann, frame_size);

        let gain = cola_gain(&window, hop_size);
        let scale = if gain > f64::EPSILON {
            1.0 / (frame_size as f64 * gain)
        } else {
            1.0 / frame_size as f64
        };
        debug!(
            "Overlap-add: N={}, H={}, gain {:.3}, ripple {:.2e}",
            frame_size,
            hop_size,
            gain,
            cola_ripple(&window, hop_size)
        );

        Self {
            buffer: vec![0.0; 2 * frame_size],
            read_pos: 0,
            write_pos: hop_size % (2 * frame_size),
            frame_size,
            hop_size,
            window,
            scale,
        }
    }

    /// Add one inverse-FFT block (N samples, unnormalized) at the write offset
    pub fn accumulate(&mut self, block: &[f64]) {
        let len = self.buffer.len();

        for (i, (&x, &w)) in block.iter().zip(self.window.iter()).enumerate() {
            self.buffer[(self.write_pos + i) % len] += x * w * self.scale;
        }

        self.write_pos = (self.write_pos + self.hop_size) % len;
    }

    /// Take one output sample; its slot is cleared for the next overlap cycle
    #[inline]
    pub fn read(&mut self) -> f64 {
        let sample = self.buffer[self.read_pos];
        self.buffer[self.read_pos] = 0.0;
        self.read_pos = (self.read_pos + 1) % self.buffer.len();
        sample
    }

    pub fn reset(&mut self) {
        self.buffer.fill(0.0);
        self.read_pos = 0;
        self.write_pos = self.hop_size % self.buffer.len();
    }

    /// Input-to-output delay in samples
    pub fn latency_samples(&self) -> usize {
        self.frame_size
    }

    /// Combined block scale applied on accumulation
    pub fn scale(&self) -> f64 {
        self.scale
    }
}
