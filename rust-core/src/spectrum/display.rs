//! Lock-free spectrogram feed for display
//!
//! The processing path pushes one processed-magnitude column per hop; a
//! display thread pops whole columns. Columns are all-or-nothing: if the
//! queue cannot take a full column it is dropped and counted.

use ringbuf::{HeapConsumer, HeapProducer, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Create a connected producer/consumer pair
///
/// # Arguments
/// * `bins` - Column height (K)
/// * `columns` - Queue depth in columns
pub fn spectrogram_channel(bins: usize, columns: usize) -> (SpectrogramProducer, SpectrogramConsumer) {
    let bins = bins.max(1);
    let rb = HeapRb::<f32>::new(bins * columns.max(1));
    let (producer, consumer) = rb.split();
    let dropped = Arc::new(AtomicU64::new(0));

    (
        SpectrogramProducer {
            producer,
            column: vec![0.0; bins],
            dropped: Arc::clone(&dropped),
        },
        SpectrogramConsumer {
            consumer,
            bins,
            dropped,
        },
    )
}

/// Processing-side end of the spectrogram feed
pub struct SpectrogramProducer {
    producer: HeapProducer<f32>,
    /// Conversion buffer, one column long
    column: Vec<f32>,
    dropped: Arc<AtomicU64>,
}

impl SpectrogramProducer {
    /// Publish one magnitude column (never blocks)
    ///
    /// # Returns
    /// `true` if the column was queued, `false` if it was dropped
    pub fn push_column(&mut self, magnitude: &[f64]) -> bool {
        let bins = self.column.len();
        if self.producer.free_len() < bins {
            self.dropped.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        for (dst, &src) in self.column.iter_mut().zip(magnitude.iter()) {
            *dst = src as f32;
        }
        if magnitude.len() < bins {
            self.column[magnitude.len()..].fill(0.0);
        }

        self.producer.push_slice(&self.column) == bins
    }

    /// Column height
    pub fn bins(&self) -> usize {
        self.column.len()
    }
}

/// Display-side end of the spectrogram feed
pub struct SpectrogramConsumer {
    consumer: HeapConsumer<f32>,
    bins: usize,
    dropped: Arc<AtomicU64>,
}

impl SpectrogramConsumer {
    /// Pop the oldest complete column into `out`
    ///
    /// # Returns
    /// `true` if a column was read
    pub fn pop_column(&mut self, out: &mut [f32]) -> bool {
        if self.consumer.len() < self.bins || out.len() < self.bins {
            return false;
        }
        self.consumer.pop_slice(&mut out[..self.bins]) == self.bins
    }

    /// Number of complete columns waiting
    pub fn available_columns(&self) -> usize {
        self.consumer.len() / self.bins
    }

    /// Column height
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Columns dropped because the queue was full
    pub fn dropped_columns(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}
