//! Painted time/frequency mask with a lock-free front/back hand-off
//!
//! The mask is a HIST × K matrix of weights in [0, 1] (columns are time,
//! rows are bins). The controller side writes the back buffer through a
//! [`MaskEditor`] and then calls [`MaskEditor::mark_dirty`]; the processing
//! side calls [`TimeFrequencyMask::swap_if_dirty`] once per hop, which copies
//! back → front only when the dirty flag was set. Several edits between two
//! swaps collapse into one update (last write wins).
//!
//! Thread safety
//! - Back weights are stored as `AtomicU32` bit patterns, so concurrent
//!   writes and the bulk copy never race in the memory-model sense.
//! - Ordering comes from the dirty flag: release-store on the controller,
//!   acquire-exchange on the processing side.
//! - The front buffer is owned by the processing side and never shared.
//! - Nothing here takes a lock or waits.

use log::debug;
use ndarray::{Array2, Axis, Zip};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::Arc;

/// Default history length in columns
pub const DEFAULT_COLUMNS: usize = 256;

/// State shared between the processing side and the controller side
struct MaskShared {
    columns: usize,
    bins: usize,

    /// [columns][bins] f32 weights as raw bits
    back: Array2<AtomicU32>,

    dirty: AtomicBool,
    head: AtomicUsize,
    low_bin: AtomicUsize,
    high_bin: AtomicUsize,
    enabled: AtomicBool,
}

impl MaskShared {
    fn new(columns: usize, bins: usize) -> Self {
        Self {
            columns,
            bins,
            back: Array2::from_shape_fn((columns, bins), |_| AtomicU32::new(0.0f32.to_bits())),
            dirty: AtomicBool::new(false),
            head: AtomicUsize::new(columns - 1),
            low_bin: AtomicUsize::new(0),
            high_bin: AtomicUsize::new(bins - 1),
            enabled: AtomicBool::new(true),
        }
    }

    #[inline]
    fn mark_dirty(&self) {
        self.dirty.store(true, Ordering::Release);
    }

    fn set_bounds(&self, lo: usize, hi: usize) {
        let max_bin = self.bins - 1;
        let (mut lo, mut hi) = (lo.min(max_bin), hi.min(max_bin));
        if lo > hi {
            std::mem::swap(&mut lo, &mut hi);
        }
        self.low_bin.store(lo, Ordering::Relaxed);
        self.high_bin.store(hi, Ordering::Relaxed);
    }

    fn ring_col_from_display_col(&self, display_col: usize) -> usize {
        let display_col = display_col.min(self.columns - 1);
        let head = self.head.load(Ordering::Relaxed);
        (head + self.columns - (self.columns - 1 - display_col)) % self.columns
    }

    #[inline]
    fn store(&self, col: usize, bin: usize, value: f32) {
        let col = col.min(self.columns - 1);
        let bin = bin.min(self.bins - 1);
        self.back[[col, bin]].store(sanitize(value).to_bits(), Ordering::Relaxed);
    }
}

#[inline]
fn sanitize(weight: f32) -> f32 {
    if weight.is_nan() {
        0.0
    } else {
        weight.clamp(0.0, 1.0)
    }
}

/// Processing-side view of the mask (owns the front buffer)
pub struct TimeFrequencyMask {
    shared: Arc<MaskShared>,
    front: Array2<f32>,
}

impl TimeFrequencyMask {
    /// Allocate a mask of `columns` × `bins`
    ///
    /// Both buffers start at zero, head on the last column, bounds at the
    /// full band, enabled and clean. Zero dimensions are clamped to 1.
    pub fn setup(columns: usize, bins: usize) -> Self {
        let columns = columns.max(1);
        let bins = bins.max(1);
        debug!("Mask setup: {} columns x {} bins", columns, bins);

        Self {
            shared: Arc::new(MaskShared::new(columns, bins)),
            front: Array2::zeros((columns, bins)),
        }
    }

    /// Controller handle sharing this mask's back buffer
    pub fn editor(&self) -> MaskEditor {
        MaskEditor {
            shared: Arc::clone(&self.shared),
        }
    }

    /// Copy back → front if the controller marked the back buffer dirty
    ///
    /// Call at most once per hop.
    ///
    /// # Returns
    /// `true` if a copy happened
    pub fn swap_if_dirty(&mut self) -> bool {
        if !self.shared.dirty.swap(false, Ordering::AcqRel) {
            return false;
        }

        Zip::from(&mut self.front)
            .and(&self.shared.back)
            .for_each(|front, back| *front = f32::from_bits(back.load(Ordering::Relaxed)));
        true
    }

    /// Rotate the ring pointer by one column
    ///
    /// # Returns
    /// The new head column
    pub fn advance_head(&self) -> usize {
        let head = self.shared.head.load(Ordering::Relaxed);
        let next = (head + 1) % self.shared.columns;
        self.shared.head.store(next, Ordering::Relaxed);
        next
    }

    /// Weight of `bin` in the current (head) column
    ///
    /// 0 outside [low_bin, high_bin], otherwise the front weight clamped to
    /// [0, 1].
    #[inline]
    pub fn weight_now(&self, bin: usize) -> f32 {
        let lo = self.shared.low_bin.load(Ordering::Relaxed);
        let hi = self.shared.high_bin.load(Ordering::Relaxed);
        if bin < lo || bin > hi || bin >= self.shared.bins {
            return 0.0;
        }

        let head = self.shared.head.load(Ordering::Relaxed);
        sanitize(self.front[[head, bin]])
    }

    /// Fill `weights` with `weight_now` for every bin (1.0 everywhere when disabled)
    pub fn weights_now(&self, weights: &mut [f64]) {
        if !self.enabled() {
            weights.fill(1.0);
            return;
        }
        for (bin, w) in weights.iter_mut().enumerate() {
            *w = self.weight_now(bin) as f64;
        }
    }

    /// Front weight at a ring column (indices clamped)
    pub fn front_weight(&self, col: usize, bin: usize) -> f32 {
        let col = col.min(self.shared.columns - 1);
        let bin = bin.min(self.shared.bins - 1);
        self.front[[col, bin]]
    }

    /// See [`MaskEditor::set_bounds`]
    pub fn set_bounds(&self, lo: usize, hi: usize) {
        self.shared.set_bounds(lo, hi);
    }

    /// See [`MaskEditor::ring_col_from_display_col`]
    pub fn ring_col_from_display_col(&self, display_col: usize) -> usize {
        self.shared.ring_col_from_display_col(display_col)
    }

    pub fn enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    pub fn low_bin(&self) -> usize {
        self.shared.low_bin.load(Ordering::Relaxed)
    }

    pub fn high_bin(&self) -> usize {
        self.shared.high_bin.load(Ordering::Relaxed)
    }

    pub fn head(&self) -> usize {
        self.shared.head.load(Ordering::Relaxed)
    }

    pub fn columns(&self) -> usize {
        self.shared.columns
    }

    pub fn bins(&self) -> usize {
        self.shared.bins
    }
}

/// Controller-side handle: writes the back buffer and the scalar settings
///
/// Cheap to clone; every clone edits the same mask.
#[derive(Clone)]
pub struct MaskEditor {
    shared: Arc<MaskShared>,
}

impl MaskEditor {
    /// Publish back-buffer edits to the processing side
    pub fn mark_dirty(&self) {
        self.shared.mark_dirty();
    }

    /// Set one back weight at a ring column (indices clamped, value clamped to [0, 1])
    pub fn set_weight(&self, col: usize, bin: usize, weight: f32) {
        self.shared.store(col, bin, weight);
    }

    /// Set one back weight addressed by screen column (0 = oldest, HIST-1 = newest)
    pub fn paint_display(&self, display_col: usize, bin: usize, weight: f32) {
        let col = self.shared.ring_col_from_display_col(display_col);
        self.shared.store(col, bin, weight);
    }

    /// Set every bin of one ring column
    pub fn fill_column(&self, col: usize, weight: f32) {
        let col = col.min(self.shared.columns - 1);
        let bits = sanitize(weight).to_bits();
        for cell in self.shared.back.index_axis(Axis(0), col).iter() {
            cell.store(bits, Ordering::Relaxed);
        }
    }

    /// Fill the whole back buffer with a constant and mark dirty
    pub fn clear_back(&self, value: f32) {
        let bits = sanitize(value).to_bits();
        for cell in self.shared.back.iter() {
            cell.store(bits, Ordering::Relaxed);
        }
        self.shared.mark_dirty();
    }

    /// Read back a weight the controller wrote (indices clamped)
    pub fn back_weight(&self, col: usize, bin: usize) -> f32 {
        let col = col.min(self.shared.columns - 1);
        let bin = bin.min(self.shared.bins - 1);
        f32::from_bits(self.shared.back[[col, bin]].load(Ordering::Relaxed))
    }

    /// Set the active band; both ends clamped to [0, K-1], swapped if reversed
    pub fn set_bounds(&self, lo: usize, hi: usize) {
        self.shared.set_bounds(lo, hi);
    }

    /// Enable or bypass the mask (bypassed = effects apply everywhere)
    pub fn set_enabled(&self, enabled: bool) {
        self.shared.enabled.store(enabled, Ordering::Relaxed);
    }

    /// Map a screen column (0 = oldest, HIST-1 = newest) to its ring column
    pub fn ring_col_from_display_col(&self, display_col: usize) -> usize {
        self.shared.ring_col_from_display_col(display_col)
    }

    pub fn enabled(&self) -> bool {
        self.shared.enabled.load(Ordering::Relaxed)
    }

    pub fn low_bin(&self) -> usize {
        self.shared.low_bin.load(Ordering::Relaxed)
    }

    pub fn high_bin(&self) -> usize {
        self.shared.high_bin.load(Ordering::Relaxed)
    }

    pub fn head(&self) -> usize {
        self.shared.head.load(Ordering::Relaxed)
    }

    pub fn columns(&self) -> usize {
        self.shared.columns
    }

    pub fn bins(&self) -> usize {
        self.shared.bins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_setup_defaults() {
        let mask = TimeFrequencyMask::setup(8, 17);

        assert_eq!(mask.columns(), 8);
        assert_eq!(mask.bins(), 17);
        assert_eq!(mask.head(), 7);
        assert_eq!(mask.low_bin(), 0);
        assert_eq!(mask.high_bin(), 16);
        assert!(mask.enabled());
        assert!((0..17).all(|k| mask.weight_now(k) == 0.0));
    }

    #[test]
    fn test_zero_dimensions_are_clamped() {
        let mask = TimeFrequencyMask::setup(0, 0);
        assert_eq!(mask.columns(), 1);
        assert_eq!(mask.bins(), 1);
        assert_eq!(mask.weight_now(5), 0.0);
    }

    #[test]
    fn test_edits_invisible_until_swap() {
        let mut mask = TimeFrequencyMask::setup(4, 9);
        let editor = mask.editor();

        editor.fill_column(mask.head(), 0.75);
        assert_eq!(mask.weight_now(3), 0.0);

        // Not dirty yet: swap is a no-op
        assert!(!mask.swap_if_dirty());
        assert_eq!(mask.weight_now(3), 0.0);

        editor.mark_dirty();
        assert!(mask.swap_if_dirty());
        assert_eq!(mask.weight_now(3), 0.75);

        // Flag cleared by the swap
        assert!(!mask.swap_if_dirty());
    }

    #[test]
    fn test_last_write_wins() {
        let mut mask = TimeFrequencyMask::setup(6, 5);
        let editor = mask.editor();

        for generation in 1..=5 {
            editor.clear_back(generation as f32 * 0.1);
            editor.set_weight(2, 2, generation as f32 * 0.05);
            editor.mark_dirty();
        }
        assert!(mask.swap_if_dirty());

        for col in 0..6 {
            for bin in 0..5 {
                assert_eq!(mask.front_weight(col, bin), editor.back_weight(col, bin));
            }
        }
        assert!((mask.front_weight(0, 0) - 0.5).abs() < 1e-6);
        assert!((mask.front_weight(2, 2) - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_handoff_across_threads() {
        let mut mask = TimeFrequencyMask::setup(16, 33);
        let editor = mask.editor();

        let writer = thread::spawn(move || {
            for round in 0..100 {
                editor.clear_back((round % 10) as f32 / 10.0);
            }
            editor.set_weight(3, 4, 1.0);
            editor.mark_dirty();
        });
        writer.join().expect("writer thread panicked");

        assert!(mask.swap_if_dirty());
        assert_eq!(mask.front_weight(3, 4), 1.0);
        assert!((mask.front_weight(0, 0) - 0.9).abs() < 1e-6);
        assert!((mask.front_weight(15, 32) - 0.9).abs() < 1e-6);
    }

    #[test]
    fn test_band_bounds_any_order() {
        let mut mask = TimeFrequencyMask::setup(4, 64);
        let editor = mask.editor();
        editor.clear_back(0.6);
        assert!(mask.swap_if_dirty());

        for &(lo, hi) in &[(10usize, 20usize), (20, 10), (50, 500), (500, 50)] {
            editor.set_bounds(lo, hi);
            let (min, max) = (lo.min(hi).min(63), lo.max(hi).min(63));
            assert_eq!(mask.low_bin(), min);
            assert_eq!(mask.high_bin(), max);

            for k in 0..80 {
                let w = mask.weight_now(k);
                if k < min || k > max {
                    assert_eq!(w, 0.0, "bin {k} outside [{min}, {max}]");
                } else {
                    assert!((w - 0.6).abs() < 1e-6);
                }
            }
        }
    }

    #[test]
    fn test_weights_are_clamped() {
        let mut mask = TimeFrequencyMask::setup(2, 4);
        let editor = mask.editor();

        editor.set_weight(1, 0, 3.0);
        editor.set_weight(1, 1, -2.0);
        editor.set_weight(1, 2, f32::NAN);
        editor.set_weight(99, 99, 0.5);
        editor.mark_dirty();
        mask.swap_if_dirty();

        assert_eq!(mask.weight_now(0), 1.0);
        assert_eq!(mask.weight_now(1), 0.0);
        assert_eq!(mask.weight_now(2), 0.0);
        assert_eq!(mask.weight_now(3), 0.5);
    }

    #[test]
    fn test_weights_now_disabled_is_unity() {
        let mask = TimeFrequencyMask::setup(2, 4);
        let editor = mask.editor();
        let mut weights = vec![0.0; 4];

        mask.weights_now(&mut weights);
        assert!(weights.iter().all(|&w| w == 0.0));

        editor.set_enabled(false);
        mask.weights_now(&mut weights);
        assert!(weights.iter().all(|&w| w == 1.0));
    }

    #[test]
    fn test_advance_head_and_display_mapping() {
        let mask = TimeFrequencyMask::setup(4, 3);

        // Newest on the right maps to head
        assert_eq!(mask.ring_col_from_display_col(3), 3);
        assert_eq!(mask.ring_col_from_display_col(0), 0);

        assert_eq!(mask.advance_head(), 0);
        assert_eq!(mask.ring_col_from_display_col(3), 0);
        assert_eq!(mask.ring_col_from_display_col(2), 3);
        assert_eq!(mask.ring_col_from_display_col(0), 1);

        // Out-of-range screen columns clamp to the newest
        assert_eq!(mask.ring_col_from_display_col(40), 0);

        assert_eq!(mask.advance_head(), 1);
        assert_eq!(mask.advance_head(), 2);
        assert_eq!(mask.advance_head(), 3);
        assert_eq!(mask.advance_head(), 0);
    }

    #[test]
    fn test_paint_display_targets_newest_column() {
        let mut mask = TimeFrequencyMask::setup(4, 8);
        let editor = mask.editor();
        mask.advance_head();

        editor.paint_display(3, 5, 0.9);
        editor.mark_dirty();
        mask.swap_if_dirty();

        assert!((mask.weight_now(5) - 0.9).abs() < 1e-6);
        assert!((mask.front_weight(mask.head(), 5) - 0.9).abs() < 1e-6);
    }
}
