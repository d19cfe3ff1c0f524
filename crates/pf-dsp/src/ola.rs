//! Overlap-add accumulator with window-energy normalization
//!
//! Grains are windowed and summed into the output ring; the squared window
//! goes into a parallel normalization ring at the same cursors. Reading a
//! sample divides the two and clears both slots.
//!
//! A grain transposed up by `ratio` only covers `N / ratio` output samples,
//! so the caller writes `grains_per_hop(ratio)` phase-shifted grains per hop
//! to keep the summed window energy at the unresampled overlap.

use pf_core::Sample;

use crate::ring::RingBuffer;

/// Lower bound on the normalization divisor
pub const NORM_FLOOR: f64 = 0.1;

/// Pitch ratios this close to 1 skip grain resampling
const UNITY_TOLERANCE: f64 = 1e-9;

/// Most grains written for one analysis hop
pub const MAX_GRAINS_PER_HOP: usize = 4;

/// Grains per hop that keep the overlap of a unity grain at `ratio`
#[inline]
pub fn grains_per_hop(ratio: f64) -> usize {
    if ratio.is_nan() || ratio <= 1.0 + UNITY_TOLERANCE {
        return 1;
    }
    (ratio.ceil() as usize).clamp(1, MAX_GRAINS_PER_HOP)
}

#[derive(Debug, Clone)]
pub struct OverlapAdd {
    output: RingBuffer,
    norm: RingBuffer,
}

impl OverlapAdd {
    pub fn new(capacity: usize) -> Self {
        Self {
            output: RingBuffer::new(capacity),
            norm: RingBuffer::new(capacity),
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.output.capacity()
    }

    /// Accumulate one grain whose first sample lands at `origin`.
    ///
    /// With `ratio != 1` the grain is resampled about its centre: output
    /// offset `p` reads grain position `N/2 + (p - N/2) * ratio`, so content
    /// is transposed by `ratio` while the centre stays put. Positions before
    /// `read_cursor` have already been emitted and are skipped.
    pub fn write_grain(
        &mut self,
        grain: &[Sample],
        window: &[f64],
        origin: usize,
        read_cursor: usize,
        ratio: f64,
    ) {
        let size = grain.len().min(window.len());
        if size == 0 {
            return;
        }
        let limit = read_cursor + self.capacity();

        if (ratio - 1.0).abs() < UNITY_TOLERANCE || ratio.is_nan() || ratio <= 0.0 {
            for (i, (&g, &w)) in grain.iter().zip(window).enumerate() {
                let pos = origin + i;
                if pos < read_cursor {
                    continue;
                }
                if pos >= limit {
                    break;
                }
                self.output.add(pos, g * w);
                self.norm.add(pos, w * w);
            }
            return;
        }

        let centre = (size / 2) as f64;
        let last = (size - 1) as f64;
        let first_offset = (centre - centre / ratio).ceil() as isize;
        let last_offset = (centre + (last - centre) / ratio).floor() as isize;

        for p in first_offset..=last_offset {
            let Some(pos) = origin.checked_add_signed(p) else {
                continue;
            };
            if pos < read_cursor {
                continue;
            }
            if pos >= limit {
                break;
            }

            let q = (centre + (p as f64 - centre) * ratio).clamp(0.0, last);
            let index = q as usize;
            let frac = q - index as f64;
            let next = (index + 1).min(size - 1);

            let g = grain[index] + frac * (grain[next] - grain[index]);
            let w = window[index] + frac * (window[next] - window[index]);

            self.output.add(pos, g * w);
            self.norm.add(pos, w * w);
        }
    }

    /// Normalized output at `cursor`; clears the slot for reuse
    #[inline]
    pub fn read(&mut self, cursor: usize) -> Sample {
        let out = self.output.take(cursor);
        let norm = self.norm.take(cursor);
        out / norm.max(NORM_FLOOR)
    }

    /// Accumulated window energy at `cursor` (not cleared)
    #[inline]
    pub fn norm_at(&self, cursor: usize) -> f64 {
        self.norm.get(cursor)
    }

    pub fn reset(&mut self) {
        self.output.clear();
        self.norm.clear();
    }
}
