//! Power-of-two ring buffer with monotonic cursors
//!
//! Cursors are plain `usize` counters that only ever increase; they are turned
//! into ring offsets with a mask at the point of access. Because the capacity
//! is a power of two, `wrapping_sub` on a cursor still lands on the right slot,
//! which lets the first analysis frames read the zeroed pre-roll.

use pf_core::Sample;

/// Fixed-capacity circular sample buffer
#[derive(Debug, Clone)]
pub struct RingBuffer {
    data: Vec<Sample>,
    mask: usize,
}

impl RingBuffer {
    /// Create a ring with the given capacity (rounded up to a power of two)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1).next_power_of_two();
        Self {
            data: vec![0.0; capacity],
            mask: capacity - 1,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    #[inline(always)]
    fn offset(&self, cursor: usize) -> usize {
        cursor & self.mask
    }

    #[inline]
    pub fn get(&self, cursor: usize) -> Sample {
        self.data[self.offset(cursor)]
    }

    #[inline]
    pub fn set(&mut self, cursor: usize, value: Sample) {
        let idx = self.offset(cursor);
        self.data[idx] = value;
    }

    #[inline]
    pub fn add(&mut self, cursor: usize, value: Sample) {
        let idx = self.offset(cursor);
        self.data[idx] += value;
    }

    /// Read a slot and clear it so the ring can be reused one lap later
    #[inline]
    pub fn take(&mut self, cursor: usize) -> Sample {
        let idx = self.offset(cursor);
        std::mem::take(&mut self.data[idx])
    }

    /// Copy `out.len()` consecutive samples starting at `start`
    pub fn copy_to(&self, start: usize, out: &mut [Sample]) {
        let first = self.offset(start);
        let head = (self.data.len() - first).min(out.len());
        out[..head].copy_from_slice(&self.data[first..first + head]);
        let rest = out.len() - head;
        if rest > 0 {
            out[head..].copy_from_slice(&self.data[..rest]);
        }
    }

    /// Zero the whole ring
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}
