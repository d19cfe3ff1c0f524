//! Sample types and audio buffer definitions

/// Type alias for audio samples (always f64 for maximum precision)
pub type Sample = f64;

/// Planar multichannel buffer
///
/// Channel-major and contiguous: channel `c` occupies
/// `data[c * frames..(c + 1) * frames]`. This is the layout
/// `SpectralEngine::process` consumes in place.
#[derive(Debug, Clone)]
pub struct PlanarBuffer {
    data: Vec<Sample>,
    channels: usize,
    frames: usize,
}

impl PlanarBuffer {
    pub fn new(channels: usize, frames: usize) -> Self {
        Self {
            data: vec![0.0; channels * frames],
            channels,
            frames,
        }
    }

    /// Build from interleaved samples (`[l0, r0, l1, r1, ...]`)
    pub fn from_interleaved(interleaved: &[Sample], channels: usize) -> Self {
        let channels = channels.max(1);
        let frames = interleaved.len() / channels;
        let mut buffer = Self::new(channels, frames);
        for (frame, chunk) in interleaved.chunks_exact(channels).enumerate() {
            for (ch, &sample) in chunk.iter().enumerate() {
                buffer.data[ch * frames + frame] = sample;
            }
        }
        buffer
    }

    /// Write the buffer back out interleaved
    pub fn write_interleaved(&self, out: &mut Vec<Sample>) {
        out.clear();
        out.reserve(self.data.len());
        for frame in 0..self.frames {
            for ch in 0..self.channels {
                out.push(self.data[ch * self.frames + frame]);
            }
        }
    }

    #[inline]
    pub fn channels(&self) -> usize {
        self.channels
    }

    #[inline]
    pub fn frames(&self) -> usize {
        self.frames
    }

    #[inline]
    pub fn channel(&self, index: usize) -> &[Sample] {
        &self.data[index * self.frames..(index + 1) * self.frames]
    }

    #[inline]
    pub fn channel_mut(&mut self, index: usize) -> &mut [Sample] {
        &mut self.data[index * self.frames..(index + 1) * self.frames]
    }

    #[inline]
    pub fn as_slice(&self) -> &[Sample] {
        &self.data
    }
}
