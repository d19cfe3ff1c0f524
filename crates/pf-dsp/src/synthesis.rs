//! Phase-locked resynthesis
//!
//! Only the dominant bin's synthesis phase is advanced; every other bin keeps
//! its analysis-time phase offset to that peak. Harmonically related bins
//! stay coherent, which removes the "phasiness" of per-bin independent
//! advance.

use rustfft::num_complex::Complex;

use crate::phase::princarg;
use crate::spectral::SpectralFrame;

/// Index of the largest magnitude (first one on ties)
#[inline]
pub fn find_peak(magnitude: &[f32]) -> usize {
    let mut peak = 0;
    let mut best = f32::NEG_INFINITY;
    for (k, &m) in magnitude.iter().enumerate() {
        if m > best {
            best = m;
            peak = k;
        }
    }
    peak
}

/// Per-hop inputs to the synthesizer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SynthesisParams {
    /// Synthesis hop in samples
    pub hop: usize,
    pub pitch_ratio: f64,
    /// Fraction of the wrapped peak phase error removed this hop (0 = none)
    pub phase_reset: f64,
}

impl Default for SynthesisParams {
    fn default() -> Self {
        Self {
            hop: 0,
            pitch_ratio: 1.0,
            phase_reset: 0.0,
        }
    }
}

/// Synthesis phase accumulator for one channel
#[derive(Debug, Clone)]
pub struct PhaseLockedSynthesizer {
    synth_phase: Vec<f64>,
    /// Magnitudes of the last synthesized frame
    magnitude: Vec<f32>,
    peak: usize,
    /// Output-rate phase advance of the peak, radians per sample
    peak_rate: f64,
}

impl PhaseLockedSynthesizer {
    pub fn new(bins: usize) -> Self {
        Self {
            synth_phase: vec![0.0; bins],
            magnitude: vec![0.0; bins],
            peak: 0,
            peak_rate: 0.0,
        }
    }

    /// Build the synthesis spectrum for one hop into `out`
    pub fn synthesize(
        &mut self,
        frame: &SpectralFrame<'_>,
        params: SynthesisParams,
        out: &mut [Complex<f64>],
    ) {
        let peak = find_peak(frame.magnitude);
        let reference = frame.phase[peak];

        let mut advanced = self.synth_phase[peak]
            + frame.inst_freq[peak] * params.hop as f64 * params.pitch_ratio;

        if params.phase_reset > 0.0 {
            let pull = params.phase_reset.min(1.0);
            advanced += pull * princarg(reference - advanced);
        }

        for (k, bin) in out.iter_mut().enumerate().take(self.synth_phase.len()) {
            let phase = advanced + (frame.phase[k] - reference);
            let magnitude = frame.magnitude[k];

            self.synth_phase[k] = phase;
            self.magnitude[k] = magnitude;
            *bin = Complex::from_polar(magnitude as f64, phase);
        }

        self.peak = peak;
        self.peak_rate = frame.inst_freq[peak] * params.pitch_ratio;
    }

    /// Last synthesized frame as it would sound `offset` output samples later.
    ///
    /// Every bin turns by the peak's advance over `offset`, so the locked
    /// offsets are kept. Stored phases are left alone.
    pub fn render_shifted(&self, offset: usize, out: &mut [Complex<f64>]) {
        let turn = self.peak_rate * offset as f64;
        for ((bin, &phase), &magnitude) in out
            .iter_mut()
            .zip(&self.synth_phase)
            .zip(&self.magnitude)
        {
            *bin = Complex::from_polar(magnitude as f64, phase + turn);
        }
    }

    /// Move the synthesis timeline back by `samples` (forward when negative)
    pub fn rewind(&mut self, samples: isize) {
        let turn = self.peak_rate * samples as f64;
        for phase in self.synth_phase.iter_mut() {
            *phase -= turn;
        }
    }

    #[inline]
    pub fn synth_phase(&self) -> &[f64] {
        &self.synth_phase
    }

    #[inline]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    #[inline]
    pub fn peak(&self) -> usize {
        self.peak
    }

    #[inline]
    pub fn peak_rate(&self) -> f64 {
        self.peak_rate
    }

    pub fn reset(&mut self) {
        self.synth_phase.fill(0.0);
        self.magnitude.fill(0.0);
        self.peak = 0;
        self.peak_rate = 0.0;
    }
}
