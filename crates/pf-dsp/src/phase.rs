//! Phase-vocoder analysis
//!
//! Turns consecutive spectra into per-bin magnitude, wrapped phase deviation
//! and instantaneous frequency (radians per sample).

use std::f64::consts::{PI, TAU};

use rustfft::num_complex::Complex;

use crate::numeric::flush_denormals_f32;

/// Wrap a phase into the principal interval (-π, π]
#[inline(always)]
pub fn princarg(phase: f64) -> f64 {
    let wrapped = phase - TAU * (phase / TAU).round();
    if wrapped <= -PI { wrapped + TAU } else { wrapped }
}

/// Per-bin analysis state for one channel
#[derive(Debug, Clone)]
pub struct PhaseAnalyzer {
    hop: usize,
    /// Expected phase advance per sample for each bin (2πk/N)
    omega: Vec<f64>,
    magnitude: Vec<f32>,
    /// Analysis phase of the most recent frame
    phase: Vec<f64>,
    inst_freq: Vec<f64>,
}

impl PhaseAnalyzer {
    pub fn new(transform_size: usize, hop: usize) -> Self {
        let bins = transform_size / 2 + 1;
        let omega = (0..bins)
            .map(|k| TAU * k as f64 / transform_size as f64)
            .collect();

        Self {
            hop,
            omega,
            magnitude: vec![0.0; bins],
            phase: vec![0.0; bins],
            inst_freq: vec![0.0; bins],
        }
    }

    /// Analyze one spectrum against the previous frame
    pub fn analyze(&mut self, spectrum: &[Complex<f64>]) {
        let hop = self.hop as f64;

        for (k, bin) in spectrum.iter().enumerate().take(self.omega.len()) {
            let (magnitude, phase) = bin.to_polar();
            let expected = self.omega[k] * hop;
            let delta = princarg(phase - self.phase[k] - expected);

            self.magnitude[k] = magnitude as f32;
            self.phase[k] = phase;
            self.inst_freq[k] = self.omega[k] + delta / hop;
        }
    }

    #[inline]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    #[inline]
    pub fn phase(&self) -> &[f64] {
        &self.phase
    }

    #[inline]
    pub fn inst_freq(&self) -> &[f64] {
        &self.inst_freq
    }

    pub fn flush_denormals(&mut self) {
        flush_denormals_f32(&mut self.magnitude);
    }

    pub fn reset(&mut self) {
        self.magnitude.fill(0.0);
        self.phase.fill(0.0);
        self.inst_freq.fill(0.0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_princarg_range() {
        for i in -200..=200 {
            let x = i as f64 * 0.173;
            let w = princarg(x);
            assert!(w > -PI && w <= PI, "{x} -> {w}");
            let turns = (x - w) / TAU;
            assert!((turns - turns.round()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_princarg_boundaries() {
        assert!((princarg(PI) - PI).abs() < 1e-12);
        assert!((princarg(-PI) - PI).abs() < 1e-12);
        assert!((princarg(3.0 * PI) - PI).abs() < 1e-9);
        assert_eq!(princarg(0.0), 0.0);
    }

    #[test]
    fn test_inst_freq_recovers_off_bin_tone() {
        let size = 1024;
        let hop = 256;
        let mut analyzer = PhaseAnalyzer::new(size, hop);

        // Tone between bins 20 and 21
        let freq = TAU * 20.3 / size as f64;
        let amplitude = 0.8;
        let bin = |n: usize| Complex::from_polar(amplitude, freq * n as f64);

        let mut spectrum = vec![Complex::new(0.0, 0.0); size / 2 + 1];
        spectrum[20] = bin(0);
        analyzer.analyze(&spectrum);
        spectrum[20] = bin(hop);
        analyzer.analyze(&spectrum);

        assert!((analyzer.inst_freq()[20] - freq).abs() < 1e-12);
        assert!((analyzer.magnitude()[20] - amplitude as f32).abs() < 1e-6);
    }

    #[test]
    fn test_silent_bins_report_bin_centre() {
        let mut analyzer = PhaseAnalyzer::new(512, 128);
        let spectrum = vec![Complex::new(0.0, 0.0); 257];
        analyzer.analyze(&spectrum);
        analyzer.analyze(&spectrum);
        // A zero bin has zero phase, so the deviation cancels the expected advance
        // modulo 2π; the estimate stays within half a bin of the centre.
        let bin_width = TAU / 512.0;
        for k in 0..257 {
            let centre = TAU * k as f64 / 512.0;
            assert!((analyzer.inst_freq()[k] - centre).abs() <= bin_width * 2.0 + 1e-12);
        }
    }
}
