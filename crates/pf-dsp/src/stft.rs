//! STFT plumbing: window and real transform pair
//!
//! One `SpectralTransform` per channel. All buffers are sized at construction;
//! `forward` and `inverse` run with pre-allocated scratch and never allocate.

use std::f64::consts::PI;
use std::sync::Arc;

use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex;

/// Periodic Hann window (sums to a constant under 4x overlap)
pub fn hann_window(size: usize) -> Vec<f64> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f64 / size as f64).cos()))
        .collect()
}

/// Forward/inverse real FFT with owned buffers
pub struct SpectralTransform {
    size: usize,
    forward: Arc<dyn RealToComplex<f64>>,
    inverse: Arc<dyn ComplexToReal<f64>>,
    /// Windowed analysis frame (consumed by `forward`)
    frame: Vec<f64>,
    /// Half spectrum, `size / 2 + 1` bins
    spectrum: Vec<Complex<f64>>,
    /// Time-domain grain produced by `inverse`
    grain: Vec<f64>,
    scratch_forward: Vec<Complex<f64>>,
    scratch_inverse: Vec<Complex<f64>>,
}

impl SpectralTransform {
    pub fn new(planner: &mut RealFftPlanner<f64>, size: usize) -> Self {
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        let scratch_forward = forward.make_scratch_vec();
        let scratch_inverse = inverse.make_scratch_vec();

        Self {
            size,
            forward,
            inverse,
            frame: vec![0.0; size],
            spectrum: vec![Complex::new(0.0, 0.0); size / 2 + 1],
            grain: vec![0.0; size],
            scratch_forward,
            scratch_inverse,
        }
    }

    /// Buffer to fill with the windowed analysis frame before `forward`
    #[inline]
    pub fn frame_mut(&mut self) -> &mut [f64] {
        &mut self.frame
    }

    #[inline]
    pub fn spectrum(&self) -> &[Complex<f64>] {
        &self.spectrum
    }

    #[inline]
    pub fn spectrum_mut(&mut self) -> &mut [Complex<f64>] {
        &mut self.spectrum
    }

    #[inline]
    pub fn grain(&self) -> &[f64] {
        &self.grain
    }

    /// Transform the frame into the half spectrum. The frame buffer is
    /// clobbered (realfft uses it as scratch).
    pub fn forward(&mut self) {
        if self
            .forward
            .process_with_scratch(&mut self.frame, &mut self.spectrum, &mut self.scratch_forward)
            .is_err()
        {
            self.spectrum.fill(Complex::new(0.0, 0.0));
        }
    }

    /// Transform the half spectrum back into a real grain, scaled by `1/N`.
    ///
    /// Negative frequencies are implied by conjugate symmetry; the DC and
    /// Nyquist bins must be real, so their imaginary parts are dropped first.
    pub fn inverse(&mut self) {
        let last = self.spectrum.len() - 1;
        self.spectrum[0].im = 0.0;
        self.spectrum[last].im = 0.0;

        if self
            .inverse
            .process_with_scratch(&mut self.spectrum, &mut self.grain, &mut self.scratch_inverse)
            .is_err()
        {
            self.grain.fill(0.0);
            return;
        }

        let scale = 1.0 / self.size as f64;
        for sample in self.grain.iter_mut() {
            *sample *= scale;
        }
    }
}
