//! Spectral-flux transient detection
//!
//! Clocked once per analysis hop, not per sample. The follower's "sample
//! rate" is therefore the hop rate.

use crate::numeric::{DENORMAL_THRESHOLD, flush_denormals_f32};

/// Flux level treated as "no transient"
pub const TRANSIENT_FLOOR: f64 = 0.05;

/// Gain from follower output to strength
pub const TRANSIENT_SENSITIVITY: f64 = 2.5;

const FLUX_EPSILON: f64 = 1e-12;

/// Attack/release envelope follower
#[derive(Debug, Clone)]
pub struct EnvelopeFollower {
    attack_coeff: f64,
    release_coeff: f64,
    envelope: f64,
    rate: f64,
}

impl EnvelopeFollower {
    pub fn new(rate: f64) -> Self {
        let mut follower = Self {
            attack_coeff: 0.0,
            release_coeff: 0.0,
            envelope: 0.0,
            rate,
        };
        follower.set_times(1.0, 100.0);
        follower
    }

    /// Set attack and release times in milliseconds
    pub fn set_times(&mut self, attack_ms: f64, release_ms: f64) {
        self.attack_coeff = Self::coeff(attack_ms, self.rate);
        self.release_coeff = Self::coeff(release_ms, self.rate);
    }

    fn coeff(time_ms: f64, rate: f64) -> f64 {
        let samples = time_ms * 0.001 * rate;
        if samples > 0.0 && samples.is_finite() {
            (-1.0 / samples).exp()
        } else {
            0.0
        }
    }

    #[inline(always)]
    pub fn process(&mut self, input: f64) -> f64 {
        let level = input.abs();
        let coeff = if level > self.envelope {
            self.attack_coeff
        } else {
            self.release_coeff
        };
        self.envelope = level + coeff * (self.envelope - level);
        self.envelope
    }

    #[inline]
    pub fn envelope(&self) -> f64 {
        self.envelope
    }

    pub fn flush_denormals(&mut self) {
        if self.envelope.abs() < DENORMAL_THRESHOLD {
            self.envelope = 0.0;
        }
    }

    pub fn reset(&mut self) {
        self.envelope = 0.0;
    }
}

/// Positive spectral flux
///
/// Sum of magnitude increases over the previous frame, normalized by the
/// current frame's total magnitude.
pub fn spectral_flux(current: &[f32], previous: &[f32]) -> f64 {
    let mut rise = 0.0;
    let mut total = 0.0;
    for (&c, &p) in current.iter().zip(previous) {
        let c = c as f64;
        rise += (c - p as f64).max(0.0);
        total += c;
    }
    rise / (total + FLUX_EPSILON)
}

/// Per-channel transient strength in [0, 1]
#[derive(Debug, Clone)]
pub struct TransientDetector {
    follower: EnvelopeFollower,
    previous: Vec<f32>,
    attack_ms: f64,
    release_ms: f64,
    strength: f64,
}

impl TransientDetector {
    /// `hop_rate` is analysis hops per second
    pub fn new(bins: usize, hop_rate: f64) -> Self {
        let follower = EnvelopeFollower::new(hop_rate);
        Self {
            follower,
            previous: vec![0.0; bins],
            attack_ms: 1.0,
            release_ms: 100.0,
            strength: 0.0,
        }
    }

    /// Feed one frame; returns the updated strength
    pub fn detect(&mut self, magnitude: &[f32], attack_ms: f64, release_ms: f64) -> f64 {
        if attack_ms != self.attack_ms || release_ms != self.release_ms {
            self.follower.set_times(attack_ms, release_ms);
            self.attack_ms = attack_ms;
            self.release_ms = release_ms;
        }

        let flux = spectral_flux(magnitude, &self.previous);
        self.previous.copy_from_slice(magnitude);

        let envelope = self.follower.process(flux);
        self.strength = ((envelope - TRANSIENT_FLOOR) * TRANSIENT_SENSITIVITY).clamp(0.0, 1.0);
        self.strength
    }

    #[inline]
    pub fn strength(&self) -> f64 {
        self.strength
    }

    pub fn flush_denormals(&mut self) {
        flush_denormals_f32(&mut self.previous);
        self.follower.flush_denormals();
    }

    pub fn reset(&mut self) {
        self.follower.reset();
        self.previous.fill(0.0);
        self.strength = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_follower_attack_release() {
        let mut follower = EnvelopeFollower::new(1000.0);
        follower.set_times(1.0, 100.0);

        // One time constant of attack reaches ~63%
        let level = follower.process(1.0);
        assert!((level - (1.0 - (-1.0_f64).exp())).abs() < 1e-12);

        for _ in 0..20 {
            follower.process(1.0);
        }
        assert!(follower.envelope() > 0.99);

        let released = follower.process(0.0);
        assert!(released > 0.98);
    }

    #[test]
    fn test_flux_of_steady_frame_is_zero() {
        let frame = [0.5_f32, 1.0, 0.25];
        assert_eq!(spectral_flux(&frame, &frame), 0.0);
    }

    #[test]
    fn test_flux_of_onset_is_one() {
        let frame = [0.5_f32, 1.0, 0.25];
        let silence = [0.0_f32; 3];
        assert!((spectral_flux(&frame, &silence) - 1.0).abs() < 1e-9);
        assert_eq!(spectral_flux(&silence, &frame), 0.0);
    }

    #[test]
    fn test_detector_fires_on_onset_and_decays() {
        let mut detector = TransientDetector::new(4, 86.0);
        let silence = [0.0_f32; 4];
        let tone = [0.0_f32, 1.0, 0.2, 0.0];

        assert_eq!(detector.detect(&silence, 0.1, 10.0), 0.0);
        let onset = detector.detect(&tone, 0.1, 10.0);
        assert!(onset > 0.9, "onset strength {onset}");

        let mut strength = onset;
        for _ in 0..20 {
            strength = detector.detect(&tone, 0.1, 10.0);
        }
        assert!(strength < 1e-6);
    }

    #[test]
    fn test_reset_clears_history() {
        let mut detector = TransientDetector::new(2, 100.0);
        detector.detect(&[1.0, 1.0], 1.0, 50.0);
        detector.reset();
        assert_eq!(detector.strength(), 0.0);
        // After reset the same frame is an onset again
        assert!(detector.detect(&[1.0, 1.0], 0.1, 10.0) > 0.0);
    }
}
