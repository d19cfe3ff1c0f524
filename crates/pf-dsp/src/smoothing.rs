//! Lock-free parameter smoothing
//!
//! The target lives in a shared `ParamCell` written by the control thread.
//! The audio thread polls it with a relaxed load and ramps toward it; there
//! is no handshake and no dirty flag to race on.

use std::sync::Arc;

use pf_core::{ParamCell, Sample};

/// Differences below this snap to the target
const SNAP_EPSILON: f64 = 1e-12;

// ============ Smoothing Algorithms ============

/// Smoothing algorithm type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SmoothingType {
    /// Linear ramp (constant rate)
    #[default]
    Linear,
    /// Exponential decay (RC filter style)
    Exponential,
    /// No smoothing (instant change)
    None,
}

// ============ Smoothed Parameter ============

#[derive(Debug)]
pub struct SmoothedParam {
    source: Arc<ParamCell>,
    current: f64,
    coeff: f64,
    smoothing_type: SmoothingType,
    smoothing_samples: f64,
    linear_step: f64,
    linear_remaining: usize,
    /// Target the current linear ramp heads for
    linear_target: f64,
}

impl SmoothedParam {
    pub fn new(
        source: Arc<ParamCell>,
        smoothing_time_ms: f64,
        sample_rate: f64,
        smoothing_type: SmoothingType,
    ) -> Self {
        let smoothing_samples = if smoothing_time_ms.is_finite() && smoothing_time_ms > 0.0 {
            smoothing_time_ms * 0.001 * sample_rate
        } else {
            0.0
        };
        let initial = source.get();

        Self {
            source,
            current: initial,
            coeff: Self::calculate_coeff(smoothing_samples),
            smoothing_type,
            smoothing_samples,
            linear_step: 0.0,
            linear_remaining: 0,
            linear_target: initial,
        }
    }

    /// Exponential coefficient: ~63% of the way in `samples`
    fn calculate_coeff(samples: f64) -> f64 {
        if samples <= 0.0 {
            1.0
        } else {
            1.0 - (-1.0 / samples).exp()
        }
    }

    #[inline]
    pub fn target(&self) -> f64 {
        self.source.get()
    }

    #[inline]
    pub fn current(&self) -> f64 {
        self.current
    }

    #[inline]
    pub fn smoothing_type(&self) -> SmoothingType {
        self.smoothing_type
    }

    #[inline]
    pub fn is_smoothing(&self) -> bool {
        match self.smoothing_type {
            SmoothingType::None => false,
            SmoothingType::Linear => self.linear_remaining > 0,
            SmoothingType::Exponential => self.current != self.target(),
        }
    }

    /// Process one sample of smoothing
    #[inline]
    pub fn next(&mut self) -> f64 {
        let target = self.target();

        match self.smoothing_type {
            SmoothingType::None => {
                self.current = target;
            }
            SmoothingType::Exponential => {
                self.current += self.coeff * (target - self.current);
                if (target - self.current).abs() < SNAP_EPSILON {
                    self.current = target;
                }
            }
            SmoothingType::Linear => {
                if target != self.linear_target {
                    self.linear_target = target;
                    self.linear_remaining = self.smoothing_samples.round() as usize;
                    if self.linear_remaining > 0 {
                        self.linear_step = (target - self.current) / self.linear_remaining as f64;
                    }
                }

                if self.linear_remaining > 0 {
                    self.linear_remaining -= 1;
                    self.current = if self.linear_remaining == 0 {
                        target
                    } else {
                        self.current + self.linear_step
                    };
                } else {
                    self.current = target;
                }
            }
        }

        self.current
    }

    /// Fill buffer with smoothed values
    pub fn fill_buffer(&mut self, buffer: &mut [Sample]) {
        for sample in buffer.iter_mut() {
            *sample = self.next();
        }
    }

    /// Jump to the target instantly
    pub fn reset(&mut self) {
        let target = self.target();
        self.current = target;
        self.linear_target = target;
        self.linear_remaining = 0;
        self.linear_step = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn param(initial: f64, ms: f64, kind: SmoothingType) -> (Arc<ParamCell>, SmoothedParam) {
        let cell = Arc::new(ParamCell::new(initial));
        let smoothed = SmoothedParam::new(Arc::clone(&cell), ms, 1000.0, kind);
        (cell, smoothed)
    }

    #[test]
    fn test_starts_at_target() {
        let (_, mut p) = param(0.3, 10.0, SmoothingType::Exponential);
        assert_eq!(p.current(), 0.3);
        assert_eq!(p.next(), 0.3);
        assert!(!p.is_smoothing());
    }

    #[test]
    fn test_linear_ramp_reaches_target_exactly() {
        let (cell, mut p) = param(0.0, 10.0, SmoothingType::Linear);
        cell.set(1.0);

        let mut buffer = [0.0; 10];
        p.fill_buffer(&mut buffer);
        assert!((buffer[0] - 0.1).abs() < 1e-12);
        assert!((buffer[4] - 0.5).abs() < 1e-12);
        assert_eq!(buffer[9], 1.0);
        assert!(!p.is_smoothing());
        assert_eq!(p.next(), 1.0);
    }

    #[test]
    fn test_linear_retargets_mid_ramp() {
        let (cell, mut p) = param(0.0, 4.0, SmoothingType::Linear);
        cell.set(1.0);
        p.next();
        p.next();
        cell.set(0.0);
        let v = p.next();
        // From 0.5 down to 0 over four samples
        assert!((v - 0.375).abs() < 1e-12);
    }

    #[test]
    fn test_exponential_converges_and_snaps() {
        let (cell, mut p) = param(0.0, 5.0, SmoothingType::Exponential);
        cell.set(1.0);
        let first = p.next();
        assert!((first - (1.0 - (-0.2_f64).exp())).abs() < 1e-12);
        for _ in 0..1000 {
            p.next();
        }
        assert_eq!(p.current(), 1.0);
    }

    #[test]
    fn test_none_follows_immediately() {
        let (cell, mut p) = param(0.0, 50.0, SmoothingType::None);
        cell.set(0.7);
        assert_eq!(p.next(), 0.7);
    }

    #[test]
    fn test_reset_jumps_to_target() {
        let (cell, mut p) = param(0.0, 100.0, SmoothingType::Exponential);
        cell.set(0.9);
        p.next();
        p.reset();
        assert_eq!(p.current(), 0.9);
        assert_eq!(p.next(), 0.9);
    }

    #[test]
    fn test_invalid_time_means_instant() {
        let (cell, mut p) = param(0.0, f64::NAN, SmoothingType::Exponential);
        cell.set(0.4);
        assert_eq!(p.next(), 0.4);
    }
}
