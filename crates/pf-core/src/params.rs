//! Parameter types for audio processors

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Parameter value (normalized 0.0-1.0)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedValue(f64);

impl NormalizedValue {
    pub const ZERO: Self = Self(0.0);
    pub const ONE: Self = Self(1.0);
    pub const HALF: Self = Self(0.5);

    /// Clamps into [0, 1]; NaN collapses to zero.
    #[inline]
    pub fn new(value: f64) -> Self {
        if value.is_nan() {
            Self::ZERO
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    #[inline]
    pub fn get(self) -> f64 {
        self.0
    }

    /// Map to a range
    #[inline]
    pub fn map(self, min: f64, max: f64) -> f64 {
        min + self.0 * (max - min)
    }

    /// Map logarithmically (for frequency, time, ratios)
    #[inline]
    pub fn map_log(self, min: f64, max: f64) -> f64 {
        let log_min = min.ln();
        let log_max = max.ln();
        (log_min + self.0 * (log_max - log_min)).exp()
    }
}

impl Default for NormalizedValue {
    fn default() -> Self {
        Self::HALF
    }
}

/// Lock-free "latest value" cell.
///
/// Written from the control thread with a plain relaxed store, read from the
/// audio thread with a relaxed load. Only the most recent value ever matters,
/// so there is no queue and no handshake.
#[derive(Debug)]
pub struct ParamCell {
    bits: AtomicU64,
}

impl ParamCell {
    pub fn new(value: f64) -> Self {
        Self {
            bits: AtomicU64::new(value.to_bits()),
        }
    }

    #[inline]
    pub fn get(&self) -> f64 {
        f64::from_bits(self.bits.load(Ordering::Relaxed))
    }

    #[inline]
    pub fn set(&self, value: f64) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }
}

impl Default for ParamCell {
    fn default() -> Self {
        Self::new(0.0)
    }
}

/// Parameter range specification
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ParamRange {
    pub min: f64,
    pub max: f64,
    pub skew: ParamSkew,
}

impl ParamRange {
    pub const fn linear(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            skew: ParamSkew::Linear,
        }
    }

    pub const fn logarithmic(min: f64, max: f64) -> Self {
        Self {
            min,
            max,
            skew: ParamSkew::Logarithmic,
        }
    }

    /// Denormalize a 0-1 value to actual value
    pub fn denormalize(&self, normalized: f64) -> f64 {
        let value = NormalizedValue::new(normalized);
        match self.skew {
            ParamSkew::Linear => value.map(self.min, self.max),
            ParamSkew::Logarithmic => value.map_log(self.min, self.max),
        }
    }

    /// Normalize an actual value to 0-1
    pub fn normalize(&self, value: f64) -> f64 {
        let clamped = value.clamp(self.min, self.max);
        match self.skew {
            ParamSkew::Linear => (clamped - self.min) / (self.max - self.min),
            ParamSkew::Logarithmic => {
                let log_min = self.min.ln();
                let log_max = self.max.ln();
                (clamped.ln() - log_min) / (log_max - log_min)
            }
        }
    }
}

/// Parameter skew type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ParamSkew {
    Linear,
    Logarithmic,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalized_clamps() {
        assert_eq!(NormalizedValue::new(1.5).get(), 1.0);
        assert_eq!(NormalizedValue::new(-0.5).get(), 0.0);
        assert_eq!(NormalizedValue::new(f64::NAN).get(), 0.0);
    }

    #[test]
    fn test_log_range_midpoint() {
        let range = ParamRange::logarithmic(0.25, 4.0);
        assert!((range.denormalize(0.5) - 1.0).abs() < 1e-12);
        assert!((range.denormalize(0.0) - 0.25).abs() < 1e-12);
        assert!((range.denormalize(1.0) - 4.0).abs() < 1e-12);
        assert!((range.normalize(2.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_linear_range_roundtrip() {
        let range = ParamRange::linear(-24.0, 24.0);
        assert!((range.denormalize(0.5)).abs() < 1e-12);
        assert!((range.normalize(12.0) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_param_cell_latest_value_wins() {
        let cell = ParamCell::new(0.25);
        cell.set(0.5);
        cell.set(0.75);
        assert_eq!(cell.get(), 0.75);
    }

    #[test]
    fn test_range_serde() {
        let range = ParamRange::logarithmic(10.0, 500.0);
        let json = serde_json::to_string(&range).unwrap();
        let back: ParamRange = serde_json::from_str(&json).unwrap();
        assert_eq!(back.skew, ParamSkew::Logarithmic);
        assert_eq!(back.max, 500.0);
    }
}
