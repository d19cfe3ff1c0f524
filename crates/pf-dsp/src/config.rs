//! Engine configuration and derived STFT layout

use pf_core::{PfError, PfResult};
use serde::{Deserialize, Serialize};

use crate::controls::ParamIndex;
use crate::smoothing::SmoothingType;

pub const MIN_TRANSFORM_SIZE: usize = 256;
pub const MAX_TRANSFORM_SIZE: usize = 32768;
pub const MIN_OVERLAP: usize = 2;
pub const MAX_OVERLAP: usize = 16;
pub const MIN_SAMPLE_RATE: f64 = 8_000.0;
pub const MAX_SAMPLE_RATE: f64 = 768_000.0;
pub const MAX_CHANNELS: usize = 32;

/// Ring capacity as a multiple of the transform size
pub const RING_FACTOR: usize = 8;

/// Transform size selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransformSize {
    /// Pick by sample rate so frequency resolution stays roughly constant
    #[default]
    Auto,
    Fixed(usize),
}

impl TransformSize {
    pub fn resolve(self, sample_rate: f64) -> PfResult<usize> {
        match self {
            TransformSize::Auto => Ok(if sample_rate <= 48_000.0 {
                2048
            } else if sample_rate <= 96_000.0 {
                4096
            } else {
                8192
            }),
            TransformSize::Fixed(size) => {
                if size.is_power_of_two()
                    && (MIN_TRANSFORM_SIZE..=MAX_TRANSFORM_SIZE).contains(&size)
                {
                    Ok(size)
                } else {
                    Err(PfError::InvalidTransformSize(size))
                }
            }
        }
    }
}

/// Smoothing times in milliseconds
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmoothingTimes {
    pub stretch_ms: f64,
    pub pitch_ms: f64,
    pub mix_ms: f64,
    /// Smear, gate, transient, phase reset, attack, release
    pub spectral_ms: f64,
}

impl Default for SmoothingTimes {
    fn default() -> Self {
        Self {
            stretch_ms: 5.0,
            pitch_ms: 5.0,
            mix_ms: 2.0,
            spectral_ms: 20.0,
        }
    }
}

impl SmoothingTimes {
    /// Smoothing time and curve for one control
    pub fn for_param(&self, param: ParamIndex) -> (f64, SmoothingType) {
        match param {
            ParamIndex::TimeStretch => (self.stretch_ms, SmoothingType::Linear),
            ParamIndex::PitchShift => (self.pitch_ms, SmoothingType::Linear),
            ParamIndex::Mix => (self.mix_ms, SmoothingType::Linear),
            ParamIndex::Freeze => (0.0, SmoothingType::None),
            ParamIndex::SpectralSmear
            | ParamIndex::TransientPreserve
            | ParamIndex::PhaseReset
            | ParamIndex::SpectralGate
            | ParamIndex::TransientAttack
            | ParamIndex::TransientRelease => (self.spectral_ms, SmoothingType::Exponential),
        }
    }
}

/// Everything the engine needs before the first process call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub sample_rate: f64,
    pub max_block_size: usize,
    pub channels: usize,
    pub transform_size: TransformSize,
    /// Frames per transform length (4 = 75% overlap)
    pub overlap: usize,
    pub freeze_crossfade_ms: f64,
    pub smoothing: SmoothingTimes,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100.0,
            max_block_size: 512,
            channels: 2,
            transform_size: TransformSize::Auto,
            overlap: 4,
            freeze_crossfade_ms: 30.0,
            smoothing: SmoothingTimes::default(),
        }
    }
}

impl EngineConfig {
    pub fn new(sample_rate: f64) -> Self {
        Self {
            sample_rate,
            ..Default::default()
        }
    }

    pub fn with_channels(mut self, channels: usize) -> Self {
        self.channels = channels;
        self
    }

    pub fn with_max_block_size(mut self, max_block_size: usize) -> Self {
        self.max_block_size = max_block_size;
        self
    }

    pub fn with_transform_size(mut self, transform_size: TransformSize) -> Self {
        self.transform_size = transform_size;
        self
    }

    pub fn with_overlap(mut self, overlap: usize) -> Self {
        self.overlap = overlap;
        self
    }

    pub fn with_freeze_crossfade_ms(mut self, ms: f64) -> Self {
        self.freeze_crossfade_ms = ms;
        self
    }

    /// Check every field and derive the STFT layout
    pub fn validate(&self) -> PfResult<StftLayout> {
        if !self.sample_rate.is_finite()
            || !(MIN_SAMPLE_RATE..=MAX_SAMPLE_RATE).contains(&self.sample_rate)
        {
            return Err(PfError::InvalidSampleRate(self.sample_rate));
        }
        if self.max_block_size == 0 {
            return Err(PfError::InvalidBlockSize(self.max_block_size));
        }
        if !(1..=MAX_CHANNELS).contains(&self.channels) {
            return Err(PfError::InvalidChannelCount(self.channels));
        }

        let transform_size = self.transform_size.resolve(self.sample_rate)?;

        if !self.overlap.is_power_of_two() || !(MIN_OVERLAP..=MAX_OVERLAP).contains(&self.overlap)
        {
            return Err(PfError::InvalidOverlap {
                transform_size,
                overlap: self.overlap,
            });
        }

        let crossfade_ms = if self.freeze_crossfade_ms.is_finite() {
            self.freeze_crossfade_ms.max(0.0)
        } else {
            0.0
        };

        Ok(StftLayout {
            transform_size,
            overlap: self.overlap,
            hop: transform_size / self.overlap,
            bins: transform_size / 2 + 1,
            latency: transform_size,
            ring_capacity: transform_size * RING_FACTOR,
            freeze_crossfade_samples: crossfade_ms * 0.001 * self.sample_rate,
        })
    }
}

/// Sizes derived from a validated config
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StftLayout {
    pub transform_size: usize,
    pub overlap: usize,
    /// Analysis hop
    pub hop: usize,
    pub bins: usize,
    /// Fixed processing latency in samples
    pub latency: usize,
    pub ring_capacity: usize,
    pub freeze_crossfade_samples: f64,
}
