//! Control surface and per-block parameter lanes
//!
//! The control thread writes normalized [0, 1] values into a `ControlSurface`.
//! Once per processed chunk the engine's `ParameterBank` smooths every control
//! into a lane of per-sample values, which all channels then read, so no
//! channel ever sees a different value for the same sample index.

use std::sync::Arc;

use pf_core::{NormalizedValue, ParamCell, ParamRange, PfError, PfResult, Sample};
use serde::{Deserialize, Serialize};

use crate::config::SmoothingTimes;
use crate::smoothing::SmoothedParam;

pub const STRETCH_RANGE: ParamRange = ParamRange::logarithmic(0.25, 4.0);
pub const PITCH_RANGE: ParamRange = ParamRange::linear(-24.0, 24.0);
pub const ATTACK_RANGE: ParamRange = ParamRange::logarithmic(0.1, 10.0);
pub const RELEASE_RANGE: ParamRange = ParamRange::logarithmic(10.0, 500.0);
pub const PERCENT_RANGE: ParamRange = ParamRange::linear(0.0, 100.0);
pub const SWITCH_RANGE: ParamRange = ParamRange::linear(0.0, 1.0);

/// Normalized threshold above which freeze is engaged
pub const FREEZE_THRESHOLD: f64 = 0.5;

// ============ Parameter Table ============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamIndex {
    TimeStretch = 0,
    PitchShift = 1,
    SpectralSmear = 2,
    TransientPreserve = 3,
    PhaseReset = 4,
    SpectralGate = 5,
    Mix = 6,
    Freeze = 7,
    TransientAttack = 8,
    TransientRelease = 9,
}

impl ParamIndex {
    pub const COUNT: usize = 10;

    pub const ALL: [ParamIndex; Self::COUNT] = [
        ParamIndex::TimeStretch,
        ParamIndex::PitchShift,
        ParamIndex::SpectralSmear,
        ParamIndex::TransientPreserve,
        ParamIndex::PhaseReset,
        ParamIndex::SpectralGate,
        ParamIndex::Mix,
        ParamIndex::Freeze,
        ParamIndex::TransientAttack,
        ParamIndex::TransientRelease,
    ];

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            ParamIndex::TimeStretch => "Time Stretch",
            ParamIndex::PitchShift => "Pitch Shift",
            ParamIndex::SpectralSmear => "Spectral Smear",
            ParamIndex::TransientPreserve => "Transient Preserve",
            ParamIndex::PhaseReset => "Phase Reset",
            ParamIndex::SpectralGate => "Spectral Gate",
            ParamIndex::Mix => "Mix",
            ParamIndex::Freeze => "Freeze",
            ParamIndex::TransientAttack => "Transient Attack",
            ParamIndex::TransientRelease => "Transient Release",
        }
    }

    /// Display range of the mapped value
    pub fn range(self) -> ParamRange {
        match self {
            ParamIndex::TimeStretch => STRETCH_RANGE,
            ParamIndex::PitchShift => PITCH_RANGE,
            ParamIndex::Freeze => SWITCH_RANGE,
            ParamIndex::TransientAttack => ATTACK_RANGE,
            ParamIndex::TransientRelease => RELEASE_RANGE,
            ParamIndex::SpectralSmear
            | ParamIndex::TransientPreserve
            | ParamIndex::PhaseReset
            | ParamIndex::SpectralGate
            | ParamIndex::Mix => PERCENT_RANGE,
        }
    }

    /// Normalized default: neutral processing, 1 ms attack, 100 ms release
    pub fn default_value(self) -> f64 {
        match self {
            ParamIndex::TimeStretch | ParamIndex::PitchShift => 0.5,
            ParamIndex::Mix => 1.0,
            ParamIndex::TransientAttack => ATTACK_RANGE.normalize(1.0),
            ParamIndex::TransientRelease => RELEASE_RANGE.normalize(100.0),
            ParamIndex::SpectralSmear
            | ParamIndex::TransientPreserve
            | ParamIndex::PhaseReset
            | ParamIndex::SpectralGate
            | ParamIndex::Freeze => 0.0,
        }
    }

    /// Normalized value to display units
    pub fn denormalize(self, normalized: f64) -> f64 {
        self.range().denormalize(normalized)
    }
}

// ============ Mappings ============

/// Time-stretch ratio, 0.25x to 4x
#[inline]
pub fn stretch_ratio(normalized: f64) -> f64 {
    STRETCH_RANGE.denormalize(normalized)
}

/// Pitch shift in semitones, -24 to +24
#[inline]
pub fn pitch_semitones(normalized: f64) -> f64 {
    PITCH_RANGE.denormalize(normalized)
}

/// Frequency ratio for a semitone offset
#[inline]
pub fn semitones_to_ratio(semitones: f64) -> f64 {
    2.0_f64.powf(semitones / 12.0)
}

#[inline]
pub fn pitch_ratio(normalized: f64) -> f64 {
    semitones_to_ratio(pitch_semitones(normalized))
}

#[inline]
pub fn attack_ms(normalized: f64) -> f64 {
    ATTACK_RANGE.denormalize(normalized)
}

#[inline]
pub fn release_ms(normalized: f64) -> f64 {
    RELEASE_RANGE.denormalize(normalized)
}

#[inline]
pub fn freeze_engaged(normalized: f64) -> bool {
    normalized >= FREEZE_THRESHOLD
}

// ============ Control Surface ============

/// Shared handle to the ten control targets
#[derive(Debug, Clone)]
pub struct ControlSurface {
    cells: [Arc<ParamCell>; ParamIndex::COUNT],
}

impl ControlSurface {
    pub fn new() -> Self {
        Self {
            cells: ParamIndex::ALL.map(|p| Arc::new(ParamCell::new(p.default_value()))),
        }
    }

    /// Set by raw index (host parameter numbering)
    pub fn set(&self, index: usize, value: f64) -> PfResult<()> {
        match ParamIndex::from_index(index) {
            Some(param) => {
                self.set_param(param, value);
                Ok(())
            }
            None => {
                log::warn!("Ignoring write to unknown parameter index {index}");
                Err(PfError::UnknownParameter(index))
            }
        }
    }

    /// Store a normalized value; clamps to [0, 1], NaN becomes 0
    #[inline]
    pub fn set_param(&self, param: ParamIndex, value: f64) {
        self.cells[param.index()].set(NormalizedValue::new(value).get());
    }

    #[inline]
    pub fn get(&self, param: ParamIndex) -> f64 {
        self.cells[param.index()].get()
    }

    /// Current targets in index order
    pub fn snapshot(&self) -> [f64; ParamIndex::COUNT] {
        ParamIndex::ALL.map(|p| self.get(p))
    }

    pub fn apply(&self, values: &[f64; ParamIndex::COUNT]) {
        for (param, &value) in ParamIndex::ALL.iter().zip(values) {
            self.set_param(*param, value);
        }
    }

    pub fn reset_to_defaults(&self) {
        for param in ParamIndex::ALL {
            self.set_param(param, param.default_value());
        }
    }

    pub(crate) fn cell(&self, param: ParamIndex) -> Arc<ParamCell> {
        Arc::clone(&self.cells[param.index()])
    }
}

impl Default for ControlSurface {
    fn default() -> Self {
        Self::new()
    }
}

// ============ Hop Controls ============

/// Mapped control values sampled where a hop fires
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HopControls {
    pub stretch: f64,
    pub pitch_ratio: f64,
    pub smear: f64,
    pub transient_preserve: f64,
    pub phase_reset: f64,
    pub gate: f64,
    pub freeze: bool,
    pub attack_ms: f64,
    pub release_ms: f64,
}

impl HopControls {
    /// Map a set of normalized values
    pub fn from_normalized(values: &[f64; ParamIndex::COUNT]) -> Self {
        let v = |p: ParamIndex| values[p.index()];
        Self {
            stretch: stretch_ratio(v(ParamIndex::TimeStretch)),
            pitch_ratio: pitch_ratio(v(ParamIndex::PitchShift)),
            smear: v(ParamIndex::SpectralSmear),
            transient_preserve: v(ParamIndex::TransientPreserve),
            phase_reset: v(ParamIndex::PhaseReset),
            gate: v(ParamIndex::SpectralGate),
            freeze: freeze_engaged(v(ParamIndex::Freeze)),
            attack_ms: attack_ms(v(ParamIndex::TransientAttack)),
            release_ms: release_ms(v(ParamIndex::TransientRelease)),
        }
    }

    /// Synthesis hop for a given analysis hop (never zero)
    #[inline]
    pub fn synthesis_hop(&self, analysis_hop: usize) -> usize {
        ((analysis_hop as f64 * self.stretch).round() as usize).max(1)
    }
}

impl Default for HopControls {
    fn default() -> Self {
        Self::from_normalized(&ParamIndex::ALL.map(|p| p.default_value()))
    }
}

// ============ Parameter Bank ============

/// Smoothed per-sample lanes for every control, shared by all channels
#[derive(Debug)]
pub struct ParameterBank {
    params: Vec<SmoothedParam>,
    /// `COUNT` lanes of `max_block_size` samples, lane-major
    lanes: Vec<Sample>,
    max_block_size: usize,
    block_len: usize,
}

impl ParameterBank {
    pub fn new(
        controls: &ControlSurface,
        sample_rate: f64,
        max_block_size: usize,
        times: &SmoothingTimes,
    ) -> Self {
        let params = ParamIndex::ALL
            .iter()
            .map(|&param| {
                let (ms, kind) = times.for_param(param);
                SmoothedParam::new(controls.cell(param), ms, sample_rate, kind)
            })
            .collect();

        Self {
            params,
            lanes: vec![0.0; ParamIndex::COUNT * max_block_size],
            max_block_size,
            block_len: 0,
        }
    }

    #[inline]
    pub fn max_block_size(&self) -> usize {
        self.max_block_size
    }

    /// Smooth `frames` samples (at most `max_block_size`) into the lanes
    pub fn advance(&mut self, frames: usize) {
        let frames = frames.min(self.max_block_size);
        for (param, lane) in self
            .params
            .iter_mut()
            .zip(self.lanes.chunks_exact_mut(self.max_block_size))
        {
            param.fill_buffer(&mut lane[..frames]);
        }
        self.block_len = frames;
    }

    /// Smoothed values for the current chunk
    #[inline]
    pub fn lane(&self, param: ParamIndex) -> &[Sample] {
        let start = param.index() * self.max_block_size;
        &self.lanes[start..start + self.block_len]
    }

    #[inline]
    pub fn value_at(&self, param: ParamIndex, frame: usize) -> f64 {
        self.lanes[param.index() * self.max_block_size + frame]
    }

    /// Mapped hop controls at a sample index of the current chunk
    pub fn hop_controls(&self, frame: usize) -> HopControls {
        HopControls::from_normalized(&ParamIndex::ALL.map(|p| self.value_at(p, frame)))
    }

    /// Smoothed value most recently produced for `param`
    #[inline]
    pub fn current(&self, param: ParamIndex) -> f64 {
        self.params[param.index()].current()
    }

    /// Snap every smoother to its target
    pub fn reset(&mut self) {
        for param in self.params.iter_mut() {
            param.reset();
        }
        self.lanes.fill(0.0);
        self.block_len = 0;
    }
}
