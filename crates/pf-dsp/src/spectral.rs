//! Per-bin spectral modifiers: freeze, gate and smear
//!
//! Order per hop is fixed: freeze blend, then gate, then smear. Only
//! magnitudes are touched; phase and instantaneous frequency pass through
//! from whichever source (live or frozen) currently dominates.

use pf_core::Decibels;

use crate::numeric::flush_denormals_f32;
use crate::phase::PhaseAnalyzer;

/// Gate floor at gate = 0+ (dB below the frame peak)
pub const GATE_RANGE_DB: f64 = 80.0;

/// Smear radius in bins at smear = 1
pub const MAX_SMEAR_RADIUS: usize = 8;

// ============ Gate ============

/// Attenuate bins below a threshold relative to the frame peak.
///
/// `gate` in (0, 1] sets the threshold at `-GATE_RANGE_DB * (1 - gate)` dB
/// below the peak. Bins under it are expanded downward 1:2, so the curve is
/// continuous at the threshold. `gate <= 0` is a no-op.
pub fn apply_gate(magnitude: &mut [f32], gate: f64) {
    if gate.is_nan() || gate <= 0.0 {
        return;
    }

    let peak = magnitude.iter().fold(0.0_f32, |acc, &m| acc.max(m)) as f64;
    if peak <= 0.0 {
        return;
    }

    let floor = Decibels(-GATE_RANGE_DB * (1.0 - gate.min(1.0)));
    let threshold = peak * floor.to_gain();

    for m in magnitude.iter_mut() {
        let value = *m as f64;
        if value < threshold {
            *m = (value * value / threshold) as f32;
        }
    }
}

// ============ Smear ============

/// Replace each bin with a weighted average of itself and its neighbours.
///
/// Neighbour weight is `smear`; radius grows from 1 to `MAX_SMEAR_RADIUS`.
/// Edge bins only average over neighbours that exist. `scratch` must be the
/// same length as `magnitude`.
pub fn apply_smear(magnitude: &mut [f32], scratch: &mut [f32], smear: f64) {
    if smear.is_nan() || smear <= 0.0 || magnitude.is_empty() {
        return;
    }

    let smear = smear.min(1.0);
    let radius = 1 + (smear * (MAX_SMEAR_RADIUS - 1) as f64).round() as usize;
    let last = magnitude.len() - 1;

    scratch.copy_from_slice(magnitude);

    for (k, m) in magnitude.iter_mut().enumerate() {
        let lo = k.saturating_sub(radius);
        let hi = (k + radius).min(last);

        let mut sum = scratch[k] as f64;
        let mut weight = 1.0;
        for (j, &neighbour) in scratch.iter().enumerate().take(hi + 1).skip(lo) {
            if j != k {
                sum += smear * neighbour as f64;
                weight += smear;
            }
        }
        *m = (sum / weight) as f32;
    }
}

// ============ Freeze ============

/// Captured spectrum plus the crossfade position toward it
#[derive(Debug, Clone)]
pub struct FreezeState {
    magnitude: Vec<f32>,
    phase: Vec<f64>,
    inst_freq: Vec<f64>,
    captured: bool,
    /// 0 = live, 1 = fully frozen
    position: f64,
    /// Position change per hop
    step: f64,
}

impl FreezeState {
    pub fn new(bins: usize, hop: usize, crossfade_samples: f64) -> Self {
        let step = (hop as f64 / crossfade_samples.max(1.0)).min(1.0);
        Self {
            magnitude: vec![0.0; bins],
            phase: vec![0.0; bins],
            inst_freq: vec![0.0; bins],
            captured: false,
            position: 0.0,
            step,
        }
    }

    /// Advance one hop. Captures the live frame on the first engaged hop.
    pub fn advance(&mut self, engaged: bool, live: &PhaseAnalyzer) {
        if engaged && !self.captured {
            self.magnitude.copy_from_slice(live.magnitude());
            self.phase.copy_from_slice(live.phase());
            self.inst_freq.copy_from_slice(live.inst_freq());
            self.captured = true;
        }

        self.position = if engaged {
            (self.position + self.step).min(1.0)
        } else {
            (self.position - self.step).max(0.0)
        };

        // Fully released: the next engage takes a fresh snapshot
        if self.position <= 0.0 {
            self.captured = false;
        }
    }

    #[inline]
    pub fn position(&self) -> f64 {
        self.position
    }

    #[inline]
    pub fn is_captured(&self) -> bool {
        self.captured
    }

    pub fn flush_denormals(&mut self) {
        flush_denormals_f32(&mut self.magnitude);
    }

    pub fn reset(&mut self) {
        self.magnitude.fill(0.0);
        self.phase.fill(0.0);
        self.inst_freq.fill(0.0);
        self.captured = false;
        self.position = 0.0;
    }
}

// ============ Processor ============

/// Where phase and instantaneous frequency come from this hop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameSource {
    Live,
    Frozen,
}

/// View of the processed frame handed to the synthesizer
#[derive(Debug, Clone, Copy)]
pub struct SpectralFrame<'a> {
    pub magnitude: &'a [f32],
    pub phase: &'a [f64],
    pub inst_freq: &'a [f64],
}

/// Working magnitude spectrum and freeze state for one channel
#[derive(Debug, Clone)]
pub struct SpectralProcessor {
    magnitude: Vec<f32>,
    scratch: Vec<f32>,
    freeze: FreezeState,
    source: FrameSource,
}

impl SpectralProcessor {
    pub fn new(bins: usize, hop: usize, crossfade_samples: f64) -> Self {
        Self {
            magnitude: vec![0.0; bins],
            scratch: vec![0.0; bins],
            freeze: FreezeState::new(bins, hop, crossfade_samples),
            source: FrameSource::Live,
        }
    }

    /// Load the working magnitudes from the live frame, the frozen snapshot,
    /// or a linear blend of the two.
    pub fn blend(&mut self, live: &PhaseAnalyzer, freeze_engaged: bool) {
        self.freeze.advance(freeze_engaged, live);
        let position = self.freeze.position();

        if position <= 0.0 {
            self.magnitude.copy_from_slice(live.magnitude());
            self.source = FrameSource::Live;
        } else if position >= 1.0 {
            self.magnitude.copy_from_slice(&self.freeze.magnitude);
            self.source = FrameSource::Frozen;
        } else {
            let wet = position as f32;
            let dry = 1.0 - wet;
            for ((out, &l), &f) in self
                .magnitude
                .iter_mut()
                .zip(live.magnitude())
                .zip(&self.freeze.magnitude)
            {
                *out = dry * l + wet * f;
            }
            self.source = if position > 0.5 {
                FrameSource::Frozen
            } else {
                FrameSource::Live
            };
        }
    }

    /// Gate then smear the working magnitudes
    pub fn shape(&mut self, gate: f64, smear: f64) {
        apply_gate(&mut self.magnitude, gate);
        apply_smear(&mut self.magnitude, &mut self.scratch, smear);
    }

    #[inline]
    pub fn magnitude(&self) -> &[f32] {
        &self.magnitude
    }

    #[inline]
    pub fn source(&self) -> FrameSource {
        self.source
    }

    #[inline]
    pub fn freeze(&self) -> &FreezeState {
        &self.freeze
    }

    /// Frame for synthesis: working magnitudes with the dominant source's phases
    pub fn frame<'a>(&'a self, live: &'a PhaseAnalyzer) -> SpectralFrame<'a> {
        match self.source {
            FrameSource::Live => SpectralFrame {
                magnitude: &self.magnitude,
                phase: live.phase(),
                inst_freq: live.inst_freq(),
            },
            FrameSource::Frozen => SpectralFrame {
                magnitude: &self.magnitude,
                phase: &self.freeze.phase,
                inst_freq: &self.freeze.inst_freq,
            },
        }
    }

    pub fn flush_denormals(&mut self) {
        flush_denormals_f32(&mut self.magnitude);
        flush_denormals_f32(&mut self.scratch);
        self.freeze.flush_denormals();
    }

    pub fn reset(&mut self) {
        self.magnitude.fill(0.0);
        self.scratch.fill(0.0);
        self.freeze.reset();
        self.source = FrameSource::Live;
    }
}
