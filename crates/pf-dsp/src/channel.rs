//! Per-channel spectral pipeline
//!
//! Owns every buffer one channel needs, all sized at construction:
//! input ring → windowed frame → FFT → phase analysis → freeze/gate/smear →
//! phase-locked synthesis → IFFT → overlap-add → normalized output.
//!
//! Cursors are monotonic sample counters. The read cursor trails the input
//! cursor by one sample at hop time, and every grain is anchored `latency`
//! samples after its frame start, so at unity settings input emerges exactly
//! `latency` samples later.
//!
//! Stretch moves grains off their anchors by an accumulated drift. When the
//! drift leaves `[-N/2, 2N]` it snaps back to zero and the synthesis phase is
//! rewound by the same distance, so the re-anchored grain lines up with what
//! is already in the accumulator.

use pf_core::Sample;
use realfft::RealFftPlanner;

use crate::config::StftLayout;
use crate::controls::{HopControls, ParamIndex, ParameterBank};
use crate::numeric::finite_or_zero;
use crate::ola::{OverlapAdd, grains_per_hop};
use crate::phase::PhaseAnalyzer;
use crate::ring::RingBuffer;
use crate::spectral::SpectralProcessor;
use crate::stft::{SpectralTransform, hann_window};
use crate::synthesis::{PhaseLockedSynthesizer, SynthesisParams};
use crate::transient::TransientDetector;

/// Hops between denormal flushes
pub const DENORMAL_FLUSH_INTERVAL: usize = 16;

/// Independent state for one audio channel
pub struct ChannelState {
    layout: StftLayout,
    window: Vec<f64>,

    input: RingBuffer,
    overlap_add: OverlapAdd,
    transform: SpectralTransform,
    analyzer: PhaseAnalyzer,
    spectral: SpectralProcessor,
    synthesizer: PhaseLockedSynthesizer,
    transient: TransientDetector,

    input_cursor: usize,
    read_cursor: usize,
    hop_counter: usize,
    warmup_remaining: usize,
    /// Offset of the next grain from its unity-stretch anchor
    drift: isize,

    analysis_hops: u64,
    synthesis_advance: u64,
    hops_since_flush: usize,
}

impl ChannelState {
    pub(crate) fn new(
        layout: &StftLayout,
        sample_rate: f64,
        planner: &mut RealFftPlanner<f64>,
    ) -> Self {
        let hop_rate = sample_rate / layout.hop as f64;

        Self {
            layout: *layout,
            window: hann_window(layout.transform_size),
            input: RingBuffer::new(layout.ring_capacity),
            overlap_add: OverlapAdd::new(layout.ring_capacity),
            transform: SpectralTransform::new(planner, layout.transform_size),
            analyzer: PhaseAnalyzer::new(layout.transform_size, layout.hop),
            spectral: SpectralProcessor::new(
                layout.bins,
                layout.hop,
                layout.freeze_crossfade_samples,
            ),
            synthesizer: PhaseLockedSynthesizer::new(layout.bins),
            transient: TransientDetector::new(layout.bins, hop_rate),
            input_cursor: 0,
            read_cursor: 0,
            hop_counter: 0,
            warmup_remaining: layout.latency,
            drift: 0,
            analysis_hops: 0,
            synthesis_advance: 0,
            hops_since_flush: 0,
        }
    }

    /// Process one chunk in place. `bank` lanes must cover `buffer.len()`.
    pub(crate) fn process(&mut self, buffer: &mut [Sample], bank: &ParameterBank) {
        let mix_lane = bank.lane(ParamIndex::Mix);
        debug_assert!(mix_lane.len() >= buffer.len());

        for (frame, sample) in buffer.iter_mut().enumerate() {
            self.input.set(self.input_cursor, finite_or_zero(*sample));
            self.input_cursor += 1;
            self.hop_counter += 1;

            if self.hop_counter >= self.layout.hop {
                self.hop_counter = 0;
                let controls = bank.hop_controls(frame);
                self.run_hop(&controls);
            }

            let wet = self.overlap_add.read(self.read_cursor);
            let dry = self
                .input
                .get(self.read_cursor.wrapping_sub(self.layout.latency));

            let out = if self.warmup_remaining > 0 {
                self.warmup_remaining -= 1;
                0.0
            } else {
                let mix = mix_lane[frame];
                dry * (1.0 - mix) + wet * mix
            };

            *sample = finite_or_zero(out);
            self.read_cursor += 1;
        }
    }

    fn run_hop(&mut self, controls: &HopControls) {
        let size = self.layout.transform_size;
        let hop = self.layout.hop;

        // Frame ending at the newest input sample
        let frame_start = self.input_cursor.wrapping_sub(size);
        let frame = self.transform.frame_mut();
        self.input.copy_to(frame_start, frame);
        for (s, w) in frame.iter_mut().zip(&self.window) {
            *s *= w;
        }
        self.transform.forward();
        self.analyzer.analyze(self.transform.spectrum());

        self.spectral.blend(&self.analyzer, controls.freeze);
        let strength = self.transient.detect(
            self.spectral.magnitude(),
            controls.attack_ms,
            controls.release_ms,
        );
        let depth = 1.0 - controls.transient_preserve * strength;
        self.spectral
            .shape(controls.gate * depth, controls.smear * depth);

        let synthesis_hop = controls.synthesis_hop(hop);
        let params = SynthesisParams {
            hop: synthesis_hop,
            pitch_ratio: controls.pitch_ratio,
            phase_reset: controls.phase_reset * strength,
        };
        let frame = self.spectral.frame(&self.analyzer);
        self.synthesizer
            .synthesize(&frame, params, self.transform.spectrum_mut());

        let anchor = frame_start.wrapping_add(self.layout.latency);
        let origin = anchor.saturating_add_signed(self.drift);
        let grains = grains_per_hop(controls.pitch_ratio);
        for grain in 0..grains {
            let offset = grain * synthesis_hop / grains;
            if grain > 0 {
                self.synthesizer
                    .render_shifted(offset, self.transform.spectrum_mut());
            }
            self.transform.inverse();
            self.overlap_add.write_grain(
                self.transform.grain(),
                &self.window,
                origin.saturating_add(offset),
                self.read_cursor,
                controls.pitch_ratio,
            );
        }

        let drift = self.drift + synthesis_hop as isize - hop as isize;
        self.drift = if drift < -((size / 2) as isize) || drift > (2 * size) as isize {
            // Re-anchored grain lands `drift` samples off the phase timeline
            self.synthesizer.rewind(drift);
            0
        } else {
            drift
        };

        self.analysis_hops += 1;
        self.synthesis_advance += synthesis_hop as u64;

        self.hops_since_flush += 1;
        if self.hops_since_flush >= DENORMAL_FLUSH_INTERVAL {
            self.hops_since_flush = 0;
            self.flush_denormals();
        }
    }

    fn flush_denormals(&mut self) {
        self.analyzer.flush_denormals();
        self.spectral.flush_denormals();
        self.transient.flush_denormals();
    }

    /// Clear all state and re-arm the warmup
    pub(crate) fn reset(&mut self) {
        self.input.clear();
        self.overlap_add.reset();
        self.analyzer.reset();
        self.spectral.reset();
        self.synthesizer.reset();
        self.transient.reset();

        self.input_cursor = 0;
        self.read_cursor = 0;
        self.hop_counter = 0;
        self.warmup_remaining = self.layout.latency;
        self.drift = 0;
        self.analysis_hops = 0;
        self.synthesis_advance = 0;
        self.hops_since_flush = 0;
    }

    // ============ Inspection ============

    /// Accumulated window energy `offset` samples after the next output sample
    pub fn normalization_at(&self, offset: usize) -> f64 {
        self.overlap_add.norm_at(self.read_cursor + offset)
    }

    /// Magnitudes of the most recent synthesis frame
    pub fn synthesis_magnitudes(&self) -> &[f32] {
        self.synthesizer.magnitude()
    }

    pub fn synthesis_phases(&self) -> &[f64] {
        self.synthesizer.synth_phase()
    }

    pub fn analysis_hops(&self) -> u64 {
        self.analysis_hops
    }

    /// Sum of synthesis hops so far
    pub fn synthesis_advance(&self) -> u64 {
        self.synthesis_advance
    }

    pub fn warmup_remaining(&self) -> usize {
        self.warmup_remaining
    }

    pub fn freeze_position(&self) -> f64 {
        self.spectral.freeze().position()
    }

    pub fn transient_strength(&self) -> f64 {
        self.transient.strength()
    }

    pub fn samples_processed(&self) -> usize {
        self.read_cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EngineConfig, SmoothingTimes, TransformSize};
    use crate::controls::ControlSurface;

    fn setup(size: usize) -> (ChannelState, ParameterBank, ControlSurface) {
        let config = EngineConfig::new(48_000.0)
            .with_channels(1)
            .with_transform_size(TransformSize::Fixed(size))
            .with_max_block_size(size * 16);
        let layout = config.validate().unwrap();
        let mut planner = RealFftPlanner::new();
        let channel = ChannelState::new(&layout, config.sample_rate, &mut planner);
        let surface = ControlSurface::new();
        let bank = ParameterBank::new(
            &surface,
            config.sample_rate,
            config.max_block_size,
            &SmoothingTimes::default(),
        );
        (channel, bank, surface)
    }

    #[test]
    fn test_warmup_is_silent() {
        let (mut channel, mut bank, _) = setup(256);
        let mut buffer = vec![1.0; 256];
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);
        assert!(buffer.iter().all(|&s| s == 0.0));
        assert_eq!(channel.warmup_remaining(), 0);
    }

    #[test]
    fn test_impulse_delayed_by_latency() {
        let (mut channel, mut bank, _) = setup(512);
        let mut buffer = vec![0.0; 2048];
        buffer[0] = 1.0;
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);

        let first = buffer.iter().position(|s| s.abs() > 1e-3);
        assert_eq!(first, Some(512));
        assert!((buffer[512] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_hop_counting() {
        let (mut channel, mut bank, _) = setup(256);
        let mut buffer = vec![0.0; 640];
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);
        assert_eq!(channel.analysis_hops(), 10);
        assert_eq!(channel.synthesis_advance(), 640);
    }

    #[test]
    fn test_nan_input_is_scrubbed() {
        let (mut channel, mut bank, _) = setup(256);
        let mut buffer: Vec<f64> = (0..2048)
            .map(|i| if i % 97 == 0 { f64::NAN } else { (i as f64 * 0.05).sin() })
            .collect();
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);
        assert!(buffer.iter().all(|s| s.is_finite()));
        assert!(channel.synthesis_phases().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn test_reset_restores_fresh_state() {
        let (mut channel, mut bank, _) = setup(256);
        let mut buffer = vec![0.5; 1000];
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);
        channel.reset();

        assert_eq!(channel.analysis_hops(), 0);
        assert_eq!(channel.samples_processed(), 0);
        assert_eq!(channel.warmup_remaining(), 256);
        assert_eq!(channel.normalization_at(0), 0.0);
        assert!(channel.synthesis_magnitudes().iter().all(|&m| m == 0.0));
    }

    #[test]
    fn test_two_octaves_up_keeps_window_energy() {
        let (mut channel, mut bank, surface) = setup(512);
        surface.set_param(ParamIndex::PitchShift, 1.0);

        let mut buffer: Vec<f64> = (0..8192).map(|i| (i as f64 * 0.03).sin()).collect();
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);

        for offset in 0..128 {
            let energy = channel.normalization_at(offset);
            assert!(energy > 1.0, "offset {offset}: {energy}");
        }
    }

    #[test]
    fn test_drift_snap_keeps_synthesis_advance() {
        let (mut channel, mut bank, surface) = setup(256);
        surface.set_param(ParamIndex::TimeStretch, 1.0);

        let mut buffer: Vec<f64> = (0..8192).map(|i| (i as f64 * 0.1).sin()).collect();
        bank.advance(buffer.len());
        channel.process(&mut buffer, &bank);

        assert_eq!(channel.analysis_hops(), 128);
        assert!(channel.synthesis_advance() > 3 * 8192);
        assert!(buffer.iter().all(|s| s.is_finite()));
        assert!(channel.synthesis_phases().iter().all(|p| p.is_finite()));
    }
}
