//! Spectral Engine Benchmarks
//!
//! Per-block cost of the full engine plus the hop-rate building blocks.
//! Target: stereo 48kHz well inside real time at every block size.

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use pf_dsp::phase::PhaseAnalyzer;
use pf_dsp::stft::{SpectralTransform, hann_window};
use pf_dsp::{ControlSurface, EngineConfig, ParamIndex, SpectralEngine};
use realfft::RealFftPlanner;

const SAMPLE_RATE: f64 = 48000.0;
const BLOCK_SIZES: &[usize] = &[64, 128, 256, 512, 1024];

/// Generate test audio (440Hz sine wave), planar stereo
fn generate_test_audio(frames: usize) -> Vec<f64> {
    let mono: Vec<f64> = (0..frames)
        .map(|i| {
            let t = i as f64 / SAMPLE_RATE;
            (2.0 * std::f64::consts::PI * 440.0 * t).sin() * 0.5
        })
        .collect();
    [mono.as_slice(), mono.as_slice()].concat()
}

fn stereo_engine(block_size: usize, params: &[(ParamIndex, f64)]) -> SpectralEngine {
    let config = EngineConfig::new(SAMPLE_RATE)
        .with_channels(2)
        .with_max_block_size(block_size);
    let controls = ControlSurface::new();
    for &(param, value) in params {
        controls.set_param(param, value);
    }
    SpectralEngine::with_controls(config, controls).unwrap()
}

fn bench_engine_group(c: &mut Criterion, name: &str, params: &[(ParamIndex, f64)]) {
    let mut group = c.benchmark_group(name);

    for &block_size in BLOCK_SIZES {
        group.bench_with_input(
            BenchmarkId::new("stereo", block_size),
            &block_size,
            |b, &size| {
                let mut engine = stereo_engine(size, params);
                let input = generate_test_audio(size);
                let mut buffer = input.clone();

                b.iter(|| {
                    buffer.copy_from_slice(&input);
                    engine.process(black_box(&mut buffer)).unwrap();
                    black_box(buffer[0])
                });
            },
        );
    }

    group.finish();
}

// ═══════════════════════════════════════════════════════════════════════════════
// ENGINE BENCHMARKS
// ═══════════════════════════════════════════════════════════════════════════════

fn bench_unity(c: &mut Criterion) {
    bench_engine_group(c, "Engine Unity", &[]);
}

fn bench_stretch(c: &mut Criterion) {
    bench_engine_group(c, "Engine Stretch 2x", &[(ParamIndex::TimeStretch, 0.75)]);
}

fn bench_pitch(c: &mut Criterion) {
    bench_engine_group(c, "Engine Pitch +12", &[(ParamIndex::PitchShift, 0.75)]);
}

fn bench_spectral_mods(c: &mut Criterion) {
    bench_engine_group(
        c,
        "Engine Gate+Smear+Reset",
        &[
            (ParamIndex::SpectralGate, 0.6),
            (ParamIndex::SpectralSmear, 0.8),
            (ParamIndex::PhaseReset, 1.0),
        ],
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOP BUILDING BLOCKS
// ═══════════════════════════════════════════════════════════════════════════════

fn bench_hop_stages(c: &mut Criterion) {
    let mut group = c.benchmark_group("Hop Stages");

    for &size in &[512usize, 1024, 2048, 4096] {
        group.bench_with_input(
            BenchmarkId::new("FFT round trip", size),
            &size,
            |b, &size| {
                let mut planner = RealFftPlanner::new();
                let mut transform = SpectralTransform::new(&mut planner, size);
                let window = hann_window(size);

                b.iter(|| {
                    for (s, w) in transform.frame_mut().iter_mut().zip(&window) {
                        *s = *w;
                    }
                    transform.forward();
                    transform.inverse();
                    black_box(transform.grain()[size / 2])
                });
            },
        );

        group.bench_with_input(
            BenchmarkId::new("Phase analysis", size),
            &size,
            |b, &size| {
                let mut planner = RealFftPlanner::new();
                let mut transform = SpectralTransform::new(&mut planner, size);
                transform.frame_mut().copy_from_slice(&hann_window(size));
                transform.forward();
                let mut analyzer = PhaseAnalyzer::new(size, size / 4);

                b.iter(|| {
                    analyzer.analyze(black_box(transform.spectrum()));
                    black_box(analyzer.inst_freq()[1])
                });
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_unity,
    bench_stretch,
    bench_pitch,
    bench_spectral_mods,
    bench_hop_stages,
);

criterion_main!(benches);
