//! PhaseForge offline renderer
//!
//! Usage:
//!   pf-render in.wav out.wav --stretch 2.0
//!   pf-render in.wav out.wav --pitch -7 --mix 80 --compensate
//!   pf-render in.wav out.wav --preset frozen.json --freeze

mod preset;
mod render;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use pf_dsp::{ControlSurface, ParamIndex};

use crate::preset::Preset;
use crate::render::{RenderOptions, read_wav, render, write_wav};

#[derive(Parser)]
#[command(name = "pf-render", about = "Render a WAV file through the PhaseForge spectral engine")]
struct Cli {
    /// Input WAV (integer or float)
    input: PathBuf,

    /// Output WAV (32-bit float)
    output: PathBuf,

    /// Time-stretch ratio, 0.25 to 4
    #[arg(long)]
    stretch: Option<f64>,

    /// Pitch shift in semitones, -24 to +24
    #[arg(long, allow_hyphen_values = true)]
    pitch: Option<f64>,

    /// Wet/dry mix in percent
    #[arg(long)]
    mix: Option<f64>,

    /// Spectral smear in percent
    #[arg(long)]
    smear: Option<f64>,

    /// Spectral gate in percent
    #[arg(long)]
    gate: Option<f64>,

    /// Transient preserve in percent
    #[arg(long)]
    transient_preserve: Option<f64>,

    /// Phase reset on transients in percent
    #[arg(long)]
    phase_reset: Option<f64>,

    /// Transient attack in ms, 0.1 to 10
    #[arg(long)]
    attack: Option<f64>,

    /// Transient release in ms, 10 to 500
    #[arg(long)]
    release: Option<f64>,

    /// Hold the spectrum captured at the start of the file
    #[arg(long)]
    freeze: bool,

    /// JSON preset of normalized values, applied before the flags above
    #[arg(long)]
    preset: Option<PathBuf>,

    /// Write the effective control values as a preset
    #[arg(long)]
    save_preset: Option<PathBuf>,

    /// Host block size in frames
    #[arg(short, long, default_value_t = 512)]
    block: usize,

    /// FFT size (power of two); picked from the sample rate when omitted
    #[arg(long)]
    transform_size: Option<usize>,

    /// Trim the engine latency so output lines up with input
    #[arg(long)]
    compensate: bool,
}

impl Cli {
    /// Flags in display units, keyed by the parameter they drive
    fn overrides(&self) -> Vec<(ParamIndex, f64)> {
        [
            (ParamIndex::TimeStretch, self.stretch),
            (ParamIndex::PitchShift, self.pitch),
            (ParamIndex::Mix, self.mix),
            (ParamIndex::SpectralSmear, self.smear),
            (ParamIndex::SpectralGate, self.gate),
            (ParamIndex::TransientPreserve, self.transient_preserve),
            (ParamIndex::PhaseReset, self.phase_reset),
            (ParamIndex::TransientAttack, self.attack),
            (ParamIndex::TransientRelease, self.release),
            (ParamIndex::Freeze, self.freeze.then_some(1.0)),
        ]
        .into_iter()
        .filter_map(|(param, value)| value.map(|v| (param, v)))
        .collect()
    }

    fn controls(&self) -> Result<ControlSurface> {
        let controls = ControlSurface::new();

        if let Some(path) = &self.preset {
            let preset = Preset::load(path)?;
            preset.apply(&controls);
            log::info!(
                "Loaded preset {} ({} values)",
                preset.name.as_deref().unwrap_or("unnamed"),
                preset.values().count()
            );
        }

        for (param, value) in self.overrides() {
            controls.set_param(param, param.range().normalize(value));
        }

        for param in ParamIndex::ALL {
            log::debug!(
                "{}: {:.3}",
                param.name(),
                param.denormalize(controls.get(param))
            );
        }

        Ok(controls)
    }
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    let controls = cli.controls()?;
    if let Some(path) = &cli.save_preset {
        let name = path.file_stem().map_or_else(
            || "preset".to_string(),
            |stem| stem.to_string_lossy().into_owned(),
        );
        Preset::capture(name, &controls).save(path)?;
        log::info!("Saved preset to {}", path.display());
    }

    let input = read_wav(&cli.input)?;
    log::info!(
        "Rendering {}: {} ch, {} Hz, {} frames",
        cli.input.display(),
        input.buffer.channels(),
        input.sample_rate,
        input.buffer.frames()
    );

    let options = RenderOptions {
        block_size: cli.block,
        transform_size: cli.transform_size,
        compensate: cli.compensate,
    };

    let started = Instant::now();
    let (output, stats) = render(&input, controls, &options)
        .with_context(|| format!("Failed to render {}", cli.input.display()))?;
    let elapsed = started.elapsed();

    write_wav(&cli.output, &output)?;

    let seconds = stats.frames as f64 / input.sample_rate as f64;
    log::info!(
        "Wrote {}: {} frames in {} blocks, latency {} samples{}, peak {:.1} dBFS, {:.1}x real time",
        cli.output.display(),
        stats.frames,
        stats.blocks,
        stats.latency,
        if options.compensate { " (compensated)" } else { "" },
        stats.peak.0,
        seconds / elapsed.as_secs_f64().max(1e-9)
    );

    Ok(())
}
