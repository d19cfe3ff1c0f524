//! Offline rendering through `SpectralEngine`
//!
//! The file is fed to the engine in host-sized planar blocks, the same way a
//! plugin host would call it. With latency compensation the first `latency`
//! output frames are dropped and `latency` frames of silence are pushed
//! through at the end, so output and input line up and keep the same length.

use std::path::Path;

use anyhow::{Context, Result, bail};
use pf_core::{Decibels, PlanarBuffer, Sample};
use pf_dsp::{ControlSurface, EngineConfig, SpectralEngine, TransformSize};

/// Decoded audio with its sample rate
#[derive(Debug, Clone)]
pub struct AudioFile {
    pub buffer: PlanarBuffer,
    pub sample_rate: u32,
}

#[derive(Debug, Clone, Copy)]
pub struct RenderOptions {
    pub block_size: usize,
    pub transform_size: Option<usize>,
    pub compensate: bool,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            block_size: 512,
            transform_size: None,
            compensate: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderStats {
    pub frames: usize,
    pub blocks: usize,
    pub latency: usize,
    /// Output sample peak across all channels
    pub peak: Decibels,
}

/// Read an integer or float WAV as `f64`
pub fn read_wav(path: &Path) -> Result<AudioFile> {
    let reader = hound::WavReader::open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;

    let spec = reader.spec();
    let channels = spec.channels as usize;
    if channels == 0 {
        bail!("{} has no channels", path.display());
    }

    let samples: Vec<Sample> = match spec.sample_format {
        hound::SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f64;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|s| s as f64 / max_val))
                .collect::<Result<_, _>>()
        }
        hound::SampleFormat::Float => reader
            .into_samples::<f32>()
            .map(|s| s.map(|s| s as f64))
            .collect::<Result<_, _>>(),
    }
    .with_context(|| format!("Failed to decode {}", path.display()))?;

    log::debug!(
        "Read {}: {} ch, {} Hz, {}-bit {:?}",
        path.display(),
        channels,
        spec.sample_rate,
        spec.bits_per_sample,
        spec.sample_format
    );

    Ok(AudioFile {
        buffer: PlanarBuffer::from_interleaved(&samples, channels),
        sample_rate: spec.sample_rate,
    })
}

/// Write 32-bit float WAV
pub fn write_wav(path: &Path, audio: &AudioFile) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.buffer.channels() as u16,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = hound::WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create {}", path.display()))?;

    let mut interleaved = Vec::new();
    audio.buffer.write_interleaved(&mut interleaved);
    for sample in interleaved {
        writer
            .write_sample(sample as f32)
            .context("Failed to write sample")?;
    }
    writer.finalize().context("Failed to finalize WAV")?;
    Ok(())
}

/// Stream `input` through a freshly configured engine
pub fn render(
    input: &AudioFile,
    controls: ControlSurface,
    options: &RenderOptions,
) -> Result<(AudioFile, RenderStats)> {
    if options.block_size == 0 {
        bail!("Block size must be at least 1");
    }

    let channels = input.buffer.channels();
    let frames = input.buffer.frames();

    let mut config = EngineConfig::new(input.sample_rate as f64)
        .with_channels(channels)
        .with_max_block_size(options.block_size);
    if let Some(size) = options.transform_size {
        config = config.with_transform_size(TransformSize::Fixed(size));
    }

    let mut engine =
        SpectralEngine::with_controls(config, controls).context("Invalid engine configuration")?;
    let latency = engine.latency_samples();
    let skip = if options.compensate { latency } else { 0 };
    let total = frames + skip;

    let mut output = PlanarBuffer::new(channels, frames);
    let mut block = vec![0.0; options.block_size * channels];
    let mut blocks = 0;
    let mut position = 0;

    while position < total {
        let len = (total - position).min(options.block_size);
        let planar = &mut block[..len * channels];

        for ch in 0..channels {
            let source = input.buffer.channel(ch);
            let dest = &mut planar[ch * len..(ch + 1) * len];
            for (i, sample) in dest.iter_mut().enumerate() {
                *sample = source.get(position + i).copied().unwrap_or(0.0);
            }
        }

        engine.process(planar)?;

        // Block frames land at `position - skip` in the output
        for ch in 0..channels {
            let produced = &planar[ch * len..(ch + 1) * len];
            let dest = output.channel_mut(ch);
            for (i, &sample) in produced.iter().enumerate() {
                let index = (position + i).checked_sub(skip);
                if let Some(slot) = index.and_then(|index| dest.get_mut(index)) {
                    *slot = sample;
                }
            }
        }

        position += len;
        blocks += 1;
    }

    let peak = output
        .as_slice()
        .iter()
        .fold(0.0_f64, |acc, s| acc.max(s.abs()));

    let stats = RenderStats {
        frames,
        blocks,
        latency,
        peak: Decibels::from_gain(peak),
    };

    Ok((
        AudioFile {
            buffer: output,
            sample_rate: input.sample_rate,
        },
        stats,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pf_dsp::ParamIndex;
    use std::f64::consts::PI;

    fn sine_file(frames: usize, channels: usize) -> AudioFile {
        let interleaved: Vec<f64> = (0..frames)
            .flat_map(|i| {
                let s = 0.5 * (2.0 * PI * 440.0 * i as f64 / 44_100.0).sin();
                (0..channels).map(move |ch| if ch == 0 { s } else { -s })
            })
            .collect();
        AudioFile {
            buffer: PlanarBuffer::from_interleaved(&interleaved, channels),
            sample_rate: 44_100,
        }
    }

    fn write_int16(path: &Path, audio: &AudioFile) {
        let spec = hound::WavSpec {
            channels: audio.buffer.channels() as u16,
            sample_rate: audio.sample_rate,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        let mut interleaved = Vec::new();
        audio.buffer.write_interleaved(&mut interleaved);
        for s in interleaved {
            writer.write_sample((s * 32767.0).round() as i16).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_uncompensated_render_is_delayed() {
        let input = sine_file(8192, 1);
        let (output, stats) = render(&input, ControlSurface::new(), &RenderOptions::default()).unwrap();

        assert_eq!(stats.latency, 2048);
        assert_eq!(stats.blocks, 16);
        assert!(stats.peak.0 < 0.0);
        assert_eq!(output.buffer.frames(), 8192);
        assert!(output.buffer.channel(0)[..2048].iter().all(|&s| s == 0.0));

        let source = input.buffer.channel(0);
        let rendered = output.buffer.channel(0);
        for n in 2048..8192 {
            assert!((rendered[n] - source[n - 2048]).abs() < 1e-5);
        }
    }

    #[test]
    fn test_compensated_render_lines_up() {
        let input = sine_file(6000, 2);
        let options = RenderOptions {
            block_size: 300,
            transform_size: Some(1024),
            compensate: true,
        };
        let (output, stats) = render(&input, ControlSurface::new(), &options).unwrap();

        assert_eq!(stats.latency, 1024);
        assert_eq!(stats.blocks, (6000 + 1024_usize).div_ceil(300));
        // 0.5 amplitude sine
        assert!((stats.peak.0 + 6.02).abs() < 0.05, "peak {:?}", stats.peak);
        for ch in 0..2 {
            let source = input.buffer.channel(ch);
            let rendered = output.buffer.channel(ch);
            assert_eq!(rendered.len(), source.len());
            for (a, b) in rendered.iter().zip(source) {
                assert!((a - b).abs() < 1e-5);
            }
        }
    }

    #[test]
    fn test_invalid_transform_size_fails() {
        let input = sine_file(1024, 1);
        let options = RenderOptions {
            transform_size: Some(1000),
            ..RenderOptions::default()
        };
        assert!(render(&input, ControlSurface::new(), &options).is_err());

        let options = RenderOptions {
            block_size: 0,
            ..RenderOptions::default()
        };
        assert!(render(&input, ControlSurface::new(), &options).is_err());
    }

    #[test]
    fn test_wav_round_trip_through_engine() {
        let dir = tempfile::tempdir().unwrap();
        let source_path = dir.path().join("in.wav");
        let output_path = dir.path().join("out.wav");

        write_int16(&source_path, &sine_file(12_000, 2));
        let input = read_wav(&source_path).unwrap();
        assert_eq!(input.buffer.channels(), 2);
        assert_eq!(input.buffer.frames(), 12_000);
        assert_eq!(input.sample_rate, 44_100);

        let controls = ControlSurface::new();
        controls.set_param(ParamIndex::Mix, 0.0);
        let options = RenderOptions {
            compensate: true,
            ..RenderOptions::default()
        };
        let (rendered, _) = render(&input, controls, &options).unwrap();
        write_wav(&output_path, &rendered).unwrap();

        let reread = read_wav(&output_path).unwrap();
        assert_eq!(reread.buffer.frames(), 12_000);
        for (a, b) in reread.buffer.as_slice().iter().zip(input.buffer.as_slice()) {
            assert!((a - b).abs() < 1e-6);
        }
    }

    #[test]
    fn test_missing_input_reports_path() {
        let err = read_wav(Path::new("/nonexistent/input.wav")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/input.wav"));
    }
}
