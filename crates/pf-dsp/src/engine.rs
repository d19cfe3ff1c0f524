//! Multi-channel spectral engine
//!
//! Configuration allocates; processing never does. Long blocks are cut into
//! `max_block_size` chunks, the parameter bank is advanced once per chunk, and
//! every channel pipeline then runs over the same chunk in channel order.

use pf_core::{PfError, PfResult, Sample};
use realfft::RealFftPlanner;

use crate::Processor;
use crate::channel::ChannelState;
use crate::config::{EngineConfig, StftLayout};
use crate::controls::{ControlSurface, HopControls, ParamIndex, ParameterBank, stretch_ratio};

/// Phase-locked time-stretch / pitch-shift engine
pub struct SpectralEngine {
    config: EngineConfig,
    layout: StftLayout,
    controls: ControlSurface,
    bank: ParameterBank,
    channels: Vec<ChannelState>,
}

impl SpectralEngine {
    pub fn new(config: EngineConfig) -> PfResult<Self> {
        Self::with_controls(config, ControlSurface::new())
    }

    /// Build around an existing control surface (e.g. one the host already holds)
    pub fn with_controls(config: EngineConfig, controls: ControlSurface) -> PfResult<Self> {
        let layout = config.validate()?;
        let (bank, channels) = Self::build(&config, &layout, &controls);

        log::info!(
            "SpectralEngine: {} ch @ {} Hz, transform {}, hop {}, latency {} samples",
            config.channels,
            config.sample_rate,
            layout.transform_size,
            layout.hop,
            layout.latency
        );

        Ok(Self {
            config,
            layout,
            controls,
            bank,
            channels,
        })
    }

    fn build(
        config: &EngineConfig,
        layout: &StftLayout,
        controls: &ControlSurface,
    ) -> (ParameterBank, Vec<ChannelState>) {
        let mut planner = RealFftPlanner::<f64>::new();
        let channels = (0..config.channels)
            .map(|_| ChannelState::new(layout, config.sample_rate, &mut planner))
            .collect();
        let bank = ParameterBank::new(
            controls,
            config.sample_rate,
            config.max_block_size,
            &config.smoothing,
        );

        log::debug!(
            "Allocated {} channel pipeline(s): ring capacity {}, {} bins, overlap {}",
            config.channels,
            layout.ring_capacity,
            layout.bins,
            layout.overlap
        );

        (bank, channels)
    }

    /// Rebuild for a new sample rate, block size or channel count.
    ///
    /// Allocates; never call from the audio thread. On error the previous
    /// configuration stays in place.
    pub fn configure(&mut self, config: EngineConfig) -> PfResult<()> {
        let layout = config.validate()?;
        let (bank, channels) = Self::build(&config, &layout, &self.controls);

        log::info!(
            "SpectralEngine reconfigured: {} ch @ {} Hz, transform {}, latency {} samples",
            config.channels,
            config.sample_rate,
            layout.transform_size,
            layout.latency
        );

        self.config = config;
        self.layout = layout;
        self.bank = bank;
        self.channels = channels;
        Ok(())
    }

    /// Process a planar, channel-major buffer in place
    pub fn process(&mut self, buffer: &mut [Sample]) -> PfResult<()> {
        let channel_count = self.channels.len();
        if buffer.len() % channel_count != 0 {
            return Err(PfError::BufferLayout {
                len: buffer.len(),
                channels: channel_count,
            });
        }

        let frames = buffer.len() / channel_count;
        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(self.config.max_block_size);
            self.bank.advance(len);

            for (ch, state) in self.channels.iter_mut().enumerate() {
                let start = ch * frames + offset;
                state.process(&mut buffer[start..start + len], &self.bank);
            }
            offset += len;
        }

        Ok(())
    }

    /// Process separate channel slices of equal length in place
    pub fn process_channels(&mut self, channels: &mut [&mut [Sample]]) -> PfResult<()> {
        let channel_count = self.channels.len();
        let frames = channels.first().map_or(0, |c| c.len());

        if channels.len() != channel_count || channels.iter().any(|c| c.len() != frames) {
            return Err(PfError::BufferLayout {
                len: channels.iter().map(|c| c.len()).sum(),
                channels: channel_count,
            });
        }

        let mut offset = 0;
        while offset < frames {
            let len = (frames - offset).min(self.config.max_block_size);
            self.bank.advance(len);

            for (state, data) in self.channels.iter_mut().zip(channels.iter_mut()) {
                state.process(&mut data[offset..offset + len], &self.bank);
            }
            offset += len;
        }

        Ok(())
    }

    /// Fixed latency to report to the host
    #[inline]
    pub fn latency_samples(&self) -> usize {
        self.layout.latency
    }

    /// Zero all rings and per-bin state and re-arm the warmup.
    /// Leaves the engine as freshly configured; control targets are kept.
    pub fn reset(&mut self) {
        for channel in self.channels.iter_mut() {
            channel.reset();
        }
        self.bank.reset();
        log::debug!("SpectralEngine reset, warmup {} samples", self.layout.latency);
    }

    /// Handle for the control thread
    pub fn controls(&self) -> ControlSurface {
        self.controls.clone()
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn layout(&self) -> &StftLayout {
        &self.layout
    }

    /// Analysis hop and the synthesis hop implied by the current stretch
    pub fn hop_sizes(&self) -> (usize, usize) {
        let controls = HopControls {
            stretch: stretch_ratio(self.bank.current(ParamIndex::TimeStretch)),
            ..HopControls::default()
        };
        (self.layout.hop, controls.synthesis_hop(self.layout.hop))
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    pub fn channel(&self, index: usize) -> Option<&ChannelState> {
        self.channels.get(index)
    }
}

impl Processor for SpectralEngine {
    fn reset(&mut self) {
        SpectralEngine::reset(self);
    }

    fn latency(&self) -> usize {
        self.latency_samples()
    }
}
