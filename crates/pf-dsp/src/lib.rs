//! pf-dsp: spectral engine for PhaseForge
//!
//! Phase-locked phase vocoder for real-time time-stretching and pitch-shifting.
//!
//! ## Modules
//! - `ring` - Power-of-two ring buffers with monotonic cursors
//! - `stft` - Hann window and realfft forward/inverse wrapper
//! - `phase` - Phase unwrapping and instantaneous frequency
//! - `spectral` - Freeze, spectral gate, spectral smear
//! - `synthesis` - Peak-locked phase resynthesis
//! - `ola` - Overlap-add with window-energy normalization
//! - `transient` - Spectral flux detector with envelope follower
//! - `smoothing` - Lock-free parameter smoothing
//! - `controls` - Parameter table, control surface, per-block lanes
//! - `config` - Engine configuration and STFT layout
//! - `channel` - Per-channel pipeline
//! - `engine` - Multi-channel orchestration

pub mod channel;
pub mod config;
pub mod controls;
pub mod engine;
pub mod numeric;
pub mod ola;
pub mod phase;
pub mod ring;
pub mod smoothing;
pub mod spectral;
pub mod stft;
pub mod synthesis;
pub mod transient;

pub use channel::{ChannelState, DENORMAL_FLUSH_INTERVAL};
pub use config::{EngineConfig, SmoothingTimes, StftLayout, TransformSize};
pub use controls::{ControlSurface, HopControls, ParamIndex, ParameterBank};
pub use engine::SpectralEngine;
pub use smoothing::{SmoothedParam, SmoothingType};

/// Trait for all DSP processors
pub trait Processor: Send + Sync {
    /// Reset processor state
    fn reset(&mut self);

    /// Get latency in samples
    fn latency(&self) -> usize {
        0
    }
}
