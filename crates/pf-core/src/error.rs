//! Error types for PhaseForge
//!
//! No variant carries a heap payload, so returning one from the audio
//! thread never allocates.

use thiserror::Error;

/// Core error type
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum PfError {
    #[error("Invalid transform size: {0} (must be a power of two in 256..=32768)")]
    InvalidTransformSize(usize),

    #[error("Invalid overlap {overlap} for transform size {transform_size}")]
    InvalidOverlap { transform_size: usize, overlap: usize },

    #[error("Invalid sample rate: {0}")]
    InvalidSampleRate(f64),

    #[error("Invalid maximum block size: {0}")]
    InvalidBlockSize(usize),

    #[error("Invalid channel count: {0}")]
    InvalidChannelCount(usize),

    #[error("Buffer of {len} samples does not match {channels} channel(s)")]
    BufferLayout { len: usize, channels: usize },

    #[error("Unknown parameter index: {0}")]
    UnknownParameter(usize),
}

/// Result type alias
pub type PfResult<T> = Result<T, PfError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PfError::InvalidTransformSize(1000);
        assert!(err.to_string().contains("1000"));

        let err = PfError::BufferLayout { len: 7, channels: 2 };
        assert_eq!(err.to_string(), "Buffer of 7 samples does not match 2 channel(s)");
    }
}
