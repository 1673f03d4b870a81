//! Errors raised by the classification kernel and the tick pipeline.
//!
//! Collaborator failures (camera, audio) are not listed here. Frame sources report
//! through [`crate::frame_source::SourceError`] and playback sinks never fail the core.

use crate::core_modules::pixel::ChannelName;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum CoreError {
    /// Aggregation was asked to scan a buffer without a single complete pixel.
    #[error("frame contains no pixels")]
    EmptyFrame,

    /// A source delivered a channel value outside 0..=255.
    #[error("{channel} channel value {value} is outside 0..=255")]
    InvalidChannelValue { channel: ChannelName, value: i32 },

    #[error("pixel stride {0} cannot hold the three RGB channels")]
    InvalidStride(usize),

    #[error("frame buffer holds {actual} bytes, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// A tick arrived after the pipeline was stopped.
    #[error("pipeline is stopped")]
    Halted,
}
