// THEORY:
// The `frame_aggregator` turns a raw frame into the only numbers the alarm cares
// about: what percentage of the frame each color class covers.
//
// Key architectural principles:
// 1.  **Full-frame recount**: every call rescans the whole buffer. There is no
//     windowed or incremental averaging, so one frame's stats never leak into the
//     next.
// 2.  **Order independence**: pixels are counted, never located. Row order, origin
//     and stride padding are irrelevant to the result.
// 3.  **Hot loop discipline**: one pass, one stack array of counters, no allocation
//     per pixel. The only heap work is building the small result once the scan ends.

use crate::core_modules::classifier::{ClassThresholds, MAX_CLASSES, classify};
use crate::core_modules::pixel::{Pixel, RGBA_STRIDE};
use crate::error::CoreError;

/// Coverage of a single class in one frame.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassShare {
    pub name: String,
    /// Percentage of the frame's pixels matching the class, [0, 100].
    pub percentage: f64,
}

/// Per-class coverage for one frame, in the rule order of the thresholds that produced it.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FrameStats {
    shares: Vec<ClassShare>,
    pixel_count: u64,
}

impl FrameStats {
    /// Builds stats directly from percentages, for feeding the alarm from
    /// somewhere other than a scanned frame. The pixel count is left at zero.
    pub fn from_percentages<I, S>(percentages: I) -> Self
    where
        I: IntoIterator<Item = (S, f64)>,
        S: Into<String>,
    {
        Self {
            shares: percentages
                .into_iter()
                .map(|(name, percentage)| ClassShare { name: name.into(), percentage })
                .collect(),
            pixel_count: 0,
        }
    }

    pub fn percentage(&self, class: &str) -> Option<f64> {
        self.shares.iter().find(|share| share.name == class).map(|share| share.percentage)
    }

    pub fn shares(&self) -> &[ClassShare] {
        &self.shares
    }

    /// Number of pixels scanned to produce these stats.
    pub fn pixel_count(&self) -> u64 {
        self.pixel_count
    }
}

/// Aggregates an interleaved RGBA buffer.
pub fn aggregate(
    frame_buffer: &[u8],
    thresholds: &ClassThresholds,
) -> Result<FrameStats, CoreError> {
    aggregate_with_stride(frame_buffer, RGBA_STRIDE, thresholds)
}

/// Aggregates a buffer of `stride`-byte channel tuples whose first three bytes are R, G, B.
/// A trailing partial tuple is ignored.
pub fn aggregate_with_stride(
    frame_buffer: &[u8],
    stride: usize,
    thresholds: &ClassThresholds,
) -> Result<FrameStats, CoreError> {
    if stride < 3 {
        return Err(CoreError::InvalidStride(stride));
    }
    let pixel_count = frame_buffer.len() / stride;
    if pixel_count == 0 {
        return Err(CoreError::EmptyFrame);
    }

    let mut counts = [0u64; MAX_CLASSES];
    for tuple in frame_buffer.chunks_exact(stride) {
        let matched = classify(&Pixel::from_tuple(tuple), thresholds);
        for index in matched.iter() {
            counts[index] += 1;
        }
    }

    let total = pixel_count as f64;
    let shares = thresholds
        .rules()
        .iter()
        .zip(counts.iter())
        .map(|(rule, &count)| ClassShare {
            name: rule.name.clone(),
            percentage: 100.0 * count as f64 / total,
        })
        .collect();

    Ok(FrameStats { shares, pixel_count: pixel_count as u64 })
}
