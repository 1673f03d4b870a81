//! Read-only telemetry: what a display shows about the latest tick.

use crate::core_modules::alarm::{AlarmState, TriggerPredicate};
use crate::core_modules::frame_aggregator::FrameStats;
use crate::frame_source::SourceErrorKind;
use std::fmt;

/// One-line system status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusLine {
    #[default]
    Idle,
    AlarmReady,
    Monitoring,
    Alarm,
    Stopped,
    SourceFailed(SourceErrorKind),
}

impl fmt::Display for StatusLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StatusLine::Idle => f.write_str("idle"),
            StatusLine::AlarmReady => f.write_str("alarm sound ready"),
            StatusLine::Monitoring => f.write_str("monitoring"),
            StatusLine::Alarm => f.write_str("ALARM: disallowed color coverage detected"),
            StatusLine::Stopped => f.write_str("system stopped"),
            StatusLine::SourceFailed(kind) => {
                let reason = match kind {
                    SourceErrorKind::PermissionDenied => "access denied",
                    SourceErrorKind::NotFound => "camera not found",
                    SourceErrorKind::Exhausted => "no more frames",
                    SourceErrorKind::Decode => "unreadable frame",
                    SourceErrorKind::Other => "unknown error",
                };
                write!(f, "camera: {reason}")
            }
        }
    }
}

/// A class's coverage, formatted with enough decimals to resolve its trigger threshold.
#[derive(Debug, Clone, PartialEq)]
pub struct Readout {
    pub class: String,
    pub percentage: f64,
    pub decimals: usize,
}

impl Readout {
    /// Swatch intensity for this readout's coverage.
    pub fn intensity(&self) -> u8 {
        preview_intensity(self.percentage)
    }
}

impl fmt::Display for Readout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {:.*}%", self.class, self.decimals, self.percentage)
    }
}

/// Sub-percent thresholds need two decimals to be readable, everything else one.
pub fn decimals_for_threshold(threshold: f64) -> usize {
    if threshold < 1.0 { 2 } else { 1 }
}

/// Builds one readout per class in `stats`. A class referenced by several trigger
/// conditions takes the finest precision any of them needs.
pub fn readouts(stats: &FrameStats, trigger: &TriggerPredicate) -> Vec<Readout> {
    stats
        .shares()
        .iter()
        .map(|share| {
            let decimals = trigger
                .conditions
                .iter()
                .filter(|condition| condition.class == share.name)
                .map(|condition| decimals_for_threshold(condition.threshold))
                .max()
                .unwrap_or(1);
            Readout { class: share.name.clone(), percentage: share.percentage, decimals }
        })
        .collect()
}

/// Intensity for a swatch tinted by a class's coverage: 1% maps to 2.55, capped at 255.
pub fn preview_intensity(percentage: f64) -> u8 {
    (percentage * 2.55).clamp(0.0, 255.0) as u8
}

/// Everything a status display needs about the latest tick.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct StatusSnapshot {
    pub state: AlarmState,
    pub line: StatusLine,
    pub readouts: Vec<Readout>,
    pub frames_processed: u64,
}

impl fmt::Display for StatusSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.frames_processed, self.line)?;
        for readout in &self.readouts {
            write!(f, " | {readout}")?;
        }
        Ok(())
    }
}
