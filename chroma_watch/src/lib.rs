// THEORY:
// This file is the main entry point for the `chroma_watch` library crate.
// It defines the public API exposed to the binaries and to any other host that
// owns a camera, a speaker and a display.
//
// The primary exports are `AlarmPipeline` (the synchronous per-frame kernel) and
// `Monitor` (the tokio tick driver around it), together with `ThresholdConfig` and
// `MonitorSettings`. The kernel itself lives in `core_modules`: color conversion,
// pixel classification, frame aggregation and the alarm state machine. Everything
// in there is pure and allocation-light, so hosts can also call it directly.

pub mod config;
pub mod core_modules;
pub mod error;
pub mod frame_source;
pub mod monitor;
pub mod pipeline;
pub mod status;

pub use config::{ConfigError, MonitorSettings, ProfileChoice, ThresholdConfig, Variant};
pub use error::CoreError;
pub use frame_source::{Frame, FrameSource, ImageSequenceSource, SourceError};
pub use monitor::{Monitor, MonitorHandle};
pub use pipeline::{
    AlarmPipeline, AlarmState, FrameReport, PlaybackOutcome, PlaybackSignal, PlaybackSink,
};
pub use status::{Readout, StatusLine, StatusSnapshot};
