// THEORY:
// The `pipeline` module is the top-level API of the alarm engine. It wires the kernel
// layers into the single synchronous call chain that runs once per tick:
//
//   frame buffer → aggregate (classify every pixel) → evaluate alarm → signal playback
//
// The pipeline owns the `AlarmStateMachine` and the playback collaborator. It never
// blocks, never spawns and never retries on its own. Errors go straight back to the
// caller of `process_frame`; playback trouble stays inside the sink and is at most
// remembered as a pending retry for the next user gesture.

use crate::config::ThresholdConfig;
use crate::core_modules::alarm::AlarmStateMachine;
use crate::core_modules::frame_aggregator::aggregate;
use crate::error::CoreError;
use crate::frame_source::Frame;
use crate::status::{StatusLine, StatusSnapshot, readouts};
use log::{debug, info, warn};

// Re-export key data structures for the public API.
pub use crate::core_modules::alarm::{AlarmState, PlaybackSignal};
pub use crate::core_modules::frame_aggregator::{ClassShare, FrameStats};

/// What the playback collaborator made of a start request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackOutcome {
    Started,
    /// The platform refused to start audio without a user gesture.
    Blocked,
    /// No alarm sound has been provided yet.
    NoAlarmLoaded,
}

/// The audio side of the alarm. Implementations own every decode, device and
/// permission failure; none of them surface as core errors.
pub trait PlaybackSink {
    fn start_looping_playback(&mut self) -> PlaybackOutcome;
    fn stop_playback(&mut self);

    /// Whether an alarm sound is ready to play.
    fn alarm_loaded(&self) -> bool {
        true
    }
}

impl<T: PlaybackSink + ?Sized> PlaybackSink for Box<T> {
    fn start_looping_playback(&mut self) -> PlaybackOutcome {
        (**self).start_looping_playback()
    }

    fn stop_playback(&mut self) {
        (**self).stop_playback()
    }

    fn alarm_loaded(&self) -> bool {
        (**self).alarm_loaded()
    }
}

/// The result of processing a single frame.
#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub stats: FrameStats,
    pub state: AlarmState,
    /// The signal sent to the playback sink on this tick, if any.
    pub signal: Option<PlaybackSignal>,
}

/// The main, top-level struct for the alarm engine.
pub struct AlarmPipeline<P> {
    config: ThresholdConfig,
    alarm: AlarmStateMachine,
    sink: P,
    running: bool,
    /// Set when the sink reported `Blocked`; cleared by a successful start or any stop.
    retry_pending: bool,
    last_stats: Option<FrameStats>,
    frames_processed: u64,
}

impl<P: PlaybackSink> AlarmPipeline<P> {
    pub fn new(config: ThresholdConfig, sink: P) -> Self {
        let alarm = AlarmStateMachine::new(config.trigger().clone(), config.signal_policy());
        Self {
            config,
            alarm,
            sink,
            running: true,
            retry_pending: false,
            last_stats: None,
            frames_processed: 0,
        }
    }

    /// Runs one tick over an interleaved RGBA buffer.
    pub fn process_frame(&mut self, frame_buffer: &[u8]) -> Result<FrameReport, CoreError> {
        if !self.running {
            return Err(CoreError::Halted);
        }

        // Stage 1: Aggregation
        let stats = aggregate(frame_buffer, self.config.thresholds())?;
        debug!(
            "frame {}: {}",
            self.frames_processed,
            stats
                .shares()
                .iter()
                .map(|share| format!("{}={:.2}%", share.name, share.percentage))
                .collect::<Vec<_>>()
                .join(" ")
        );

        // Stage 2: Alarm evaluation
        let signal = self.alarm.evaluate(&stats);

        // Stage 3: Playback side effects
        if let Some(signal) = signal {
            self.dispatch(signal);
        }

        self.frames_processed += 1;
        self.last_stats = Some(stats.clone());
        Ok(FrameReport { stats, state: self.alarm.state(), signal })
    }

    pub fn process(&mut self, frame: &Frame) -> Result<FrameReport, CoreError> {
        self.process_frame(frame.data())
    }

    fn dispatch(&mut self, signal: PlaybackSignal) {
        match signal {
            PlaybackSignal::Start => match self.sink.start_looping_playback() {
                PlaybackOutcome::Started => self.retry_pending = false,
                PlaybackOutcome::Blocked => {
                    warn!("alarm playback blocked, waiting for a user gesture to retry");
                    self.retry_pending = true;
                }
                PlaybackOutcome::NoAlarmLoaded => {
                    warn!("alarm is active but no alarm sound is loaded");
                }
            },
            PlaybackSignal::Stop => {
                self.retry_pending = false;
                self.sink.stop_playback();
            }
        }
    }

    /// Re-issues a start that the sink reported as blocked. Call this from the
    /// collaborator's user-gesture handler. Does nothing unless the alarm is still
    /// active and the last start attempt was blocked.
    pub fn retry_playback(&mut self) -> Option<PlaybackOutcome> {
        if !self.running || !self.retry_pending || self.alarm.state() != AlarmState::Active {
            return None;
        }
        let outcome = self.sink.start_looping_playback();
        self.retry_pending = outcome == PlaybackOutcome::Blocked;
        Some(outcome)
    }

    /// Halts tick processing and silences the alarm. Safe to call repeatedly: only the
    /// first call on an active alarm reaches the sink.
    pub fn stop(&mut self) {
        if let Some(signal) = self.alarm.reset() {
            self.dispatch(signal);
        }
        if self.running {
            info!("pipeline stopped after {} frames", self.frames_processed);
        }
        self.running = false;
        self.retry_pending = false;
    }

    /// Re-arms a stopped pipeline. The alarm starts out silent.
    pub fn start(&mut self) {
        if !self.running {
            info!("pipeline started with profile `{}`", self.config.name());
        }
        self.running = true;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn state(&self) -> AlarmState {
        self.alarm.state()
    }

    pub fn is_retry_pending(&self) -> bool {
        self.retry_pending
    }

    pub fn config(&self) -> &ThresholdConfig {
        &self.config
    }

    pub fn last_stats(&self) -> Option<&FrameStats> {
        self.last_stats.as_ref()
    }

    pub fn frames_processed(&self) -> u64 {
        self.frames_processed
    }

    pub fn sink(&self) -> &P {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut P {
        &mut self.sink
    }

    pub fn into_sink(self) -> P {
        self.sink
    }

    pub fn snapshot(&self) -> StatusSnapshot {
        let line = match (self.running, self.alarm.state()) {
            (false, _) => StatusLine::Stopped,
            (true, AlarmState::Active) => StatusLine::Alarm,
            // Nothing sampled yet.
            (true, AlarmState::Silent) if self.frames_processed == 0 => {
                if self.sink.alarm_loaded() { StatusLine::AlarmReady } else { StatusLine::Idle }
            }
            (true, AlarmState::Silent) => StatusLine::Monitoring,
        };
        StatusSnapshot {
            state: self.alarm.state(),
            line,
            readouts: self
                .last_stats
                .as_ref()
                .map(|stats| readouts(stats, self.config.trigger()))
                .unwrap_or_default(),
            frames_processed: self.frames_processed,
        }
    }
}
