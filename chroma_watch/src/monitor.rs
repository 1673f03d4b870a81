// THEORY:
// The `monitor` is the tick driver around the synchronous pipeline. It runs on a tokio
// task that owns both the `AlarmPipeline` and the `FrameSource`, so no kernel state is
// ever shared between threads.
//
// Key architectural principles:
// 1.  **One frame at a time**: a `tokio::time::interval` paces the loop and missed
//     ticks are skipped, never queued, so two frames are never processed at once and
//     frames are handled in arrival order.
// 2.  **Single-producer handoff**: the latest `StatusSnapshot` is published through a
//     `watch` channel. Readers always see a whole snapshot, never a torn one.
// 3.  **Cooperative stop**: a second `watch` channel carries the stop request. The loop
//     checks it before every tick, then stops the pipeline (silencing an active alarm
//     exactly once) and hands the pipeline back through the task's `JoinHandle`.
// 4.  **Collaborator failures are not fatal**: a source error or a core error costs one
//     tick and a log line. Only an exhausted source ends the run on its own.

use crate::config::{ConfigError, MAX_TICK_INTERVAL_MS};
use crate::frame_source::{FrameSource, SourceError};
use crate::pipeline::{AlarmPipeline, PlaybackSink};
use crate::status::{StatusLine, StatusSnapshot};
use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

/// Control and telemetry for a spawned monitor. Dropping it also stops the monitor.
pub struct MonitorHandle {
    stop_tx: watch::Sender<bool>,
    status_rx: watch::Receiver<StatusSnapshot>,
}

impl MonitorHandle {
    /// Requests a stop. Idempotent; the monitor finishes its current tick first.
    pub fn stop(&self) {
        self.stop_tx.send_replace(true);
    }

    /// The most recently published status.
    pub fn status(&self) -> StatusSnapshot {
        self.status_rx.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusSnapshot> {
        self.status_rx.clone()
    }
}

pub struct Monitor<S, P> {
    pipeline: AlarmPipeline<P>,
    source: S,
    tick: Duration,
}

impl<S, P> Monitor<S, P>
where
    S: FrameSource + Send + 'static,
    P: PlaybackSink + Send + 'static,
{
    pub fn new(pipeline: AlarmPipeline<P>, source: S, tick: Duration) -> Result<Self, ConfigError> {
        let tick_ms = tick.as_millis();
        if tick.is_zero() || tick_ms > MAX_TICK_INTERVAL_MS as u128 {
            return Err(ConfigError::InvalidTickInterval(tick_ms.min(u64::MAX as u128) as u64));
        }
        Ok(Self { pipeline, source, tick })
    }

    /// Starts the tick loop on the current tokio runtime.
    pub fn spawn(self) -> (MonitorHandle, JoinHandle<AlarmPipeline<P>>) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let (status_tx, status_rx) = watch::channel(self.pipeline.snapshot());
        let task = tokio::spawn(self.run(stop_rx, status_tx));
        (MonitorHandle { stop_tx, status_rx }, task)
    }

    async fn run(
        mut self,
        mut stop_rx: watch::Receiver<bool>,
        status_tx: watch::Sender<StatusSnapshot>,
    ) -> AlarmPipeline<P> {
        let mut ticker = time::interval(self.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        info!("monitor running every {:?}", self.tick);

        loop {
            tokio::select! {
                biased;
                changed = stop_rx.changed() => {
                    // A dropped handle counts as a stop request.
                    if changed.is_err() || *stop_rx.borrow_and_update() {
                        info!("monitor stop requested");
                        break;
                    }
                }
                _ = ticker.tick() => {
                    if !self.tick_once(&status_tx) {
                        break;
                    }
                }
            }
        }

        self.pipeline.stop();
        status_tx.send_replace(self.pipeline.snapshot());
        self.pipeline
    }

    /// Returns false when the run should end.
    fn tick_once(&mut self, status_tx: &watch::Sender<StatusSnapshot>) -> bool {
        match self.source.next_frame() {
            Ok(Some(frame)) => {
                if let Err(error) = self.pipeline.process(&frame) {
                    warn!("frame skipped: {error}");
                }
                status_tx.send_replace(self.pipeline.snapshot());
            }
            Ok(None) => debug!("no frame ready this tick"),
            Err(SourceError::Exhausted) => {
                info!("frame source exhausted");
                return false;
            }
            Err(error) => {
                warn!("frame source failed: {error}");
                let mut snapshot = self.pipeline.snapshot();
                snapshot.line = StatusLine::SourceFailed(error.kind());
                status_tx.send_replace(snapshot);
            }
        }
        true
    }
}
