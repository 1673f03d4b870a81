use chroma_watch::{PlaybackOutcome, PlaybackSink};
use log::{info, warn};
use std::path::PathBuf;

/// Stands in for a speaker: reports alarm playback through the log instead of audio.
pub struct LogPlaybackSink {
    alarm_file: Option<PathBuf>,
    playing: bool,
    starts: u32,
}

impl LogPlaybackSink {
    pub fn new(alarm_file: Option<PathBuf>) -> Self {
        let alarm_file = alarm_file.filter(|path| {
            let exists = path.is_file();
            if !exists {
                warn!("alarm file {} not found, alarm will be silent", path.display());
            }
            exists
        });
        Self { alarm_file, playing: false, starts: 0 }
    }

    pub fn has_alarm(&self) -> bool {
        self.alarm_file.is_some()
    }

    pub fn starts(&self) -> u32 {
        self.starts
    }
}

impl PlaybackSink for LogPlaybackSink {
    fn start_looping_playback(&mut self) -> PlaybackOutcome {
        let Some(path) = &self.alarm_file else {
            return PlaybackOutcome::NoAlarmLoaded;
        };
        if !self.playing {
            info!("looping alarm sound {}", path.display());
            self.playing = true;
            self.starts += 1;
        }
        PlaybackOutcome::Started
    }

    fn stop_playback(&mut self) {
        if self.playing {
            info!("alarm sound stopped");
        }
        self.playing = false;
    }

    fn alarm_loaded(&self) -> bool {
        self.has_alarm()
    }
}
