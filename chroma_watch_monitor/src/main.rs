mod sink;

use anyhow::Context;
use chroma_watch::{
    AlarmPipeline, ImageSequenceSource, Monitor, MonitorSettings, Readout, StatusSnapshot,
};
use log::info;
use sink::LogPlaybackSink;
use std::env;
use std::io::IsTerminal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // --- 1. Argument Parsing & Setup ---
    let args: Vec<String> = env::args().collect();
    if args.len() < 2 {
        println!("Usage: chroma_watch_monitor <frames_dir> [settings.json]");
        return Ok(());
    }
    let frames_dir = &args[1];

    let mut settings = match args.get(2) {
        Some(path) => MonitorSettings::load(path)
            .with_context(|| format!("loading settings from {path}"))?,
        None => MonitorSettings::default(),
    };
    // Tick override from env, like the other knobs.
    if let Ok(tick) = env::var("CW_TICK_MS") {
        settings.tick_interval_ms = tick
            .parse()
            .with_context(|| format!("CW_TICK_MS={tick} is not a number"))?;
        settings.validate()?;
    }

    // --- 2. Collaborators ---
    let source = ImageSequenceSource::from_dir(frames_dir, settings.loop_frames)
        .with_context(|| format!("opening frames in {frames_dir}"))?;
    info!("{} frames in {frames_dir}", source.len());

    let sink = LogPlaybackSink::new(settings.alarm_file.clone());

    // --- 3. Pipeline & Monitor ---
    let config = settings.threshold_config();
    info!("using threshold profile `{}`", config.name());
    let pipeline = AlarmPipeline::new(config, sink);
    let monitor = Monitor::new(pipeline, source, settings.tick_interval())?;
    let (handle, mut task) = monitor.spawn();

    // --- 4. Status Display ---
    let colored = std::io::stdout().is_terminal();
    let mut status = handle.subscribe();
    println!("{}", render(&status.borrow_and_update(), colored));
    let printer = tokio::spawn(async move {
        while status.changed().await.is_ok() {
            let line = render(&status.borrow_and_update(), colored);
            println!("{line}");
        }
    });

    // --- 5. Run Until Ctrl-C Or End Of Frames ---
    let finished = tokio::select! {
        result = &mut task => Some(result?),
        signal = tokio::signal::ctrl_c() => {
            signal.context("listening for Ctrl-C")?;
            None
        }
    };
    let pipeline = match finished {
        Some(pipeline) => pipeline,
        None => {
            info!("Ctrl-C received, stopping");
            handle.stop();
            task.await?
        }
    };
    drop(handle);
    printer.await.ok();

    println!(
        "Monitoring complete: {} frames, alarm started {} times.",
        pipeline.frames_processed(),
        pipeline.sink().starts()
    );
    Ok(())
}

/// One status line, prefixed with a tinted swatch per class when printing to a terminal.
fn render(snapshot: &StatusSnapshot, colored: bool) -> String {
    if !colored {
        return snapshot.to_string();
    }
    let swatches: String = snapshot.readouts.iter().map(swatch).collect();
    format!("{swatches} {snapshot}")
}

/// A two-cell ANSI truecolor block tinted by the class's coverage.
fn swatch(readout: &Readout) -> String {
    let level = readout.intensity();
    let (red, green, blue) = match readout.class.as_str() {
        "red" => (level, 0, 0),
        "green" => (0, level, 0),
        "blue" => (0, 0, level),
        _ => (level, level, level),
    };
    format!("\x1b[48;2;{red};{green};{blue}m  \x1b[0m")
}
