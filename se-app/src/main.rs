//! soundengine - command line demo
//!
//! Records from the default input for a few seconds, beeps, then plays the
//! take back through the default output.
//!
//! ```text
//! soundengine                  record, beep, play back
//! soundengine --save take.wav  also save the recording
//! soundengine --load take.wav  play back a saved recording instead
//! soundengine --devices        list audio devices
//! soundengine --write-options  write the options file with current values
//! soundengine --option sample_rate=48000 --option buffer_size=512
//!                              override options-file values for this run
//! ```

use std::env;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use crossbeam_channel::RecvTimeoutError;
use tracing_subscriber::EnvFilter;

use se_audio::{
    AudioDriver, BeepOptions, CpalDriver, Engine, EngineCommand, EngineEvent, EngineHandle,
    EngineSnapshot, HostEvent,
};

/// How long the demo records for
const RECORD_TIME: Duration = Duration::from_secs(5);

/// Upper bound on playback before giving up
const PLAYBACK_TIMEOUT: Duration = Duration::from_secs(60);

struct Args {
    devices: bool,
    write_options: bool,
    save: Option<PathBuf>,
    load: Option<PathBuf>,
    /// `key=value` lines in options-file syntax
    overrides: Vec<String>,
}

fn parse_args() -> anyhow::Result<Args> {
    let mut args = Args {
        devices: false,
        write_options: false,
        save: None,
        load: None,
        overrides: Vec::new(),
    };
    let mut iter = env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--devices" => args.devices = true,
            "--write-options" => args.write_options = true,
            "--save" => args.save = Some(iter.next().context("--save needs a path")?.into()),
            "--load" => args.load = Some(iter.next().context("--load needs a path")?.into()),
            "--option" => args
                .overrides
                .push(iter.next().context("--option needs key=value")?),
            other => bail!("unknown argument '{}'", other),
        }
    }
    Ok(args)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = parse_args()?;
    if args.devices {
        return list_devices();
    }

    let overrides = se_library::parse_options(&args.overrides.join("\n"));
    if !overrides.is_empty() {
        tracing::info!("Command line overrides: {:?}", overrides);
    }
    let patch = se_library::load_options().merge(overrides);
    let mut engine = EngineHandle::spawn(move || Engine::new(Box::new(CpalDriver::new()), Some(patch)))
        .context("failed to start audio engine")?;

    let result = run_demo(&engine, &args);
    let last_state = engine
        .events()
        .try_iter()
        .filter_map(|e| match e {
            HostEvent::State(snapshot) => Some(snapshot),
            _ => None,
        })
        .last();
    engine.shutdown();

    if args.write_options {
        if let Some(snapshot) = last_state {
            se_library::save_options(&snapshot.options)
                .with_context(|| format!("failed to write {}", se_library::options_path().display()))?;
            println!("Options written to {}", se_library::options_path().display());
        }
    }
    result
}

fn run_demo(engine: &EngineHandle, args: &Args) -> anyhow::Result<()> {
    match &args.load {
        Some(path) => {
            engine.send(EngineCommand::LoadRecording(path.clone()));
            wait_for(engine, Duration::from_secs(5), |e| {
                matches!(e, EngineEvent::RecordingLoaded)
            })?;
        }
        None => {
            println!("Recording for {} seconds...", RECORD_TIME.as_secs());
            engine.send(EngineCommand::StartRecording);
            wait_for(engine, RECORD_TIME, |_| false)?;
            engine.send(EngineCommand::StopRecording);
        }
    }

    engine.send(EngineCommand::Beep(BeepOptions::default()));
    wait_for(engine, Duration::from_secs(1), |e| matches!(e, EngineEvent::BeepStopped))?;

    if let Some(path) = &args.save {
        engine.send(EngineCommand::SaveRecording(path.clone()));
        wait_for(engine, Duration::from_secs(5), |e| {
            matches!(e, EngineEvent::RecordingSaved)
        })?;
        println!("Saved to {}", path.display());
    }

    println!("Playing back...");
    engine.send(EngineCommand::StartPlayback);
    let finished = wait_for(engine, PLAYBACK_TIMEOUT, |e| {
        matches!(e, EngineEvent::PlaybackFinished)
    })?;
    if !finished {
        tracing::warn!("Playback did not finish within {:?}", PLAYBACK_TIMEOUT);
    }
    Ok(())
}

/// Print host events until `done` matches one or `timeout` passes
///
/// Returns whether `done` matched. A failed command aborts the demo.
fn wait_for(
    engine: &EngineHandle,
    timeout: Duration,
    mut done: impl FnMut(&EngineEvent) -> bool,
) -> anyhow::Result<bool> {
    let deadline = Instant::now() + timeout;
    let mut peak = 0.0f32;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let event = match engine.events().recv_timeout(remaining) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return Ok(false),
            Err(RecvTimeoutError::Disconnected) => bail!("audio engine stopped unexpectedly"),
        };

        match event {
            HostEvent::Failed { operation, message } => bail!("{} failed: {}", operation, message),
            HostEvent::State(snapshot) => report_state(&snapshot, &mut peak),
            HostEvent::SampleAt { .. } | HostEvent::Devices(_) => {}
            HostEvent::Event(EngineEvent::Info(peaks)) => {
                let level = peaks
                    .max
                    .iter()
                    .chain(peaks.min.iter())
                    .fold(0.0f32, |acc, s| acc.max(s.abs()));
                peak = peak.max(level);
            }
            HostEvent::Event(event) => {
                if !matches!(
                    event,
                    EngineEvent::RecordingProgress | EngineEvent::PlaybackProgress(_)
                ) {
                    tracing::info!("{}", event.kind());
                }
                if done(&event) {
                    return Ok(true);
                }
            }
        }
    }
}

fn report_state(snapshot: &EngineSnapshot, peak: &mut f32) {
    if snapshot.playing {
        tracing::debug!(
            "playing {:>5.1}%  peak {:.3}",
            snapshot.playback_progress * 100.0,
            peak
        );
    } else if snapshot.recording {
        tracing::debug!("recording {} samples  peak {:.3}", snapshot.sample_count, peak);
    }
    *peak = 0.0;
}

fn list_devices() -> anyhow::Result<()> {
    let driver = CpalDriver::new();
    let devices = driver.devices().context("failed to enumerate audio devices")?;
    let default_in = driver.default_input_device();
    let default_out = driver.default_output_device();

    println!(
        "{:>3}  {:<8} {:>4} {:>4} {:>8}  {:>15}  {:>15}  name",
        "id", "host", "in", "out", "rate", "in latency ms", "out latency ms"
    );
    for device in devices {
        let mark = match (Some(device.id) == default_in, Some(device.id) == default_out) {
            (true, true) => " (default in/out)",
            (true, false) => " (default in)",
            (false, true) => " (default out)",
            (false, false) => "",
        };
        println!(
            "{:>3}  {:<8} {:>4} {:>4} {:>8.0}  {:>6.1} - {:>6.1}  {:>6.1} - {:>6.1}  {}{}",
            device.id,
            device.host_api,
            device.max_input_channels,
            device.max_output_channels,
            device.default_sample_rate,
            device.default_low_input_latency * 1000.0,
            device.default_high_input_latency * 1000.0,
            device.default_low_output_latency * 1000.0,
            device.default_high_output_latency * 1000.0,
            device.name,
            mark
        );
    }
    Ok(())
}
