//! Threaded host for the engine
//!
//! The engine and its stream live on a dedicated host thread. Other threads
//! talk to it through bounded channels: commands in, events and periodic
//! state snapshots out.

use crate::beep::BeepOptions;
use crate::driver::DeviceInfo;
use crate::engine::{Engine, EngineSnapshot, PROCESSING_INTERVAL};
use crate::error::EngineError;
use crate::events::{EngineEvent, EventKind};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use se_library::OptionsPatch;
use std::path::PathBuf;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Headroom for command bursts and event backlogs
const CHANNEL_CAPACITY: usize = 1024;

/// Snapshot rate, ~30 per second
const STATE_INTERVAL: Duration = Duration::from_millis(33);

/// Events forwarded to the host; `fft` only runs when asked for
const FORWARDED: [EventKind; 15] = [
    EventKind::Info,
    EventKind::PlaybackStarted,
    EventKind::PlaybackStopped,
    EventKind::PlaybackPaused,
    EventKind::PlaybackFinished,
    EventKind::PlaybackProgress,
    EventKind::RecordingStarted,
    EventKind::RecordingStopped,
    EventKind::RecordingSaved,
    EventKind::RecordingDeleted,
    EventKind::RecordingLoaded,
    EventKind::RecordingProgress,
    EventKind::BeepStarted,
    EventKind::BeepStopped,
    EventKind::Error,
];

/// Commands sent to the host thread
#[derive(Debug, Clone)]
pub enum EngineCommand {
    StartPlayback,
    StopPlayback,
    PausePlayback,
    StartRecording,
    StopRecording,
    DeleteRecording,
    SaveRecording(PathBuf),
    LoadRecording(PathBuf),
    SetPlaybackProgress(f64),
    Beep(BeepOptions),
    SetVolume(f32),
    SetMute(bool),
    SetOptions(OptionsPatch),
    Synchronize,
    /// Answered with `HostEvent::SampleAt`
    RecordingSampleAt(usize),
    /// Answered with `HostEvent::Devices`
    ListDevices,
    Shutdown,
}

/// Messages from the host thread
#[derive(Debug, Clone)]
pub enum HostEvent {
    Event(EngineEvent),
    State(Box<EngineSnapshot>),
    SampleAt {
        index: usize,
        value: f32,
    },
    Devices(Vec<DeviceInfo>),
    /// A command hit a hard failure
    Failed {
        operation: &'static str,
        message: String,
    },
}

/// Handle to an engine running on its own thread
pub struct EngineHandle {
    command_tx: Sender<EngineCommand>,
    event_rx: Receiver<HostEvent>,
    thread: Option<JoinHandle<()>>,
}

impl EngineHandle {
    /// Start the host thread and build the engine on it
    ///
    /// Streams are created on the host thread since some backends can't move
    /// them across threads. Returns once the engine is running.
    pub fn spawn<F>(make_engine: F) -> Result<Self, EngineError>
    where
        F: FnOnce() -> Result<Engine, EngineError> + Send + 'static,
    {
        let (command_tx, command_rx) = bounded(CHANNEL_CAPACITY);
        let (event_tx, event_rx) = bounded(CHANNEL_CAPACITY);
        let (ready_tx, ready_rx) = bounded(1);

        let thread = thread::Builder::new()
            .name("soundengine-host".into())
            .spawn(move || {
                let mut engine = match make_engine() {
                    Ok(engine) => {
                        let _ = ready_tx.send(Ok(()));
                        engine
                    }
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                run_host_loop(&mut engine, command_rx, event_tx);
            })
            .map_err(|e| EngineError::HostThread(e.to_string()))?;

        match ready_rx.recv() {
            Ok(Ok(())) => Ok(Self {
                command_tx,
                event_rx,
                thread: Some(thread),
            }),
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                Err(EngineError::ShutDown)
            }
        }
    }

    /// Queue a command; returns false if the queue is full or the host is gone
    pub fn send(&self, command: EngineCommand) -> bool {
        self.command_tx.try_send(command).is_ok()
    }

    pub fn events(&self) -> &Receiver<HostEvent> {
        &self.event_rx
    }

    /// Stop the host thread and tear the engine down
    pub fn shutdown(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.command_tx.send(EngineCommand::Shutdown);
            if thread.join().is_err() {
                tracing::error!("Engine host thread panicked");
            }
        }
    }
}

impl Drop for EngineHandle {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_host_loop(engine: &mut Engine, commands: Receiver<EngineCommand>, events: Sender<HostEvent>) {
    for kind in FORWARDED {
        let tx = events.clone();
        let registered = engine.on(kind, move |event| {
            let _ = tx.try_send(HostEvent::Event(event.clone()));
        });
        if let Err(e) = registered {
            tracing::error!("Could not forward {}: {}", kind, e);
        }
    }

    let mut last_state = Instant::now();
    loop {
        match commands.recv_timeout(PROCESSING_INTERVAL) {
            Ok(EngineCommand::Shutdown) | Err(RecvTimeoutError::Disconnected) => break,
            Ok(command) => {
                if let Err((operation, e)) = apply(engine, command, &events) {
                    tracing::error!("{} failed: {}", operation, e);
                    let _ = events.try_send(HostEvent::Failed {
                        operation,
                        message: e.to_string(),
                    });
                }
            }
            Err(RecvTimeoutError::Timeout) => {}
        }

        engine.tick();

        if last_state.elapsed() >= STATE_INTERVAL {
            let _ = events.try_send(HostEvent::State(Box::new(engine.snapshot())));
            last_state = Instant::now();
        }
    }

    if let Err(e) = engine.shutdown() {
        let _ = events.try_send(HostEvent::Failed {
            operation: "shutdown",
            message: e.to_string(),
        });
    }
    tracing::info!("Engine host thread stopped");
}

fn apply(
    engine: &mut Engine,
    command: EngineCommand,
    events: &Sender<HostEvent>,
) -> Result<(), (&'static str, EngineError)> {
    match command {
        EngineCommand::StartPlayback => engine.start_playback(),
        EngineCommand::StopPlayback => engine.stop_playback(),
        EngineCommand::PausePlayback => engine.pause_playback(),
        EngineCommand::StartRecording => engine.start_recording(),
        EngineCommand::StopRecording => engine.stop_recording(),
        EngineCommand::DeleteRecording => engine.delete_recording(),
        EngineCommand::SaveRecording(path) => {
            engine.save_recording(&path).map_err(|e| ("save recording", e))?
        }
        EngineCommand::LoadRecording(path) => {
            engine.load_recording(&path).map_err(|e| ("load recording", e))?
        }
        EngineCommand::SetPlaybackProgress(progress) => {
            engine.set_playback_progress(progress);
        }
        EngineCommand::Beep(options) => engine.beep(options),
        EngineCommand::SetVolume(volume) => engine.set_volume(volume),
        EngineCommand::SetMute(muted) => engine.set_mute(muted),
        EngineCommand::SetOptions(patch) => {
            engine.set_options(&patch).map_err(|e| ("set options", e))?
        }
        EngineCommand::Synchronize => {
            engine.synchronize();
        }
        EngineCommand::RecordingSampleAt(index) => {
            let value = engine.recording_sample_at(index);
            let _ = events.try_send(HostEvent::SampleAt { index, value });
        }
        EngineCommand::ListDevices => {
            let devices = engine.devices().map_err(|e| ("enumerate devices", e))?;
            let _ = events.try_send(HostEvent::Devices(devices));
        }
        EngineCommand::Shutdown => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::driver::ManualDriver;

    const WAIT: Duration = Duration::from_secs(2);

    fn spawn_manual(buffer_size: usize) -> (EngineHandle, crate::driver::ManualDriverHandle) {
        let driver = ManualDriver::new();
        let pump = driver.handle();
        let handle = EngineHandle::spawn(move || {
            let patch = OptionsPatch {
                buffer_size: Some(buffer_size),
                ..Default::default()
            };
            Engine::new(Box::new(driver), Some(patch))
        })
        .unwrap();
        (handle, pump)
    }

    fn wait_for(handle: &EngineHandle, mut matches: impl FnMut(&HostEvent) -> bool) -> HostEvent {
        let deadline = Instant::now() + WAIT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            match handle.events().recv_timeout(remaining) {
                Ok(event) if matches(&event) => return event,
                Ok(_) => continue,
                Err(e) => panic!("no matching host event: {}", e),
            }
        }
    }

    #[test]
    fn test_commands_drive_engine() {
        let (mut handle, pump) = spawn_manual(8);
        assert!(handle.send(EngineCommand::StartRecording));
        wait_for(&handle, |e| {
            matches!(e, HostEvent::Event(EngineEvent::RecordingStarted))
        });

        pump.pump(Some(&[0.5; 8]), None);
        wait_for(&handle, |e| {
            matches!(e, HostEvent::Event(EngineEvent::RecordingProgress))
        });

        handle.send(EngineCommand::StopRecording);
        let state = wait_for(&handle, |e| {
            matches!(e, HostEvent::State(s) if !s.recording && s.sample_count == 8)
        });
        if let HostEvent::State(snapshot) = state {
            assert_eq!(snapshot.options.stream.buffer_size, 8);
        }

        handle.shutdown();
        assert!(!pump.is_active());
    }

    #[test]
    fn test_queries_are_answered() {
        let (handle, pump) = spawn_manual(4);
        handle.send(EngineCommand::StartRecording);
        wait_for(&handle, |e| {
            matches!(e, HostEvent::Event(EngineEvent::RecordingStarted))
        });
        pump.pump(Some(&[0.1, 0.2, 0.3, 0.4]), None);
        wait_for(&handle, |e| {
            matches!(e, HostEvent::Event(EngineEvent::RecordingProgress))
        });

        handle.send(EngineCommand::RecordingSampleAt(2));
        let answer = wait_for(&handle, |e| matches!(e, HostEvent::SampleAt { .. }));
        assert!(matches!(answer, HostEvent::SampleAt { index: 2, value } if value == 0.3));

        handle.send(EngineCommand::ListDevices);
        match wait_for(&handle, |e| matches!(e, HostEvent::Devices(_))) {
            HostEvent::Devices(devices) => {
                assert_eq!(devices.len(), 1);
                assert_eq!(devices[0].name, "Manual");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_failures_are_reported() {
        let (handle, _pump) = spawn_manual(8);
        let dir = tempfile::tempdir().unwrap();
        handle.send(EngineCommand::LoadRecording(dir.path().join("missing.wav")));

        let failed = wait_for(&handle, |e| matches!(e, HostEvent::Failed { .. }));
        match failed {
            HostEvent::Failed { operation, message } => {
                assert_eq!(operation, "load recording");
                assert!(message.contains("missing.wav"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_spawn_reports_construction_error() {
        let result = EngineHandle::spawn(|| {
            let patch = OptionsPatch {
                sample_rate: Some(0),
                ..Default::default()
            };
            Engine::new(Box::new(ManualDriver::new()), Some(patch))
        });
        assert!(matches!(result, Err(EngineError::InvalidOptions(_))));
    }
}
