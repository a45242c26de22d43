//! Recording and playback state machine
//!
//! Recording and playing are independent flags kept mutually exclusive by
//! guarded transitions: a rejected transition logs a warning and changes
//! nothing. Each transition returns the event to emit, if any.

use crate::events::EngineEvent;
use crate::recording::{PlaybackCursor, RecordingStore};

#[derive(Debug, Clone)]
pub struct Transport {
    store: RecordingStore,
    cursor: PlaybackCursor,
    recording: bool,
    playing: bool,
}

impl Transport {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            store: RecordingStore::new(buffer_size),
            cursor: PlaybackCursor::default(),
            recording: false,
            playing: false,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.recording
    }

    pub fn is_playing(&self) -> bool {
        self.playing
    }

    pub fn store(&self) -> &RecordingStore {
        &self.store
    }

    pub fn sample_count(&self) -> usize {
        self.store.sample_count()
    }

    pub fn sample_at(&self, index: usize) -> f32 {
        self.store.sample_at(index)
    }

    /// Playback position in buffers
    pub fn position(&self) -> usize {
        self.cursor.position()
    }

    pub fn progress(&self) -> f64 {
        self.cursor.progress(self.store.len())
    }

    /// Move the cursor; values outside [0, 1] are rejected
    pub fn set_progress(&mut self, progress: f64) -> bool {
        if !(0.0..=1.0).contains(&progress) {
            tracing::warn!("Playback progress {} outside 0..1, ignoring", progress);
            return false;
        }
        self.cursor.set_progress(progress, self.store.len());
        true
    }

    pub fn start_playback(&mut self) -> Option<EngineEvent> {
        if self.recording {
            tracing::warn!("Cannot start playback while recording");
            return None;
        }
        self.playing = true;
        Some(EngineEvent::PlaybackStarted)
    }

    pub fn stop_playback(&mut self) -> Option<EngineEvent> {
        self.playing = false;
        self.cursor.reset();
        Some(EngineEvent::PlaybackStopped)
    }

    pub fn pause_playback(&mut self) -> Option<EngineEvent> {
        self.playing = false;
        Some(EngineEvent::PlaybackPaused)
    }

    pub fn start_recording(&mut self) -> Option<EngineEvent> {
        if self.playing {
            tracing::warn!("Cannot start recording while playing");
            return None;
        }
        if self.recording {
            tracing::warn!("Already recording");
            return None;
        }
        self.clear();
        self.recording = true;
        Some(EngineEvent::RecordingStarted)
    }

    pub fn stop_recording(&mut self) -> Option<EngineEvent> {
        if !self.recording {
            tracing::warn!("Cannot stop recording, not recording");
            return None;
        }
        self.recording = false;
        Some(EngineEvent::RecordingStopped)
    }

    pub fn delete_recording(&mut self) -> Option<EngineEvent> {
        self.clear();
        Some(EngineEvent::RecordingDeleted)
    }

    /// Replace the recording with decoded buffers
    pub fn load(&mut self, buffers: Vec<Vec<f32>>) -> Option<EngineEvent> {
        self.cursor.reset();
        self.store.replace(buffers);
        Some(EngineEvent::RecordingLoaded)
    }

    /// Re-slice the recording for a new buffer size and rewind
    pub fn rechunk(&mut self, buffer_size: usize) {
        self.store.rechunk(buffer_size);
        self.cursor.reset();
    }

    /// Apply one tick to the buffer taken from the intake
    ///
    /// Playback overwrites `buffer` with the next stored buffer; recording
    /// appends a copy of it.
    pub fn process(&mut self, buffer: &mut [f32]) -> Option<EngineEvent> {
        if self.playing {
            let count = self.store.len();
            let position = self.cursor.position();
            return match self.store.get(position) {
                Some(stored) => {
                    stored.copy_into(buffer);
                    self.cursor.advance();
                    Some(EngineEvent::PlaybackProgress(position as f64 / count as f64))
                }
                None => {
                    self.playing = false;
                    self.cursor.reset();
                    Some(EngineEvent::PlaybackFinished)
                }
            };
        }

        if self.recording {
            self.store.append(buffer);
            return Some(EngineEvent::RecordingProgress);
        }

        None
    }

    fn clear(&mut self) {
        self.store.clear();
        self.cursor.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recorded(buffers: usize, size: usize) -> Transport {
        let mut transport = Transport::new(size);
        transport.start_recording();
        for b in 0..buffers {
            let mut buffer = vec![b as f32; size];
            transport.process(&mut buffer);
        }
        transport.stop_recording();
        transport
    }

    #[test]
    fn test_recording_appends_copies() {
        let mut transport = Transport::new(4);
        assert_eq!(transport.start_recording(), Some(EngineEvent::RecordingStarted));

        let mut buffer = vec![0.5; 4];
        assert_eq!(transport.process(&mut buffer), Some(EngineEvent::RecordingProgress));
        buffer.fill(0.0);
        assert_eq!(transport.sample_count(), 4);
        assert_eq!(transport.sample_at(2), 0.5);

        assert_eq!(transport.stop_recording(), Some(EngineEvent::RecordingStopped));
        assert_eq!(transport.process(&mut buffer), None);
    }

    #[test]
    fn test_playback_walks_store_then_finishes() {
        let mut transport = recorded(2, 4);
        transport.start_playback();

        let mut buffer = vec![9.0; 4];
        assert_eq!(transport.process(&mut buffer), Some(EngineEvent::PlaybackProgress(0.0)));
        assert_eq!(buffer, vec![0.0; 4]);
        assert_eq!(transport.process(&mut buffer), Some(EngineEvent::PlaybackProgress(0.5)));
        assert_eq!(buffer, vec![1.0; 4]);
        assert_eq!(transport.position(), 2);

        assert_eq!(transport.process(&mut buffer), Some(EngineEvent::PlaybackFinished));
        assert!(!transport.is_playing());
        assert_eq!(transport.position(), 0);
    }

    #[test]
    fn test_empty_store_finishes_immediately() {
        let mut transport = Transport::new(4);
        transport.start_playback();
        assert_eq!(transport.process(&mut [0.0; 4]), Some(EngineEvent::PlaybackFinished));
    }

    #[test]
    fn test_pause_keeps_cursor_and_stop_rewinds() {
        let mut transport = recorded(4, 2);
        transport.start_playback();
        transport.process(&mut [0.0; 2]);
        transport.process(&mut [0.0; 2]);

        assert_eq!(transport.pause_playback(), Some(EngineEvent::PlaybackPaused));
        assert_eq!(transport.position(), 2);
        transport.start_playback();
        assert_eq!(transport.position(), 2);

        assert_eq!(transport.stop_playback(), Some(EngineEvent::PlaybackStopped));
        assert_eq!(transport.position(), 0);
        assert!(!transport.is_playing());
    }

    #[test]
    fn test_recording_rejected_while_playing() {
        let mut transport = recorded(3, 2);
        transport.start_playback();

        assert_eq!(transport.start_recording(), None);
        assert!(transport.is_playing());
        assert!(!transport.is_recording());
        assert_eq!(transport.sample_count(), 6);
    }

    #[test]
    fn test_playback_rejected_while_recording() {
        let mut transport = Transport::new(2);
        transport.start_recording();
        assert_eq!(transport.start_playback(), None);
        assert!(!transport.is_playing());
        assert_eq!(transport.start_recording(), None);
    }

    #[test]
    fn test_stop_recording_requires_recording() {
        let mut transport = Transport::new(2);
        assert_eq!(transport.stop_recording(), None);
    }

    #[test]
    fn test_start_recording_replaces_previous_take() {
        let mut transport = recorded(3, 2);
        transport.start_recording();
        assert_eq!(transport.sample_count(), 0);
    }

    #[test]
    fn test_progress_guard() {
        let mut transport = recorded(10, 2);
        assert!(transport.set_progress(0.35));
        assert_eq!(transport.position(), 3);
        assert!(!transport.set_progress(1.5));
        assert!(!transport.set_progress(f64::NAN));
        assert_eq!(transport.position(), 3);
    }

    #[test]
    fn test_delete_and_load_rewind() {
        let mut transport = recorded(4, 2);
        transport.set_progress(0.5);
        assert_eq!(transport.delete_recording(), Some(EngineEvent::RecordingDeleted));
        assert_eq!(transport.sample_count(), 0);
        assert_eq!(transport.position(), 0);

        assert_eq!(
            transport.load(vec![vec![1.0, 2.0], vec![3.0]]),
            Some(EngineEvent::RecordingLoaded)
        );
        assert_eq!(transport.sample_count(), 4);
        assert_eq!(transport.sample_at(3), 0.0);
    }
}
