//! Engine event names, payloads, and the listener registry
//!
//! Notification listeners receive an `EngineEvent`; `data` listeners are
//! hooks that get the processed buffer and return its replacement. Listeners
//! run in registration order, prepended ones first. `once` listeners are
//! removed right after their first call.

use crate::error::{EventError, HookError};
use se_analysis::PeakInfo;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Data,
    Info,
    Fft,
    PlaybackStarted,
    PlaybackStopped,
    PlaybackPaused,
    PlaybackFinished,
    PlaybackProgress,
    RecordingStarted,
    RecordingStopped,
    RecordingSaved,
    RecordingDeleted,
    RecordingLoaded,
    RecordingProgress,
    BeepStarted,
    BeepStopped,
    Error,
}

impl EventKind {
    pub const ALL: [EventKind; 17] = [
        EventKind::Data,
        EventKind::Info,
        EventKind::Fft,
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

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Data => "data",
            EventKind::Info => "info",
            EventKind::Fft => "fft",
            EventKind::PlaybackStarted => "playback_started",
            EventKind::PlaybackStopped => "playback_stopped",
            EventKind::PlaybackPaused => "playback_paused",
            EventKind::PlaybackFinished => "playback_finished",
            EventKind::PlaybackProgress => "playback_progress",
            EventKind::RecordingStarted => "recording_started",
            EventKind::RecordingStopped => "recording_stopped",
            EventKind::RecordingSaved => "recording_saved",
            EventKind::RecordingDeleted => "recording_deleted",
            EventKind::RecordingLoaded => "recording_loaded",
            EventKind::RecordingProgress => "recording_progress",
            EventKind::BeepStarted => "beep_started",
            EventKind::BeepStopped => "beep_stopped",
            EventKind::Error => "error",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .iter()
            .copied()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| EventError::UnknownEvent(s.to_string()))
    }
}

/// Events emitted by the engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Per-channel extremes of the processed buffer
    Info(PeakInfo),
    /// Magnitude spectrum of one analysis window
    Fft(Vec<f32>),
    PlaybackStarted,
    PlaybackStopped,
    PlaybackPaused,
    PlaybackFinished,
    /// Fraction of the recording played so far
    PlaybackProgress(f64),
    RecordingStarted,
    RecordingStopped,
    RecordingSaved,
    RecordingDeleted,
    RecordingLoaded,
    RecordingProgress,
    BeepStarted,
    BeepStopped,
    Error(HookError),
}

impl EngineEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            EngineEvent::Info(_) => EventKind::Info,
            EngineEvent::Fft(_) => EventKind::Fft,
            EngineEvent::PlaybackStarted => EventKind::PlaybackStarted,
            EngineEvent::PlaybackStopped => EventKind::PlaybackStopped,
            EngineEvent::PlaybackPaused => EventKind::PlaybackPaused,
            EngineEvent::PlaybackFinished => EventKind::PlaybackFinished,
            EngineEvent::PlaybackProgress(_) => EventKind::PlaybackProgress,
            EngineEvent::RecordingStarted => EventKind::RecordingStarted,
            EngineEvent::RecordingStopped => EventKind::RecordingStopped,
            EngineEvent::RecordingSaved => EventKind::RecordingSaved,
            EngineEvent::RecordingDeleted => EventKind::RecordingDeleted,
            EngineEvent::RecordingLoaded => EventKind::RecordingLoaded,
            EngineEvent::RecordingProgress => EventKind::RecordingProgress,
            EngineEvent::BeepStarted => EventKind::BeepStarted,
            EngineEvent::BeepStopped => EventKind::BeepStopped,
            EngineEvent::Error(_) => EventKind::Error,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

pub type Listener = Box<dyn FnMut(&EngineEvent)>;
pub type DataHook = Box<dyn FnMut(&[f32]) -> Vec<f32>>;

struct Entry<F> {
    id: ListenerId,
    once: bool,
    callback: F,
}

#[derive(Default)]
pub struct EventBus {
    next_id: u64,
    listeners: HashMap<EventKind, Vec<Entry<Listener>>>,
    hooks: Vec<Entry<DataHook>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&mut self) -> ListenerId {
        self.next_id += 1;
        ListenerId(self.next_id)
    }

    fn register(
        &mut self,
        kind: EventKind,
        callback: Listener,
        once: bool,
        prepend: bool,
    ) -> Result<ListenerId, EventError> {
        if kind == EventKind::Data {
            return Err(EventError::WrongListenerKind(kind));
        }
        let id = self.next_id();
        let list = self.listeners.entry(kind).or_default();
        let entry = Entry { id, once, callback };
        if prepend {
            list.insert(0, entry);
        } else {
            list.push(entry);
        }
        Ok(id)
    }

    fn register_hook(&mut self, callback: DataHook, once: bool, prepend: bool) -> ListenerId {
        let id = self.next_id();
        let entry = Entry { id, once, callback };
        if prepend {
            self.hooks.insert(0, entry);
        } else {
            self.hooks.push(entry);
        }
        id
    }

    pub fn on(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.register(kind, Box::new(listener), false, false)
    }

    pub fn once(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.register(kind, Box::new(listener), true, false)
    }

    pub fn prepend(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.register(kind, Box::new(listener), false, true)
    }

    pub fn prepend_once(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.register(kind, Box::new(listener), true, true)
    }

    pub fn on_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.register_hook(Box::new(hook), false, false)
    }

    pub fn once_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.register_hook(Box::new(hook), true, false)
    }

    pub fn prepend_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.register_hook(Box::new(hook), false, true)
    }

    /// Remove one listener or hook; returns whether it was registered
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.hooks.len();
        self.hooks.retain(|e| e.id != id);
        if self.hooks.len() != before {
            return true;
        }
        for list in self.listeners.values_mut() {
            let before = list.len();
            list.retain(|e| e.id != id);
            if list.len() != before {
                return true;
            }
        }
        false
    }

    /// Remove every listener of `kind`, or all listeners when `None`
    pub fn remove_all_listeners(&mut self, kind: Option<EventKind>) {
        match kind {
            Some(EventKind::Data) => self.hooks.clear(),
            Some(kind) => {
                self.listeners.remove(&kind);
            }
            None => {
                self.hooks.clear();
                self.listeners.clear();
            }
        }
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        match kind {
            EventKind::Data => self.hooks.len(),
            kind => self.listeners.get(&kind).map_or(0, Vec::len),
        }
    }

    pub fn has_listeners(&self, kind: EventKind) -> bool {
        self.listener_count(kind) > 0
    }

    /// Events with at least one listener
    pub fn event_names(&self) -> Vec<EventKind> {
        EventKind::ALL
            .iter()
            .copied()
            .filter(|&kind| self.has_listeners(kind))
            .collect()
    }

    pub fn emit(&mut self, event: &EngineEvent) {
        if let Some(list) = self.listeners.get_mut(&event.kind()) {
            list.retain_mut(|entry| {
                (entry.callback)(event);
                !entry.once
            });
        }
    }

    /// Pass `buffer` through every data hook in order
    ///
    /// A hook whose result has the wrong length is skipped; the buffer keeps
    /// the output of the hooks before it.
    pub fn run_hooks(&mut self, buffer: &mut [f32]) -> Vec<HookError> {
        let mut errors = Vec::new();
        self.hooks.retain_mut(|entry| {
            let replacement = (entry.callback)(buffer);
            if replacement.len() == buffer.len() {
                buffer.copy_from_slice(&replacement);
            } else {
                errors.push(HookError {
                    listener: entry.id,
                    expected: buffer.len(),
                    actual: replacement.len(),
                });
            }
            !entry.once
        });
        errors
    }
}
