//! Audio engine for soundengine - real-time exchange, transport, and events
//!
//! This module provides the capture/playback pipeline:
//! - Exchange: SPSC buffer hand-off between the driver callback and the host thread
//! - Driver: cpal streams, plus a manually pumped driver for tests and headless use
//! - Transport: recording into and playback from an in-memory store
//! - Beep: injected sine tone with a wall-clock deadline
//! - Events: named engine events and data hooks
//! - Engine: the processing loop and command surface
//! - Handle: the engine on its own host thread, driven over channels

mod beep;
mod buffer;
pub mod driver;
mod effects;
mod engine;
mod error;
mod events;
mod exchange;
mod handle;
mod recording;
mod transport;

pub use beep::{Beep, BeepOptions, DEFAULT_BEEP_DURATION_MS, DEFAULT_BEEP_FREQUENCY, DEFAULT_BEEP_LEVEL};
pub use buffer::AudioBuffer;
pub use driver::{AudioDriver, CpalDriver, DeviceInfo, DriverError, DriverStream, ManualDriver, ManualDriverHandle};
pub use effects::{apply_damping, apply_damping_planar};
pub use engine::{Engine, EngineSnapshot, PROCESSING_INTERVAL};
pub use error::{EngineError, EventError, HookError};
pub use events::{EngineEvent, EventBus, EventKind, ListenerId};
pub use exchange::{exchange, BufferExchange, ExchangeStats, HardwareBridge, DEFAULT_QUEUE_CAPACITY};
pub use handle::{EngineCommand, EngineHandle, HostEvent};
pub use recording::{PlaybackCursor, RecordingStore};
pub use transport::Transport;
