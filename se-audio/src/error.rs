//! Engine error types

use crate::driver::DriverError;
use crate::events::{EventKind, ListenerId};
use se_library::WaveError;
use thiserror::Error;

/// Errors surfaced by engine operations
///
/// Soft failures (invalid transport transitions, out-of-range indices,
/// unknown window names) are logged instead and never show up here.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("{operation} failed: {source}")]
    Driver {
        operation: &'static str,
        #[source]
        source: DriverError,
    },

    #[error(transparent)]
    Wave(#[from] WaveError),

    #[error(transparent)]
    Event(#[from] EventError),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("engine has been shut down")]
    ShutDown,

    #[error("failed to start host thread: {0}")]
    HostThread(String),
}

impl EngineError {
    pub fn driver(operation: &'static str, source: DriverError) -> Self {
        Self::Driver { operation, source }
    }
}

/// Errors from listener registration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventError {
    #[error("unknown event '{0}'")]
    UnknownEvent(String),

    #[error("'{0}' listeners must be registered as data hooks")]
    WrongListenerKind(EventKind),
}

/// A data hook broke its contract by returning a buffer of another length
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("data hook {listener:?} returned {actual} samples, expected {expected}")]
pub struct HookError {
    pub listener: ListenerId,
    pub expected: usize,
    pub actual: usize,
}
