//! Audio driver abstraction
//!
//! A driver opens a stream for a `StreamConfig` and calls into the shared
//! `HardwareBridge` once per period from its real-time context. The bridge
//! sits behind a `parking_lot::Mutex`; the real-time side may only
//! `try_lock` it and must output silence when the lock is taken.

mod cpal_driver;
mod manual;

pub use cpal_driver::CpalDriver;
pub use manual::{ManualDriver, ManualDriverHandle};

use crate::exchange::HardwareBridge;
use parking_lot::Mutex;
use se_library::StreamConfig;
use std::sync::Arc;
use thiserror::Error;

/// The bridge as shared between the host thread and the driver callback
pub type SharedBridge = Arc<Mutex<HardwareBridge>>;

/// Errors that can occur during driver operations
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DriverError {
    #[error("Failed to enumerate audio devices: {0}")]
    Enumerate(String),

    #[error("Audio device not found: {0}")]
    DeviceNotFound(usize),

    #[error("No default {0} device available")]
    NoDefaultDevice(&'static str),

    #[error("Failed to open audio stream: {0}")]
    Open(String),

    #[error("Failed to start audio stream: {0}")]
    Start(String),

    #[error("Failed to stop audio stream: {0}")]
    Stop(String),
}

/// Device metadata as reported by the driver
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceInfo {
    pub id: usize,
    pub name: String,
    pub host_api: String,
    pub max_input_channels: u16,
    pub max_output_channels: u16,
    pub default_sample_rate: f64,
    /// Seconds
    pub default_low_input_latency: f64,
    pub default_low_output_latency: f64,
    pub default_high_input_latency: f64,
    pub default_high_output_latency: f64,
}

/// Source of audio streams
pub trait AudioDriver {
    fn name(&self) -> &str;

    fn devices(&self) -> Result<Vec<DeviceInfo>, DriverError>;

    fn default_input_device(&self) -> Option<usize>;

    fn default_output_device(&self) -> Option<usize>;

    /// Build a stream that drives `bridge`; it starts stopped
    fn open(
        &mut self,
        config: &StreamConfig,
        bridge: SharedBridge,
    ) -> Result<Box<dyn DriverStream>, DriverError>;
}

/// An open stream
pub trait DriverStream {
    fn start(&mut self) -> Result<(), DriverError>;

    fn stop(&mut self) -> Result<(), DriverError>;

    fn is_active(&self) -> bool;
}
