//! Manually pumped driver
//!
//! Stands in for hardware in tests and headless hosts: nothing runs until
//! `ManualDriverHandle::pump` is called, which performs one driver period
//! the way a real-time callback would.

use super::{AudioDriver, DeviceInfo, DriverError, DriverStream, SharedBridge};
use parking_lot::Mutex;
use se_library::StreamConfig;
use std::sync::Arc;

#[derive(Default)]
struct ManualState {
    bridge: Option<SharedBridge>,
    config: Option<StreamConfig>,
    active: bool,
    opened: usize,
    devices: Vec<DeviceInfo>,
    fail_next: Option<DriverError>,
}

pub struct ManualDriver {
    state: Arc<Mutex<ManualState>>,
}

/// Cloneable control side of a `ManualDriver`
#[derive(Clone)]
pub struct ManualDriverHandle {
    state: Arc<Mutex<ManualState>>,
}

impl ManualDriver {
    pub fn new() -> Self {
        let device = DeviceInfo {
            id: 0,
            name: "Manual".to_string(),
            host_api: "manual".to_string(),
            max_input_channels: 2,
            max_output_channels: 2,
            default_sample_rate: 44100.0,
            default_low_input_latency: 0.0,
            default_low_output_latency: 0.0,
            default_high_input_latency: 0.0,
            default_high_output_latency: 0.0,
        };
        Self {
            state: Arc::new(Mutex::new(ManualState {
                devices: vec![device],
                ..Default::default()
            })),
        }
    }

    pub fn handle(&self) -> ManualDriverHandle {
        ManualDriverHandle {
            state: Arc::clone(&self.state),
        }
    }
}

impl Default for ManualDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualDriverHandle {
    /// Run one driver period; returns false when no stream is running
    pub fn pump(&self, input: Option<&[f32]>, output: Option<&mut [f32]>) -> bool {
        let bridge = {
            let state = self.state.lock();
            match (&state.bridge, state.active) {
                (Some(bridge), true) => Arc::clone(bridge),
                _ => return false,
            }
        };
        let Some(mut guard) = bridge.try_lock() else {
            if let Some(out) = output {
                out.fill(0.0);
            }
            return true;
        };
        guard.process(input, output);
        true
    }

    pub fn is_active(&self) -> bool {
        self.state.lock().active
    }

    /// Config of the most recently opened stream
    pub fn config(&self) -> Option<StreamConfig> {
        self.state.lock().config.clone()
    }

    /// Number of streams opened so far
    pub fn opened(&self) -> usize {
        self.state.lock().opened
    }

    pub fn set_devices(&self, devices: Vec<DeviceInfo>) {
        self.state.lock().devices = devices;
    }

    /// Make the next open, start, or stop fail with `error`
    pub fn fail_next(&self, error: DriverError) {
        self.state.lock().fail_next = Some(error);
    }
}

fn take_failure(state: &Mutex<ManualState>, matches: fn(&DriverError) -> bool) -> Result<(), DriverError> {
    let mut state = state.lock();
    match state.fail_next.take() {
        Some(error) if matches(&error) => Err(error),
        other => {
            state.fail_next = other;
            Ok(())
        }
    }
}

impl AudioDriver for ManualDriver {
    fn name(&self) -> &str {
        "manual"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, DriverError> {
        take_failure(&self.state, |e| matches!(e, DriverError::Enumerate(_)))?;
        Ok(self.state.lock().devices.clone())
    }

    fn default_input_device(&self) -> Option<usize> {
        let state = self.state.lock();
        state.devices.iter().find(|d| d.max_input_channels > 0).map(|d| d.id)
    }

    fn default_output_device(&self) -> Option<usize> {
        let state = self.state.lock();
        state.devices.iter().find(|d| d.max_output_channels > 0).map(|d| d.id)
    }

    fn open(
        &mut self,
        config: &StreamConfig,
        bridge: SharedBridge,
    ) -> Result<Box<dyn DriverStream>, DriverError> {
        take_failure(&self.state, |e| matches!(e, DriverError::Open(_)))?;

        let mut state = self.state.lock();
        for id in [config.input_device, config.output_device].into_iter().flatten() {
            if !state.devices.iter().any(|d| d.id == id) {
                return Err(DriverError::DeviceNotFound(id));
            }
        }
        state.bridge = Some(bridge);
        state.config = Some(config.clone());
        state.active = false;
        state.opened += 1;

        Ok(Box::new(ManualStream {
            state: Arc::clone(&self.state),
        }))
    }
}

struct ManualStream {
    state: Arc<Mutex<ManualState>>,
}

impl DriverStream for ManualStream {
    fn start(&mut self) -> Result<(), DriverError> {
        take_failure(&self.state, |e| matches!(e, DriverError::Start(_)))?;
        self.state.lock().active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        take_failure(&self.state, |e| matches!(e, DriverError::Stop(_)))?;
        self.state.lock().active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.state.lock().active
    }
}

impl Drop for ManualStream {
    fn drop(&mut self) {
        let mut state = self.state.lock();
        state.active = false;
        state.bridge = None;
    }
}
