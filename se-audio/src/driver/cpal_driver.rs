//! cpal-backed driver
//!
//! Devices are numbered across every available host in enumeration order.
//! Callback periods are re-blocked into exchange-sized buffers, since cpal
//! does not guarantee the requested fixed buffer size.

use super::{AudioDriver, DeviceInfo, DriverError, DriverStream, SharedBridge};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleRate, SupportedBufferSize};
use ringbuf::traits::{Consumer, Producer, Split};
use ringbuf::{HeapCons, HeapRb};
use se_library::StreamConfig;

/// Periods of capture the duplex FIFO can hold before dropping input
const CAPTURE_FIFO_BUFFERS: usize = 8;

pub struct CpalDriver;

impl CpalDriver {
    pub fn new() -> Self {
        Self
    }

    /// All devices from all hosts, paired with their host name
    fn enumerate() -> Result<Vec<(&'static str, cpal::Device)>, DriverError> {
        let mut all = Vec::new();
        for host_id in cpal::available_hosts() {
            let host = match cpal::host_from_id(host_id) {
                Ok(h) => h,
                Err(e) => {
                    tracing::debug!("Could not initialize host {:?}: {}", host_id, e);
                    continue;
                }
            };
            match host.devices() {
                Ok(devices) => all.extend(devices.map(|d| (host_id.name(), d))),
                Err(e) => {
                    tracing::debug!("Could not enumerate devices for {:?}: {}", host_id, e);
                }
            }
        }
        if all.is_empty() {
            return Err(DriverError::Enumerate("no audio hosts with devices".into()));
        }
        Ok(all)
    }

    fn default_index(default: Option<cpal::Device>) -> Option<usize> {
        let host_name = cpal::default_host().id().name();
        let name = default?.name().ok()?;
        Self::enumerate()
            .ok()?
            .iter()
            .position(|(host, d)| *host == host_name && d.name().ok().as_deref() == Some(name.as_str()))
    }

    fn device(
        id: Option<usize>,
        direction: &'static str,
        default: impl FnOnce(&cpal::Host) -> Option<cpal::Device>,
    ) -> Result<cpal::Device, DriverError> {
        match id {
            Some(id) => Self::enumerate()?
                .into_iter()
                .nth(id)
                .map(|(_, d)| d)
                .ok_or(DriverError::DeviceNotFound(id)),
            None => default(&cpal::default_host()).ok_or(DriverError::NoDefaultDevice(direction)),
        }
    }

    fn describe(id: usize, host: &str, device: &cpal::Device) -> DeviceInfo {
        let name = device.name().unwrap_or_else(|_| format!("Device {}", id));

        let max_input_channels = device
            .supported_input_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);
        let max_output_channels = device
            .supported_output_configs()
            .map(|configs| configs.map(|c| c.channels()).max().unwrap_or(0))
            .unwrap_or(0);

        let input = device.default_input_config().ok();
        let output = device.default_output_config().ok();
        let default_sample_rate = output
            .as_ref()
            .or(input.as_ref())
            .map(|c| c.sample_rate().0 as f64)
            .unwrap_or(0.0);

        let latency = |config: Option<&cpal::SupportedStreamConfig>| -> (f64, f64) {
            match config.map(|c| (c.buffer_size().clone(), c.sample_rate().0 as f64)) {
                Some((SupportedBufferSize::Range { min, max }, rate)) if rate > 0.0 => {
                    (min as f64 / rate, max as f64 / rate)
                }
                _ => (0.0, 0.0),
            }
        };
        let (low_in, high_in) = latency(input.as_ref());
        let (low_out, high_out) = latency(output.as_ref());

        DeviceInfo {
            id,
            name,
            host_api: host.to_string(),
            max_input_channels,
            max_output_channels,
            default_sample_rate,
            default_low_input_latency: low_in,
            default_low_output_latency: low_out,
            default_high_input_latency: high_in,
            default_high_output_latency: high_out,
        }
    }
}

impl Default for CpalDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn stream_config(channels: u16, config: &StreamConfig) -> cpal::StreamConfig {
    let frames = (config.buffer_size / channels.max(1) as usize).max(1);
    cpal::StreamConfig {
        channels,
        sample_rate: SampleRate(config.sample_rate),
        buffer_size: BufferSize::Fixed(frames as u32),
    }
}

/// Re-blocks arbitrary output periods into exchange buffers
struct OutputBlocks {
    block: Vec<f32>,
    position: usize,
    input: Vec<f32>,
    capture: Option<HeapCons<f32>>,
}

impl OutputBlocks {
    fn new(buffer_size: usize, capture: Option<HeapCons<f32>>) -> Self {
        Self {
            block: vec![0.0; buffer_size],
            position: buffer_size,
            input: vec![0.0; buffer_size],
            capture,
        }
    }

    fn fill(&mut self, data: &mut [f32], bridge: &SharedBridge) {
        let mut written = 0;
        while written < data.len() {
            if self.position == self.block.len() {
                // Never wait on the host: skip this period on contention
                let Some(mut guard) = bridge.try_lock() else {
                    // Drop the capture this period would have consumed
                    if let Some(capture) = self.capture.as_mut() {
                        capture.pop_slice(&mut self.input);
                    }
                    data[written..].fill(0.0);
                    return;
                };
                let input = match self.capture.as_mut() {
                    Some(capture) => {
                        let got = capture.pop_slice(&mut self.input);
                        self.input[got..].fill(0.0);
                        Some(self.input.as_slice())
                    }
                    None => None,
                };
                guard.process(input, Some(&mut self.block));
                self.position = 0;
            }
            let n = (self.block.len() - self.position).min(data.len() - written);
            data[written..written + n]
                .copy_from_slice(&self.block[self.position..self.position + n]);
            self.position += n;
            written += n;
        }
    }
}

/// Collects input periods into exchange buffers for input-only streams
struct InputBlocks {
    block: Vec<f32>,
    filled: usize,
}

impl InputBlocks {
    fn push(&mut self, mut data: &[f32], bridge: &SharedBridge) {
        while !data.is_empty() {
            let n = (self.block.len() - self.filled).min(data.len());
            self.block[self.filled..self.filled + n].copy_from_slice(&data[..n]);
            self.filled += n;
            data = &data[n..];

            if self.filled == self.block.len() {
                if let Some(mut guard) = bridge.try_lock() {
                    guard.process(Some(&self.block), None);
                }
                self.filled = 0;
            }
        }
    }
}

fn log_stream_error(err: cpal::StreamError) {
    tracing::error!("Audio stream error: {}", err);
}

impl AudioDriver for CpalDriver {
    fn name(&self) -> &str {
        "cpal"
    }

    fn devices(&self) -> Result<Vec<DeviceInfo>, DriverError> {
        let devices: Vec<DeviceInfo> = Self::enumerate()?
            .iter()
            .enumerate()
            .map(|(id, (host, device))| Self::describe(id, host, device))
            .collect();
        tracing::info!("Enumerated {} audio devices", devices.len());
        Ok(devices)
    }

    fn default_input_device(&self) -> Option<usize> {
        Self::default_index(cpal::default_host().default_input_device())
    }

    fn default_output_device(&self) -> Option<usize> {
        Self::default_index(cpal::default_host().default_output_device())
    }

    fn open(
        &mut self,
        config: &StreamConfig,
        bridge: SharedBridge,
    ) -> Result<Box<dyn DriverStream>, DriverError> {
        if !config.has_input() && !config.has_output() {
            return Err(DriverError::Open("stream has neither input nor output channels".into()));
        }
        if config.input_latency.is_some() || config.output_latency.is_some() {
            tracing::debug!("Latency hints are advisory with cpal; requesting fixed buffer size instead");
        }

        let buffer_size = config.buffer_size.max(1);
        let mut streams = Vec::with_capacity(2);
        let mut capture = None;

        if config.has_input() {
            let device = Self::device(config.input_device, "input", |h| h.default_input_device())?;
            let input_config = stream_config(config.input_channels, config);

            let stream = if config.has_output() {
                // Duplex: the output callback drives the bridge
                let (mut tx, rx) = HeapRb::<f32>::new(buffer_size * CAPTURE_FIFO_BUFFERS).split();
                capture = Some(rx);
                device.build_input_stream(
                    &input_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        tx.push_slice(data);
                    },
                    log_stream_error,
                    None,
                )
            } else {
                let mut blocks = InputBlocks {
                    block: vec![0.0; buffer_size],
                    filled: 0,
                };
                let shared = bridge.clone();
                device.build_input_stream(
                    &input_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| blocks.push(data, &shared),
                    log_stream_error,
                    None,
                )
            };
            streams.push(stream.map_err(|e| DriverError::Open(e.to_string()))?);
        }

        if config.has_output() {
            let device = Self::device(config.output_device, "output", |h| h.default_output_device())?;
            let output_config = stream_config(config.output_channels, config);
            let mut blocks = OutputBlocks::new(buffer_size, capture);
            let shared = bridge.clone();

            let stream = device
                .build_output_stream(
                    &output_config,
                    move |data: &mut [f32], _: &cpal::OutputCallbackInfo| blocks.fill(data, &shared),
                    log_stream_error,
                    None,
                )
                .map_err(|e| DriverError::Open(e.to_string()))?;
            streams.push(stream);
        }

        tracing::info!(
            "Opened cpal stream: {} Hz, {} samples per buffer, {} in / {} out",
            config.sample_rate,
            buffer_size,
            config.input_channels,
            config.output_channels
        );

        Ok(Box::new(CpalStream {
            streams,
            active: false,
        }))
    }
}

struct CpalStream {
    streams: Vec<cpal::Stream>,
    active: bool,
}

impl DriverStream for CpalStream {
    fn start(&mut self) -> Result<(), DriverError> {
        for stream in &self.streams {
            stream.play().map_err(|e| DriverError::Start(e.to_string()))?;
        }
        self.active = true;
        Ok(())
    }

    fn stop(&mut self) -> Result<(), DriverError> {
        for stream in &self.streams {
            stream.pause().map_err(|e| DriverError::Stop(e.to_string()))?;
        }
        self.active = false;
        Ok(())
    }

    fn is_active(&self) -> bool {
        self.active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::exchange;
    use parking_lot::Mutex;
    use ringbuf::traits::Observer;
    use std::sync::Arc;

    fn shared(buffer_size: usize) -> (crate::exchange::BufferExchange, SharedBridge) {
        let (host, bridge) = exchange(buffer_size, 16);
        (host, Arc::new(Mutex::new(bridge)))
    }

    #[test]
    fn test_stream_config_frames() {
        let config = StreamConfig {
            buffer_size: 1024,
            ..Default::default()
        };
        let cpal_config = stream_config(2, &config);
        assert_eq!(cpal_config.channels, 2);
        assert_eq!(cpal_config.sample_rate, SampleRate(44100));
        assert_eq!(cpal_config.buffer_size, BufferSize::Fixed(512));
    }

    #[test]
    fn test_output_blocks_span_uneven_periods() {
        let (mut host, bridge) = shared(4);
        host.send(vec![1.0, 2.0, 3.0, 4.0].into()).unwrap();
        host.send(vec![5.0, 6.0, 7.0, 8.0].into()).unwrap();

        let mut blocks = OutputBlocks::new(4, None);
        let mut first = [0.0; 3];
        let mut second = [0.0; 5];
        blocks.fill(&mut first, &bridge);
        blocks.fill(&mut second, &bridge);

        assert_eq!(first, [1.0, 2.0, 3.0]);
        assert_eq!(second, [4.0, 5.0, 6.0, 7.0, 8.0]);
        assert_eq!(host.pending(), 2);
    }

    #[test]
    fn test_output_blocks_silent_on_contention() {
        let (mut host, bridge) = shared(4);
        host.send(vec![1.0; 4].into()).unwrap();

        let mut blocks = OutputBlocks::new(4, None);
        let guard = bridge.lock();
        let mut out = [0.5; 4];
        blocks.fill(&mut out, &bridge);
        drop(guard);

        assert_eq!(out, [0.0; 4]);
        assert_eq!(host.pending(), 0);
    }

    #[test]
    fn test_contention_discards_one_capture_block() {
        let (_host, bridge) = shared(4);
        let (mut tx, rx) = HeapRb::<f32>::new(16).split();
        tx.push_slice(&[0.1; 10]);

        let mut blocks = OutputBlocks::new(4, Some(rx));
        let guard = bridge.lock();
        let mut out = [0.5; 4];
        blocks.fill(&mut out, &bridge);
        drop(guard);

        assert_eq!(out, [0.0; 4]);
        assert_eq!(tx.occupied_len(), 6);
    }

    #[test]
    fn test_duplex_capture_feeds_intake() {
        let (mut host, bridge) = shared(4);
        let (mut tx, rx) = HeapRb::<f32>::new(16).split();
        tx.push_slice(&[0.1, 0.2]);

        let mut blocks = OutputBlocks::new(4, Some(rx));
        blocks.fill(&mut [0.0; 4], &bridge);

        let captured = host.receive().unwrap();
        assert_eq!(&*captured, &[0.1, 0.2, 0.0, 0.0]);
    }

    #[test]
    fn test_input_blocks_accumulate() {
        let (mut host, bridge) = shared(4);
        let mut blocks = InputBlocks {
            block: vec![0.0; 4],
            filled: 0,
        };
        blocks.push(&[1.0, 2.0, 3.0], &bridge);
        assert_eq!(host.pending(), 0);
        blocks.push(&[4.0, 5.0], &bridge);

        assert_eq!(&*host.receive().unwrap(), &[1.0, 2.0, 3.0, 4.0]);
        assert_eq!(blocks.filled, 1);
    }
}
