//! Audio engine - owns the stream, runs the processing loop, takes commands
//!
//! All state lives on the host thread. The only thing shared with the
//! driver's real-time context is the `HardwareBridge`, reached through the
//! stream guard (`SharedBridge`). `tick` is the processing loop body and is
//! expected to run every `PROCESSING_INTERVAL`.

use crate::beep::{Beep, BeepOptions};
use crate::driver::{AudioDriver, DeviceInfo, DriverStream, SharedBridge};
use crate::effects::{apply_volume, mute};
use crate::error::{EngineError, EventError};
use crate::events::{EngineEvent, EventBus, EventKind, ListenerId};
use crate::exchange::{
    exchange, BufferExchange, ExchangeStats, HardwareBridge, DEFAULT_QUEUE_CAPACITY,
};
use crate::transport::Transport;
use parking_lot::Mutex;
use se_analysis::{measure_peaks, SpectrumAnalyzer, WindowFunction, WindowTable, MAX_OVERLAP};
use se_library::wave::{self, WaveFormat};
use se_library::{EngineOptions, OptionsPatch, StreamConfig};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Period of the processing loop
pub const PROCESSING_INTERVAL: Duration = Duration::from_millis(1);

/// Point-in-time view of the engine for hosts that can't query it directly
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSnapshot {
    pub recording: bool,
    pub playing: bool,
    pub beeping: bool,
    pub sample_count: usize,
    pub playback_progress: f64,
    pub playback_position: usize,
    pub volume: f32,
    pub muted: bool,
    pub options: EngineOptions,
    pub underflows: u64,
    pub overruns: u64,
}

pub struct Engine {
    driver: Box<dyn AudioDriver>,
    stream: Option<Box<dyn DriverStream>>,
    bridge: SharedBridge,
    exchange: BufferExchange,
    options: EngineOptions,
    window: Arc<WindowTable>,
    spectrum: SpectrumAnalyzer,
    transport: Transport,
    beep: Beep,
    events: EventBus,
    volume: f32,
    muted: bool,
    shut_down: bool,
}

/// Options after applying `patch` to `current`
///
/// Unknown window names and out-of-range overlaps are soft failures; values
/// the stream can't run with are rejected.
fn patched(current: &EngineOptions, patch: &OptionsPatch) -> Result<EngineOptions, EngineError> {
    let mut next = current.clone();
    patch.apply_stream(&mut next.stream);

    if let Some(size) = patch.fft_window_size {
        next.analysis.fft_window_size = size;
    }
    if let Some(overlap) = patch.fft_overlap {
        if overlap.is_nan() {
            tracing::warn!("FFT overlap is NaN, keeping {}", current.analysis.fft_overlap);
        } else {
            if !(0.0..=MAX_OVERLAP).contains(&overlap) {
                tracing::warn!("FFT overlap {} out of range, clamping to 0..{}", overlap, MAX_OVERLAP);
            }
            next.analysis.fft_overlap = overlap.clamp(0.0, MAX_OVERLAP);
        }
    }
    if let Some(name) = &patch.fft_window_function {
        match name.parse::<WindowFunction>() {
            Ok(function) => next.analysis.fft_window_function = function,
            Err(e) => tracing::warn!("{}, keeping {}", e, current.analysis.fft_window_function),
        }
    }

    let stream = &next.stream;
    if stream.sample_rate == 0 {
        return Err(EngineError::InvalidOptions("sample rate must be positive".into()));
    }
    if stream.buffer_size == 0 {
        return Err(EngineError::InvalidOptions("buffer size must be positive".into()));
    }
    if !stream.has_input() && !stream.has_output() {
        return Err(EngineError::InvalidOptions(
            "at least one input or output channel is required".into(),
        ));
    }
    if next.analysis.fft_window_size == 0 {
        return Err(EngineError::InvalidOptions("FFT window size must be positive".into()));
    }
    Ok(next)
}

impl Engine {
    /// Create an engine and start its stream
    ///
    /// Devices left unset resolve to the driver's defaults.
    pub fn new(driver: Box<dyn AudioDriver>, patch: Option<OptionsPatch>) -> Result<Self, EngineError> {
        let mut defaults = EngineOptions::default();
        defaults.stream.input_device = driver.default_input_device();
        defaults.stream.output_device = driver.default_output_device();
        let options = patched(&defaults, &patch.unwrap_or_default())?;

        let (host, bridge) = exchange(options.stream.buffer_size, DEFAULT_QUEUE_CAPACITY);
        let window = Arc::new(WindowTable::build(
            options.analysis.fft_window_function,
            options.analysis.fft_window_size,
        ));
        let spectrum = SpectrumAnalyzer::new(Arc::clone(&window), options.analysis.fft_overlap);

        let mut engine = Self {
            driver,
            stream: None,
            bridge: Arc::new(Mutex::new(bridge)),
            exchange: host,
            transport: Transport::new(options.stream.buffer_size),
            options,
            window,
            spectrum,
            beep: Beep::default(),
            events: EventBus::new(),
            volume: 1.0,
            muted: false,
            shut_down: false,
        };

        let shared = Arc::clone(&engine.bridge);
        let _guard = shared.lock();
        engine.open_stream()?;
        Ok(engine)
    }

    /// Open and start a stream for the current config; caller holds the guard
    fn open_stream(&mut self) -> Result<(), EngineError> {
        let mut stream = self
            .driver
            .open(&self.options.stream, Arc::clone(&self.bridge))
            .map_err(|e| EngineError::driver("open stream", e))?;
        stream
            .start()
            .map_err(|e| EngineError::driver("start stream", e))?;
        self.stream = Some(stream);

        let stream = &self.options.stream;
        tracing::info!(
            "Stream started on {}: {} Hz, buffer {}, {} in / {} out",
            self.driver.name(),
            stream.sample_rate,
            stream.buffer_size,
            stream.input_channels,
            stream.output_channels
        );
        Ok(())
    }

    /// Stop and release the stream; caller holds the guard
    fn close_stream(&mut self) -> Result<(), EngineError> {
        if let Some(mut stream) = self.stream.take() {
            let stopped = if stream.is_active() { stream.stop() } else { Ok(()) };
            drop(stream);
            stopped.map_err(|e| EngineError::driver("stop stream", e))?;
            tracing::info!("Stream stopped");
        }
        Ok(())
    }

    fn ensure_running(&self) -> Result<(), EngineError> {
        if self.shut_down {
            Err(EngineError::ShutDown)
        } else {
            Ok(())
        }
    }

    /// Replace the exchange with one sized for the current stream config
    fn resize_exchange(&mut self, bridge: &mut HardwareBridge) {
        let (host, fresh) = exchange(self.options.stream.buffer_size, DEFAULT_QUEUE_CAPACITY);
        *bridge = fresh;
        self.exchange = host;
    }

    /// Full stop, reconfigure, start cycle under the stream guard
    ///
    /// If the new stream can't be opened the previous config is restored and
    /// reopened, and the error is returned.
    fn reconfigure(&mut self, config: StreamConfig) -> Result<(), EngineError> {
        let shared = Arc::clone(&self.bridge);
        let mut guard = shared.lock();

        self.close_stream()?;
        self.exchange.synchronize(&mut guard);

        let previous = std::mem::replace(&mut self.options.stream, config);
        let resized = self.options.stream.buffer_size != previous.buffer_size;
        if resized {
            self.resize_exchange(&mut guard);
        }

        match self.open_stream() {
            Ok(()) => {
                if resized {
                    self.transport.rechunk(self.options.stream.buffer_size);
                    self.spectrum.reset();
                }
                Ok(())
            }
            Err(e) => {
                tracing::warn!("{}, restoring previous stream", e);
                self.options.stream = previous;
                if resized {
                    self.resize_exchange(&mut guard);
                }
                if let Err(restore) = self.open_stream() {
                    tracing::error!("Previous stream could not be restored: {}", restore);
                }
                Err(e)
            }
        }
    }

    fn emit(&mut self, event: Option<EngineEvent>) {
        if let Some(event) = event {
            tracing::debug!("Event: {}", event.kind());
            self.events.emit(&event);
        }
    }

    /// One pass of the processing loop
    ///
    /// Returns false when no captured buffer was waiting.
    pub fn tick(&mut self) -> bool {
        if self.shut_down {
            return false;
        }
        if self.beep.poll(Instant::now()) {
            self.emit(Some(EngineEvent::BeepStopped));
        }

        let Some(mut buffer) = self.exchange.receive() else {
            return false;
        };

        let event = self.transport.process(&mut buffer);
        self.emit(event);

        if self.events.has_listeners(EventKind::Info) {
            let stream = &self.options.stream;
            let channels = if stream.has_input() {
                stream.input_channels
            } else {
                stream.output_channels
            };
            let peaks = measure_peaks(&buffer, channels as usize);
            self.emit(Some(EngineEvent::Info(peaks)));
        }

        if self.events.has_listeners(EventKind::Fft) {
            let mut frames = Vec::new();
            self.spectrum.push(&buffer, |frame| frames.push(frame.to_vec()));
            for frame in frames {
                self.emit(Some(EngineEvent::Fft(frame)));
            }
        }

        if self.events.has_listeners(EventKind::Data) {
            for error in self.events.run_hooks(&mut buffer) {
                tracing::warn!("{}", error);
                self.emit(Some(EngineEvent::Error(error)));
            }
        }

        if self.muted {
            mute(&mut buffer);
        } else {
            if self.beep.mix_into(&mut buffer) {
                self.emit(Some(EngineEvent::BeepStarted));
            }
            apply_volume(&mut buffer, self.volume);
        }

        if self.exchange.send(buffer).is_err() {
            tracing::warn!("Outtake full, dropping processed buffer");
        }
        true
    }

    /// Run `tick` until the intake is empty; returns buffers processed
    pub fn drain(&mut self) -> usize {
        let mut processed = 0;
        while self.tick() {
            processed += 1;
        }
        processed
    }

    /// Discard all in-flight buffers on both sides of the exchange
    pub fn synchronize(&mut self) -> usize {
        let mut guard = self.bridge.lock();
        self.exchange.synchronize(&mut guard)
    }

    // --- transport ---

    pub fn start_playback(&mut self) {
        let event = self.transport.start_playback();
        self.emit(event);
    }

    pub fn stop_playback(&mut self) {
        let event = self.transport.stop_playback();
        self.emit(event);
    }

    pub fn pause_playback(&mut self) {
        let event = self.transport.pause_playback();
        self.emit(event);
    }

    pub fn is_playing(&self) -> bool {
        self.transport.is_playing()
    }

    pub fn start_recording(&mut self) {
        let event = self.transport.start_recording();
        self.emit(event);
    }

    pub fn stop_recording(&mut self) {
        let event = self.transport.stop_recording();
        self.emit(event);
    }

    pub fn is_recording(&self) -> bool {
        self.transport.is_recording()
    }

    pub fn delete_recording(&mut self) {
        let event = self.transport.delete_recording();
        self.emit(event);
    }

    /// Write the recording as a float WAV file
    pub fn save_recording(&mut self, path: &Path) -> Result<(), EngineError> {
        let format = WaveFormat {
            channels: self.options.stream.input_channels,
            sample_rate: self.options.stream.sample_rate,
        };
        wave::save(path, self.transport.store().buffers(), format)?;
        tracing::info!(
            "Saved {} samples to {}",
            self.transport.sample_count(),
            path.display()
        );
        self.emit(Some(EngineEvent::RecordingSaved));
        Ok(())
    }

    /// Replace the recording with a float WAV file
    ///
    /// On failure the current recording is left untouched.
    pub fn load_recording(&mut self, path: &Path) -> Result<(), EngineError> {
        let decoded = wave::load(path, self.options.stream.buffer_size)?;

        let stream = &self.options.stream;
        let header = &decoded.header;
        if header.channels != stream.input_channels || header.sample_rate != stream.sample_rate {
            tracing::warn!(
                "{} is {} ch / {} Hz, stream is {} ch / {} Hz",
                path.display(),
                header.channels,
                header.sample_rate,
                stream.input_channels,
                stream.sample_rate
            );
        }

        let event = self.transport.load(decoded.buffers);
        tracing::info!(
            "Loaded {} samples from {}",
            self.transport.sample_count(),
            path.display()
        );
        self.emit(event);
        Ok(())
    }

    pub fn recording_samples(&self) -> usize {
        self.transport.sample_count()
    }

    pub fn recording_sample_at(&self, index: usize) -> f32 {
        self.transport.sample_at(index)
    }

    pub fn playback_progress(&self) -> f64 {
        self.transport.progress()
    }

    /// Returns false (and leaves the cursor) when `progress` is outside 0..1
    pub fn set_playback_progress(&mut self, progress: f64) -> bool {
        self.transport.set_progress(progress)
    }

    /// Playback position in buffers
    pub fn playback_position(&self) -> usize {
        self.transport.position()
    }

    // --- signal shaping ---

    pub fn beep(&mut self, options: BeepOptions) {
        let stream = &self.options.stream;
        self.beep
            .start(options, stream.sample_rate, stream.input_channels, Instant::now());
    }

    pub fn is_beeping(&self) -> bool {
        self.beep.is_active()
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        if !(0.0..=1.0).contains(&volume) {
            tracing::warn!("Volume {} out of range, clamping to 0..1", volume);
        }
        self.volume = if volume.is_nan() { self.volume } else { volume.clamp(0.0, 1.0) };
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    pub fn set_mute(&mut self, muted: bool) {
        self.muted = muted;
    }

    // --- options ---

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Window coefficients currently used for analysis
    pub fn window_table(&self) -> Arc<WindowTable> {
        Arc::clone(&self.window)
    }

    /// Apply a partial options update
    ///
    /// Stream changes go through a full stop, reconfigure, start cycle, which
    /// is also retried whenever no stream is running. Nothing is applied if
    /// the stream can't be opened.
    pub fn set_options(&mut self, patch: &OptionsPatch) -> Result<(), EngineError> {
        self.ensure_running()?;
        let next = patched(&self.options, patch)?;

        if patch.touches_stream(&self.options.stream) || self.stream.is_none() {
            self.reconfigure(next.stream)?;
        }

        let analysis = next.analysis;
        if analysis.fft_window_size != self.window.len()
            || analysis.fft_window_function != self.window.function()
        {
            self.window = Arc::new(WindowTable::build(
                analysis.fft_window_function,
                analysis.fft_window_size,
            ));
            self.spectrum = SpectrumAnalyzer::new(Arc::clone(&self.window), analysis.fft_overlap);
        } else if analysis.fft_overlap != self.options.analysis.fft_overlap {
            self.spectrum = SpectrumAnalyzer::new(Arc::clone(&self.window), analysis.fft_overlap);
        }
        self.options.analysis = analysis;
        Ok(())
    }

    pub fn devices(&self) -> Result<Vec<DeviceInfo>, EngineError> {
        self.driver
            .devices()
            .map_err(|e| EngineError::driver("enumerate devices", e))
    }

    pub fn is_streaming(&self) -> bool {
        self.stream.as_ref().is_some_and(|s| s.is_active())
    }

    pub fn exchange_stats(&self) -> Arc<ExchangeStats> {
        Arc::clone(self.exchange.stats())
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        let stats = self.exchange.stats();
        EngineSnapshot {
            recording: self.is_recording(),
            playing: self.is_playing(),
            beeping: self.is_beeping(),
            sample_count: self.recording_samples(),
            playback_progress: self.playback_progress(),
            playback_position: self.playback_position(),
            volume: self.volume,
            muted: self.muted,
            options: self.options.clone(),
            underflows: stats.underflows(),
            overruns: stats.overruns(),
        }
    }

    // --- listeners ---

    pub fn on(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.events.on(kind, listener)
    }

    /// Alias of [`Engine::on`]
    pub fn add_listener(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.events.on(kind, listener)
    }

    pub fn once(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.events.once(kind, listener)
    }

    pub fn prepend(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.events.prepend(kind, listener)
    }

    pub fn prepend_once(
        &mut self,
        kind: EventKind,
        listener: impl FnMut(&EngineEvent) + 'static,
    ) -> Result<ListenerId, EventError> {
        self.events.prepend_once(kind, listener)
    }

    pub fn on_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.events.on_data(hook)
    }

    pub fn once_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.events.once_data(hook)
    }

    pub fn prepend_data(&mut self, hook: impl FnMut(&[f32]) -> Vec<f32> + 'static) -> ListenerId {
        self.events.prepend_data(hook)
    }

    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        self.events.remove_listener(id)
    }

    pub fn remove_all_listeners(&mut self, kind: Option<EventKind>) {
        self.events.remove_all_listeners(kind)
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.events.listener_count(kind)
    }

    pub fn event_names(&self) -> Vec<EventKind> {
        self.events.event_names()
    }

    // --- lifecycle ---

    /// Stop the stream and discard in-flight buffers
    pub fn shutdown(&mut self) -> Result<(), EngineError> {
        if self.shut_down {
            return Ok(());
        }
        self.shut_down = true;

        let shared = Arc::clone(&self.bridge);
        let mut guard = shared.lock();
        let closed = self.close_stream();
        self.exchange.synchronize(&mut guard);
        closed
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if let Err(e) = self.shutdown() {
            tracing::error!("Engine teardown failed: {}", e);
        }
    }
}
