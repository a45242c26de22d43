//! Engine option types
//!
//! `EngineOptions` is the full, resolved configuration of a running engine.
//! `OptionsPatch` is a partial update where every `None` field keeps the
//! current value.

use se_analysis::WindowFunction;

pub const DEFAULT_SAMPLE_RATE: u32 = 44100;
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_CHANNELS: u16 = 1;
pub const DEFAULT_FFT_WINDOW_SIZE: usize = 1024;
pub const DEFAULT_FFT_OVERLAP: f32 = 0.5;

/// Hardware stream parameters
///
/// Any change requires a full stop, reconfigure, start cycle. Devices and
/// latencies of `None` mean "use the driver default".
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    pub sample_rate: u32,
    /// Samples per buffer, interleaved across channels
    pub buffer_size: usize,
    pub input_channels: u16,
    pub output_channels: u16,
    pub input_device: Option<usize>,
    pub output_device: Option<usize>,
    /// Suggested input latency in seconds
    pub input_latency: Option<f64>,
    /// Suggested output latency in seconds
    pub output_latency: Option<f64>,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            buffer_size: DEFAULT_BUFFER_SIZE,
            input_channels: DEFAULT_CHANNELS,
            output_channels: DEFAULT_CHANNELS,
            input_device: None,
            output_device: None,
            input_latency: None,
            output_latency: None,
        }
    }
}

impl StreamConfig {
    pub fn has_input(&self) -> bool {
        self.input_channels > 0
    }

    pub fn has_output(&self) -> bool {
        self.output_channels > 0
    }
}

/// Spectrum analysis parameters
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOptions {
    pub fft_window_size: usize,
    /// Fraction of a window shared by consecutive frames
    pub fft_overlap: f32,
    pub fft_window_function: WindowFunction,
}

impl Default for AnalysisOptions {
    fn default() -> Self {
        Self {
            fft_window_size: DEFAULT_FFT_WINDOW_SIZE,
            fft_overlap: DEFAULT_FFT_OVERLAP,
            fft_window_function: WindowFunction::Rectangular,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineOptions {
    pub stream: StreamConfig,
    pub analysis: AnalysisOptions,
}

/// Partial options update
///
/// Device fields are doubly optional: `Some(None)` selects the driver
/// default, `None` leaves the device unchanged. The window function is kept
/// as a name so unknown names can be reported by whoever applies the patch.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OptionsPatch {
    pub sample_rate: Option<u32>,
    pub buffer_size: Option<usize>,
    pub input_channels: Option<u16>,
    pub output_channels: Option<u16>,
    pub input_device: Option<Option<usize>>,
    pub output_device: Option<Option<usize>>,
    pub input_latency: Option<f64>,
    pub output_latency: Option<f64>,
    pub fft_window_size: Option<usize>,
    pub fft_overlap: Option<f32>,
    pub fft_window_function: Option<String>,
}

impl OptionsPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when applying the patch would change the hardware stream
    pub fn touches_stream(&self, current: &StreamConfig) -> bool {
        self.sample_rate.is_some_and(|v| v != current.sample_rate)
            || self.buffer_size.is_some_and(|v| v != current.buffer_size)
            || self.input_channels.is_some_and(|v| v != current.input_channels)
            || self.output_channels.is_some_and(|v| v != current.output_channels)
            || self.input_device.is_some_and(|v| v != current.input_device)
            || self.output_device.is_some_and(|v| v != current.output_device)
            || self.input_latency.is_some_and(|v| Some(v) != current.input_latency)
            || self.output_latency.is_some_and(|v| Some(v) != current.output_latency)
    }

    /// Apply the stream fields of this patch
    pub fn apply_stream(&self, stream: &mut StreamConfig) {
        if let Some(v) = self.sample_rate {
            stream.sample_rate = v;
        }
        if let Some(v) = self.buffer_size {
            stream.buffer_size = v;
        }
        if let Some(v) = self.input_channels {
            stream.input_channels = v;
        }
        if let Some(v) = self.output_channels {
            stream.output_channels = v;
        }
        if let Some(v) = self.input_device {
            stream.input_device = v;
        }
        if let Some(v) = self.output_device {
            stream.output_device = v;
        }
        if let Some(v) = self.input_latency {
            stream.input_latency = Some(v);
        }
        if let Some(v) = self.output_latency {
            stream.output_latency = Some(v);
        }
    }

    /// Later patches win field by field
    pub fn merge(mut self, later: OptionsPatch) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if later.$field.is_some() { self.$field = later.$field; })*
            };
        }
        take!(
            sample_rate,
            buffer_size,
            input_channels,
            output_channels,
            input_device,
            output_device,
            input_latency,
            output_latency,
            fft_window_size,
            fft_overlap,
            fft_window_function
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = EngineOptions::default();
        assert_eq!(options.stream.sample_rate, 44100);
        assert_eq!(options.stream.buffer_size, 1024);
        assert_eq!(options.stream.input_channels, 1);
        assert_eq!(options.stream.output_channels, 1);
        assert!(options.stream.input_latency.is_none());
        assert_eq!(options.analysis.fft_window_size, 1024);
        assert_eq!(options.analysis.fft_window_function, WindowFunction::Rectangular);
    }

    #[test]
    fn test_touches_stream_ignores_unchanged_values() {
        let stream = StreamConfig::default();
        let same = OptionsPatch {
            sample_rate: Some(44100),
            fft_window_size: Some(2048),
            ..Default::default()
        };
        assert!(!same.touches_stream(&stream));

        let other = OptionsPatch {
            buffer_size: Some(512),
            ..Default::default()
        };
        assert!(other.touches_stream(&stream));

        let device = OptionsPatch {
            output_device: Some(Some(2)),
            ..Default::default()
        };
        assert!(device.touches_stream(&stream));
    }

    #[test]
    fn test_apply_stream() {
        let mut stream = StreamConfig {
            input_device: Some(3),
            ..Default::default()
        };
        let patch = OptionsPatch {
            sample_rate: Some(48000),
            input_device: Some(None),
            output_latency: Some(0.01),
            ..Default::default()
        };
        patch.apply_stream(&mut stream);
        assert_eq!(stream.sample_rate, 48000);
        assert_eq!(stream.input_device, None);
        assert_eq!(stream.output_latency, Some(0.01));
        assert_eq!(stream.buffer_size, 1024);
    }

    #[test]
    fn test_merge_prefers_later() {
        let base = OptionsPatch {
            sample_rate: Some(48000),
            buffer_size: Some(256),
            ..Default::default()
        };
        let later = OptionsPatch {
            buffer_size: Some(512),
            ..Default::default()
        };
        let merged = base.merge(later);
        assert_eq!(merged.sample_rate, Some(48000));
        assert_eq!(merged.buffer_size, Some(512));
        assert!(OptionsPatch::default().is_empty());
        assert!(!merged.is_empty());
    }
}
