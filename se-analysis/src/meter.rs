//! Per-buffer peak metering
//!
//! Computes the minimum and maximum sample of every channel of an
//! interleaved buffer. Accumulators start at min = 1.0 and max = -1.0.

/// Minimum and maximum sample per channel
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PeakInfo {
    pub min: Vec<f32>,
    pub max: Vec<f32>,
}

impl PeakInfo {
    pub fn channels(&self) -> usize {
        self.min.len()
    }
}

/// Measure per-channel extremes of an interleaved buffer
///
/// Samples are read as `frame * channels + channel`. A trailing partial
/// frame is ignored.
pub fn measure_peaks(samples: &[f32], channels: usize) -> PeakInfo {
    let channels = channels.max(1);
    let mut min = vec![1.0f32; channels];
    let mut max = vec![-1.0f32; channels];

    for frame in samples.chunks_exact(channels) {
        for (channel, &sample) in frame.iter().enumerate() {
            if sample < min[channel] {
                min[channel] = sample;
            }
            if sample > max[channel] {
                max[channel] = sample;
            }
        }
    }

    PeakInfo { min, max }
}
