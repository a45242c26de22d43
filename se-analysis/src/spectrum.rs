//! Windowed FFT spectrum analyzer
//!
//! Collects samples until a full analysis window is available, applies the
//! current window table and produces one magnitude frame per hop.

use crate::window::WindowTable;
use rustfft::{num_complex::Complex, FftPlanner};
use std::sync::Arc;

/// Largest overlap fraction accepted; keeps the hop at a usable size
pub const MAX_OVERLAP: f32 = 0.95;

/// Streaming magnitude spectrum over overlapping windows
pub struct SpectrumAnalyzer {
    window: Arc<WindowTable>,
    hop: usize,
    fft: Arc<dyn rustfft::Fft<f32>>,
    /// Samples waiting for the next full window
    pending: Vec<f32>,
    /// Pre-allocated FFT buffer
    fft_buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
}

impl SpectrumAnalyzer {
    /// Create an analyzer for the given window table and overlap fraction
    pub fn new(window: Arc<WindowTable>, overlap: f32) -> Self {
        let size = window.len().max(1);
        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(size);

        Self {
            hop: Self::hop_for(size, overlap),
            window,
            fft,
            pending: Vec::with_capacity(size * 2),
            fft_buffer: vec![Complex::new(0.0, 0.0); size],
            magnitudes: vec![0.0; size / 2 + 1],
        }
    }

    /// Samples between the starts of consecutive windows
    pub fn hop_for(size: usize, overlap: f32) -> usize {
        let overlap = if overlap.is_finite() {
            overlap.clamp(0.0, MAX_OVERLAP)
        } else {
            0.0
        };
        ((size as f32 * (1.0 - overlap)).round() as usize).max(1)
    }

    pub fn window_size(&self) -> usize {
        self.fft_buffer.len()
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    /// Number of magnitude bins per frame
    pub fn bins(&self) -> usize {
        self.magnitudes.len()
    }

    /// Feed samples; `on_frame` receives every completed magnitude frame
    pub fn push(&mut self, samples: &[f32], mut on_frame: impl FnMut(&[f32])) {
        self.pending.extend_from_slice(samples);
        let size = self.window_size();

        while self.pending.len() >= size {
            self.analyze_front();
            on_frame(&self.magnitudes);
            self.pending.drain(..self.hop.min(self.pending.len()));
        }
    }

    /// Drop any partially collected window
    pub fn reset(&mut self) {
        self.pending.clear();
    }

    fn analyze_front(&mut self) {
        let size = self.window_size();
        for (i, (slot, &sample)) in self
            .fft_buffer
            .iter_mut()
            .zip(self.pending[..size].iter())
            .enumerate()
        {
            let weight = self.window.at(i).unwrap_or(1.0) as f32;
            *slot = Complex::new(sample * weight, 0.0);
        }

        self.fft.process(&mut self.fft_buffer);

        let scale = 1.0 / size as f32;
        for (mag, bin) in self.magnitudes.iter_mut().zip(self.fft_buffer.iter()) {
            *mag = bin.norm() * scale;
        }
    }
}
