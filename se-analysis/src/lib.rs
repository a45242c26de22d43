//! Audio analysis module for soundengine
//!
//! Provides window function tables, per-buffer peak metering and a
//! windowed FFT spectrum analyzer.

mod meter;
mod spectrum;
mod window;

pub use meter::{measure_peaks, PeakInfo};
pub use spectrum::{SpectrumAnalyzer, MAX_OVERLAP};
pub use window::{UnknownWindowFunction, WindowFunction, WindowTable};
