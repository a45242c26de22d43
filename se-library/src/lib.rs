//! Recording files and options for soundengine - WAV codec, option types, and options file

mod config;
mod options;
pub mod wave;

pub use config::{
    load_options, load_options_from, options_path, parse_options, save_options, save_options_to,
    serialize_options,
};
pub use options::{
    AnalysisOptions, EngineOptions, OptionsPatch, StreamConfig, DEFAULT_BUFFER_SIZE,
    DEFAULT_CHANNELS, DEFAULT_FFT_OVERLAP, DEFAULT_FFT_WINDOW_SIZE, DEFAULT_SAMPLE_RATE,
};
pub use wave::{DecodedWave, WaveError, WaveFormat, WaveHeader};
