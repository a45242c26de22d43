//! Options file persistence
//!
//! Engine options are stored as simple `key=value` lines. Loading yields an
//! `OptionsPatch` so a file only needs to name the values it overrides.

use crate::options::{EngineOptions, OptionsPatch};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Get the default options file path
pub fn options_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("soundengine")
        .join("options.txt")
}

/// Load options from the default location
///
/// Returns an empty patch if the file doesn't exist or can't be read.
pub fn load_options() -> OptionsPatch {
    let path = options_path();
    match load_options_from(&path) {
        Ok(patch) => patch,
        Err(e) if e.kind() == io::ErrorKind::NotFound => OptionsPatch::default(),
        Err(e) => {
            tracing::warn!("Could not read options file {}: {}", path.display(), e);
            OptionsPatch::default()
        }
    }
}

pub fn load_options_from(path: &Path) -> io::Result<OptionsPatch> {
    let content = fs::read_to_string(path)?;
    Ok(parse_options(&content))
}

/// Save options to the default location
pub fn save_options(options: &EngineOptions) -> io::Result<()> {
    save_options_to(options, &options_path())
}

pub fn save_options_to(options: &EngineOptions, path: &Path) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serialize_options(options))
}

fn value<T: FromStr>(key: &str, raw: &str) -> Option<T> {
    match raw.parse() {
        Ok(v) => Some(v),
        Err(_) => {
            tracing::warn!("Ignoring invalid value '{}' for option {}", raw, key);
            None
        }
    }
}

fn device(key: &str, raw: &str) -> Option<Option<usize>> {
    if raw.eq_ignore_ascii_case("default") || raw.eq_ignore_ascii_case("none") {
        Some(None)
    } else {
        value(key, raw).map(Some)
    }
}

/// Parse options from `key=value` lines
pub fn parse_options(content: &str) -> OptionsPatch {
    let mut patch = OptionsPatch::default();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let Some((key, raw)) = line.split_once('=') else {
            tracing::debug!("Skipping options line without '=': {}", line);
            continue;
        };
        let key = key.trim();
        let raw = raw.trim();

        match key {
            "sample_rate" => patch.sample_rate = value(key, raw).or(patch.sample_rate),
            "buffer_size" => patch.buffer_size = value(key, raw).or(patch.buffer_size),
            "input_channels" => patch.input_channels = value(key, raw).or(patch.input_channels),
            "output_channels" => patch.output_channels = value(key, raw).or(patch.output_channels),
            "input_device" => patch.input_device = device(key, raw).or(patch.input_device),
            "output_device" => patch.output_device = device(key, raw).or(patch.output_device),
            "input_latency" => patch.input_latency = value(key, raw).or(patch.input_latency),
            "output_latency" => patch.output_latency = value(key, raw).or(patch.output_latency),
            "fft_window_size" => patch.fft_window_size = value(key, raw).or(patch.fft_window_size),
            "fft_overlap" => patch.fft_overlap = value(key, raw).or(patch.fft_overlap),
            "fft_window_function" if !raw.is_empty() => {
                patch.fft_window_function = Some(raw.to_string())
            }
            _ => {} // Ignore unknown keys
        }
    }

    patch
}

/// Serialize options to `key=value` lines
pub fn serialize_options(options: &EngineOptions) -> String {
    let stream = &options.stream;
    let analysis = &options.analysis;
    let device = |d: Option<usize>| d.map_or_else(|| "default".to_string(), |i| i.to_string());

    let mut lines = vec![
        "# soundengine options".to_string(),
        format!("sample_rate={}", stream.sample_rate),
        format!("buffer_size={}", stream.buffer_size),
        format!("input_channels={}", stream.input_channels),
        format!("output_channels={}", stream.output_channels),
        format!("input_device={}", device(stream.input_device)),
        format!("output_device={}", device(stream.output_device)),
    ];
    if let Some(latency) = stream.input_latency {
        lines.push(format!("input_latency={}", latency));
    }
    if let Some(latency) = stream.output_latency {
        lines.push(format!("output_latency={}", latency));
    }
    lines.push(format!("fft_window_size={}", analysis.fft_window_size));
    lines.push(format!("fft_overlap={}", analysis.fft_overlap));
    lines.push(format!("fft_window_function={}", analysis.fft_window_function));

    lines.join("\n")
}
