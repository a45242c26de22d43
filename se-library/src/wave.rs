//! PCM-float WAV encoding and decoding
//!
//! Recordings are stored as a canonical 44-byte RIFF header followed by
//! little-endian 32-bit IEEE float samples. Decoding slices the data section
//! back into fixed-size buffers, zero padding the last one.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Size of the canonical header in bytes
pub const HEADER_LEN: usize = 44;
/// WAVE_FORMAT_IEEE_FLOAT
pub const FORMAT_IEEE_FLOAT: u16 = 3;
pub const BITS_PER_SAMPLE: u16 = 32;

const BYTES_PER_SAMPLE: usize = 4;

/// Errors that can occur while saving or loading recordings
#[derive(Error, Debug)]
pub enum WaveError {
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("malformed wave data: {0}")]
    Malformed(String),
    #[error("recording too large for a wave file ({0} bytes)")]
    TooLarge(usize),
    #[error("buffer size must be non-zero")]
    ZeroBufferSize,
}

/// Channel layout and rate written into the header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveFormat {
    pub channels: u16,
    pub sample_rate: u32,
}

/// The fields of the 44-byte header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WaveHeader {
    /// Total file size minus 8
    pub chunk_size: u32,
    pub audio_format: u16,
    pub channels: u16,
    pub sample_rate: u32,
    pub byte_rate: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    /// Size of the data section in bytes
    pub data_size: u32,
}

impl WaveHeader {
    /// Header for `data_size` bytes of 32-bit float samples
    pub fn float_pcm(format: WaveFormat, data_size: u32) -> Self {
        let block_align = format.channels * (BITS_PER_SAMPLE / 8);
        Self {
            chunk_size: data_size.saturating_add(36),
            audio_format: FORMAT_IEEE_FLOAT,
            channels: format.channels,
            sample_rate: format.sample_rate,
            byte_rate: format.sample_rate * block_align as u32,
            block_align,
            bits_per_sample: BITS_PER_SAMPLE,
            data_size,
        }
    }

    pub fn format(&self) -> WaveFormat {
        WaveFormat {
            channels: self.channels,
            sample_rate: self.sample_rate,
        }
    }

    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[0..4].copy_from_slice(b"RIFF");
        out[4..8].copy_from_slice(&self.chunk_size.to_le_bytes());
        out[8..12].copy_from_slice(b"WAVE");
        out[12..16].copy_from_slice(b"fmt ");
        out[16..20].copy_from_slice(&16u32.to_le_bytes());
        out[20..22].copy_from_slice(&self.audio_format.to_le_bytes());
        out[22..24].copy_from_slice(&self.channels.to_le_bytes());
        out[24..28].copy_from_slice(&self.sample_rate.to_le_bytes());
        out[28..32].copy_from_slice(&self.byte_rate.to_le_bytes());
        out[32..34].copy_from_slice(&self.block_align.to_le_bytes());
        out[34..36].copy_from_slice(&self.bits_per_sample.to_le_bytes());
        out[36..40].copy_from_slice(b"data");
        out[40..44].copy_from_slice(&self.data_size.to_le_bytes());
        out
    }

    /// Parse and validate the header at the start of `bytes`
    pub fn parse(bytes: &[u8]) -> Result<Self, WaveError> {
        if bytes.len() < HEADER_LEN {
            return Err(WaveError::Malformed(format!(
                "expected at least {} header bytes, got {}",
                HEADER_LEN,
                bytes.len()
            )));
        }

        for (range, marker) in [
            (0..4, b"RIFF"),
            (8..12, b"WAVE"),
            (12..16, b"fmt "),
            (36..40, b"data"),
        ] {
            if &bytes[range.clone()] != marker {
                return Err(WaveError::Malformed(format!(
                    "missing '{}' marker at byte {}",
                    String::from_utf8_lossy(marker),
                    range.start
                )));
            }
        }

        let u16_at = |at: usize| u16::from_le_bytes([bytes[at], bytes[at + 1]]);
        let u32_at =
            |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);

        let header = Self {
            chunk_size: u32_at(4),
            audio_format: u16_at(20),
            channels: u16_at(22),
            sample_rate: u32_at(24),
            byte_rate: u32_at(28),
            block_align: u16_at(32),
            bits_per_sample: u16_at(34),
            data_size: u32_at(40),
        };

        if header.audio_format != FORMAT_IEEE_FLOAT {
            return Err(WaveError::Malformed(format!(
                "audio format {} is not IEEE float",
                header.audio_format
            )));
        }
        if header.bits_per_sample != BITS_PER_SAMPLE {
            return Err(WaveError::Malformed(format!(
                "{} bits per sample, expected {}",
                header.bits_per_sample, BITS_PER_SAMPLE
            )));
        }

        Ok(header)
    }
}

/// A decoded recording
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedWave {
    pub header: WaveHeader,
    /// Buffers of exactly the requested size, last one zero padded
    pub buffers: Vec<Vec<f32>>,
}

impl DecodedWave {
    pub fn sample_count(&self) -> usize {
        self.buffers.iter().map(|b| b.len()).sum()
    }
}

/// Write header and samples of `buffers` in order
pub fn write_wave<W, B>(writer: &mut W, buffers: &[B], format: WaveFormat) -> Result<(), WaveError>
where
    W: Write,
    B: AsRef<[f32]>,
{
    let samples: usize = buffers.iter().map(|b| b.as_ref().len()).sum();
    let data_bytes = samples * BYTES_PER_SAMPLE;
    let data_size = u32::try_from(data_bytes)
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or(WaveError::TooLarge(data_bytes))?;

    writer.write_all(&WaveHeader::float_pcm(format, data_size).to_bytes())?;

    let mut chunk = Vec::new();
    for buffer in buffers {
        chunk.clear();
        for sample in buffer.as_ref() {
            chunk.extend_from_slice(&sample.to_le_bytes());
        }
        writer.write_all(&chunk)?;
    }
    writer.flush()?;
    Ok(())
}

/// Encode `buffers` into an in-memory wave file
pub fn encode<B: AsRef<[f32]>>(buffers: &[B], format: WaveFormat) -> Result<Vec<u8>, WaveError> {
    let samples: usize = buffers.iter().map(|b| b.as_ref().len()).sum();
    let mut out = Vec::with_capacity(HEADER_LEN + samples * BYTES_PER_SAMPLE);
    write_wave(&mut out, buffers, format)?;
    Ok(out)
}

/// Decode a wave file into buffers of `buffer_size` samples
pub fn decode(bytes: &[u8], buffer_size: usize) -> Result<DecodedWave, WaveError> {
    if buffer_size == 0 {
        return Err(WaveError::ZeroBufferSize);
    }
    let header = WaveHeader::parse(bytes)?;

    let data = &bytes[HEADER_LEN..];
    let buffers = data
        .chunks(buffer_size * BYTES_PER_SAMPLE)
        .filter(|chunk| chunk.len() >= BYTES_PER_SAMPLE)
        .map(|chunk| {
            let mut buffer: Vec<f32> = chunk
                .chunks_exact(BYTES_PER_SAMPLE)
                .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
                .collect();
            buffer.resize(buffer_size, 0.0);
            buffer
        })
        .collect();

    Ok(DecodedWave { header, buffers })
}

/// Save buffers to a wave file, creating parent directories as needed
pub fn save<B: AsRef<[f32]>>(path: &Path, buffers: &[B], format: WaveFormat) -> Result<(), WaveError> {
    let write_err = |source| WaveError::Write {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }

    let file = File::create(path).map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    match write_wave(&mut writer, buffers, format) {
        Err(WaveError::Io(source)) => Err(write_err(source)),
        other => other,
    }
}

/// Load a wave file into buffers of `buffer_size` samples
pub fn load(path: &Path, buffer_size: usize) -> Result<DecodedWave, WaveError> {
    let bytes = std::fs::read(path).map_err(|source| WaveError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    decode(&bytes, buffer_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MONO_44K: WaveFormat = WaveFormat {
        channels: 1,
        sample_rate: 44100,
    };

    fn ramp(buffers: usize, size: usize) -> Vec<Vec<f32>> {
        (0..buffers)
            .map(|b| (0..size).map(|i| (b * size + i) as f32 / 1000.0).collect())
            .collect()
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode(&ramp(3, 1024), MONO_44K).unwrap();
        let data_size = 3 * 1024 * 4;
        assert_eq!(bytes.len(), HEADER_LEN + data_size);

        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32::from_le_bytes(bytes[4..8].try_into().unwrap()), data_size as u32 + 36);
        assert_eq!(&bytes[8..16], b"WAVEfmt ");
        assert_eq!(u32::from_le_bytes(bytes[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(bytes[20..22].try_into().unwrap()), 3);
        assert_eq!(u16::from_le_bytes(bytes[22..24].try_into().unwrap()), 1);
        assert_eq!(u32::from_le_bytes(bytes[24..28].try_into().unwrap()), 44100);
        assert_eq!(u32::from_le_bytes(bytes[28..32].try_into().unwrap()), 44100 * 4);
        assert_eq!(u16::from_le_bytes(bytes[32..34].try_into().unwrap()), 4);
        assert_eq!(u16::from_le_bytes(bytes[34..36].try_into().unwrap()), 32);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32::from_le_bytes(bytes[40..44].try_into().unwrap()), data_size as u32);
    }

    #[test]
    fn test_stereo_block_align_and_byte_rate() {
        let header = WaveHeader::float_pcm(
            WaveFormat {
                channels: 2,
                sample_rate: 48000,
            },
            0,
        );
        assert_eq!(header.block_align, 8);
        assert_eq!(header.byte_rate, 48000 * 8);
        assert_eq!(header.chunk_size, 36);
    }

    #[test]
    fn test_samples_are_little_endian_in_order() {
        let bytes = encode(&[vec![1.0f32, -0.5], vec![0.25, 2.0]], MONO_44K).unwrap();
        let body: Vec<f32> = bytes[HEADER_LEN..]
            .chunks_exact(4)
            .map(|b| f32::from_le_bytes(b.try_into().unwrap()))
            .collect();
        assert_eq!(body, vec![1.0, -0.5, 0.25, 2.0]);
    }

    #[test]
    fn test_decode_restores_buffers() {
        let original = ramp(3, 256);
        let decoded = decode(&encode(&original, MONO_44K).unwrap(), 256).unwrap();
        assert_eq!(decoded.buffers, original);
        assert_eq!(decoded.header.format(), MONO_44K);
    }

    #[test]
    fn test_decode_pads_last_buffer() {
        let samples: Vec<f32> = (1..=10).map(|i| i as f32).collect();
        let decoded = decode(&encode(&[samples], MONO_44K).unwrap(), 4).unwrap();
        assert_eq!(decoded.buffers.len(), 3);
        assert_eq!(decoded.buffers[2], vec![9.0, 10.0, 0.0, 0.0]);
        assert_eq!(decoded.sample_count(), 12);
    }

    #[test]
    fn test_decode_empty_data_section() {
        let empty: [Vec<f32>; 0] = [];
        let decoded = decode(&encode(&empty, MONO_44K).unwrap(), 1024).unwrap();
        assert!(decoded.buffers.is_empty());
    }

    #[test]
    fn test_decode_ignores_trailing_partial_sample() {
        let mut bytes = encode(&[vec![0.5f32; 4]], MONO_44K).unwrap();
        bytes.extend_from_slice(&[0xAB, 0xCD]);
        let decoded = decode(&bytes, 4).unwrap();
        assert_eq!(decoded.buffers, vec![vec![0.5; 4]]);
    }

    #[test]
    fn test_decode_rejects_bad_magic() {
        let mut bytes = encode(&[vec![0.0f32; 4]], MONO_44K).unwrap();
        bytes[8..12].copy_from_slice(b"AVI ");
        assert!(matches!(decode(&bytes, 4), Err(WaveError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_integer_pcm() {
        let mut bytes = encode(&[vec![0.0f32; 4]], MONO_44K).unwrap();
        bytes[20..22].copy_from_slice(&1u16.to_le_bytes());
        assert!(matches!(decode(&bytes, 4), Err(WaveError::Malformed(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_header() {
        assert!(matches!(decode(&[0u8; 20], 4), Err(WaveError::Malformed(_))));
        assert!(matches!(decode(&[0u8; 64], 0), Err(WaveError::ZeroBufferSize)));
    }

    #[test]
    fn test_save_and_load_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("take.wav");
        let original = ramp(2, 128);

        save(&path, &original, MONO_44K).unwrap();
        let loaded = load(&path, 128).unwrap();
        assert_eq!(loaded.buffers, original);
    }

    #[test]
    fn test_load_missing_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.wav");
        match load(&path, 128) {
            Err(WaveError::Read { path: p, .. }) => assert_eq!(p, path),
            other => panic!("expected read error, got {:?}", other),
        }
    }
}
