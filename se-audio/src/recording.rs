//! Recording store and playback cursor

use crate::buffer::AudioBuffer;

/// Ordered sequence of equally sized buffers
///
/// Appended to while recording, randomly indexed while playing.
#[derive(Debug, Clone)]
pub struct RecordingStore {
    buffers: Vec<AudioBuffer>,
    buffer_size: usize,
}

impl RecordingStore {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffers: Vec::new(),
            buffer_size,
        }
    }

    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    /// Number of buffers
    pub fn len(&self) -> usize {
        self.buffers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffers.is_empty()
    }

    pub fn buffers(&self) -> &[AudioBuffer] {
        &self.buffers
    }

    pub fn get(&self, index: usize) -> Option<&AudioBuffer> {
        self.buffers.get(index)
    }

    /// Append a copy of `samples`, padded or truncated to the buffer size
    pub fn append(&mut self, samples: &[f32]) {
        let mut buffer = AudioBuffer::silent(self.buffer_size);
        buffer.fill_from(samples);
        self.buffers.push(buffer);
    }

    pub fn clear(&mut self) {
        self.buffers.clear();
    }

    /// Replace the contents with decoded buffers
    pub fn replace(&mut self, buffers: Vec<Vec<f32>>) {
        self.buffers.clear();
        for samples in buffers {
            self.append(&samples);
        }
    }

    pub fn sample_count(&self) -> usize {
        self.buffer_size * self.buffers.len()
    }

    /// Sample at a flat index; out of range reads as silence
    pub fn sample_at(&self, index: usize) -> f32 {
        if self.buffer_size > 0 {
            if let Some(buffer) = self.buffers.get(index / self.buffer_size) {
                return buffer[index % self.buffer_size];
            }
        }
        tracing::warn!(
            "Sample index {} out of range (recording has {} samples)",
            index,
            self.sample_count()
        );
        0.0
    }

    /// Re-slice every sample into buffers of a new size
    ///
    /// The final buffer is zero padded.
    pub fn rechunk(&mut self, buffer_size: usize) {
        if buffer_size == self.buffer_size {
            return;
        }
        let samples: Vec<f32> = self.buffers.iter().flat_map(|b| b.iter().copied()).collect();
        self.buffer_size = buffer_size;
        self.buffers.clear();
        if buffer_size == 0 {
            return;
        }
        for chunk in samples.chunks(buffer_size) {
            self.append(chunk);
        }
    }
}

/// Read position into a `RecordingStore`, counted in buffers
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlaybackCursor {
    position: usize,
}

impl PlaybackCursor {
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    pub fn advance(&mut self) {
        self.position += 1;
    }

    /// Place the cursor at `floor(progress * count)`, clamped to `[0, count]`
    pub fn set_progress(&mut self, progress: f64, count: usize) {
        let index = (progress * count as f64).floor();
        self.position = if index.is_nan() || index <= 0.0 {
            0
        } else {
            (index as usize).min(count)
        };
    }

    /// Position as a fraction of `count`; 0 for an empty store
    pub fn progress(&self, count: usize) -> f64 {
        if count == 0 {
            0.0
        } else {
            self.position as f64 / count as f64
        }
    }
}
