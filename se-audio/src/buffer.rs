//! Owned fixed-size sample buffer

use std::ops::{Deref, DerefMut};

/// A fixed-length block of interleaved float samples
///
/// The length is set at construction and never changes, so a buffer can be
/// recycled through the exchange without reallocating.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer(Box<[f32]>);

impl AudioBuffer {
    pub fn silent(len: usize) -> Self {
        Self(vec![0.0; len].into_boxed_slice())
    }

    pub fn from_slice(samples: &[f32]) -> Self {
        Self(samples.into())
    }

    /// Copy `samples` in, zero filling whatever they don't cover
    pub fn fill_from(&mut self, samples: &[f32]) {
        let n = samples.len().min(self.0.len());
        self.0[..n].copy_from_slice(&samples[..n]);
        self.0[n..].fill(0.0);
    }

    /// Copy the buffer out, zero filling the rest of `out`
    pub fn copy_into(&self, out: &mut [f32]) {
        let n = out.len().min(self.0.len());
        out[..n].copy_from_slice(&self.0[..n]);
        out[n..].fill(0.0);
    }

    pub fn into_vec(self) -> Vec<f32> {
        self.0.into_vec()
    }
}

impl Deref for AudioBuffer {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.0
    }
}

impl DerefMut for AudioBuffer {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.0
    }
}

impl AsRef<[f32]> for AudioBuffer {
    fn as_ref(&self) -> &[f32] {
        &self.0
    }
}

impl From<Vec<f32>> for AudioBuffer {
    fn from(samples: Vec<f32>) -> Self {
        Self(samples.into_boxed_slice())
    }
}
