//! Outgoing signal shaping and hook helpers

/// Zero every sample
#[inline]
pub fn mute(buffer: &mut [f32]) {
    buffer.fill(0.0);
}

#[inline]
pub fn apply_volume(buffer: &mut [f32], volume: f32) {
    for sample in buffer.iter_mut() {
        *sample *= volume;
    }
}

/// Scaled copy of an interleaved buffer
///
/// Shaped for use inside a data hook:
/// `engine.on_data(|b| apply_damping(b, 0.5))`.
pub fn apply_damping(buffer: &[f32], coefficient: f32) -> Vec<f32> {
    buffer.iter().map(|s| s * coefficient).collect()
}

/// Scaled copy of per-channel buffers
pub fn apply_damping_planar<B: AsRef<[f32]>>(channels: &[B], coefficient: f32) -> Vec<Vec<f32>> {
    channels
        .iter()
        .map(|channel| apply_damping(channel.as_ref(), coefficient))
        .collect()
}
