//! Buffer hand-off between the real-time callback and the host thread
//!
//! Two fixed-capacity SPSC rings carry buffer ownership across the boundary:
//! intake (callback -> host) and outtake (host -> callback). The callback side
//! recycles buffers through a preallocated pool, so the real-time path never
//! allocates.
//!
//! ```text
//!   driver ──▶ HardwareBridge ──intake──▶ BufferExchange ──▶ processing
//!   driver ◀── HardwareBridge ◀─outtake── BufferExchange ◀── processing
//! ```

use crate::buffer::AudioBuffer;
use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Capacity of each ring in buffers
pub const DEFAULT_QUEUE_CAPACITY: usize = 100;

/// Boundary counters, readable from any thread
#[derive(Debug, Default)]
pub struct ExchangeStats {
    underflows: AtomicU64,
    overruns: AtomicU64,
}

impl ExchangeStats {
    /// Output requests with no processed buffer ready
    pub fn underflows(&self) -> u64 {
        self.underflows.load(Ordering::Relaxed)
    }

    /// Input buffers dropped because the pool or intake was exhausted
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }
}

/// Host-side ends of the exchange
pub struct BufferExchange {
    intake: HeapCons<AudioBuffer>,
    outtake: HeapProd<AudioBuffer>,
    buffer_size: usize,
    stats: Arc<ExchangeStats>,
}

/// Callback-side ends of the exchange plus the buffer pool
pub struct HardwareBridge {
    intake: HeapProd<AudioBuffer>,
    outtake: HeapCons<AudioBuffer>,
    spare: Vec<AudioBuffer>,
    pool_size: usize,
    buffer_size: usize,
    in_underflow: bool,
    stats: Arc<ExchangeStats>,
}

/// Create a connected exchange for buffers of `buffer_size` samples
pub fn exchange(buffer_size: usize, capacity: usize) -> (BufferExchange, HardwareBridge) {
    let capacity = capacity.max(1);
    let (intake_tx, intake_rx) = HeapRb::<AudioBuffer>::new(capacity).split();
    let (outtake_tx, outtake_rx) = HeapRb::<AudioBuffer>::new(capacity).split();
    let stats = Arc::new(ExchangeStats::default());

    // Enough buffers to fill both rings with one in flight on each side
    let pool_size = capacity * 2 + 2;
    let spare = (0..pool_size)
        .map(|_| AudioBuffer::silent(buffer_size))
        .collect();

    let host = BufferExchange {
        intake: intake_rx,
        outtake: outtake_tx,
        buffer_size,
        stats: Arc::clone(&stats),
    };
    let bridge = HardwareBridge {
        intake: intake_tx,
        outtake: outtake_rx,
        spare,
        pool_size,
        buffer_size,
        in_underflow: false,
        stats,
    };
    (host, bridge)
}

impl BufferExchange {
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn stats(&self) -> &Arc<ExchangeStats> {
        &self.stats
    }

    /// Take the oldest captured buffer, if any
    pub fn receive(&mut self) -> Option<AudioBuffer> {
        self.intake.try_pop()
    }

    pub fn pending(&self) -> usize {
        self.intake.occupied_len()
    }

    /// Queue a processed buffer for the callback
    ///
    /// Returns the buffer back if the outtake ring is full.
    pub fn send(&mut self, buffer: AudioBuffer) -> Result<(), AudioBuffer> {
        self.outtake.try_push(buffer)
    }

    /// Discard every in-flight buffer, returning them to the bridge pool
    ///
    /// Requires exclusive access to the bridge, so the caller must hold the
    /// stream guard.
    pub fn synchronize(&mut self, bridge: &mut HardwareBridge) -> usize {
        let mut drained = 0;
        while let Some(buffer) = self.intake.try_pop() {
            bridge.recycle(buffer);
            drained += 1;
        }
        while let Some(buffer) = bridge.outtake.try_pop() {
            bridge.recycle(buffer);
            drained += 1;
        }
        bridge.replenish();
        bridge.in_underflow = false;
        drained
    }
}

impl HardwareBridge {
    pub fn buffer_size(&self) -> usize {
        self.buffer_size
    }

    pub fn stats(&self) -> &Arc<ExchangeStats> {
        &self.stats
    }

    pub fn spare(&self) -> usize {
        self.spare.len()
    }

    /// One driver period
    ///
    /// Captures `input` (zeros when absent) onto intake, then plays the next
    /// processed buffer into `output`. An empty outtake produces silence.
    /// Never blocks and never allocates.
    pub fn process(&mut self, input: Option<&[f32]>, output: Option<&mut [f32]>) {
        match self.spare.pop() {
            Some(mut buffer) => {
                match input {
                    Some(samples) => buffer.fill_from(samples),
                    None => buffer.fill(0.0),
                }
                if let Err(buffer) = self.intake.try_push(buffer) {
                    self.spare.push(buffer);
                    self.stats.overruns.fetch_add(1, Ordering::Relaxed);
                }
            }
            None => {
                self.stats.overruns.fetch_add(1, Ordering::Relaxed);
            }
        }

        match self.outtake.try_pop() {
            Some(buffer) => {
                if let Some(out) = output {
                    buffer.copy_into(out);
                }
                self.recycle(buffer);
                self.in_underflow = false;
            }
            None => {
                if let Some(out) = output {
                    out.fill(0.0);
                }
                self.stats.underflows.fetch_add(1, Ordering::Relaxed);
                if !self.in_underflow {
                    self.in_underflow = true;
                    tracing::warn!("Buffer underflow, outputting silence");
                }
            }
        }
    }

    fn recycle(&mut self, buffer: AudioBuffer) {
        if self.spare.len() < self.pool_size && buffer.len() == self.buffer_size {
            self.spare.push(buffer);
        }
    }

    /// Top the pool back up after buffers were dropped host-side
    fn replenish(&mut self) {
        while self.spare.len() < self.pool_size {
            self.spare.push(AudioBuffer::silent(self.buffer_size));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_input_reaches_host() {
        let (mut host, mut bridge) = exchange(4, 8);
        bridge.process(Some(&[0.1, 0.2, 0.3, 0.4]), None);

        assert_eq!(host.pending(), 1);
        let buffer = host.receive().unwrap();
        assert_eq!(&*buffer, &[0.1, 0.2, 0.3, 0.4]);
        assert!(host.receive().is_none());
    }

    #[test]
    fn test_missing_input_is_zero_filled() {
        let (mut host, mut bridge) = exchange(3, 8);
        bridge.process(None, None);
        assert_eq!(&*host.receive().unwrap(), &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn test_output_follows_processed_buffers_in_order() {
        let (mut host, mut bridge) = exchange(2, 8);
        host.send(AudioBuffer::from(vec![1.0, 2.0])).unwrap();
        host.send(AudioBuffer::from(vec![3.0, 4.0])).unwrap();

        let mut out = [0.0; 2];
        bridge.process(None, Some(&mut out));
        assert_eq!(out, [1.0, 2.0]);
        bridge.process(None, Some(&mut out));
        assert_eq!(out, [3.0, 4.0]);
    }

    #[test]
    fn test_underflow_outputs_silence() {
        let (host, mut bridge) = exchange(4, 8);
        let mut out = [0.7; 4];
        bridge.process(None, Some(&mut out));
        bridge.process(None, Some(&mut out));
        assert_eq!(out, [0.0; 4]);
        assert_eq!(host.stats().underflows(), 2);
    }

    #[test]
    fn test_full_intake_counts_overrun() {
        let (host, mut bridge) = exchange(2, 2);
        for _ in 0..5 {
            bridge.process(Some(&[1.0, 1.0]), None);
        }
        assert_eq!(host.pending(), 2);
        assert_eq!(host.stats().overruns(), 3);
    }

    #[test]
    fn test_buffers_are_recycled() {
        let (mut host, mut bridge) = exchange(2, 2);
        let pool = bridge.spare();
        for _ in 0..50 {
            bridge.process(Some(&[0.5, 0.5]), Some(&mut [0.0; 2]));
            let buffer = host.receive().unwrap();
            host.send(buffer).unwrap();
        }
        // One buffer sits in outtake waiting for the next period
        assert_eq!(bridge.spare(), pool - 1);
        assert_eq!(host.stats().overruns(), 0);
    }

    #[test]
    fn test_synchronize_drains_both_rings() {
        let (mut host, mut bridge) = exchange(2, 8);
        bridge.process(Some(&[1.0, 1.0]), None);
        bridge.process(Some(&[2.0, 2.0]), None);
        host.send(AudioBuffer::from(vec![3.0, 3.0])).unwrap();

        let drained = host.synchronize(&mut bridge);
        assert_eq!(drained, 3);
        assert_eq!(host.pending(), 0);

        let mut out = [9.0; 2];
        bridge.process(None, Some(&mut out));
        assert_eq!(out, [0.0, 0.0]);
    }
}
