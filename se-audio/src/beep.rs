//! Injected sine tone
//!
//! A beep is mixed additively into outgoing buffers until a wall-clock
//! deadline passes. Starting a beep while one is active restarts it with the
//! new settings.

use std::f64::consts::PI;
use std::time::{Duration, Instant};

pub const DEFAULT_BEEP_FREQUENCY: f64 = 700.0;
pub const DEFAULT_BEEP_LEVEL: f64 = 1.0;
pub const DEFAULT_BEEP_DURATION_MS: u64 = 200;

/// Gain applied on top of the level
const BEEP_GAIN: f64 = 0.72;

/// Beep settings; `None` fields take the defaults
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BeepOptions {
    pub frequency: Option<f64>,
    /// 0.0 to 1.0
    pub level: Option<f64>,
    pub duration_ms: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct Beep {
    active: bool,
    frequency: f64,
    level: f64,
    duration_ms: u64,
    /// Samples emitted so far minus one
    index: i64,
    end_index: f64,
    deadline: Option<Instant>,
}

impl Default for Beep {
    fn default() -> Self {
        Self {
            active: false,
            frequency: DEFAULT_BEEP_FREQUENCY,
            level: DEFAULT_BEEP_LEVEL,
            duration_ms: DEFAULT_BEEP_DURATION_MS,
            index: -1,
            end_index: 0.0,
            deadline: None,
        }
    }
}

impl Beep {
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn frequency(&self) -> f64 {
        self.frequency
    }

    pub fn level(&self) -> f64 {
        self.level
    }

    pub fn duration_ms(&self) -> u64 {
        self.duration_ms
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Arm a beep; returns true if an active beep was restarted
    pub fn start(&mut self, options: BeepOptions, sample_rate: u32, channels: u16, now: Instant) -> bool {
        let restarted = self.active;
        if restarted {
            *self = Self::default();
        }

        if let Some(frequency) = options.frequency {
            self.frequency = frequency;
        }
        if let Some(level) = options.level {
            if !(0.0..=1.0).contains(&level) {
                tracing::warn!("Beep level {} out of range, clamping to 0..1", level);
            }
            self.level = if level.is_nan() { DEFAULT_BEEP_LEVEL } else { level.clamp(0.0, 1.0) };
        }
        if let Some(duration_ms) = options.duration_ms {
            self.duration_ms = duration_ms;
        }

        let seconds = self.duration_ms as f64 / 1000.0;
        self.end_index = sample_rate as f64 * channels.max(1) as f64 * seconds;
        self.deadline = Some(now + Duration::from_millis(self.duration_ms));
        self.active = true;

        tracing::debug!(
            "Beep armed: {} Hz, level {}, {} ms",
            self.frequency,
            self.level,
            self.duration_ms
        );
        restarted
    }

    /// Stop the beep once its deadline has passed; returns true if it stopped
    pub fn poll(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if self.active && now >= deadline => {
                *self = Self::default();
                true
            }
            _ => false,
        }
    }

    /// Add the tone to every sample of `buffer`
    ///
    /// Returns true when this call produced the first sample of the beep.
    pub fn mix_into(&mut self, buffer: &mut [f32]) -> bool {
        if !self.active {
            return false;
        }
        let mut started = false;
        let seconds = self.duration_ms as f64 / 1000.0;

        for sample in buffer.iter_mut() {
            self.index += 1;
            if self.index == 0 {
                started = true;
            }
            let position = if self.end_index > 0.0 {
                self.index as f64 / self.end_index
            } else {
                0.0
            };
            let tone = (2.0 * self.frequency * position * seconds * PI).sin() * BEEP_GAIN * self.level;
            *sample += tone as f32;
        }
        started
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_inactive_beep_leaves_buffer_untouched() {
        let mut beep = Beep::default();
        let mut buffer = [0.25; 8];
        assert!(!beep.mix_into(&mut buffer));
        assert_eq!(buffer, [0.25; 8]);
    }

    #[test]
    fn test_tone_matches_requested_frequency() {
        let mut beep = Beep::default();
        beep.start(BeepOptions::default(), 44100, 1, Instant::now());

        let mut buffer = [0.0f32; 64];
        assert!(beep.mix_into(&mut buffer));
        assert_eq!(buffer[0], 0.0);
        for (i, &sample) in buffer.iter().enumerate() {
            let t = i as f64 / 44100.0;
            let expected = (2.0 * PI * 700.0 * t).sin() * 0.72;
            assert_abs_diff_eq!(sample as f64, expected, epsilon = 1e-5);
        }

        // Phase continues across buffers and started fires once
        assert!(!beep.mix_into(&mut buffer));
    }

    #[test]
    fn test_end_index_uses_channels() {
        let mut beep = Beep::default();
        beep.start(
            BeepOptions {
                duration_ms: Some(500),
                ..Default::default()
            },
            48000,
            2,
            Instant::now(),
        );
        assert_abs_diff_eq!(beep.end_index, 48000.0);
    }

    #[test]
    fn test_deadline_stops_and_resets() {
        let now = Instant::now();
        let mut beep = Beep::default();
        beep.start(
            BeepOptions {
                frequency: Some(440.0),
                level: Some(0.5),
                duration_ms: Some(200),
            },
            44100,
            1,
            now,
        );
        assert!(!beep.poll(now + Duration::from_millis(199)));
        assert!(beep.is_active());

        assert!(beep.poll(now + Duration::from_millis(200)));
        assert!(!beep.is_active());
        assert_eq!(beep.frequency(), DEFAULT_BEEP_FREQUENCY);
        assert_eq!(beep.level(), DEFAULT_BEEP_LEVEL);
        assert_eq!(beep.duration_ms(), DEFAULT_BEEP_DURATION_MS);
        assert!(!beep.poll(now + Duration::from_secs(1)));
    }

    #[test]
    fn test_restart_rearms_with_new_settings() {
        let now = Instant::now();
        let mut beep = Beep::default();
        beep.start(BeepOptions::default(), 44100, 1, now);
        beep.mix_into(&mut [0.0; 16]);

        let later = now + Duration::from_millis(100);
        let restarted = beep.start(
            BeepOptions {
                duration_ms: Some(50),
                ..Default::default()
            },
            44100,
            1,
            later,
        );
        assert!(restarted);
        assert_eq!(beep.deadline(), Some(later + Duration::from_millis(50)));
        assert!(beep.mix_into(&mut [0.0; 4]));
    }

    #[test]
    fn test_level_is_clamped() {
        let mut beep = Beep::default();
        beep.start(
            BeepOptions {
                level: Some(3.0),
                ..Default::default()
            },
            44100,
            1,
            Instant::now(),
        );
        assert_eq!(beep.level(), 1.0);
    }
}
