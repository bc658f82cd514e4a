use std::time::Duration;
use log::{debug, warn};
use crate::libs::keyer_io::keyer_io::{KeyerSpeed, keyer_speed_is_usual, MAX_KEYER_SPEED, MIN_KEYER_SPEED};

// "PARIS" is 50 units long, so one unit is a minute divided by 50 × WPM.
const MS_PER_MINUTE: f64 = 60000.0;
const UNITS_PER_WORD: f64 = 50.0;
const DAH_UNITS: f64 = 3.0;
const WORD_UNITS: f64 = 7.0;

// The poller must sample several times per unit or dit/dah classification gets sloppy.
const MIN_POLLS_PER_UNIT: f64 = 3.0;

/// The decoding thresholds, all derived from the keyer speed. There are no setters for the
/// individual thresholds: the 1:3:7 ratio is fixed.
pub trait KeyingTiming: Send {
    fn set_keyer_speed(&mut self, speed: KeyerSpeed) -> Result<(), String>;
    fn get_keyer_speed(&self) -> KeyerSpeed;

    /// One dit.
    fn get_unit_ms(&self) -> f64;
    /// Minimum held-down time for a dah, and minimum silence after a locked symbol to close the
    /// character.
    fn get_dah_threshold_ms(&self) -> f64;
    /// Minimum silence to close a word.
    fn get_word_threshold_ms(&self) -> f64;

    fn get_unit_duration(&self) -> Duration {
        Duration::from_micros((self.get_unit_ms() * 1000.0).round() as u64)
    }

    fn poll_interval_is_adequate(&self, poll_interval: Duration) -> bool {
        let poll_ms = poll_interval.as_micros() as f64 / 1000.0;
        self.get_unit_ms() >= poll_ms * MIN_POLLS_PER_UNIT
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DefaultKeyingTiming {
    keyer_speed: KeyerSpeed,
    unit_ms: f64,
    dah_threshold_ms: f64,
    word_threshold_ms: f64,
}

impl DefaultKeyingTiming {
    pub fn new(speed: KeyerSpeed) -> Result<Self, String> {
        let mut timing = Self {
            keyer_speed: 0,
            unit_ms: 0.0,
            dah_threshold_ms: 0.0,
            word_threshold_ms: 0.0,
        };
        timing.set_keyer_speed(speed)?;
        Ok(timing)
    }
}

impl KeyingTiming for DefaultKeyingTiming {
    fn set_keyer_speed(&mut self, speed: KeyerSpeed) -> Result<(), String> {
        if speed == 0 {
            return Err("Keyer speed must be at least 1 WPM".to_owned());
        }
        if !keyer_speed_is_usual(speed) {
            warn!("Keyer speed of {} WPM is outside the usual range [{}..{}] WPM", speed, MIN_KEYER_SPEED, MAX_KEYER_SPEED);
        }
        let unit_ms = MS_PER_MINUTE / (UNITS_PER_WORD * speed as f64);
        self.keyer_speed = speed;
        self.unit_ms = unit_ms;
        self.dah_threshold_ms = unit_ms * DAH_UNITS;
        self.word_threshold_ms = unit_ms * WORD_UNITS;
        debug!("KeyingTiming speed set to {} WPM; unit: {}ms dah threshold: {}ms word threshold: {}ms",
            self.keyer_speed, self.unit_ms, self.dah_threshold_ms, self.word_threshold_ms);
        Ok(())
    }

    fn get_keyer_speed(&self) -> KeyerSpeed {
        self.keyer_speed
    }

    fn get_unit_ms(&self) -> f64 {
        self.unit_ms
    }

    fn get_dah_threshold_ms(&self) -> f64 {
        self.dah_threshold_ms
    }

    fn get_word_threshold_ms(&self) -> f64 {
        self.word_threshold_ms
    }
}

#[cfg(test)]
#[path = "./keying_timing_spec.rs"]
mod keying_timing_spec;
