use std::f64::consts::PI;

/// An endless sine wave of 16-bit samples. The sample index wraps at the sample rate: with an
/// integer frequency that is a whole number of cycles, so the wave is continuous across the wrap.
pub struct SineSamples {
    frequency: u16,
    amplitude: i16,
    sample_rate: u32,
    index: u32,
}

impl SineSamples {
    pub fn new(frequency: u16, amplitude: i16, sample_rate: u32) -> Self {
        Self { frequency, amplitude, sample_rate, index: 0 }
    }

    /// Back to the zero crossing at index 0.
    pub fn restart(&mut self) {
        self.index = 0;
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn frequency(&self) -> u16 {
        self.frequency
    }

    pub fn amplitude(&self) -> i16 {
        self.amplitude
    }

    fn sample_at(&self, index: u32) -> i16 {
        let angle = 2.0 * PI * self.frequency as f64 * index as f64 / self.sample_rate as f64;
        (self.amplitude as f64 * angle.sin()).round() as i16
    }
}

impl Iterator for SineSamples {
    type Item = i16;

    fn next(&mut self) -> Option<i16> {
        let sample = self.sample_at(self.index);
        self.index = (self.index + 1) % self.sample_rate;
        Some(sample)
    }
}

#[cfg(test)]
#[path = "./sine_samples_spec.rs"]
mod sine_samples_spec;
