//! Simulated acquisition device
//!
//! Generates rows at a nominal rate from per-channel [`SignalPattern`]s.
//! Useful for demos and for exercising the external device path without
//! hardware.

use std::time::Instant;

use crate::clock::SharedClock;
use crate::error::{Result, SyncError};

use super::AcquisitionDevice;

/// Upper bound on rows returned by one read
const MAX_ROWS_PER_READ: u64 = 1024;

/// Data generation pattern for one simulated channel
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SignalPattern {
    /// Constant value
    Constant(f64),
    /// Sine wave with frequency and amplitude
    Sine {
        frequency: f64,
        amplitude: f64,
        offset: f64,
    },
    /// Counter that increments once per sample and wraps
    Counter { step: f64, min: f64, max: f64 },
    /// Uniform noise within range
    Noise { min: f64, max: f64 },
    /// Sawtooth wave
    Sawtooth { period: f64, amplitude: f64 },
    /// Square wave
    Square { period: f64, amplitude: f64 },
}

impl Default for SignalPattern {
    fn default() -> Self {
        SignalPattern::Sine {
            frequency: 1.0,
            amplitude: 1.0,
            offset: 0.0,
        }
    }
}

impl SignalPattern {
    /// Value of the pattern for sample `index` at `elapsed_secs`
    pub fn value_at(&self, index: u64, elapsed_secs: f64, rng: &mut XorShift) -> f64 {
        match *self {
            SignalPattern::Constant(v) => v,
            SignalPattern::Sine {
                frequency,
                amplitude,
                offset,
            } => offset + amplitude * (2.0 * std::f64::consts::PI * frequency * elapsed_secs).sin(),
            SignalPattern::Counter { step, min, max } => {
                let span = max - min;
                if span <= 0.0 {
                    return min;
                }
                min + (index as f64 * step).rem_euclid(span)
            }
            SignalPattern::Noise { min, max } => min + rng.next_f64() * (max - min),
            SignalPattern::Sawtooth { period, amplitude } => {
                if period <= 0.0 {
                    return 0.0;
                }
                amplitude * (elapsed_secs % period) / period
            }
            SignalPattern::Square { period, amplitude } => {
                if period <= 0.0 {
                    return amplitude;
                }
                if elapsed_secs % period < period / 2.0 {
                    amplitude
                } else {
                    -amplitude
                }
            }
        }
    }
}

/// Small xorshift generator for noise channels
#[derive(Debug, Clone)]
pub struct XorShift(u64);

impl XorShift {
    pub fn new(seed: u64) -> Self {
        Self(seed.max(1))
    }

    pub fn next_f64(&mut self) -> f64 {
        let mut s = self.0;
        s ^= s << 13;
        s ^= s >> 7;
        s ^= s << 17;
        self.0 = s;
        (s as f64) / (u64::MAX as f64)
    }
}

/// Acquisition device producing synthetic rows in real time
#[derive(Debug)]
pub struct SimulatedDevice {
    name: String,
    rate: f64,
    channels: Vec<SignalPattern>,
    clock: Option<SharedClock>,
    available: bool,
    started: Option<Instant>,
    emitted: u64,
    rng: XorShift,
}

impl SimulatedDevice {
    pub fn new(name: impl Into<String>, rate: f64, channels: Vec<SignalPattern>) -> Self {
        Self {
            name: name.into(),
            rate,
            channels,
            clock: None,
            available: true,
            started: None,
            emitted: 0,
            rng: XorShift::new(12345),
        }
    }

    /// A device whose `prepare` always fails
    pub fn unavailable(name: impl Into<String>) -> Self {
        Self {
            available: false,
            ..Self::new(name, 0.0, Vec::new())
        }
    }

    /// Stamp samples in a separate clock domain
    pub fn with_clock(mut self, clock: SharedClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Rows produced so far
    pub fn emitted(&self) -> u64 {
        self.emitted
    }
}

impl AcquisitionDevice for SimulatedDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn nominal_rate(&self) -> f64 {
        self.rate
    }

    fn channel_count(&self) -> Option<usize> {
        Some(self.channels.len())
    }

    fn clock(&self) -> Option<SharedClock> {
        self.clock.clone()
    }

    fn prepare(&mut self) -> Result<()> {
        if !self.available {
            return Err(SyncError::Device(format!(
                "simulated device '{}' is not connected",
                self.name
            )));
        }
        if self.rate <= 0.0 || self.channels.is_empty() {
            return Err(SyncError::Device(format!(
                "simulated device '{}' needs a positive rate and at least one channel",
                self.name
            )));
        }
        Ok(())
    }

    fn start_stream(&mut self) -> Result<()> {
        self.started = Some(Instant::now());
        self.emitted = 0;
        Ok(())
    }

    fn read_available(&mut self) -> Result<Vec<Vec<f64>>> {
        let Some(started) = self.started else {
            return Err(SyncError::Device("stream not started".to_string()));
        };
        let due = (started.elapsed().as_secs_f64() * self.rate).floor() as u64;
        let end = due.min(self.emitted + MAX_ROWS_PER_READ);

        let mut rows = Vec::with_capacity((end.saturating_sub(self.emitted)) as usize);
        for index in self.emitted..end {
            let t = index as f64 / self.rate;
            let row = self
                .channels
                .iter()
                .map(|pattern| pattern.value_at(index, t, &mut self.rng))
                .collect();
            rows.push(row);
        }
        self.emitted = end.max(self.emitted);
        Ok(rows)
    }

    fn stop_stream(&mut self) -> Result<()> {
        self.started = None;
        Ok(())
    }
}
