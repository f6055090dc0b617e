//! Conversion of analog samples into one-bit logic levels.
//!
//! Output uses one byte per sample holding `0` or `1`.

use crate::error::{Error, Result};

/// Writes `1` for every sample at or above `threshold`, `0` otherwise.
pub fn threshold(samples: &[f32], threshold: f32, out: &mut Vec<u8>) {
    out.extend(samples.iter().map(|&value| u8::from(value >= threshold)));
}

/// Two-threshold comparator with hysteresis.
///
/// The output switches to `1` only once a sample exceeds `high` and back to `0` only once a
/// sample falls below `low`; samples in between repeat the previous level.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SchmittTrigger {
    low: f32,
    high: f32,
    state: bool,
}

impl SchmittTrigger {
    /// Creates a trigger starting at the given output level.
    pub fn new(low: f32, high: f32, initial: bool) -> Result<Self> {
        if low.is_nan() || high.is_nan() || low > high {
            return Err(Error::config(format!(
                "schmitt trigger low threshold {low} exceeds high threshold {high}"
            )));
        }
        Ok(Self {
            low,
            high,
            state: initial,
        })
    }

    /// Current output level.
    pub fn state(&self) -> bool {
        self.state
    }

    /// Feeds `samples` through the trigger, appending one level per sample to `out`.
    pub fn feed(&mut self, samples: &[f32], out: &mut Vec<u8>) {
        out.reserve(samples.len());
        for &value in samples {
            if value < self.low {
                self.state = false;
            } else if value > self.high {
                self.state = true;
            }
            out.push(u8::from(self.state));
        }
    }
}
