//! Update rate control for frame subscriptions

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Update rate for frame streams
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum UpdateRate {
    /// Every published frame (typically 100Hz from the rig)
    Native,

    /// At most this many frames per second, latest wins.
    /// If the requested rate reaches the source rate, Native is used
    Max(u32),

    /// Poll the hand-off slot on a fixed cadence, like a dashboard timer
    Every(Duration),
}

impl UpdateRate {
    /// Normalize rate against source frequency
    /// Returns effective rate to use
    pub fn normalize(self, source_hz: f64) -> Self {
        match self {
            UpdateRate::Native => UpdateRate::Native,
            UpdateRate::Max(0) => UpdateRate::Native,
            UpdateRate::Max(hz) if hz as f64 >= source_hz => UpdateRate::Native,
            UpdateRate::Max(hz) => UpdateRate::Max(hz),
            UpdateRate::Every(period) if period.is_zero() => UpdateRate::Native,
            UpdateRate::Every(period) => UpdateRate::Every(period),
        }
    }

    /// Sampling interval if rate limiting is needed
    pub fn sample_interval(self, source_hz: f64) -> Option<Duration> {
        match self.normalize(source_hz) {
            UpdateRate::Native => None,
            UpdateRate::Max(hz) => Some(Duration::from_secs_f64(1.0 / hz as f64)),
            UpdateRate::Every(period) => Some(period),
        }
    }
}
