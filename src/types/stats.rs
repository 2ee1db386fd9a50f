//! Ingest counters shared between the receive task and its readers

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Monotonic counters updated by the receive task.
///
/// Every field is written by a single task and read lock-free from anywhere,
/// so relaxed ordering is enough; a snapshot may mix values from two
/// consecutive datagrams.
#[derive(Debug, Default)]
pub struct IngestStats {
    received: AtomicU64,
    published: AtomicU64,
    dropped: AtomicU64,
    errors: AtomicU64,
    mean_step_bits: AtomicU64,
}

impl IngestStats {
    pub(crate) fn record_received(&self) {
        self.received.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_published(&self) -> u64 {
        self.published.fetch_add(1, Ordering::Relaxed) + 1
    }

    pub(crate) fn record_dropped(&self) {
        self.dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn set_mean_step(&self, seconds: f64) {
        self.mean_step_bits.store(seconds.to_bits(), Ordering::Relaxed);
    }

    /// Datagrams dropped for having the wrong length.
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    /// Copy every counter.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            received: self.received.load(Ordering::Relaxed),
            published: self.published.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            mean_step: f64::from_bits(self.mean_step_bits.load(Ordering::Relaxed)),
        }
    }
}

/// Point-in-time copy of [`IngestStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StatsSnapshot {
    /// Datagrams read from the provider
    pub received: u64,
    /// Frames published to the hand-off slot
    pub published: u64,
    /// Datagrams dropped for a length mismatch
    pub dropped: u64,
    /// Provider errors (socket failures)
    pub errors: u64,
    /// Running mean of the simulation time step in seconds, 0 until two
    /// frames carried the time signal
    pub mean_step: f64,
}

/// Running mean of the step between consecutive simulation timestamps.
#[derive(Debug, Default, Clone)]
pub(crate) struct StepTracker {
    previous: Option<f64>,
    mean: f64,
    count: u64,
}

impl StepTracker {
    /// Feed the next timestamp, returning the updated mean.
    pub(crate) fn observe(&mut self, t: f64) -> f64 {
        if let Some(previous) = self.previous {
            let step = t - previous;
            self.mean = (self.mean * self.count as f64 + step) / (self.count + 1) as f64;
            self.count += 1;
        }
        self.previous = Some(t);
        self.mean
    }
}
