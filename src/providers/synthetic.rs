//! Synthetic provider for running without the rig

use std::sync::Arc;
use tokio::time::{Duration, Interval, MissedTickBehavior, interval};
use tracing::{info, trace};

use crate::provider::{Datagram, Provider};
use crate::types::PacketSchema;
use crate::{Result, TelemetryError};

/// Provider that fabricates datagrams at the configured rate.
///
/// The signal named by `time_signal` carries elapsed simulation time; every
/// other signal gets a sine wave phase-shifted by its element index. Values
/// are encoded through the schema, so the driver exercises the same
/// validation and decode path as for real traffic.
pub struct SyntheticProvider {
    schema: Arc<PacketSchema>,

    /// Signals in element order, resolved once
    signals: Vec<(String, usize)>,

    /// Name of the simulation time signal
    time_signal: String,

    /// Frame pacing interval
    interval: Interval,

    /// Simulation time of the next datagram in seconds
    t: f64,

    /// Seconds between datagrams
    step: f64,

    sample_rate: f64,
}

impl SyntheticProvider {
    /// Create a generator producing `sample_rate` datagrams per second.
    pub fn new(
        schema: Arc<PacketSchema>,
        sample_rate: f64,
        time_signal: impl Into<String>,
    ) -> Result<Self> {
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(TelemetryError::config(format!(
                "synthetic sample rate must be positive, got {sample_rate}"
            )));
        }

        let step = 1.0 / sample_rate;
        let mut interval = interval(Duration::from_secs_f64(step));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let signals = schema
            .signals_by_index()
            .into_iter()
            .map(|(name, index)| (name.to_string(), index))
            .collect();

        info!(sample_rate, "Synthetic telemetry source created");

        Ok(Self { schema, signals, time_signal: time_signal.into(), interval, t: 0.0, step, sample_rate })
    }

    /// Values for simulation time `t`, one per signal.
    fn sample(&self, t: f64) -> Vec<(&str, f64)> {
        let element_type = self.schema.format().element_type;
        self.signals
            .iter()
            .map(|(name, index)| {
                let raw = if *name == self.time_signal {
                    t
                } else {
                    let amplitude = if element_type.is_integer() { 100.0 } else { 1.0 };
                    amplitude * (t + *index as f64 * 0.1).sin()
                };
                (name.as_str(), element_type.nearest_representable(raw))
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl Provider for SyntheticProvider {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        self.interval.tick().await;

        let bytes = self.schema.encode(self.sample(self.t))?;
        debug_assert_eq!(bytes.len(), self.schema.byte_length());
        trace!(t = self.t, len = bytes.len(), "Synthetic datagram");
        self.t += self.step;

        Ok(Some(Datagram::new(bytes, None)))
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}
