//! Driver spawns and manages the ingest task

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

use crate::provider::Provider;
use crate::types::{Frame, IngestStats, PacketSchema, StepTracker};
use crate::TelemetryError;

/// Lifecycle of an ingest loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ListenerState {
    /// No socket held, no task running
    Stopped,
    /// Acquiring the socket
    Starting,
    /// Receive task running
    Listening,
}

/// Knobs for the ingest task.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// Signal carrying simulation time, for the mean step statistic
    pub time_signal: String,
    /// Period of the status log line, `None` to disable
    pub status_interval: Option<Duration>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self { time_signal: "time".to_string(), status_interval: Some(Duration::from_secs(10)) }
    }
}

/// Result of spawning the driver task
pub struct DriverChannels {
    /// Single-slot hand-off holding the newest frame
    pub frames: watch::Receiver<Option<Arc<Frame>>>,
    /// Lifecycle state, `Stopped` once the task exits
    pub state: watch::Receiver<ListenerState>,
    /// Counters updated by the task
    pub stats: Arc<IngestStats>,
    /// Cancellation token for graceful shutdown
    pub cancel: CancellationToken,
    /// Handle of the ingest task
    pub task: JoinHandle<()>,
}

/// Driver spawns and manages the ingest task
///
/// The task owns the provider and is the only writer of the hand-off slot:
/// receive, validate, decode, publish, repeat. Readers never block it, since
/// publishing is a swap of an `Arc` in a watch channel.
pub struct Driver;

impl Driver {
    /// Spawn the ingest task for `provider`.
    ///
    /// Must be called from within a tokio runtime. The state is `Listening`
    /// when this returns.
    pub fn spawn<P>(provider: P, schema: Arc<PacketSchema>, options: DriverOptions) -> DriverChannels
    where
        P: Provider,
    {
        let (frame_tx, frame_rx) = watch::channel(None);
        let (state_tx, state_rx) = watch::channel(ListenerState::Listening);
        let stats = Arc::new(IngestStats::default());
        let cancel = CancellationToken::new();

        let task = tokio::spawn(Self::ingest_task(
            provider,
            schema,
            options,
            frame_tx,
            state_tx,
            Arc::clone(&stats),
            cancel.clone(),
        ));

        DriverChannels { frames: frame_rx, state: state_rx, stats, cancel, task }
    }

    /// Ingest task - receives datagrams and publishes frames
    async fn ingest_task<P>(
        mut provider: P,
        schema: Arc<PacketSchema>,
        options: DriverOptions,
        frame_tx: watch::Sender<Option<Arc<Frame>>>,
        state_tx: watch::Sender<ListenerState>,
        stats: Arc<IngestStats>,
        cancel: CancellationToken,
    ) where
        P: Provider,
    {
        info!(
            local = ?provider.local_addr(),
            byte_length = schema.byte_length(),
            signals = schema.signal_count(),
            "Ingest task started"
        );

        let mut error_count = 0u32;
        let mut sequence = 0u64;
        let mut steps = StepTracker::default();
        let mut status = options.status_interval.map(|period| {
            let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        loop {
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Ingest task cancelled");
                    break;
                }
                _ = next_tick(&mut status) => {
                    let snapshot = stats.snapshot();
                    info!(
                        received = snapshot.received,
                        published = snapshot.published,
                        dropped = snapshot.dropped,
                        mean_step = snapshot.mean_step,
                        "Ingest status"
                    );
                    continue;
                }
                result = provider.next_datagram() => result,
            };

            match result {
                Ok(Some(datagram)) => {
                    error_count = 0;
                    stats.record_received();

                    match Frame::decode(Arc::clone(&schema), &datagram.bytes, sequence + 1, datagram.source) {
                        Ok(frame) => {
                            if let Some(t) = frame.get(&options.time_signal) {
                                stats.set_mean_step(steps.observe(t));
                            }
                            sequence = stats.record_published();
                            trace!(sequence, "Frame published");
                            frame_tx.send_replace(Some(Arc::new(frame)));
                        }
                        Err(TelemetryError::Decode { expected, actual }) => {
                            stats.record_dropped();
                            debug!(
                                expected,
                                actual,
                                source = ?datagram.source,
                                dropped = stats.dropped_count(),
                                "Dropped malformed datagram"
                            );
                        }
                        Err(e) => {
                            stats.record_dropped();
                            warn!("Dropped undecodable datagram: {}", e);
                        }
                    }
                }
                Ok(None) => {
                    info!("Datagram source ended");
                    break;
                }
                Err(e) => {
                    // Receive errors are transient on UDP (e.g. ICMP resets); back off, keep going
                    error_count = error_count.saturating_add(1);
                    stats.record_error();
                    error!("Provider error ({} in a row): {}", error_count, e);

                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(backoff(error_count)) => {}
                    }
                }
            }
        }

        state_tx.send_replace(ListenerState::Stopped);
        let snapshot = stats.snapshot();
        info!(
            published = snapshot.published,
            dropped = snapshot.dropped,
            "Ingest task ended"
        );
    }
}

/// Delay after the `consecutive_errors`-th provider error in a row:
/// 50ms, 100ms, 200ms, ... capped at 1.6s.
fn backoff(consecutive_errors: u32) -> Duration {
    Duration::from_millis(50 << consecutive_errors.saturating_sub(1).min(5))
}

/// Wait for the next status tick, or forever when status logging is off.
async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending::<()>().await,
    }
}
