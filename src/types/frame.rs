//! Decoded telemetry frames

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::SystemTime;

use super::PacketSchema;
use crate::Result;

/// One decoded snapshot of every named signal from a single valid datagram.
///
/// Frames are immutable once built. The ingest loop supersedes the previous
/// frame by publishing a new `Arc<Frame>`; it never mutates one in place.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Signal name to decoded value
    values: HashMap<String, f64>,

    /// Monotonic arrival counter, starting at 1
    pub sequence: u64,

    /// Wall-clock time the datagram was accepted
    pub received_at: SystemTime,

    /// Sender of the datagram, if known
    pub source: Option<SocketAddr>,

    /// Schema the frame was decoded with
    pub schema: Arc<PacketSchema>,
}

impl Frame {
    /// Decode `bytes` into a frame.
    ///
    /// Fails without building anything when the datagram length does not
    /// match the schema.
    pub fn decode(
        schema: Arc<PacketSchema>,
        bytes: &[u8],
        sequence: u64,
        source: Option<SocketAddr>,
    ) -> Result<Self> {
        let values = schema.decode(bytes)?;
        Ok(Self { values, sequence, received_at: SystemTime::now(), source, schema })
    }

    /// Value of a signal, if it is mapped.
    pub fn get(&self, name: &str) -> Option<f64> {
        self.values.get(name).copied()
    }

    /// Value of a signal, or `0.0` when it is not mapped.
    pub fn get_or_zero(&self, name: &str) -> f64 {
        self.get(name).unwrap_or(0.0)
    }

    /// All decoded values.
    pub fn values(&self) -> &HashMap<String, f64> {
        &self.values
    }

    /// Number of decoded signals.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the frame has no named signals.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}
