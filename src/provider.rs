//! Provider trait for datagram sources

use std::net::SocketAddr;

use crate::Result;

/// One raw datagram, not yet validated against the schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Datagram {
    /// Payload bytes
    pub bytes: Vec<u8>,
    /// Sender, if the source has one
    pub source: Option<SocketAddr>,
}

impl Datagram {
    /// Create a datagram with a known sender.
    pub fn new(bytes: Vec<u8>, source: Option<SocketAddr>) -> Self {
        Self { bytes, source }
    }
}

/// Trait for telemetry datagram sources
///
/// Providers abstract over where datagrams come from (a UDP socket, a
/// synthetic generator) and handle their own pacing. Validation and decoding
/// belong to the driver, so a provider hands over bytes exactly as received.
#[async_trait::async_trait]
pub trait Provider: Send + 'static {
    /// Get the next datagram
    ///
    /// Returns:
    /// - `Ok(Some(datagram))` - Datagram received
    /// - `Ok(None)` - Source ended (normal termination)
    /// - `Err(e)` - Transient receive error; the driver backs off and retries
    ///
    /// Must be cancel-safe: the driver drops the future when stopping.
    async fn next_datagram(&mut self) -> Result<Option<Datagram>>;

    /// Expected source rate in Hz
    fn sample_rate(&self) -> f64;

    /// Local address the provider is bound to, if any
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}
