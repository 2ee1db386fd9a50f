//! UDP socket provider

use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tracing::{info, trace};

use crate::provider::{Datagram, Provider};
use crate::{Result, TelemetryError};

/// Largest UDP payload; anything longer than the schema is still read whole
/// so it can be rejected on length.
const MAX_DATAGRAM_SIZE: usize = 65_536;

/// Provider that reads datagrams from a bound UDP socket
pub struct UdpProvider {
    /// Shared with the listener handle, which sends on the same socket
    socket: Arc<UdpSocket>,

    /// Receive buffer, reused across datagrams
    buffer: Vec<u8>,

    /// Expected rig rate
    sample_rate: f64,
}

impl UdpProvider {
    /// Bind a socket on `address`.
    ///
    /// Fails with [`TelemetryError::Bind`] when the address is in use, not
    /// local, or needs privileges the process does not have.
    pub async fn bind<A>(address: A, sample_rate: f64) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        let label = address.to_string();
        let socket =
            UdpSocket::bind(address).await.map_err(|e| TelemetryError::bind_failed(label.clone(), e))?;

        info!(
            requested = %label,
            local = ?socket.local_addr().ok(),
            "UDP socket bound"
        );

        Ok(Self::from_socket(Arc::new(socket), sample_rate))
    }

    /// Wrap an already bound socket.
    pub fn from_socket(socket: Arc<UdpSocket>, sample_rate: f64) -> Self {
        Self { socket, buffer: vec![0u8; MAX_DATAGRAM_SIZE], sample_rate }
    }

    /// The bound socket, for sending replies on the same port.
    pub fn socket(&self) -> Arc<UdpSocket> {
        Arc::clone(&self.socket)
    }
}

#[async_trait::async_trait]
impl Provider for UdpProvider {
    async fn next_datagram(&mut self) -> Result<Option<Datagram>> {
        let (len, source) = self
            .socket
            .recv_from(&mut self.buffer)
            .await
            .map_err(|source| TelemetryError::Receive { source })?;

        trace!(len, %source, "Datagram received");
        Ok(Some(Datagram::new(self.buffer[..len].to_vec(), Some(source))))
    }

    fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    fn local_addr(&self) -> Option<SocketAddr> {
        self.socket.local_addr().ok()
    }
}
