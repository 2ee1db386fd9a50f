//! Live telemetry listener over UDP

use futures::StreamExt;
use futures::stream::BoxStream;
use std::fmt::Display;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::{ToSocketAddrs, UdpSocket};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::adapters::FrameAdapter;
use crate::config::Config;
use crate::driver::{Driver, DriverOptions, ListenerState};
use crate::provider::Provider;
use crate::providers::{SyntheticProvider, UdpProvider};
use crate::stream::frame_stream;
use crate::types::{Frame, IngestStats, OutboundCommand, PacketSchema, UpdateRate};
use crate::{Result, TelemetryError};

/// Default rig rate when none is configured
const DEFAULT_SAMPLE_RATE_HZ: f64 = 100.0;

/// Handle to a running ingest loop.
///
/// Holds the latest-frame slot, the counters and the socket used for outbound
/// commands. Dropping the handle cancels the loop; [`stop`](Self::stop) also
/// waits for it to finish.
pub struct TelemetryListener {
    /// Schema inbound datagrams are decoded with
    schema: Arc<PacketSchema>,

    /// Schema outbound commands are encoded with
    control: Arc<PacketSchema>,

    /// Hand-off slot written by the ingest task
    frames: watch::Receiver<Option<Arc<Frame>>>,

    state: watch::Receiver<ListenerState>,

    stats: Arc<IngestStats>,

    /// Socket for `send()`, cleared by `stop()`
    socket: Mutex<Option<Arc<UdpSocket>>>,

    /// Ingest task, taken by the first `stop()`
    task: Mutex<Option<JoinHandle<()>>>,

    cancel: CancellationToken,

    local_addr: Option<SocketAddr>,

    source_hz: f64,
}

impl TelemetryListener {
    /// Bind `listen_addr` and start decoding datagrams against `schema`.
    ///
    /// Returns as soon as the socket is bound; frames appear in
    /// [`latest`](Self::latest) as datagrams arrive.
    pub async fn start<A>(schema: Arc<PacketSchema>, listen_addr: A) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        Self::start_with_options(schema, listen_addr, DEFAULT_SAMPLE_RATE_HZ, DriverOptions::default())
            .await
    }

    /// [`start`](Self::start) with an explicit rig rate and driver options.
    pub async fn start_with_options<A>(
        schema: Arc<PacketSchema>,
        listen_addr: A,
        sample_rate_hz: f64,
        options: DriverOptions,
    ) -> Result<Self>
    where
        A: ToSocketAddrs + Display,
    {
        debug!(address = %listen_addr, state = ?ListenerState::Starting, "Starting listener");

        let provider = UdpProvider::bind(listen_addr, sample_rate_hz).await?;
        let socket = provider.socket();
        Ok(Self::launch(provider, schema, Some(socket), options))
    }

    /// Start a listener fed by [`SyntheticProvider`] instead of the rig.
    ///
    /// An ephemeral socket is still bound so outbound commands can be sent.
    pub async fn simulate(
        schema: Arc<PacketSchema>,
        sample_rate_hz: f64,
        options: DriverOptions,
    ) -> Result<Self> {
        let provider =
            SyntheticProvider::new(Arc::clone(&schema), sample_rate_hz, options.time_signal.clone())?;
        let socket = UdpSocket::bind("0.0.0.0:0")
            .await
            .map_err(|e| TelemetryError::bind_failed("0.0.0.0:0", e))?;

        info!(sample_rate_hz, "Using synthetic telemetry");
        Ok(Self::launch(provider, schema, Some(Arc::new(socket)), options))
    }

    /// Start from a loaded configuration, synthetic when `simulate` is set.
    ///
    /// With `ingest.fallback_to_synthetic`, a rig host that does not resolve
    /// or a listen address that cannot be bound switches to synthetic
    /// telemetry instead of failing.
    pub async fn from_config(config: &Config, simulate: bool) -> Result<Self> {
        let schema = Arc::new(config.packet_schema()?);
        let control = Arc::new(config.control_schema()?);
        let options = DriverOptions {
            time_signal: config.ingest.time_signal.clone(),
            status_interval: config.ingest.status_interval(),
        };
        let rate = config.ingest.sample_rate_hz;

        let listener = if simulate {
            Self::simulate(schema, rate, options).await?
        } else if !config.ingest.fallback_to_synthetic {
            Self::start_with_options(schema, config.udp.listen_address(), rate, options).await?
        } else if !resolves(&config.udp.send_address()).await {
            warn!(send_address = %config.udp.send_address(), "Rig host does not resolve, falling back to synthetic telemetry");
            Self::simulate(schema, rate, options).await?
        } else {
            let listen = config.udp.listen_address();
            match Self::start_with_options(Arc::clone(&schema), listen, rate, options.clone()).await {
                Ok(listener) => listener,
                Err(TelemetryError::Bind { address, source }) => {
                    warn!(%address, error = %source, "Listen address unavailable, falling back to synthetic telemetry");
                    Self::simulate(schema, rate, options).await?
                }
                Err(e) => return Err(e),
            }
        };
        Ok(listener.with_control_schema(control))
    }

    fn launch<P: Provider>(
        provider: P,
        schema: Arc<PacketSchema>,
        socket: Option<Arc<UdpSocket>>,
        options: DriverOptions,
    ) -> Self {
        let source_hz = provider.sample_rate();
        let local_addr = provider.local_addr();
        let channels = Driver::spawn(provider, Arc::clone(&schema), options);

        info!(local = ?local_addr, source_hz, "Listener started");

        Self {
            control: Arc::clone(&schema),
            schema,
            frames: channels.frames,
            state: channels.state,
            stats: channels.stats,
            socket: Mutex::new(socket),
            task: Mutex::new(Some(channels.task)),
            cancel: channels.cancel,
            local_addr,
            source_hz,
        }
    }

    /// Encode outbound commands with `control` instead of the inbound schema.
    pub fn with_control_schema(mut self, control: Arc<PacketSchema>) -> Self {
        self.control = control;
        self
    }

    /// Newest decoded frame, `None` until the first valid datagram.
    ///
    /// Never blocks and never consumes: repeated calls return the same frame
    /// until a newer one is published.
    pub fn latest(&self) -> Option<Arc<Frame>> {
        self.frames.borrow().clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        *self.state.borrow()
    }

    /// Ingest counters.
    pub fn stats(&self) -> &IngestStats {
        &self.stats
    }

    /// Datagrams rejected for their length since start.
    pub fn dropped_count(&self) -> u64 {
        self.stats.dropped_count()
    }

    /// Address the receive socket is bound to; `None` for synthetic input.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Schema inbound datagrams are decoded with.
    pub fn schema(&self) -> &Arc<PacketSchema> {
        &self.schema
    }

    /// Schema outbound commands are encoded with.
    pub fn control_schema(&self) -> &Arc<PacketSchema> {
        &self.control
    }

    /// Expected rig rate in Hz.
    pub fn source_hz(&self) -> f64 {
        self.source_hz
    }

    /// Wait up to `timeout` for a frame.
    ///
    /// Returns the current frame immediately if one exists, `Ok(None)` if the
    /// ingest loop ended first.
    pub async fn wait_for_frame(&self, timeout: Duration) -> Result<Option<Arc<Frame>>> {
        let mut frames = self.frames.clone();
        match tokio::time::timeout(timeout, frames.wait_for(Option::is_some)).await {
            Ok(Ok(slot)) => Ok(slot.clone()),
            Ok(Err(_)) => Ok(None),
            Err(_) => Err(TelemetryError::Timeout { duration: timeout }),
        }
    }

    /// Encode `command` and transmit it as one datagram to `destination`.
    ///
    /// Signals the command leaves out are sent as the control schema's
    /// default. Failure is reported only to the caller; the receive loop
    /// keeps running.
    pub async fn send<A>(&self, destination: A, command: &OutboundCommand) -> Result<()>
    where
        A: ToSocketAddrs + Display,
    {
        let payload = command.encode(&self.control)?;

        let socket = self.current_socket();
        let Some(socket) = socket else {
            return Err(TelemetryError::listener_stopped(destination.to_string()));
        };

        transmit(&socket, destination, &payload).await
    }

    fn current_socket(&self) -> Option<Arc<UdpSocket>> {
        match self.socket.lock() {
            Ok(slot) => slot.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Frames as a stream at `rate`; ends when the listener stops.
    pub fn frames(&self, rate: UpdateRate) -> BoxStream<'static, Arc<Frame>> {
        frame_stream(self.frames.clone(), rate, self.source_hz)
    }

    /// Typed frames as a stream at `rate`.
    ///
    /// The adapter is validated against the schema once, here.
    pub fn subscribe<T>(&self, rate: UpdateRate) -> Result<BoxStream<'static, T>>
    where
        T: FrameAdapter + Send + 'static,
    {
        let validation = T::validate_schema(&self.schema)?;
        Ok(self.frames(rate).map(move |frame| T::adapt(&frame, &validation)).boxed())
    }

    /// A receiver on the hand-off slot, for consumers that drive their own
    /// loop (the CSV recorder, for one).
    pub fn watch(&self) -> watch::Receiver<Option<Arc<Frame>>> {
        self.frames.clone()
    }

    /// Stop the ingest loop and release the socket.
    ///
    /// Idempotent: later calls return immediately. Datagrams in flight when
    /// the loop is cancelled may be lost.
    pub async fn stop(&self) {
        let socket = match self.socket.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        let task = match self.task.lock() {
            Ok(mut slot) => slot.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        let Some(task) = task else {
            debug!("Listener already stopped");
            return;
        };

        self.cancel.cancel();
        if let Err(e) = task.await {
            warn!("Ingest task ended abnormally: {}", e);
        }
        drop(socket);

        let snapshot = self.stats.snapshot();
        info!(
            published = snapshot.published,
            dropped = snapshot.dropped,
            state = ?self.state(),
            "Listener stopped"
        );
    }
}

impl Drop for TelemetryListener {
    fn drop(&mut self) {
        debug!("Dropping telemetry listener");
        self.cancel.cancel();
    }
}

/// Send one datagram encoded with `schema` from an ephemeral socket.
///
/// For one-shot senders that do not run a listener.
pub async fn send_datagram<A>(schema: &PacketSchema, destination: A, command: &OutboundCommand) -> Result<()>
where
    A: ToSocketAddrs + Display,
{
    let payload = command.encode(schema)?;
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| TelemetryError::send_failed(destination.to_string(), e))?;
    transmit(&socket, destination, &payload).await
}

async fn transmit<A>(socket: &UdpSocket, destination: A, payload: &[u8]) -> Result<()>
where
    A: ToSocketAddrs + Display,
{
    let label = destination.to_string();
    let sent = socket
        .send_to(payload, destination)
        .await
        .map_err(|e| TelemetryError::send_failed(label.clone(), e))?;

    if sent != payload.len() {
        return Err(TelemetryError::Send {
            destination: label,
            reason: format!("short write: {sent} of {} bytes", payload.len()),
            source: None,
        });
    }

    debug!(destination = %label, bytes = sent, "Control datagram sent");
    Ok(())
}

/// Whether `address` resolves to at least one socket address.
async fn resolves(address: &str) -> bool {
    match tokio::net::lookup_host(address).await {
        Ok(mut addresses) => addresses.next().is_some(),
        Err(e) => {
            debug!(address, error = %e, "Address lookup failed");
            false
        }
    }
}
