//! UDP telemetry decoding and live-value hand-off for real-time rigs.
//!
//! afolink receives fixed-format binary datagrams from a real-time target
//! (an ankle-foot orthosis test bench running a Simulink model), decodes them
//! against a configured packet layout and keeps the newest decoded frame in a
//! single-slot hand-off that any number of readers can poll without blocking
//! the receive loop. Control values go back to the rig in the same format.
//!
//! # Features
//!
//! - **Packet schemas**: `struct`-style layouts such as `<30f`, 8 to 32-bit
//!   integers, `f32` or `f64` elements, either byte order
//! - **Latest-value hand-off**: readers see whole frames only, never a queue
//! - **Streams**: rate-limited frame streams and typed adapters
//! - **Synthetic source**: sine-wave telemetry when the rig is unreachable
//! - **CSV recording**: rolling log of the newest rows
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use afolink::{Afolink, Config, OutboundCommand};
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> afolink::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let listener = Afolink::listen(&config).await?;
//!
//!     let mut poll = tokio::time::interval(config.ingest.poll_interval());
//!     for _ in 0..50 {
//!         poll.tick().await;
//!         if let Some(frame) = listener.latest() {
//!             println!("ankle {:.2}", frame.get_or_zero("ankle_angle"));
//!         }
//!     }
//!
//!     let command = OutboundCommand::new().set("assistance_level", 2.0);
//!     listener.send(config.udp.send_address(), &command).await?;
//!     listener.stop().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Typed subscription
//!
//! ```rust,no_run
//! use afolink::{Afolink, Config, GaitSample, UpdateRate};
//! use futures::StreamExt;
//!
//! #[tokio::main]
//! async fn main() -> afolink::Result<()> {
//!     let config = Config::load("config.yaml")?;
//!     let listener = Afolink::simulate(&config).await?;
//!     let mut samples = listener.subscribe::<GaitSample>(UpdateRate::Max(10))?;
//!
//!     while let Some(sample) = samples.next().await {
//!         println!("t={:.2} torque={:.2}", sample.t, sample.torque);
//!     }
//!     Ok(())
//! }
//! ```

// Core types and error handling
pub mod adapters;
pub mod config;
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Ingest architecture
pub mod connection;
pub mod driver;
pub mod provider;
pub mod providers;
pub mod recorder;
pub mod stream;

// Core exports
pub use adapters::{AdapterValidation, FieldExtraction, FrameAdapter, GaitSample};
pub use config::Config;
pub use error::*;
pub use types::*;

// Main API exports
pub use connection::{ListenerState, TelemetryListener, send_datagram};
pub use recorder::CsvRecorder;

/// Entry point for configured listeners.
///
/// Thin wrappers over [`TelemetryListener::from_config`] that pick the rig or
/// the synthetic source.
pub struct Afolink;

impl Afolink {
    /// Bind the configured listen address and start decoding rig traffic.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - The packet or control layout is inconsistent
    /// - The listen address cannot be bound
    pub async fn listen(config: &Config) -> Result<TelemetryListener> {
        TelemetryListener::from_config(config, false).await
    }

    /// Start a listener fed by synthetic telemetry at the configured rate.
    pub async fn simulate(config: &Config) -> Result<TelemetryListener> {
        TelemetryListener::from_config(config, true).await
    }
}
