//! Core types for telemetry data representation.
//!
//! ## Architecture
//!
//! - [`PacketFormat`] describes the wire layout (`<30f`): byte order, element
//!   type and element count
//! - [`PacketSchema`] adds the signal-name mapping and is the single source of
//!   truth for turning bytes into named values and back
//! - [`Frame`] is one immutable decoded snapshot
//! - [`OutboundCommand`] is a partial set of control values to send
//! - [`IngestStats`] counts what the receive loop saw
//!
//! ## Usage Example
//!
//! ```rust
//! use afolink::types::{PacketFormat, PacketSchema};
//!
//! let format = PacketFormat::parse("<3f").unwrap();
//! let schema = PacketSchema::new(format, [("a", 0), ("b", 1), ("c", 2)]).unwrap();
//!
//! let mut datagram = Vec::new();
//! for v in [1.0f32, 2.0, 3.0] {
//!     datagram.extend_from_slice(&v.to_le_bytes());
//! }
//!
//! let values = schema.decode(&datagram).unwrap();
//! assert_eq!(values["b"], 2.0);
//! ```

mod command;
mod element;
mod frame;
mod schema;
mod stats;
mod update_rate;

pub use command::OutboundCommand;
pub use element::{ElementType, Endianness, MAX_DATAGRAM_BYTES, PacketFormat};
pub use frame::Frame;
pub use schema::PacketSchema;
pub use stats::{IngestStats, StatsSnapshot};
pub(crate) use stats::StepTracker;
pub use update_rate::UpdateRate;
