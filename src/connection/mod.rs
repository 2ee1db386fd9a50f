//! Connection layer: the listener handle and one-shot sending

mod listener;

pub use crate::driver::ListenerState;
pub use listener::{TelemetryListener, send_datagram};
