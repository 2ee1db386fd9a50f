//! Frame adapter trait for typed views of telemetry frames

use crate::types::{Frame, PacketSchema};

use super::AdapterValidation;

/// Two-phase frame adapter: validate once per listener, adapt per frame.
///
/// `validate_schema()` runs when a subscription is created and resolves every
/// signal the adapter reads; `adapt()` runs for each delivered frame using
/// that plan.
pub trait FrameAdapter: Sized {
    /// Validate the adapter against the packet schema.
    ///
    /// Fails when a required signal is not mapped. Optional signals are
    /// recorded as absent and read as their default.
    fn validate_schema(schema: &PacketSchema) -> crate::Result<AdapterValidation>;

    /// Build the typed value from a decoded frame.
    fn adapt(frame: &Frame, validation: &AdapterValidation) -> Self;
}
