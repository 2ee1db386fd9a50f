//! Typed views over decoded frames.
//!
//! Adapters work in two phases:
//! - **Validation**: once per subscription, resolve every signal the adapter
//!   reads against the [`PacketSchema`](crate::types::PacketSchema)
//! - **Adaptation**: per frame, read values through the resolved plan
//!
//! Missing required signals fail the subscription up front; optional ones
//! read as their default for the lifetime of the subscription.
//!
//! # Example
//!
//! ```rust
//! use afolink::adapters::{AdapterValidation, FieldExtraction, FrameAdapter};
//! use afolink::types::{Frame, PacketSchema};
//! use afolink::Result;
//!
//! struct Assistance {
//!     level: f64,
//!     stiffness: f64,
//! }
//!
//! impl FrameAdapter for Assistance {
//!     fn validate_schema(schema: &PacketSchema) -> Result<AdapterValidation> {
//!         Ok(AdapterValidation::new(vec![
//!             FieldExtraction::required(schema, "assistance_level")?,
//!             FieldExtraction::with_default(schema, "k_value", 1.0),
//!         ]))
//!     }
//!
//!     fn adapt(frame: &Frame, validation: &AdapterValidation) -> Self {
//!         Self {
//!             level: validation.fetch_or_default(frame, "assistance_level"),
//!             stiffness: validation.fetch_or_default(frame, "k_value"),
//!         }
//!     }
//! }
//! ```

mod frame_adapter;
mod gait;
mod validation;

pub use frame_adapter::FrameAdapter;
pub use gait::{GaitSample, IMU_SIGNALS, PRESSURE_SIGNALS};
pub use validation::{AdapterValidation, FieldExtraction};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TelemetryError;
    use crate::test_utils::{abc_schema, f32_datagram};
    use crate::types::{Frame, PacketFormat, PacketSchema};
    use std::sync::Arc;

    #[test]
    fn adapter_validation_creation() {
        let schema = abc_schema();
        let validation = AdapterValidation::new(vec![
            FieldExtraction::required(&schema, "a").unwrap(),
            FieldExtraction::optional(&schema, "zzz"),
            FieldExtraction::Skipped,
        ]);

        assert_eq!(validation.field_count(), 3);
        assert!(validation.has_required_fields());
        assert_eq!(validation.index_of("a"), Some(0));
        assert_eq!(validation.index_of("zzz"), Some(1));
        assert!(validation.is_available("a"));
        assert!(!validation.is_available("zzz"));
    }

    #[test]
    fn required_field_must_be_mapped() {
        let err = FieldExtraction::required(&abc_schema(), "torque").unwrap_err();
        assert!(matches!(err, TelemetryError::FieldNotFound { signal } if signal == "torque"));
    }

    #[test]
    fn field_extraction_properties() {
        let schema = abc_schema();

        let required = FieldExtraction::required(&schema, "c").unwrap();
        assert_eq!(required.signal_name(), Some("c"));
        assert_eq!(required.element_index(), Some(2));
        assert!(required.is_required());

        let defaulted = FieldExtraction::with_default(&schema, "k", 4.5);
        assert_eq!(defaulted.element_index(), None);
        assert_eq!(defaulted.default_value(), 4.5);

        assert_eq!(FieldExtraction::Skipped.signal_name(), None);
        assert!(!FieldExtraction::Skipped.is_required());
    }

    #[test]
    fn fetch_uses_defaults_for_unmapped_signals() {
        let schema = Arc::new(abc_schema());
        let frame = Frame::decode(Arc::clone(&schema), &f32_datagram(&[1.0, 2.0, 3.0]), 1, None)
            .unwrap();
        let validation = AdapterValidation::new(vec![
            FieldExtraction::optional(&schema, "b"),
            FieldExtraction::optional(&schema, "missing"),
            FieldExtraction::with_default(&schema, "fallback", -1.0),
        ]);

        assert_eq!(validation.fetch_or_default(&frame, "b"), 2.0);
        assert_eq!(validation.fetch_or_default(&frame, "missing"), 0.0);
        assert_eq!(validation.fetch_or_default(&frame, "fallback"), -1.0);
        assert_eq!(validation.fetch_or_default(&frame, "c"), 3.0);
    }

    #[test]
    fn gait_sample_reads_rig_layout() {
        let mut signals = vec![
            ("time".to_string(), 0),
            ("ankle_angle".to_string(), 1),
            ("actual_torque".to_string(), 2),
            ("gait_percentage".to_string(), 3),
            ("statusword".to_string(), 4),
        ];
        signals.extend((0..8).map(|i| (format!("pressure_{}", i + 1), 5 + i)));
        let schema = Arc::new(
            PacketSchema::new(PacketFormat::parse("<13f").unwrap(), signals).unwrap(),
        );

        let mut values = vec![0.25f32, -12.5, 3.0, 40.0, 1591.0];
        values.extend((0..8).map(|i| 500.0 + i as f32));
        let frame = Frame::decode(Arc::clone(&schema), &f32_datagram(&values), 1, None).unwrap();

        let validation = GaitSample::validate_schema(&schema).unwrap();
        assert!(!validation.has_required_fields());

        let sample = GaitSample::adapt(&frame, &validation);
        assert_eq!(sample.t, 0.25);
        assert_eq!(sample.ankle, -12.5);
        assert_eq!(sample.torque, 3.0);
        assert_eq!(sample.gait, 40.0);
        assert_eq!(sample.statusword, 1591.0);
        assert_eq!(sample.press[0], 500.0);
        assert_eq!(sample.press[7], 507.0);
        assert_eq!(sample.demand_torque, 0.0);
        assert_eq!(sample.imu, [0.0; 12]);
    }

    #[test]
    fn gait_sample_accepts_capitalised_time() {
        let schema = Arc::new(
            PacketSchema::new(PacketFormat::parse("<2f").unwrap(), [("Time", 0), ("imu_3", 1)])
                .unwrap(),
        );
        let frame = Frame::decode(Arc::clone(&schema), &f32_datagram(&[9.5, 0.5]), 1, None).unwrap();

        let sample = GaitSample::adapt(&frame, &GaitSample::validate_schema(&schema).unwrap());
        assert_eq!(sample.t, 9.5);
        assert_eq!(sample.imu[2], 0.5);
    }
}
