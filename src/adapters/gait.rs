//! Gait sample adapter for the orthosis rig

use serde::Serialize;

use super::{AdapterValidation, FieldExtraction, FrameAdapter};
use crate::types::{Frame, PacketSchema};

/// Simulation time, with the capitalised spelling some models emit
const TIME_SIGNALS: [&str; 2] = ["time", "Time"];

/// Plantar pressure sensors, heel to toe
pub const PRESSURE_SIGNALS: [&str; 8] = [
    "pressure_1",
    "pressure_2",
    "pressure_3",
    "pressure_4",
    "pressure_5",
    "pressure_6",
    "pressure_7",
    "pressure_8",
];

/// IMU channels
pub const IMU_SIGNALS: [&str; 12] = [
    "imu_1", "imu_2", "imu_3", "imu_4", "imu_5", "imu_6", "imu_7", "imu_8", "imu_9", "imu_10",
    "imu_11", "imu_12",
];

/// One dashboard sample from the orthosis rig.
///
/// Every signal is optional; unmapped signals read as 0.0.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GaitSample {
    /// Simulation time in seconds
    pub t: f64,
    /// Ankle angle in degrees
    pub ankle: f64,
    /// Measured torque
    pub torque: f64,
    /// Torque demanded by the controller
    pub demand_torque: f64,
    /// Position in the gait cycle, 0-100
    pub gait: f64,
    /// Plantar pressures
    pub press: [f64; 8],
    /// IMU channels
    pub imu: [f64; 12],
    /// Drive statusword
    pub statusword: f64,
}

impl FrameAdapter for GaitSample {
    fn validate_schema(schema: &PacketSchema) -> crate::Result<AdapterValidation> {
        let mut plan: Vec<FieldExtraction> = TIME_SIGNALS
            .iter()
            .chain(["ankle_angle", "actual_torque", "demand_torque", "gait_percentage"].iter())
            .chain(PRESSURE_SIGNALS.iter())
            .chain(IMU_SIGNALS.iter())
            .map(|name| FieldExtraction::optional(schema, name))
            .collect();
        plan.push(FieldExtraction::optional(schema, "statusword"));

        Ok(AdapterValidation::new(plan))
    }

    fn adapt(frame: &Frame, validation: &AdapterValidation) -> Self {
        let fetch = |name: &str| validation.fetch_or_default(frame, name);

        let t = TIME_SIGNALS
            .iter()
            .find(|name| validation.is_available(name))
            .map_or(0.0, |name| fetch(name));

        Self {
            t,
            ankle: fetch("ankle_angle"),
            torque: fetch("actual_torque"),
            demand_torque: fetch("demand_torque"),
            gait: fetch("gait_percentage"),
            press: PRESSURE_SIGNALS.map(fetch),
            imu: IMU_SIGNALS.map(fetch),
            statusword: fetch("statusword"),
        }
    }
}
