//! Test utilities shared by unit tests and benches
//!
//! Schemas for the two layouts the tests exercise, datagram builders and
//! loopback helpers.

#![cfg(any(test, feature = "benchmark"))]

use std::time::Duration;
use tokio::net::UdpSocket;

use crate::types::{PacketFormat, PacketSchema};

/// Signals of the orthosis rig's 30-float datagram, by element index.
pub const RIG_SIGNALS: [(&str, usize); 30] = [
    ("time", 0),
    ("ankle_angle", 1),
    ("actual_torque", 2),
    ("demand_torque", 3),
    ("gait_percentage", 4),
    ("pressure_1", 5),
    ("pressure_2", 6),
    ("pressure_3", 7),
    ("pressure_4", 8),
    ("pressure_5", 9),
    ("pressure_6", 10),
    ("pressure_7", 11),
    ("pressure_8", 12),
    ("imu_1", 13),
    ("imu_2", 14),
    ("imu_3", 15),
    ("imu_4", 16),
    ("imu_5", 17),
    ("imu_6", 18),
    ("imu_7", 19),
    ("imu_8", 20),
    ("imu_9", 21),
    ("imu_10", 22),
    ("imu_11", 23),
    ("imu_12", 24),
    ("statusword", 25),
    ("motor_enable", 26),
    ("assistance_level", 27),
    ("k_value", 28),
    ("zero_request", 29),
];

/// `<3f` with `a`, `b`, `c` at indices 0, 1, 2.
pub fn abc_schema() -> PacketSchema {
    let format = PacketFormat::parse("<3f").expect("valid format");
    PacketSchema::new(format, [("a", 0), ("b", 1), ("c", 2)]).expect("valid schema")
}

/// `<30f` with every rig signal mapped.
pub fn rig_schema() -> PacketSchema {
    let format = PacketFormat::parse("<30f").expect("valid format");
    PacketSchema::new(format, RIG_SIGNALS).expect("valid schema")
}

/// Little-endian `f32` datagram holding `values` in order.
pub fn f32_datagram(values: &[f32]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Socket on an ephemeral loopback port, for sending test traffic.
pub async fn loopback_sender() -> UdpSocket {
    UdpSocket::bind("127.0.0.1:0").await.expect("bind loopback sender")
}

/// Poll `condition` until it holds or `timeout` passes.
pub async fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
