//! Datagram providers: the rig's UDP stream and a synthetic stand-in

pub mod synthetic;
pub mod udp;

pub use synthetic::SyntheticProvider;
pub use udp::UdpProvider;
