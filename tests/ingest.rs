//! End-to-end ingest tests through the public API
//!
//! A configured listener on loopback receives datagrams from a plain UDP
//! socket standing in for the rig.

use afolink::{Afolink, Config, CsvRecorder, ListenerState, OutboundCommand, TelemetryError, UpdateRate};
use futures::StreamExt;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio_util::sync::CancellationToken;

const WAIT: Duration = Duration::from_secs(2);

fn config(send_port: u16) -> Config {
    let yaml = format!(
        r#"
udp:
  listen_host: 127.0.0.1
  listen_port: 0
  send_host: 127.0.0.1
  send_port: {send_port}
packet:
  format: "<4f"
  size: 4
signals:
  time: 0
  ankle_angle: 1
  actual_torque: 2
control:
  format: "<4f"
  size: 4
  signals:
    zero_request: 0
    motor_enable: 1
    assistance_level: 2
    k_value: 3
ingest:
  status_interval_secs: 0
"#
    );
    Config::from_yaml_str(&yaml).expect("test configuration is valid")
}

fn datagram(values: [f32; 4]) -> Vec<u8> {
    values.iter().flat_map(|v| v.to_le_bytes()).collect()
}

#[tokio::test]
async fn configured_listener_round_trip() {
    let _ = tracing_subscriber::fmt::try_init();

    let rig = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    let config = config(rig.local_addr().unwrap().port());
    let listener = Afolink::listen(&config).await.unwrap();
    let address = listener.local_addr().unwrap();

    rig.send_to(&datagram([0.01, -5.0, 1.5, 99.0]), address).await.unwrap();
    let frame = listener.wait_for_frame(WAIT).await.unwrap().unwrap();
    assert_eq!(frame.get("ankle_angle"), Some(-5.0));
    assert_eq!(frame.len(), 3);

    // Control layout differs from the inbound mapping
    let command = OutboundCommand::new().set("assistance_level", 3.0);
    listener.send(config.udp.send_address(), &command).await.unwrap();

    let mut buffer = [0u8; 64];
    let len = tokio::time::timeout(WAIT, rig.recv(&mut buffer)).await.unwrap().unwrap();
    assert_eq!(&buffer[..len], datagram([0.0, 0.0, 3.0, 0.0]).as_slice());

    listener.stop().await;
    assert_eq!(listener.state(), ListenerState::Stopped);
}

#[tokio::test]
async fn malformed_traffic_never_reaches_readers() {
    let config = config(9);
    let listener = Afolink::listen(&config).await.unwrap();
    let address = listener.local_addr().unwrap();
    let mut frames = listener.frames(UpdateRate::Native);

    let rig = UdpSocket::bind("127.0.0.1:0").await.unwrap();
    rig.send_to(&[1u8; 15], address).await.unwrap();
    rig.send_to(&[1u8; 17], address).await.unwrap();
    rig.send_to(&datagram([1.0, 2.0, 3.0, 4.0]), address).await.unwrap();

    let frame = tokio::time::timeout(WAIT, frames.next()).await.unwrap().unwrap();
    assert_eq!(frame.get("time"), Some(1.0));
    assert_eq!(listener.dropped_count(), 2);
    assert_eq!(frame.sequence, 1);

    listener.stop().await;
}

#[tokio::test]
async fn unknown_control_signal_is_rejected() {
    let config = config(9);
    let listener = Afolink::listen(&config).await.unwrap();

    // Inbound-only signal is not part of the control layout
    let command = OutboundCommand::new().set("ankle_angle", 1.0);
    let err = listener.send(config.udp.send_address(), &command).await.unwrap_err();
    assert!(matches!(err, TelemetryError::Encode { ref signal, .. } if signal == "ankle_angle"), "{err}");

    listener.stop().await;
}

#[tokio::test]
async fn simulated_session_records_csv() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("data_log.csv");

    let mut config = config(9);
    config.ingest.sample_rate_hz = 200.0;
    let listener = Afolink::simulate(&config).await.unwrap();

    let recorder = CsvRecorder::create(&path, vec!["time".into(), "ankle_angle".into()], 1000).unwrap();
    let cancel = CancellationToken::new();
    let task = recorder.spawn(listener.watch(), Duration::from_millis(20), cancel.clone());

    tokio::time::sleep(Duration::from_millis(150)).await;
    cancel.cancel();
    task.await.unwrap().unwrap();
    listener.stop().await;

    let mut reader = csv::Reader::from_path(&path).unwrap();
    let header: Vec<String> = reader.headers().unwrap().iter().map(str::to_string).collect();
    assert_eq!(header, vec!["time", "ankle_angle"]);
    let times: Vec<f64> =
        reader.records().map(|r| r.unwrap()[0].parse().unwrap()).collect();
    assert!(!times.is_empty());
    assert!(times.windows(2).all(|w| w[0] < w[1]), "rows are in arrival order");
}

#[tokio::test]
async fn fallback_replaces_an_unavailable_listen_address() {
    let taken = std::net::UdpSocket::bind("127.0.0.1:0").unwrap();
    let mut config = config(9);
    config.udp.listen_port = taken.local_addr().unwrap().port();

    let err = Afolink::listen(&config).await.err().expect("port is taken");
    assert!(matches!(err, TelemetryError::Bind { .. }), "{err}");

    config.ingest.fallback_to_synthetic = true;
    let listener = Afolink::listen(&config).await.unwrap();
    assert!(listener.local_addr().is_none(), "synthetic source has no receive socket");
    assert!(listener.wait_for_frame(WAIT).await.unwrap().is_some());
    listener.stop().await;
}

#[test]
fn size_mismatch_is_fatal() {
    let yaml = r#"
udp: { listen_port: 5005, send_host: 127.0.0.1, send_port: 5432 }
packet: { format: "<30f", size: 31 }
signals: { time: 0 }
"#;
    assert!(matches!(Config::from_yaml_str(yaml), Err(TelemetryError::Config { .. })));
}

#[test]
fn config_file_loads_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(
        &path,
        "network:\n  listen_port: 5005\n  send_host: 10.0.0.2\n  send_port: 5432\npacket:\n  format: '<2d'\n  size: 2\nsignals:\n  time: 0\n",
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.udp.listen_address(), "0.0.0.0:5005");
    assert_eq!(config.packet_schema().unwrap().byte_length(), 16);
}
