//! YAML configuration: network addressing, packet layouts and optional services.
//!
//! ```yaml
//! udp:
//!   listen_host: 0.0.0.0
//!   listen_port: 5005
//!   send_host: 192.168.7.5
//!   send_port: 5432
//! packet:
//!   format: "<3f"
//!   size: 3
//! signals:
//!   time: 0
//!   ankle_angle: 1
//!   actual_torque: 2
//! ```
//!
//! `packet.size` repeats the element count of `packet.format`; the two must
//! agree, and every signal index must lie in `[0, size)`. A signal name may
//! appear only once per section, and `default` must be encodable in the
//! element type. All of this is checked at load time and reported as
//! [`TelemetryError::Config`].

use serde::de::{self, MapAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::types::{PacketFormat, PacketSchema};
use crate::{Result, TelemetryError};

/// Complete configuration document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Listening and destination addresses
    #[serde(alias = "network")]
    pub udp: NetworkConfig,

    /// Inbound datagram layout
    pub packet: PacketConfig,

    /// Inbound signal name to element index
    #[serde(deserialize_with = "unique_signals")]
    pub signals: BTreeMap<String, i64>,

    /// Outbound layout; inbound layout is reused when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control: Option<ControlConfig>,

    /// Receive loop tuning
    #[serde(default)]
    pub ingest: IngestConfig,

    /// CSV logging of received frames
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recorder: Option<RecorderConfig>,
}

/// Network addressing section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_listen_host")]
    pub listen_host: String,
    pub listen_port: u16,
    pub send_host: String,
    pub send_port: u16,
}

impl NetworkConfig {
    /// `listen_host:listen_port`
    pub fn listen_address(&self) -> String {
        join_host_port(&self.listen_host, self.listen_port)
    }

    /// `send_host:send_port`
    pub fn send_address(&self) -> String {
        join_host_port(&self.send_host, self.send_port)
    }
}

fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') && !host.starts_with('[') {
        format!("[{host}]:{port}")
    } else {
        format!("{host}:{port}")
    }
}

/// Packet layout section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PacketConfig {
    /// Struct-style format string, e.g. `<30f`
    pub format: String,
    /// Element count, must equal the count derived from `format`
    pub size: i64,
    /// Value sent for signals an outbound command leaves out
    #[serde(default)]
    pub default: f64,
}

/// Outbound control layout section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlConfig {
    pub format: String,
    pub size: i64,
    #[serde(default)]
    pub default: f64,
    #[serde(deserialize_with = "unique_signals")]
    pub signals: BTreeMap<String, i64>,
}

/// Receive loop tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Expected source rate, used to pace the synthetic source and to
    /// normalize subscription rates
    #[serde(default = "default_sample_rate_hz")]
    pub sample_rate_hz: f64,
    /// Presentation polling cadence
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Period of the status log line; 0 disables it
    #[serde(default = "default_status_interval_secs")]
    pub status_interval_secs: u64,
    /// Signal carrying simulation time, used for the mean step statistic
    #[serde(default = "default_time_signal")]
    pub time_signal: String,
    /// Switch to synthetic telemetry when the listen address cannot be bound
    /// or the rig host does not resolve
    #[serde(default)]
    pub fallback_to_synthetic: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: default_sample_rate_hz(),
            poll_interval_ms: default_poll_interval_ms(),
            status_interval_secs: default_status_interval_secs(),
            time_signal: default_time_signal(),
            fallback_to_synthetic: false,
        }
    }
}

impl IngestConfig {
    /// Presentation polling cadence.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Status log period, `None` when disabled.
    pub fn status_interval(&self) -> Option<Duration> {
        (self.status_interval_secs > 0).then(|| Duration::from_secs(self.status_interval_secs))
    }
}

/// CSV recorder section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecorderConfig {
    pub path: PathBuf,
    /// Signals to log, in column order; all signals by index when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub columns: Option<Vec<String>>,
    /// Rows kept on disk (newest win)
    #[serde(default = "default_max_rows")]
    pub max_rows: usize,
    #[serde(default = "default_flush_interval_ms")]
    pub flush_interval_ms: u64,
}

impl RecorderConfig {
    /// Recorder writing to `path` with default retention.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            columns: None,
            max_rows: default_max_rows(),
            flush_interval_ms: default_flush_interval_ms(),
        }
    }

    /// Rewrite period of the CSV file.
    pub fn flush_interval(&self) -> Duration {
        Duration::from_millis(self.flush_interval_ms)
    }
}

fn default_listen_host() -> String {
    "0.0.0.0".to_string()
}

fn default_sample_rate_hz() -> f64 {
    100.0
}

fn default_poll_interval_ms() -> u64 {
    100
}

fn default_status_interval_secs() -> u64 {
    10
}

fn default_time_signal() -> String {
    "time".to_string()
}

fn default_max_rows() -> usize {
    1000
}

fn default_flush_interval_ms() -> u64 {
    1000
}

/// Signal map that rejects a name listed twice with different indices.
///
/// A plain map would keep the last entry silently.
fn unique_signals<'de, D>(deserializer: D) -> std::result::Result<BTreeMap<String, i64>, D::Error>
where
    D: Deserializer<'de>,
{
    struct SignalsVisitor;

    impl<'de> Visitor<'de> for SignalsVisitor {
        type Value = BTreeMap<String, i64>;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a map of signal names to element indices")
        }

        fn visit_map<A>(self, mut access: A) -> std::result::Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut signals = BTreeMap::new();
            while let Some((name, index)) = access.next_entry::<String, i64>()? {
                match signals.get(&name) {
                    Some(&existing) if existing != index => {
                        return Err(de::Error::custom(format!(
                            "signal '{name}' maps to both {existing} and {index}"
                        )));
                    }
                    Some(_) => {}
                    None => {
                        signals.insert(name, index);
                    }
                }
            }
            Ok(signals)
        }
    }

    deserializer.deserialize_map(SignalsVisitor)
}

impl Config {
    /// Load and validate a configuration file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| TelemetryError::file_error(path.to_path_buf(), e))?;
        debug!(path = %path.display(), bytes = text.len(), "Read configuration");
        Self::from_yaml_str(&text)
    }

    /// Parse and validate a configuration document.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let config: Config = serde_yaml_ng::from_str(text)
            .map_err(|e| TelemetryError::config_with_source("invalid configuration YAML", Box::new(e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Check layout consistency of every section.
    pub fn validate(&self) -> Result<()> {
        check_layout("packet", &self.packet.format, self.packet.size, self.packet.default, &self.signals)?;

        if let Some(control) = &self.control {
            check_layout("control", &control.format, control.size, control.default, &control.signals)?;
        }

        if !self.ingest.sample_rate_hz.is_finite() || self.ingest.sample_rate_hz <= 0.0 {
            return Err(TelemetryError::config(format!(
                "ingest.sample_rate_hz must be positive, got {}",
                self.ingest.sample_rate_hz
            )));
        }

        if self.ingest.poll_interval_ms == 0 {
            return Err(TelemetryError::config("ingest.poll_interval_ms must be at least 1"));
        }

        if let Some(recorder) = &self.recorder {
            if recorder.max_rows == 0 {
                return Err(TelemetryError::config("recorder.max_rows must be at least 1"));
            }
            if recorder.flush_interval_ms == 0 {
                return Err(TelemetryError::config("recorder.flush_interval_ms must be at least 1"));
            }
            for column in recorder.columns.iter().flatten() {
                if !self.signals.contains_key(column) {
                    return Err(TelemetryError::config(format!(
                        "recorder column '{column}' is not a configured signal"
                    )));
                }
            }
        }

        Ok(())
    }

    /// Schema for inbound datagrams.
    pub fn packet_schema(&self) -> Result<PacketSchema> {
        build_schema(&self.packet.format, &self.signals, self.packet.default)
    }

    /// Schema for outbound commands.
    pub fn control_schema(&self) -> Result<PacketSchema> {
        match &self.control {
            Some(control) => build_schema(&control.format, &control.signals, control.default),
            None => self.packet_schema(),
        }
    }
}

fn check_layout(
    section: &str,
    format: &str,
    size: i64,
    default: f64,
    signals: &BTreeMap<String, i64>,
) -> Result<()> {
    let parsed = PacketFormat::parse(format).map_err(|e| {
        TelemetryError::config_with_source(format!("{section}.format '{format}' is invalid"), Box::new(e))
    })?;

    if size <= 0 {
        return Err(TelemetryError::config(format!("{section}.size must be positive, got {size}")));
    }
    if size as usize != parsed.count {
        return Err(TelemetryError::config(format!(
            "{section}.size is {size} but format '{format}' declares {} elements",
            parsed.count
        )));
    }

    for (name, &index) in signals {
        if index < 0 || index >= size {
            return Err(TelemetryError::config(format!(
                "signal '{name}' index {index} is outside [0, {size})"
            )));
        }
    }

    parsed.element_type.check(default).map_err(|reason| {
        TelemetryError::config(format!("{section}.default {default} cannot be encoded as '{format}': {reason}"))
    })?;
    Ok(())
}

fn build_schema(format: &str, signals: &BTreeMap<String, i64>, default: f64) -> Result<PacketSchema> {
    let format = PacketFormat::parse(format)?;
    let mut mapped = Vec::with_capacity(signals.len());
    for (name, &index) in signals {
        let index = usize::try_from(index).map_err(|_| {
            TelemetryError::schema(format!("signal '{name}' has negative index {index}"))
        })?;
        mapped.push((name.as_str(), index));
    }
    PacketSchema::new(format, mapped)?.with_default(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: &str = r#"
udp:
  listen_host: 127.0.0.1
  listen_port: 5005
  send_host: 192.168.7.5
  send_port: 5432
packet:
  format: "<3f"
  size: 3
signals:
  a: 0
  b: 1
  c: 2
"#;

    #[test]
    fn loads_minimal_document_with_defaults() {
        let config = Config::from_yaml_str(BASE).unwrap();
        assert_eq!(config.udp.listen_address(), "127.0.0.1:5005");
        assert_eq!(config.udp.send_address(), "192.168.7.5:5432");
        assert_eq!(config.ingest.sample_rate_hz, 100.0);
        assert_eq!(config.ingest.poll_interval(), Duration::from_millis(100));
        assert_eq!(config.ingest.time_signal, "time");
        assert!(config.recorder.is_none());

        let schema = config.packet_schema().unwrap();
        assert_eq!(schema.byte_length(), 12);
        assert_eq!(schema.index_of("c"), Some(2));
        assert_eq!(config.control_schema().unwrap(), schema);
    }

    #[test]
    fn network_alias_is_accepted() {
        let text = BASE.replace("udp:", "network:");
        assert!(Config::from_yaml_str(&text).is_ok());
    }

    #[test]
    fn size_format_mismatch_is_config_error() {
        let text = BASE.replace("size: 3", "size: 4");
        let err = Config::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }), "{err}");
        assert!(err.to_string().contains("declares 3 elements"));
    }

    #[test]
    fn out_of_range_signal_is_config_error() {
        for bad in ["c: 3", "c: -1"] {
            let text = BASE.replace("c: 2", bad);
            assert!(matches!(Config::from_yaml_str(&text), Err(TelemetryError::Config { .. })));
        }
    }

    #[test]
    fn malformed_yaml_is_config_error() {
        assert!(matches!(
            Config::from_yaml_str("udp: [unclosed"),
            Err(TelemetryError::Config { .. })
        ));
        let text = BASE.replace("<3f", "<3z");
        assert!(matches!(Config::from_yaml_str(&text), Err(TelemetryError::Config { .. })));
    }

    #[test]
    fn control_section_defines_outbound_layout() {
        let text = format!(
            "{BASE}control:\n  format: \"<4f\"\n  size: 4\n  default: 0.0\n  signals:\n    zero_signal: 0\n    motor_signal: 1\n    assistance_signal: 2\n    fixed_k_signal: 3\n"
        );
        let config = Config::from_yaml_str(&text).unwrap();
        let control = config.control_schema().unwrap();
        assert_eq!(control.byte_length(), 16);
        assert!(control.has_signal("fixed_k_signal"));
        assert!(!control.has_signal("a"));
    }

    #[test]
    fn recorder_columns_must_be_signals() {
        let ok = format!("{BASE}recorder:\n  path: log.csv\n  columns: [a, c]\n");
        let config = Config::from_yaml_str(&ok).unwrap();
        let recorder = config.recorder.unwrap();
        assert_eq!(recorder.max_rows, 1000);
        assert_eq!(recorder.flush_interval(), Duration::from_secs(1));

        let bad = format!("{BASE}recorder:\n  path: log.csv\n  columns: [a, zzz]\n");
        assert!(matches!(Config::from_yaml_str(&bad), Err(TelemetryError::Config { .. })));
    }

    #[test]
    fn zero_intervals_are_rejected() {
        let poll = format!("{BASE}ingest:\n  poll_interval_ms: 0\n");
        assert!(Config::from_yaml_str(&poll).is_err());

        let flush = format!("{BASE}recorder:\n  path: log.csv\n  flush_interval_ms: 0\n");
        assert!(Config::from_yaml_str(&flush).is_err());
    }

    #[test]
    fn repeated_signal_name_is_config_error() {
        let packet = BASE.replace("  c: 2", "  c: 2\n  a: 1");
        let err = Config::from_yaml_str(&packet).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }), "{err}");

        let control = format!(
            "{BASE}control:\n  format: \"<2f\"\n  size: 2\n  signals:\n    k: 0\n    k: 1\n"
        );
        assert!(matches!(Config::from_yaml_str(&control), Err(TelemetryError::Config { .. })));

        let repeated_same_index = BASE.replace("  c: 2", "  c: 2\n  c: 2");
        let config = Config::from_yaml_str(&repeated_same_index).unwrap();
        assert_eq!(config.signals["c"], 2);
    }

    #[test]
    fn oversized_layout_is_config_error() {
        let overflowing = BASE
            .replace("<3f", "<5000000000000000000f")
            .replace("size: 3", "size: 5000000000000000000");
        assert!(matches!(Config::from_yaml_str(&overflowing), Err(TelemetryError::Config { .. })));

        let too_big = BASE.replace("<3f", "<16377f").replace("size: 3", "size: 16377");
        assert!(matches!(Config::from_yaml_str(&too_big), Err(TelemetryError::Config { .. })));
    }

    #[test]
    fn unencodable_default_is_config_error() {
        let text = BASE.replace("<3f", "<3h").replace("size: 3", "size: 3\n  default: 0.5");
        let err = Config::from_yaml_str(&text).unwrap_err();
        assert!(matches!(err, TelemetryError::Config { .. }), "{err}");
        assert!(err.to_string().contains("packet.default"));

        let whole = BASE.replace("<3f", "<3h").replace("size: 3", "size: 3\n  default: -1");
        let config = Config::from_yaml_str(&whole).unwrap();
        assert_eq!(config.packet_schema().unwrap().default_value(), -1.0);
    }

    #[test]
    fn fallback_is_opt_in() {
        assert!(!Config::from_yaml_str(BASE).unwrap().ingest.fallback_to_synthetic);
        let text = format!("{BASE}ingest:\n  fallback_to_synthetic: true\n");
        assert!(Config::from_yaml_str(&text).unwrap().ingest.fallback_to_synthetic);
    }

    #[test]
    fn load_reports_missing_file() {
        let err = Config::load("/definitely/not/here/config.yaml").unwrap_err();
        assert!(matches!(err, TelemetryError::File { .. }));
    }

    #[test]
    fn ipv6_hosts_are_bracketed() {
        assert_eq!(join_host_port("::1", 5005), "[::1]:5005");
    }
}
