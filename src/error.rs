//! Error types for telemetry ingest and control.
//!
//! All errors implement `std::error::Error` and carry enough structured context
//! to tell a startup failure apart from a per-datagram or per-send failure.
//!
//! ## Error Categories
//!
//! - **Config / Schema**: the configuration document or packet layout is
//!   inconsistent. Fatal at startup.
//! - **Bind**: the listening socket could not be acquired. Fatal to `start()`.
//! - **Decode**: a datagram had the wrong length. Absorbed and counted by the
//!   ingest loop, only surfaced when decoding by hand.
//! - **Encode / Send**: an outbound command could not be encoded or
//!   transmitted. Reported to the caller of `send()` only.
//!
//! ## Recovery and Retry
//!
//! ```rust
//! use afolink::TelemetryError;
//!
//! let error = TelemetryError::bind_failed("0.0.0.0:5005", std::io::ErrorKind::AddrInUse.into());
//! if error.is_retryable() {
//!     for suggestion in error.recovery_suggestions() {
//!         println!("  - {}", suggestion);
//!     }
//! }
//! ```

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Result type alias for telemetry operations.
pub type Result<T, E = TelemetryError> = std::result::Result<T, E>;

/// Main error type for telemetry operations.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TelemetryError {
    #[error("Configuration error: {reason}")]
    Config {
        reason: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Invalid packet schema: {reason}")]
    Schema { reason: String },

    #[error("Failed to bind {address}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Datagram length mismatch: expected {expected} bytes, got {actual}")]
    Decode { expected: usize, actual: usize },

    #[error("Cannot encode {signal}={value} as {format}: {reason}")]
    Encode { signal: String, value: f64, format: String, reason: String },

    #[error("Failed to send to {destination}: {reason}")]
    Send {
        destination: String,
        reason: String,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("UDP receive failed")]
    Receive {
        #[source]
        source: std::io::Error,
    },

    #[error("File error: {path}")]
    File {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {context}: {details}")]
    Parse { context: String, details: String },

    #[error("Operation timed out after {duration:?}")]
    Timeout { duration: Duration },

    #[error("Signal '{signal}' not found in packet schema")]
    FieldNotFound { signal: String },
}

impl TelemetryError {
    /// Returns whether this error is potentially recoverable through retry.
    pub fn is_retryable(&self) -> bool {
        match self {
            TelemetryError::Bind { .. } => true,
            TelemetryError::Send { .. } => true,
            TelemetryError::Timeout { .. } => true,
            TelemetryError::Decode { .. } => true,
            TelemetryError::Receive { .. } => true,
            TelemetryError::Config { .. } => false,
            TelemetryError::Schema { .. } => false,
            TelemetryError::Encode { .. } => false,
            TelemetryError::File { .. } => false,
            TelemetryError::Parse { .. } => false,
            TelemetryError::FieldNotFound { .. } => false,
        }
    }

    /// Returns suggested recovery actions for this error.
    pub fn recovery_suggestions(&self) -> Vec<&'static str> {
        match self {
            TelemetryError::Config { .. } => vec![
                "Check that packet.size matches the element count in packet.format",
                "Check that every signal index is below packet.size",
                "Validate the YAML syntax of the configuration file",
            ],
            TelemetryError::Schema { .. } => vec![
                "Use a non-zero element count",
                "Keep signal indices inside the packet layout",
                "Give each signal name exactly one index",
            ],
            TelemetryError::Bind { .. } => vec![
                "Check that no other process is listening on the port",
                "Use a port above 1024 or run with the required privileges",
                "Verify the listen host is a local interface address",
            ],
            TelemetryError::Decode { .. } => vec![
                "Compare the sender's packet layout with packet.format",
                "Check that the sender transmits one record per datagram",
            ],
            TelemetryError::Encode { .. } => vec![
                "Send finite values only",
                "Send whole numbers within range for integer layouts",
                "Check the signal name against the control layout",
            ],
            TelemetryError::Send { .. } => vec![
                "Check that the rig host is reachable",
                "Verify send_host and send_port in the configuration",
                "Restart the listener if it has been stopped",
            ],
            TelemetryError::Receive { .. } => vec![
                "Check the network interface the listener is bound to",
                "Ignore transient resets caused by an unreachable rig",
            ],
            TelemetryError::File { .. } => vec![
                "Check file exists and is readable",
                "Check file permissions",
                "Ensure sufficient disk space",
            ],
            TelemetryError::Parse { .. } => vec![
                "Check data format compatibility",
                "Verify source data integrity",
            ],
            TelemetryError::Timeout { .. } => vec![
                "Increase timeout duration",
                "Verify the rig is streaming data",
            ],
            TelemetryError::FieldNotFound { .. } => vec![
                "Check signal name spelling",
                "Add the signal to the signals section of the configuration",
            ],
        }
    }

    /// Helper constructor for configuration errors.
    pub fn config(reason: impl Into<String>) -> Self {
        TelemetryError::Config { reason: reason.into(), source: None }
    }

    /// Helper constructor for configuration errors with source.
    pub fn config_with_source(
        reason: impl Into<String>,
        source: Box<dyn std::error::Error + Send + Sync>,
    ) -> Self {
        TelemetryError::Config { reason: reason.into(), source: Some(source) }
    }

    /// Helper constructor for schema errors.
    pub fn schema(reason: impl Into<String>) -> Self {
        TelemetryError::Schema { reason: reason.into() }
    }

    /// Helper constructor for bind errors.
    pub fn bind_failed(address: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Bind { address: address.into(), source }
    }

    /// Helper constructor for length mismatches.
    pub fn length_mismatch(expected: usize, actual: usize) -> Self {
        TelemetryError::Decode { expected, actual }
    }

    /// Helper constructor for send failures caused by the socket.
    pub fn send_failed(destination: impl Into<String>, source: std::io::Error) -> Self {
        TelemetryError::Send {
            destination: destination.into(),
            reason: source.to_string(),
            source: Some(source),
        }
    }

    /// Helper constructor for sends attempted on a stopped listener.
    pub fn listener_stopped(destination: impl Into<String>) -> Self {
        TelemetryError::Send {
            destination: destination.into(),
            reason: "listener is stopped".to_string(),
            source: None,
        }
    }

    /// Helper constructor for file errors with path context.
    pub fn file_error(path: PathBuf, source: std::io::Error) -> Self {
        TelemetryError::File { path, source }
    }
}

impl From<std::io::Error> for TelemetryError {
    fn from(err: std::io::Error) -> Self {
        TelemetryError::File { path: PathBuf::from("<unknown>"), source: err }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
          #[test]
          fn error_messages_format_correctly_with_arbitrary_context(
            reason in ".*",
            signal in "\\w+",
            expected in 1usize..4096usize,
            actual in 0usize..4096usize,
          ) {
            let config_msg = TelemetryError::config(reason.clone()).to_string();
            prop_assert!(config_msg.contains(&reason));

            let decode_msg = TelemetryError::length_mismatch(expected, actual).to_string();
            prop_assert!(decode_msg.contains(&expected.to_string()));
            prop_assert!(decode_msg.contains(&actual.to_string()));

            let missing_msg = TelemetryError::FieldNotFound { signal: signal.clone() }.to_string();
            prop_assert!(missing_msg.contains(&signal));

            let stopped_msg = TelemetryError::listener_stopped("127.0.0.1:5432").to_string();
            prop_assert!(stopped_msg.contains("127.0.0.1:5432"));
          }

          #[test]
          fn config_source_chain_preserves_base_message(base_message in ".*") {
            let yaml_error: Box<dyn std::error::Error + Send + Sync> =
              Box::new(std::io::Error::other(base_message.clone()));
            let top = TelemetryError::config_with_source("loading config.yaml", yaml_error);

            let source = std::error::Error::source(&top);
            prop_assert!(source.is_some());
            prop_assert_eq!(source.map(|s| s.to_string()), Some(base_message));
          }
        }
    }

    #[test]
    fn bind_error_keeps_io_source() {
        let err = TelemetryError::bind_failed(
            "0.0.0.0:5005",
            std::io::Error::new(std::io::ErrorKind::AddrInUse, "address in use"),
        );
        assert!(err.to_string().contains("0.0.0.0:5005"));
        let source = std::error::Error::source(&err).expect("bind errors carry a source");
        assert_eq!(source.to_string(), "address in use");
    }

    #[test]
    fn error_traits_validation() {
        fn assert_send_sync_static<T: Send + Sync + 'static>() {}
        assert_send_sync_static::<TelemetryError>();

        let error = TelemetryError::schema("test");
        let _: &dyn std::error::Error = &error;
    }

    #[test]
    fn recovery_methods_work() {
        let bind = TelemetryError::bind_failed("0.0.0.0:1", std::io::ErrorKind::PermissionDenied.into());
        let config = TelemetryError::config("size mismatch");
        let decode = TelemetryError::length_mismatch(12, 8);

        assert!(bind.is_retryable());
        assert!(decode.is_retryable());
        assert!(!config.is_retryable());

        for err in [&bind, &config, &decode] {
            let suggestions = err.recovery_suggestions();
            assert!(!suggestions.is_empty());
            for suggestion in suggestions {
                assert!(suggestion.len() > 5);
            }
        }
    }

    #[test]
    fn from_conversions_work() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "config.yaml");
        match TelemetryError::from(io_err) {
            TelemetryError::File { source, .. } => assert_eq!(source.to_string(), "config.yaml"),
            other => panic!("Expected File error variant, got {other:?}"),
        }
    }
}
