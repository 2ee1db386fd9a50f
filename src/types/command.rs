//! Outbound control commands

use std::collections::BTreeMap;

use super::PacketSchema;
use crate::Result;

/// Partial mapping of control signals to values, encoded and sent once.
///
/// Signals left out are encoded with the schema's default value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OutboundCommand {
    values: BTreeMap<String, f64>,
}

impl OutboundCommand {
    /// Create an empty command.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a signal, replacing any earlier value.
    pub fn set(mut self, name: impl Into<String>, value: f64) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Parse `name=value` pairs, as given on the command line.
    pub fn parse_assignments<'a, I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut command = Self::new();
        for pair in pairs {
            let (name, value) = pair.split_once('=').ok_or_else(|| crate::TelemetryError::Parse {
                context: "control assignment".to_string(),
                details: format!("'{pair}' is not of the form name=value"),
            })?;
            let value: f64 = value.trim().parse().map_err(|e| crate::TelemetryError::Parse {
                context: format!("control assignment '{pair}'"),
                details: format!("{e}"),
            })?;
            command = command.set(name.trim(), value);
        }
        Ok(command)
    }

    /// Iterate over the set signals.
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.values.iter().map(|(name, value)| (name.as_str(), *value))
    }

    /// Whether no signal is set.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Encode into one datagram for `schema`.
    pub fn encode(&self, schema: &PacketSchema) -> Result<Vec<u8>> {
        schema.encode(self.iter())
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for OutboundCommand {
    fn from_iter<T: IntoIterator<Item = (S, f64)>>(iter: T) -> Self {
        Self { values: iter.into_iter().map(|(name, value)| (name.into(), value)).collect() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_assignments() {
        let command = OutboundCommand::parse_assignments(["motor=1.5", " assist = 0.5"]).unwrap();
        let pairs: Vec<_> = command.iter().collect();
        assert_eq!(pairs, vec![("assist", 0.5), ("motor", 1.5)]);
    }

    #[test]
    fn rejects_malformed_assignments() {
        assert!(OutboundCommand::parse_assignments(["motor"]).is_err());
        assert!(OutboundCommand::parse_assignments(["motor=fast"]).is_err());
    }
}
