//! Packet schema: how datagram bytes map to named signal values

use serde::Serialize;
use std::collections::HashMap;

use super::{MAX_DATAGRAM_BYTES, PacketFormat};
use crate::{Result, TelemetryError};

/// Byte layout and signal mapping every datagram must satisfy.
///
/// Built once from configuration and shared read-only (usually behind an
/// `Arc`) for the lifetime of the process.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PacketSchema {
    format: PacketFormat,
    /// Signal name to element index (O(1) lookup)
    signals: HashMap<String, usize>,
    /// Value encoded for signals missing from an outbound command
    default_value: f64,
}

impl PacketSchema {
    /// Create a new schema with validation.
    ///
    /// Fails when the element count is zero, when the layout does not fit in
    /// one datagram, when an index falls outside the layout, or when one name
    /// is given two different indices. Several names may share one index.
    pub fn new<I, S>(format: PacketFormat, signals: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        if format.count == 0 {
            return Err(TelemetryError::schema(format!(
                "format '{format}' declares zero elements"
            )));
        }
        if format.byte_length() > MAX_DATAGRAM_BYTES {
            return Err(TelemetryError::schema(format!(
                "format '{format}' needs {} bytes, more than one datagram holds ({MAX_DATAGRAM_BYTES})",
                format.byte_length()
            )));
        }

        let mut map: HashMap<String, usize> = HashMap::new();
        for (name, index) in signals {
            let name = name.into();
            if index >= format.count {
                return Err(TelemetryError::schema(format!(
                    "signal '{name}' index {index} is outside [0, {})",
                    format.count
                )));
            }
            match map.get(&name) {
                Some(&existing) if existing != index => {
                    return Err(TelemetryError::schema(format!(
                        "signal '{name}' maps to both {existing} and {index}"
                    )));
                }
                Some(_) => {}
                None => {
                    map.insert(name, index);
                }
            }
        }

        Ok(Self { format, signals: map, default_value: 0.0 })
    }

    /// Use `value` instead of 0 for signals missing from outbound commands.
    ///
    /// Fails when the element type cannot hold `value`, since every encode
    /// would then fail.
    pub fn with_default(mut self, value: f64) -> Result<Self> {
        self.format.element_type.check(value).map_err(|reason| {
            TelemetryError::schema(format!("default {value} cannot be encoded as '{}': {reason}", self.format))
        })?;
        self.default_value = value;
        Ok(self)
    }

    /// Layout of the datagram.
    pub fn format(&self) -> PacketFormat {
        self.format
    }

    /// Number of scalar elements per datagram.
    pub fn element_count(&self) -> usize {
        self.format.count
    }

    /// Exact datagram size in bytes.
    pub fn byte_length(&self) -> usize {
        self.format.byte_length()
    }

    /// Fill value for unset signals when encoding.
    pub fn default_value(&self) -> f64 {
        self.default_value
    }

    /// Element index of a signal.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.signals.get(name).copied()
    }

    /// Check if a signal exists.
    pub fn has_signal(&self, name: &str) -> bool {
        self.signals.contains_key(name)
    }

    /// Get the number of named signals.
    pub fn signal_count(&self) -> usize {
        self.signals.len()
    }

    /// Signals ordered by element index, then name.
    pub fn signals_by_index(&self) -> Vec<(&str, usize)> {
        let mut ordered: Vec<(&str, usize)> =
            self.signals.iter().map(|(name, &index)| (name.as_str(), index)).collect();
        ordered.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        ordered
    }

    /// Unpack every element of a datagram in declared order.
    pub fn decode_elements(&self, bytes: &[u8]) -> Result<Vec<f64>> {
        if bytes.len() != self.byte_length() {
            return Err(TelemetryError::length_mismatch(self.byte_length(), bytes.len()));
        }

        let PacketFormat { endianness, element_type, .. } = self.format;
        Ok(bytes.chunks_exact(element_type.size()).map(|raw| element_type.read(raw, endianness)).collect())
    }

    /// Decode a datagram into named values.
    ///
    /// The result holds exactly one entry per mapped signal; elements with no
    /// signal name are unpacked but left out.
    pub fn decode(&self, bytes: &[u8]) -> Result<HashMap<String, f64>> {
        let elements = self.decode_elements(bytes)?;
        Ok(self.signals.iter().map(|(name, &index)| (name.clone(), elements[index])).collect())
    }

    /// Encode named values into one datagram.
    ///
    /// Signals missing from `values` are written as the default value. Names
    /// unknown to the schema and values the element type cannot hold are
    /// rejected before anything is written.
    pub fn encode<'a, I>(&self, values: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = (&'a str, f64)>,
    {
        let PacketFormat { endianness, element_type, count } = self.format;
        let encode_error = |name: &str, value: f64, reason: String| TelemetryError::Encode {
            signal: name.to_string(),
            value,
            format: self.format.to_string(),
            reason,
        };

        let mut elements = vec![self.default_value; count];
        for (name, value) in values {
            let index = self
                .index_of(name)
                .ok_or_else(|| encode_error(name, value, "not a signal of this layout".to_string()))?;
            element_type.check(value).map_err(|reason| encode_error(name, value, reason))?;
            elements[index] = value;
        }

        let mut out = Vec::with_capacity(self.byte_length());
        for value in elements {
            element_type.write(value, endianness, &mut out);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{abc_schema, f32_datagram};
    use crate::types::{ElementType, Endianness};
    use proptest::prelude::*;

    #[test]
    fn decodes_named_floats() {
        let schema = abc_schema();
        let values = schema.decode(&f32_datagram(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(values.len(), 3);
        assert_eq!(values["a"], 1.0);
        assert_eq!(values["b"], 2.0);
        assert_eq!(values["c"], 3.0);
    }

    #[test]
    fn wrong_length_is_a_decode_error() {
        let schema = abc_schema();
        match schema.decode(&[0u8; 8]) {
            Err(TelemetryError::Decode { expected, actual }) => {
                assert_eq!(expected, 12);
                assert_eq!(actual, 8);
            }
            other => panic!("expected decode error, got {other:?}"),
        }
        assert!(schema.decode(&[0u8; 16]).is_err());
        assert!(schema.decode(&[]).is_err());
    }

    #[test]
    fn unmapped_elements_are_omitted() {
        let format = PacketFormat::parse("<4f").unwrap();
        let schema = PacketSchema::new(format, [("first", 0), ("last", 3)]).unwrap();
        let values = schema.decode(&f32_datagram(&[1.0, 9.0, 9.0, 4.0])).unwrap();
        assert_eq!(values.len(), 2);
        assert_eq!(values["last"], 4.0);
    }

    #[test]
    fn rejects_invalid_layouts() {
        let three = PacketFormat::parse("<3f").unwrap();
        assert!(matches!(
            PacketSchema::new(PacketFormat::parse("<0f").unwrap(), [("a", 0)]),
            Err(TelemetryError::Schema { .. })
        ));
        assert!(matches!(PacketSchema::new(three, [("a", 3)]), Err(TelemetryError::Schema { .. })));
        assert!(matches!(
            PacketSchema::new(three, [("a", 0), ("a", 1)]),
            Err(TelemetryError::Schema { .. })
        ));
    }

    #[test]
    fn duplicate_name_with_same_index_and_aliases_are_allowed() {
        let three = PacketFormat::parse("<3f").unwrap();
        let schema = PacketSchema::new(three, [("time", 0), ("time", 0), ("Time", 0)]).unwrap();
        assert_eq!(schema.signal_count(), 2);
        assert_eq!(schema.index_of("Time"), Some(0));
    }

    #[test]
    fn partial_command_fills_default() {
        let format = PacketFormat::parse("<30f").unwrap();
        let schema = PacketSchema::new(format, [("assistance_level", 27), ("motor", 1)]).unwrap();

        let bytes = schema.encode([("assistance_level", 2.0)]).unwrap();
        assert_eq!(bytes.len(), 120);

        let elements = schema.decode_elements(&bytes).unwrap();
        assert_eq!(elements.len(), 30);
        for (index, value) in elements.iter().enumerate() {
            if index == 27 {
                assert_eq!(*value, 2.0);
            } else {
                assert_eq!(*value, 0.0);
            }
        }
    }

    #[test]
    fn configured_default_is_used_for_missing_signals() {
        let format = PacketFormat::parse("<2d").unwrap();
        let schema = PacketSchema::new(format, [("a", 0), ("b", 1)]).unwrap().with_default(-1.0).unwrap();
        let elements = schema.decode_elements(&schema.encode([("a", 5.0)]).unwrap()).unwrap();
        assert_eq!(elements, vec![5.0, -1.0]);
    }

    #[test]
    fn unencodable_default_is_rejected_up_front() {
        let ints = PacketSchema::new(PacketFormat::parse("<2h").unwrap(), [("a", 0)]).unwrap();
        for bad in [0.5, f64::NAN, 40_000.0] {
            assert!(matches!(ints.clone().with_default(bad), Err(TelemetryError::Schema { .. })), "{bad}");
        }
        assert_eq!(ints.with_default(-3.0).unwrap().default_value(), -3.0);

        let floats = PacketSchema::new(PacketFormat::parse("<2f").unwrap(), [("a", 0)]).unwrap();
        assert!(floats.clone().with_default(1e300).is_err());
        assert!(floats.with_default(f64::NAN).is_ok());
    }

    #[test]
    fn layout_larger_than_a_datagram_is_rejected() {
        let huge = PacketFormat::new(Endianness::Little, ElementType::Float32, 16_377);
        assert!(matches!(PacketSchema::new(huge, [("a", 0)]), Err(TelemetryError::Schema { .. })));

        let overflowing = PacketFormat::new(Endianness::Little, ElementType::Float64, usize::MAX);
        assert!(PacketSchema::new(overflowing, [("a", 0)]).is_err());
    }

    #[test]
    fn encode_rejects_unknown_and_unrepresentable_values() {
        let schema = abc_schema();
        match schema.encode([("a", 1.0), ("nope", 1.0)]) {
            Err(TelemetryError::Encode { signal, reason, .. }) => {
                assert_eq!(signal, "nope");
                assert!(reason.contains("not a signal"));
            }
            other => panic!("expected encode error, got {other:?}"),
        }

        let ints = PacketSchema::new(PacketFormat::parse("<2h").unwrap(), [("x", 0)]).unwrap();
        assert!(matches!(ints.encode([("x", f64::NAN)]), Err(TelemetryError::Encode { .. })));
        assert!(matches!(ints.encode([("x", 70_000.0)]), Err(TelemetryError::Encode { .. })));
        assert!(ints.encode([("x", -7.0)]).is_ok());
    }

    #[test]
    fn big_endian_integers_decode() {
        let schema =
            PacketSchema::new(PacketFormat::parse(">2i").unwrap(), [("a", 0), ("b", 1)]).unwrap();
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&(-5i32).to_be_bytes());
        bytes.extend_from_slice(&1_000_000i32.to_be_bytes());
        let values = schema.decode(&bytes).unwrap();
        assert_eq!(values["a"], -5.0);
        assert_eq!(values["b"], 1_000_000.0);
    }

    proptest! {
        #[test]
        fn prop_decode_yields_one_value_per_signal_and_reencodes(
            bytes in prop::collection::vec(any::<u8>(), 32),
            mapped in prop::collection::btree_set(0usize..8, 1..8),
        ) {
            let format = PacketFormat::parse("<8f").unwrap();
            let schema = PacketSchema::new(
                format,
                mapped.iter().map(|&index| (format!("s{index}"), index)),
            ).unwrap();

            let values = schema.decode(&bytes).unwrap();
            prop_assert_eq!(values.len(), mapped.len());

            let reencoded = schema
                .encode(values.iter().map(|(name, value)| (name.as_str(), *value)))
                .unwrap();
            prop_assert_eq!(reencoded.len(), bytes.len());
            for index in 0..8 {
                let span = index * 4..index * 4 + 4;
                if mapped.contains(&index) {
                    prop_assert_eq!(&reencoded[span.clone()], &bytes[span]);
                } else {
                    prop_assert_eq!(&reencoded[span], &[0u8; 4][..]);
                }
            }
        }

        #[test]
        fn prop_fully_mapped_layout_reencodes_any_buffer(
            code in prop::sample::select(vec!['b', 'B', 'h', 'H', 'i', 'I', 'f', 'd']),
            prefix in prop::sample::select(vec!['<', '>']),
            count in 1usize..8,
            raw in prop::collection::vec(any::<u8>(), 64),
        ) {
            let format = PacketFormat::parse(&format!("{prefix}{count}{code}")).unwrap();
            let schema = PacketSchema::new(format, (0..count).map(|index| (format!("s{index}"), index))).unwrap();

            let bytes = &raw[..schema.byte_length()];
            let values = schema.decode(bytes).unwrap();
            let reencoded = schema
                .encode(values.iter().map(|(name, value)| (name.as_str(), *value)))
                .unwrap();
            prop_assert_eq!(reencoded.as_slice(), bytes);
        }

        #[test]
        fn prop_wrong_length_never_decodes(len in 0usize..64) {
            prop_assume!(len != 12);
            prop_assert!(abc_schema().decode(&vec![0u8; len]).is_err());
        }
    }
}
