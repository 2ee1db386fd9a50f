//! Validation plans and per-field extraction strategies

use std::collections::HashMap;

use crate::types::{Frame, PacketSchema};
use crate::{Result, TelemetryError};

/// Extraction plan built once when an adapter is validated.
#[derive(Debug, Clone)]
pub struct AdapterValidation {
    /// Ordered list of field extraction operations
    pub extraction_plan: Vec<FieldExtraction>,
    /// Signal name to position in `extraction_plan`
    index_map: HashMap<String, usize>,
}

impl AdapterValidation {
    /// Create a validation plan from extraction operations.
    pub fn new(extraction_plan: Vec<FieldExtraction>) -> Self {
        let index_map = extraction_plan
            .iter()
            .enumerate()
            .filter_map(|(position, extraction)| {
                extraction.signal_name().map(|name| (name.to_string(), position))
            })
            .collect();

        Self { extraction_plan, index_map }
    }

    /// Number of planned fields.
    pub fn field_count(&self) -> usize {
        self.extraction_plan.len()
    }

    /// Whether any planned field is required.
    pub fn has_required_fields(&self) -> bool {
        self.extraction_plan.iter().any(FieldExtraction::is_required)
    }

    /// Position of a signal in the extraction plan.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index_map.get(name).copied()
    }

    /// Whether the schema maps `name`, according to the plan.
    pub fn is_available(&self, name: &str) -> bool {
        self.index_of(name)
            .and_then(|position| self.extraction_plan.get(position))
            .is_some_and(|field| field.element_index().is_some())
    }

    /// Read a signal through the plan.
    ///
    /// Signals the schema does not map read as the field's default (0.0 unless
    /// planned with [`FieldExtraction::WithDefault`]). Signals outside the plan
    /// are read straight from the frame.
    pub fn fetch_or_default(&self, frame: &Frame, name: &str) -> f64 {
        match self.index_of(name).and_then(|position| self.extraction_plan.get(position)) {
            Some(field) => match field.element_index() {
                Some(_) => frame.get(name).unwrap_or_else(|| field.default_value()),
                None => field.default_value(),
            },
            None => frame.get_or_zero(name),
        }
    }
}

/// Extraction strategy for a single signal.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldExtraction {
    /// Signal that must be mapped; validation fails otherwise
    Required {
        /// Signal name
        name: String,
        /// Element index in the packet
        index: usize,
    },

    /// Signal that may be unmapped, reading 0.0 when absent
    Optional {
        /// Signal name
        name: String,
        /// Element index, `None` when unmapped
        index: Option<usize>,
    },

    /// Signal that reads a fixed fallback when unmapped
    WithDefault {
        /// Signal name
        name: String,
        /// Element index, `None` when unmapped
        index: Option<usize>,
        /// Fallback value
        default: f64,
    },

    /// Adapter field filled by the application
    Skipped,
}

impl FieldExtraction {
    /// Plan a required signal, failing if the schema does not map it.
    pub fn required(schema: &PacketSchema, name: &str) -> Result<Self> {
        let index = schema
            .index_of(name)
            .ok_or_else(|| TelemetryError::FieldNotFound { signal: name.to_string() })?;
        Ok(FieldExtraction::Required { name: name.to_string(), index })
    }

    /// Plan an optional signal.
    pub fn optional(schema: &PacketSchema, name: &str) -> Self {
        FieldExtraction::Optional { name: name.to_string(), index: schema.index_of(name) }
    }

    /// Plan a signal with a fallback value.
    pub fn with_default(schema: &PacketSchema, name: &str, default: f64) -> Self {
        FieldExtraction::WithDefault { name: name.to_string(), index: schema.index_of(name), default }
    }

    /// Signal name, if this extraction reads one.
    pub fn signal_name(&self) -> Option<&str> {
        match self {
            FieldExtraction::Required { name, .. }
            | FieldExtraction::Optional { name, .. }
            | FieldExtraction::WithDefault { name, .. } => Some(name),
            FieldExtraction::Skipped => None,
        }
    }

    /// Whether validation fails without this signal.
    pub fn is_required(&self) -> bool {
        matches!(self, FieldExtraction::Required { .. })
    }

    /// Element index in the packet, when mapped.
    pub fn element_index(&self) -> Option<usize> {
        match self {
            FieldExtraction::Required { index, .. } => Some(*index),
            FieldExtraction::Optional { index, .. } | FieldExtraction::WithDefault { index, .. } => {
                *index
            }
            FieldExtraction::Skipped => None,
        }
    }

    /// Value used when the signal is unmapped.
    pub fn default_value(&self) -> f64 {
        match self {
            FieldExtraction::WithDefault { default, .. } => *default,
            _ => 0.0,
        }
    }
}
