//! Composite import identifiers
//!
//! Imports hand over a single slash-separated string such as
//! `env/resource/scope`. An [`ImportIdentifier`] describes its ordered
//! components; parsing checks the count and the shape of every segment and
//! reports the expected shape when either is wrong.

use crate::validators::is_uuid_shaped;
use serde_json::{Map, Value};
use thiserror::Error;

/// How a single segment is checked
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentPattern {
    Uuid,
    /// Any non-empty segment (names, enum values)
    Any,
}

impl SegmentPattern {
    fn matches(self, segment: &str) -> bool {
        match self {
            Self::Uuid => is_uuid_shaped(segment),
            Self::Any => !segment.is_empty(),
        }
    }
}

/// One segment of a composite identifier
#[derive(Debug, Clone)]
pub struct ImportComponent {
    /// Attribute the segment populates, e.g. `environment_id`
    pub label: &'static str,
    pub pattern: SegmentPattern,
    /// The primary segment becomes the record's `id`
    pub primary: bool,
}

impl ImportComponent {
    pub fn uuid(label: &'static str) -> Self {
        Self {
            label,
            pattern: SegmentPattern::Uuid,
            primary: false,
        }
    }

    pub fn any(label: &'static str) -> Self {
        Self {
            label,
            pattern: SegmentPattern::Any,
            primary: false,
        }
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ImportError {
    #[error("Invalid import ID \"{id}\": expected {expected_segments} segments in the form \"{shape}\"")]
    WrongSegmentCount {
        id: String,
        expected_segments: usize,
        shape: String,
    },

    #[error("Invalid import ID \"{id}\": segment {label} (\"{segment}\") is malformed, expected \"{shape}\"")]
    MalformedSegment {
        id: String,
        label: &'static str,
        segment: String,
        shape: String,
    },

    #[error("Resource does not support import")]
    Unsupported,
}

/// Ordered description of a composite identifier
#[derive(Debug, Clone, Default)]
pub struct ImportIdentifier {
    components: Vec<ImportComponent>,
}

impl ImportIdentifier {
    pub fn new(components: Vec<ImportComponent>) -> Self {
        Self { components }
    }

    /// `env/<id>` for objects owned directly by an environment
    pub fn environment_child(label: &'static str) -> Self {
        Self::new(vec![
            ImportComponent::uuid("environment_id"),
            ImportComponent::uuid(label).primary(),
        ])
    }

    /// `env/<parent>/<id>` for objects owned by another object
    pub fn nested(parent: &'static str, label: &'static str) -> Self {
        Self::new(vec![
            ImportComponent::uuid("environment_id"),
            ImportComponent::uuid(parent),
            ImportComponent::uuid(label).primary(),
        ])
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Human-readable shape, e.g. `environment_id/resource_id/resource_scope_id`
    pub fn expected_shape(&self) -> String {
        self.components
            .iter()
            .map(|c| c.label)
            .collect::<Vec<_>>()
            .join("/")
    }

    pub fn parse(&self, id: &str) -> Result<ImportedId, ImportError> {
        if self.components.is_empty() {
            return Err(ImportError::Unsupported);
        }

        let segments: Vec<&str> = id.split('/').collect();
        if segments.len() != self.components.len() {
            return Err(ImportError::WrongSegmentCount {
                id: id.to_string(),
                expected_segments: self.components.len(),
                shape: self.expected_shape(),
            });
        }

        let mut values = Vec::with_capacity(segments.len());
        for (component, segment) in self.components.iter().zip(&segments) {
            if !component.pattern.matches(segment) {
                return Err(ImportError::MalformedSegment {
                    id: id.to_string(),
                    label: component.label,
                    segment: (*segment).to_string(),
                    shape: self.expected_shape(),
                });
            }
            values.push((component.label, (*segment).to_string(), component.primary));
        }

        Ok(ImportedId { values })
    }
}

/// A parsed composite identifier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImportedId {
    values: Vec<(&'static str, String, bool)>,
}

impl ImportedId {
    pub fn get(&self, label: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(l, _, _)| *l == label)
            .map(|(_, v, _)| v.as_str())
    }

    pub fn primary(&self) -> Option<&str> {
        self.values
            .iter()
            .find(|(_, _, primary)| *primary)
            .map(|(_, v, _)| v.as_str())
    }

    /// Stub state: the primary segment under `id`, the others under their labels
    pub fn to_state_json(&self) -> Value {
        let mut map = Map::new();
        for (label, value, primary) in &self.values {
            let key = if *primary { "id" } else { label };
            map.insert(key.to_string(), Value::String(value.clone()));
        }
        Value::Object(map)
    }
}
