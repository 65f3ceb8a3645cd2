//! Attribute schemas
//!
//! A [`Schema`] describes the attributes a reconciler accepts: their kind,
//! whether they are required, optional or computed, and which validators
//! run against them. [`Schema::validate`] is the first synchronization point
//! of every create and update.

use crate::diagnostics::Diagnostics;
use crate::validators::{ValidationRequest, Validator};
use crate::value::is_unknown;
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

/// Shape of an attribute value
#[derive(Debug, Clone)]
pub enum AttributeKind {
    String,
    Bool,
    Int,
    StringSet,
    StringList,
    StringMap,
    /// A single nested block
    Block(Schema),
    /// A list of nested blocks
    BlockList(Schema),
}

impl AttributeKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Bool => "bool",
            Self::Int => "number",
            Self::StringSet => "set of string",
            Self::StringList => "list of string",
            Self::StringMap => "map of string",
            Self::Block(_) => "block",
            Self::BlockList(_) => "list of blocks",
        }
    }

    fn accepts(&self, value: &Value) -> bool {
        match self {
            Self::String => value.is_string(),
            Self::Bool => value.is_boolean(),
            Self::Int => value.is_i64() || value.is_u64(),
            Self::StringSet | Self::StringList => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_string)),
            Self::StringMap => value
                .as_object()
                .is_some_and(|map| map.values().all(Value::is_string)),
            Self::Block(_) => value.is_object(),
            Self::BlockList(_) => value
                .as_array()
                .is_some_and(|items| items.iter().all(Value::is_object)),
        }
    }
}

/// Who supplies an attribute's value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Required,
    Optional,
    /// Set by the server only
    Computed,
    /// Optional in configuration, filled by the server when omitted
    OptionalComputed,
}

impl Presence {
    pub fn is_computed(&self) -> bool {
        matches!(self, Self::Computed | Self::OptionalComputed)
    }
}

/// A single schema attribute
#[derive(Clone)]
pub struct Attribute {
    pub name: &'static str,
    pub kind: AttributeKind,
    pub presence: Presence,
    pub sensitive: bool,
    /// Changing this attribute replaces the remote object
    pub force_new: bool,
    pub description: &'static str,
    pub validators: Vec<Arc<dyn Validator>>,
}

impl fmt::Debug for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Attribute")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("presence", &self.presence)
            .field("sensitive", &self.sensitive)
            .field("force_new", &self.force_new)
            .field("validators", &self.validators.len())
            .finish()
    }
}

impl Attribute {
    fn new(name: &'static str, kind: AttributeKind) -> Self {
        Self {
            name,
            kind,
            presence: Presence::Optional,
            sensitive: false,
            force_new: false,
            description: "",
            validators: Vec::new(),
        }
    }

    pub fn string(name: &'static str) -> Self {
        Self::new(name, AttributeKind::String)
    }

    pub fn bool(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Bool)
    }

    pub fn int(name: &'static str) -> Self {
        Self::new(name, AttributeKind::Int)
    }

    pub fn string_set(name: &'static str) -> Self {
        Self::new(name, AttributeKind::StringSet)
    }

    pub fn string_list(name: &'static str) -> Self {
        Self::new(name, AttributeKind::StringList)
    }

    pub fn string_map(name: &'static str) -> Self {
        Self::new(name, AttributeKind::StringMap)
    }

    pub fn block(name: &'static str, schema: Schema) -> Self {
        Self::new(name, AttributeKind::Block(schema))
    }

    pub fn block_list(name: &'static str, schema: Schema) -> Self {
        Self::new(name, AttributeKind::BlockList(schema))
    }

    /// The `id` attribute every reconciler exposes
    pub fn id() -> Self {
        Self::string("id")
            .computed()
            .describe("The ID of the object.")
    }

    pub fn required(mut self) -> Self {
        self.presence = Presence::Required;
        self
    }

    pub fn optional(mut self) -> Self {
        self.presence = Presence::Optional;
        self
    }

    pub fn computed(mut self) -> Self {
        self.presence = Presence::Computed;
        self
    }

    pub fn optional_computed(mut self) -> Self {
        self.presence = Presence::OptionalComputed;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }

    pub fn validate<V: Validator + 'static>(mut self, validator: V) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }
}

/// The attribute set of a reconciler or nested block
#[derive(Debug, Clone, Default)]
pub struct Schema {
    pub version: u32,
    pub description: &'static str,
    pub attributes: Vec<Attribute>,
}

impl Schema {
    pub fn new(description: &'static str) -> Self {
        Self {
            version: 0,
            description,
            attributes: Vec::new(),
        }
    }

    pub fn version(mut self, version: u32) -> Self {
        self.version = version;
        self
    }

    pub fn attribute(mut self, attribute: Attribute) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Names of attributes whose change forces replacement
    pub fn force_new_attributes(&self) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.force_new)
            .map(|a| a.name)
            .collect()
    }

    /// Names of attributes that must never be logged
    pub fn sensitive_attributes(&self) -> Vec<&'static str> {
        self.attributes
            .iter()
            .filter(|a| a.sensitive)
            .map(|a| a.name)
            .collect()
    }

    /// Validate a planned value against this schema
    pub fn validate(&self, config: &Value, diags: &mut Diagnostics) {
        match config.as_object() {
            Some(map) => self.validate_object("", map, diags),
            None => diags.error(
                "Invalid configuration",
                "Expected an object at the top level of the configuration.",
            ),
        }
    }

    fn validate_object(&self, prefix: &str, map: &Map<String, Value>, diags: &mut Diagnostics) {
        for attribute in &self.attributes {
            let path = join_path(prefix, attribute.name);
            let value = map.get(attribute.name).unwrap_or(&Value::Null);

            if is_unknown(value) {
                continue;
            }

            if value.is_null() {
                if attribute.presence == Presence::Required {
                    diags.attribute_error(
                        &path,
                        "Missing required argument",
                        format!("The argument \"{path}\" is required, but no definition was found."),
                    );
                }
            } else if !attribute.kind.accepts(value) {
                diags.attribute_error(
                    &path,
                    "Incorrect attribute value type",
                    format!(
                        "Inappropriate value for attribute \"{path}\": {} required.",
                        attribute.kind.type_name()
                    ),
                );
                continue;
            } else {
                match (&attribute.kind, value) {
                    (AttributeKind::Block(nested), Value::Object(inner)) => {
                        nested.validate_object(&path, inner, diags);
                    }
                    (AttributeKind::BlockList(nested), Value::Array(items)) => {
                        for (i, item) in items.iter().enumerate() {
                            if let Value::Object(inner) = item {
                                nested.validate_object(&format!("{path}[{i}]"), inner, diags);
                            }
                        }
                    }
                    _ => {}
                }
            }

            let request = ValidationRequest {
                path: &path,
                value,
                siblings: map,
            };
            for validator in &attribute.validators {
                validator.validate(&request, diags);
            }
        }
    }
}

fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validators::{LengthAtLeast, UuidShape};
    use crate::value::UNKNOWN_SENTINEL;
    use serde_json::json;

    fn sample() -> Schema {
        Schema::new("sample")
            .attribute(Attribute::id())
            .attribute(Attribute::string("environment_id").required().force_new().validate(UuidShape))
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("secret").optional().sensitive())
            .attribute(Attribute::block(
                "options",
                Schema::new("options").attribute(Attribute::int("ttl").required()),
            ))
    }

    #[test]
    fn test_missing_required() {
        let mut diags = Diagnostics::new();
        sample().validate(&json!({"name": "x"}), &mut diags);
        assert!(diags.has_error());
        assert!(diags.mentions("environment_id"));
    }

    #[test]
    fn test_unknown_values_are_skipped() {
        let mut diags = Diagnostics::new();
        sample().validate(
            &json!({"environment_id": UNKNOWN_SENTINEL, "name": UNKNOWN_SENTINEL}),
            &mut diags,
        );
        assert!(!diags.has_error(), "{diags}");
    }

    #[test]
    fn test_nested_block_paths() {
        let mut diags = Diagnostics::new();
        sample().validate(
            &json!({
                "environment_id": "6d2b1c55-2f3a-4b67-9d1e-3a4b5c6d7e8f",
                "name": "x",
                "options": {}
            }),
            &mut diags,
        );
        let err = diags.errors().next().unwrap();
        assert_eq!(err.attribute.as_deref(), Some("options.ttl"));
    }

    #[test]
    fn test_wrong_type() {
        let mut diags = Diagnostics::new();
        sample().validate(
            &json!({"environment_id": "6d2b1c55-2f3a-4b67-9d1e-3a4b5c6d7e8f", "name": 5}),
            &mut diags,
        );
        assert!(diags.mentions("string required"));
    }

    #[test]
    fn test_schema_flags() {
        let schema = sample();
        assert_eq!(schema.force_new_attributes(), vec!["environment_id"]);
        assert_eq!(schema.sensitive_attributes(), vec!["secret"]);
    }
}
