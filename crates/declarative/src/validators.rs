//! Reusable attribute validators
//!
//! Validators see the attribute's own value plus its sibling attributes, so
//! cross-field rules ("required if", "conflicts with") live here too. They
//! append diagnostics and never abort; a null value is left to presence
//! checks unless the validator is about absence itself.

use crate::diagnostics::Diagnostics;
use crate::value::{UNKNOWN_SENTINEL, is_present, is_unknown};
use regex::Regex;
use serde_json::{Map, Value};
use std::fmt;

/// What a validator gets to look at
#[derive(Debug, Clone, Copy)]
pub struct ValidationRequest<'a> {
    /// Full attribute path, e.g. `conditions.user_attribute_equals[0].value`
    pub path: &'a str,
    pub value: &'a Value,
    /// Other attributes of the enclosing object
    pub siblings: &'a Map<String, Value>,
}

impl ValidationRequest<'_> {
    fn sibling(&self, name: &str) -> &Value {
        self.siblings.get(name).unwrap_or(&Value::Null)
    }
}

/// A reusable predicate over one attribute
pub trait Validator: Send + Sync + fmt::Debug {
    /// Short human description, used in schema documentation
    fn description(&self) -> String;

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics);
}

/// Whether `value` has the canonical 8-4-4-4-12 hexadecimal UUID shape
pub fn is_uuid_shaped(value: &str) -> bool {
    let bytes = value.as_bytes();
    bytes.len() == 36
        && bytes.iter().enumerate().all(|(i, b)| match i {
            8 | 13 | 18 | 23 => *b == b'-',
            _ => b.is_ascii_hexdigit(),
        })
}

/// String (or every element of a string collection) must look like a UUID
#[derive(Debug, Clone, Copy)]
pub struct UuidShape;

impl Validator for UuidShape {
    fn description(&self) -> String {
        "value must be a valid UUID".to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let candidates: Vec<&str> = match request.value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items
                .iter()
                .filter(|v| !is_unknown(v))
                .filter_map(Value::as_str)
                .collect(),
            _ => return,
        };
        for candidate in candidates {
            if !is_uuid_shaped(candidate) {
                diags.attribute_error(
                    request.path,
                    "Invalid attribute value",
                    format!(
                        "Attribute {} {}, got: {candidate}",
                        request.path,
                        self.description()
                    ),
                );
            }
        }
    }
}

/// String length lower bound
#[derive(Debug, Clone, Copy)]
pub struct LengthAtLeast(pub usize);

impl Validator for LengthAtLeast {
    fn description(&self) -> String {
        format!("string length must be at least {}", self.0)
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Some(s) = request.value.as_str()
            && s.chars().count() < self.0
        {
            diags.attribute_error(
                request.path,
                "Invalid attribute value length",
                format!(
                    "Attribute {} {}, got: {}",
                    request.path,
                    self.description(),
                    s.chars().count()
                ),
            );
        }
    }
}

/// String (or every element of a string collection) must be one of a fixed set
#[derive(Debug, Clone)]
pub struct OneOf(pub &'static [&'static str]);

impl Validator for OneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", quoted_list(self.0))
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let candidates: Vec<&str> = match request.value {
            Value::String(s) => vec![s.as_str()],
            Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
            _ => return,
        };
        for candidate in candidates {
            if candidate != UNKNOWN_SENTINEL && !self.0.contains(&candidate) {
                diags.attribute_error(
                    request.path,
                    "Invalid attribute value match",
                    format!(
                        "Attribute {} {}, got: \"{candidate}\"",
                        request.path,
                        self.description()
                    ),
                );
            }
        }
    }
}

/// Integer inclusive range
#[derive(Debug, Clone, Copy)]
pub struct IntBetween(pub i64, pub i64);

impl Validator for IntBetween {
    fn description(&self) -> String {
        format!("value must be between {} and {}", self.0, self.1)
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Some(n) = request.value.as_i64()
            && !(self.0..=self.1).contains(&n)
        {
            diags.attribute_error(
                request.path,
                "Invalid attribute value",
                format!("Attribute {} {}, got: {n}", request.path, self.description()),
            );
        }
    }
}

/// Integer lower bound
#[derive(Debug, Clone, Copy)]
pub struct IntAtLeast(pub i64);

impl Validator for IntAtLeast {
    fn description(&self) -> String {
        format!("value must be at least {}", self.0)
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Some(n) = request.value.as_i64()
            && n < self.0
        {
            diags.attribute_error(
                request.path,
                "Invalid attribute value",
                format!("Attribute {} {}, got: {n}", request.path, self.description()),
            );
        }
    }
}

/// String must match a regular expression
#[derive(Debug, Clone)]
pub struct MatchesRegex {
    pattern: Regex,
    message: &'static str,
}

impl MatchesRegex {
    pub fn new(pattern: &str, message: &'static str) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            message,
        })
    }
}

impl Validator for MatchesRegex {
    fn description(&self) -> String {
        self.message.to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Some(s) = request.value.as_str()
            && !is_unknown(request.value)
            && !self.pattern.is_match(s)
        {
            diags.attribute_error(
                request.path,
                "Invalid attribute value",
                format!("Attribute {} {}, got: {s}", request.path, self.message),
            );
        }
    }
}

/// Attribute must be set when a sibling has one of the listed values
#[derive(Debug, Clone)]
pub struct RequiredIfSiblingEquals {
    pub sibling: &'static str,
    pub values: &'static [&'static str],
}

impl Validator for RequiredIfSiblingEquals {
    fn description(&self) -> String {
        format!(
            "required when {} is one of: {}",
            self.sibling,
            quoted_list(self.values)
        )
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let Some(sibling) = self.sibling_value(request) else {
            return;
        };
        if self.values.contains(&sibling) && !is_present(request.value) {
            diags.attribute_error(
                request.path,
                "Missing required attribute",
                format!(
                    "Attribute \"{}\" must be specified when \"{}\" is \"{sibling}\".",
                    request.path, self.sibling
                ),
            );
        }
    }
}

impl RequiredIfSiblingEquals {
    fn sibling_value<'a>(&self, request: &'a ValidationRequest<'_>) -> Option<&'a str> {
        let value = request.sibling(self.sibling);
        if is_unknown(value) {
            return None;
        }
        value.as_str()
    }
}

/// Attribute must be absent when a sibling has one of the listed values
#[derive(Debug, Clone)]
pub struct ConflictsIfSiblingEquals {
    pub sibling: &'static str,
    pub values: &'static [&'static str],
}

impl Validator for ConflictsIfSiblingEquals {
    fn description(&self) -> String {
        format!(
            "must not be set when {} is one of: {}",
            self.sibling,
            quoted_list(self.values)
        )
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let sibling = request.sibling(self.sibling);
        let Some(sibling) = sibling.as_str().filter(|_| !is_unknown(sibling)) else {
            return;
        };
        if self.values.contains(&sibling) && is_present(request.value) {
            diags.attribute_error(
                request.path,
                "Invalid attribute combination",
                format!(
                    "Attribute \"{}\" cannot be specified when \"{}\" is \"{sibling}\".",
                    request.path, self.sibling
                ),
            );
        }
    }
}

/// Attribute cannot be set together with any of the listed siblings
#[derive(Debug, Clone)]
pub struct ConflictsWith(pub &'static [&'static str]);

impl Validator for ConflictsWith {
    fn description(&self) -> String {
        format!("conflicts with: {}", quoted_list(self.0))
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if !is_present(request.value) {
            return;
        }
        for other in self.0 {
            if is_present(request.sibling(other)) {
                diags.attribute_error(
                    request.path,
                    "Invalid attribute combination",
                    format!(
                        "Attribute \"{}\" cannot be specified when \"{other}\" is specified.",
                        request.path
                    ),
                );
            }
        }
    }
}

/// Exactly one attribute of the group must be set.
///
/// Attach to one member of the group; `names` lists every member, the
/// attribute itself included.
#[derive(Debug, Clone)]
pub struct ExactlyOneOf(pub &'static [&'static str]);

impl Validator for ExactlyOneOf {
    fn description(&self) -> String {
        format!("exactly one of {} must be set", quoted_list(self.0))
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let mut set = Vec::new();
        for name in self.0 {
            let value = request.sibling(name);
            if is_unknown(value) {
                return;
            }
            if is_present(value) {
                set.push(*name);
            }
        }
        if set.len() != 1 {
            let detail = if set.is_empty() {
                format!(
                    "No attribute specified when one (and only one) of [{}] is required",
                    self.0.join(",")
                )
            } else {
                format!(
                    "{} attributes specified when one (and only one) of [{}] is required: {}",
                    set.len(),
                    self.0.join(","),
                    set.join(", ")
                )
            };
            diags.attribute_error(request.path, "Invalid attribute combination", detail);
        }
    }
}

/// A declared block must carry at least one non-empty member
#[derive(Debug, Clone, Copy)]
pub struct NotEmptyBlock;

impl Validator for NotEmptyBlock {
    fn description(&self) -> String {
        "block must set at least one attribute".to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Value::Object(map) = request.value
            && !map.values().any(|v| is_present(v) || is_unknown(v))
        {
            diags.attribute_error(
                request.path,
                "Invalid block",
                format!(
                    "Block \"{}\" is declared but empty; {}.",
                    request.path,
                    self.description()
                ),
            );
        }
    }
}

fn quoted_list(values: &[&str]) -> String {
    values
        .iter()
        .map(|v| format!("\"{v}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(validator: &dyn Validator, value: Value, siblings: Value) -> Diagnostics {
        let mut diags = Diagnostics::new();
        let siblings = siblings.as_object().cloned().unwrap_or_default();
        validator.validate(
            &ValidationRequest {
                path: "attr",
                value: &value,
                siblings: &siblings,
            },
            &mut diags,
        );
        diags
    }

    #[test]
    fn test_uuid_shape() {
        assert!(is_uuid_shaped("6d2b1c55-2f3a-4b67-9d1e-3a4b5c6d7e8f"));
        assert!(!is_uuid_shaped("6d2b1c552f3a4b679d1e3a4b5c6d7e8f"));
        assert!(!is_uuid_shaped("not-a-uuid"));

        assert!(run(&UuidShape, json!("nope"), json!({})).has_error());
        assert!(!run(&UuidShape, json!(null), json!({})).has_error());
        let set = run(
            &UuidShape,
            json!(["6d2b1c55-2f3a-4b67-9d1e-3a4b5c6d7e8f", "bad"]),
            json!({}),
        );
        assert_eq!(set.error_count(), 1);
    }

    #[test]
    fn test_one_of_and_bounds() {
        let kinds = OneOf(&["CUSTOM", "OPENID_CONNECT"]);
        assert!(!run(&kinds, json!("CUSTOM"), json!({})).has_error());
        assert!(run(&kinds, json!("OTHER"), json!({})).has_error());

        assert!(run(&IntBetween(300, 2_592_000), json!(299), json!({})).has_error());
        assert!(!run(&IntBetween(300, 2_592_000), json!(3600), json!({})).has_error());
        assert!(run(&IntAtLeast(1), json!(0), json!({})).has_error());
        assert!(run(&LengthAtLeast(1), json!(""), json!({})).has_error());
    }

    #[test]
    fn test_required_if_sibling_equals() {
        let v = RequiredIfSiblingEquals {
            sibling: "resource_type",
            values: &["CUSTOM"],
        };
        assert!(run(&v, json!(null), json!({"resource_type": "CUSTOM"})).has_error());
        assert!(!run(&v, json!(null), json!({"resource_type": "OPENID_CONNECT"})).has_error());
        assert!(!run(&v, json!("x"), json!({"resource_type": "CUSTOM"})).has_error());
    }

    #[test]
    fn test_conflicts_if_sibling_equals() {
        let v = ConflictsIfSiblingEquals {
            sibling: "resource_type",
            values: &["OPENID_CONNECT", "PINGONE_API"],
        };
        let diags = run(&v, json!("x"), json!({"resource_type": "PINGONE_API"}));
        assert!(diags.mentions("cannot be specified"));
        assert!(!run(&v, json!(null), json!({"resource_type": "PINGONE_API"})).has_error());
    }

    #[test]
    fn test_conflicts_with() {
        let v = ConflictsWith(&["registration_local_population_id"]);
        assert!(
            run(
                &v,
                json!("https://example.com"),
                json!({"registration_local_population_id": "p"})
            )
            .has_error()
        );
        assert!(!run(&v, json!("https://example.com"), json!({})).has_error());
    }

    #[test]
    fn test_exactly_one_of() {
        let v = ExactlyOneOf(&["oidc_options", "saml_options", "external_link_options"]);
        assert!(run(&v, json!(null), json!({})).mentions("No attribute specified"));
        assert!(
            run(
                &v,
                json!({"a": 1}),
                json!({"oidc_options": {"a": 1}, "saml_options": {"b": 2}})
            )
            .mentions("2 attributes specified")
        );
        assert!(!run(&v, json!({"a": 1}), json!({"oidc_options": {"a": 1}})).has_error());
        // a declared block with no attributes still counts
        assert!(!run(&v, json!(null), json!({"external_link_options": {}})).has_error());
    }

    #[test]
    fn test_not_empty_block() {
        assert!(run(&NotEmptyBlock, json!({"a": null, "b": []}), json!({})).has_error());
        assert!(!run(&NotEmptyBlock, json!({"a": 5}), json!({})).has_error());
        assert!(!run(&NotEmptyBlock, json!(null), json!({})).has_error());
    }

    #[test]
    fn test_matches_regex() {
        let v = MatchesRegex::new(r"^https://", "must be an https URL").unwrap();
        assert!(run(&v, json!("http://x"), json!({})).has_error());
        assert!(!run(&v, json!("https://x"), json!({})).has_error());
    }
}
