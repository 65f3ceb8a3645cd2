//! Validators specific to PingOne attribute formats.

use chrono::DateTime;
use declarative::Diagnostics;
use declarative::validators::{ValidationRequest, Validator};
use declarative::value::is_unknown;
use regex::Regex;
use serde_json::Value;
use std::net::IpAddr;
use std::sync::LazyLock;

/// Literal text with any number of non-empty `${...}` placeholders
static EXPRESSION: LazyLock<Option<Regex>> =
    LazyLock::new(|| Regex::new(r"^(?:[^$]|\$(?:[^{]|$)|\$\{[^{}]+\})*$").ok());

fn known_str<'a>(request: &'a ValidationRequest<'_>) -> Option<&'a str> {
    if is_unknown(request.value) {
        return None;
    }
    request.value.as_str()
}

/// String must be an RFC 3339 timestamp, e.g. `2026-01-01T00:00:00Z`
#[derive(Debug, Clone, Copy)]
pub struct Rfc3339Timestamp;

impl Validator for Rfc3339Timestamp {
    fn description(&self) -> String {
        "value must be an RFC 3339 timestamp".to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        if let Some(s) = known_str(request)
            && let Err(e) = DateTime::parse_from_rfc3339(s)
        {
            diags.attribute_error(
                request.path,
                "Invalid timestamp",
                format!("Attribute {} must be an RFC 3339 timestamp, got \"{s}\": {e}", request.path),
            );
        }
    }
}

/// Whether `value` is an `address/prefix` block
pub fn is_cidr(value: &str) -> bool {
    let Some((address, prefix)) = value.split_once('/') else {
        return false;
    };
    let Ok(address) = address.parse::<IpAddr>() else {
        return false;
    };
    let Ok(prefix) = prefix.parse::<u8>() else {
        return false;
    };
    match address {
        IpAddr::V4(_) => prefix <= 32,
        IpAddr::V6(_) => prefix <= 128,
    }
}

/// String, or every element of a string collection, must be a CIDR block
#[derive(Debug, Clone, Copy)]
pub struct Cidr;

impl Validator for Cidr {
    fn description(&self) -> String {
        "value must be a CIDR block".to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let candidates: Vec<&str> = match request.value {
            Value::String(s) if !is_unknown(request.value) => vec![s.as_str()],
            Value::Array(items) => items
                .iter()
                .filter(|v| !is_unknown(v))
                .filter_map(Value::as_str)
                .collect(),
            _ => return,
        };
        for candidate in candidates.into_iter().filter(|c| !is_cidr(c)) {
            diags.attribute_error(
                request.path,
                "Invalid CIDR block",
                format!("Attribute {} expected a CIDR block such as 10.0.0.0/8, got: {candidate}", request.path),
            );
        }
    }
}

/// Attribute mapping value: literal text or `${...}` expressions
#[derive(Debug, Clone, Copy)]
pub struct AttributeExpression;

impl Validator for AttributeExpression {
    fn description(&self) -> String {
        "value must be literal text or a ${...} expression".to_string()
    }

    fn validate(&self, request: &ValidationRequest<'_>, diags: &mut Diagnostics) {
        let Some(s) = known_str(request) else {
            return;
        };
        let Some(pattern) = EXPRESSION.as_ref() else {
            return;
        };
        if s.is_empty() || !pattern.is_match(s) {
            diags.attribute_error(
                request.path,
                "Invalid attribute expression",
                format!(
                    "Attribute {} must be literal text or contain complete ${{...}} placeholders, got: \"{s}\"",
                    request.path
                ),
            );
        }
    }
}
