//! Type bridge between host attribute values and native values
//!
//! The host hands every attribute over in one of three states: null (not
//! set), unknown (will only be known after apply) or known. [`AttrValue`]
//! carries that trichotomy into typed models so reconcilers never confuse an
//! unset optional with a value that is still being computed.

use serde::de::{DeserializeOwned, Error as _};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Marker the host uses for values that are not yet known.
pub const UNKNOWN_SENTINEL: &str = "74D93920-ED26-11E3-AC10-0800200C9A66";

/// An attribute value as seen by the host runtime
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AttrValue<T> {
    /// Not set in configuration or state
    #[default]
    Null,
    /// Will be known after apply
    Unknown,
    /// A concrete value
    Known(T),
}

impl<T> AttrValue<T> {
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Self::Unknown)
    }

    pub fn is_known(&self) -> bool {
        matches!(self, Self::Known(_))
    }

    /// Borrow the known value, if any
    pub fn known(&self) -> Option<&T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Take the known value, if any
    pub fn into_known(self) -> Option<T> {
        match self {
            Self::Known(v) => Some(v),
            _ => None,
        }
    }

    /// Null for `None`, known for `Some`
    pub fn from_option(value: Option<T>) -> Self {
        value.map_or(Self::Null, Self::Known)
    }

    pub fn as_ref(&self) -> AttrValue<&T> {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => AttrValue::Known(v),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> AttrValue<U> {
        match self {
            Self::Null => AttrValue::Null,
            Self::Unknown => AttrValue::Unknown,
            Self::Known(v) => AttrValue::Known(f(v)),
        }
    }

    /// Keep this value if it is known, otherwise fall back to `other`.
    ///
    /// Used for write-only attributes the API never echoes back.
    pub fn or_known(self, other: Self) -> Self {
        if self.is_known() { self } else { other }
    }
}

impl<T: Clone> AttrValue<T> {
    /// The known value or the provided default
    pub fn known_or(&self, default: T) -> T {
        self.known().cloned().unwrap_or(default)
    }
}

impl<T: Default + Clone> AttrValue<T> {
    pub fn known_or_default(&self) -> T {
        self.known().cloned().unwrap_or_default()
    }
}

impl AttrValue<String> {
    pub fn as_str(&self) -> Option<&str> {
        self.known().map(String::as_str)
    }

    /// Known string value, treating empty strings as null
    pub fn non_empty(&self) -> Option<&str> {
        self.as_str().filter(|s| !s.is_empty())
    }
}

impl<T> From<Option<T>> for AttrValue<T> {
    fn from(value: Option<T>) -> Self {
        Self::from_option(value)
    }
}

impl<T: Serialize> Serialize for AttrValue<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Null => serializer.serialize_none(),
            Self::Unknown => serializer.serialize_str(UNKNOWN_SENTINEL),
            Self::Known(v) => v.serialize(serializer),
        }
    }
}

impl<'de, T: DeserializeOwned> Deserialize<'de> for AttrValue<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Value::deserialize(deserializer)?;
        if raw.is_null() {
            return Ok(Self::Null);
        }
        if is_unknown(&raw) {
            return Ok(Self::Unknown);
        }
        T::deserialize(raw).map(Self::Known).map_err(D::Error::custom)
    }
}

/// Whether a raw host value is the unknown marker
pub fn is_unknown(value: &Value) -> bool {
    value.as_str() == Some(UNKNOWN_SENTINEL)
}

/// Whether a raw host value carries something: not null, not unknown, not an
/// empty collection. A declared block counts even when it has no attributes.
pub fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => s != UNKNOWN_SENTINEL,
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}
