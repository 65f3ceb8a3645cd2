//! Resources (OAuth resource servers) and the objects they own.

use crate::types::ObjectRef;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Resource type; governs which scope, grant and attribute operations are legal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceType {
    Custom,
    OpenidConnect,
    PingoneApi,
}

impl ResourceType {
    pub const ALL: [&'static str; 3] = ["CUSTOM", "OPENID_CONNECT", "PINGONE_API"];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Custom => "CUSTOM",
            Self::OpenidConnect => "OPENID_CONNECT",
            Self::PingoneApi => "PINGONE_API",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "CUSTOM" => Some(Self::Custom),
            "OPENID_CONNECT" => Some(Self::OpenidConnect),
            "PINGONE_API" => Some(Self::PingoneApi),
            _ => None,
        }
    }

    /// Name of the built-in resource of this type
    pub fn builtin_name(&self) -> Option<&'static str> {
        match self {
            Self::Custom => None,
            Self::OpenidConnect => Some("openid"),
            Self::PingoneApi => Some("PingOne API"),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<ResourceType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audience: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token_validity_seconds: Option<i64>,
}

/// Scope names the OpenID Connect resource ships with
pub const PREDEFINED_OPENID_SCOPES: [&str; 5] = ["address", "email", "openid", "phone", "profile"];

pub fn is_predefined_openid_scope(name: &str) -> bool {
    PREDEFINED_OPENID_SCOPES.contains(&name)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceScope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Resource attribute IDs released with this scope (OpenID Connect only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapped_claims: Option<Vec<String>>,
    /// Owning resource; set by the server
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ObjectRef>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResourceAttributeType {
    Core,
    Custom,
    Predefined,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceAttribute {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    /// Expression such as `${user.email}`
    pub value: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub attribute_type: Option<ResourceAttributeType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id_token: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_info: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ObjectRef>,
}

/// Secret of a custom resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSecret {
    pub secret: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousSecret>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The outgoing secret retained after a rotation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousSecret {
    pub secret: String,
    pub expires_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_used: Option<DateTime<Utc>>,
}

/// Body of a secret regeneration request
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegenerateSecret {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous: Option<PreviousExpiry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviousExpiry {
    pub expires_at: DateTime<Utc>,
}
