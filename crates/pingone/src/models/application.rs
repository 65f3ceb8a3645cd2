//! Applications, their resource grants and attribute mappings.

use crate::types::ObjectRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Classification of an application by protocol and built-in type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApplicationKind {
    Oidc,
    Saml,
    ExternalLink,
    /// Built-in application portal
    Portal,
    /// Built-in self-service application
    SelfService,
    /// Built-in administrator console
    AdminConsole,
    /// Anything this client does not recognise
    Unknown,
}

impl ApplicationKind {
    /// Built-in applications that allow at most one grant per resource
    pub fn is_system(&self) -> bool {
        matches!(self, Self::Portal | Self::SelfService)
    }

    /// Name of the OIDC/SAML core attribute for this kind
    pub fn core_attribute_name(&self) -> Option<&'static str> {
        match self {
            Self::Oidc | Self::Portal | Self::SelfService => Some("sub"),
            Self::Saml => Some("saml_subject"),
            _ => None,
        }
    }
}

impl fmt::Display for ApplicationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Oidc => "OpenID Connect",
            Self::Saml => "SAML",
            Self::ExternalLink => "external link",
            Self::Portal => "PingOne application portal",
            Self::SelfService => "PingOne self-service",
            Self::AdminConsole => "PingOne admin console",
            Self::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

pub const TYPE_PORTAL: &str = "PING_ONE_PORTAL";
pub const TYPE_SELF_SERVICE: &str = "PING_ONE_SELF_SERVICE";
pub const TYPE_ADMIN_CONSOLE: &str = "PING_ONE_ADMIN_CONSOLE";

pub const PROTOCOL_OIDC: &str = "OPENID_CONNECT";
pub const PROTOCOL_SAML: &str = "SAML";
pub const PROTOCOL_EXTERNAL_LINK: &str = "EXTERNAL_LINK";

/// An application. Protocol-specific settings the client does not model
/// survive a read-modify-write through `extra`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Application {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    pub protocol: String,
    #[serde(rename = "type")]
    pub application_type: String,

    // OpenID Connect
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grant_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response_types: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_logout_redirect_uris: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_endpoint_auth_method: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pkce_enforcement: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub home_page_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub login_page_url: Option<String>,

    // SAML
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acs_urls: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sp_entity_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assertion_duration: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slo_endpoint: Option<String>,

    #[serde(flatten, default)]
    pub extra: Map<String, Value>,
}

impl Application {
    pub fn kind(&self) -> ApplicationKind {
        match self.application_type.as_str() {
            TYPE_PORTAL => ApplicationKind::Portal,
            TYPE_SELF_SERVICE => ApplicationKind::SelfService,
            TYPE_ADMIN_CONSOLE => ApplicationKind::AdminConsole,
            _ => match self.protocol.as_str() {
                PROTOCOL_OIDC => ApplicationKind::Oidc,
                PROTOCOL_SAML => ApplicationKind::Saml,
                PROTOCOL_EXTERNAL_LINK => ApplicationKind::ExternalLink,
                _ => ApplicationKind::Unknown,
            },
        }
    }
}

/// Association of an application with a resource and a subset of its scopes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationResourceGrant {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub resource: ObjectRef,
    pub scopes: Vec<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ObjectRef>,
}

impl ApplicationResourceGrant {
    pub fn new(resource_id: &str, scope_ids: &[String]) -> Self {
        Self {
            id: None,
            resource: ObjectRef::new(resource_id),
            scopes: scope_ids.iter().map(ObjectRef::new).collect(),
            application: None,
        }
    }

    pub fn scope_ids(&self) -> Vec<String> {
        self.scopes.iter().map(|s| s.id.clone()).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MappingType {
    Core,
    Custom,
}

/// An attribute released to an application in its tokens or assertions
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApplicationAttributeMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mapping_type: Option<MappingType>,
    /// SAML subject name format (SAML core attribute only)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub application: Option<ObjectRef>,
}
