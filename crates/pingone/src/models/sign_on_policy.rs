//! Sign-on policies and their priority-ordered actions.

use crate::types::ObjectRef;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOnPolicy {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The environment's default policy; set by the server
    #[serde(default, skip_serializing)]
    pub default: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enabled {
    pub enabled: bool,
}

impl Enabled {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

/// Registration settings of actions that can initiate registration.
///
/// Either a local population or an external registration page, never both.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_href: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DiscoveryCondition {
    /// Text the identifier must contain
    pub contains: String,
    /// Expression the text is matched against
    pub value: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscoveryRule {
    pub condition: DiscoveryCondition,
    pub identity_provider: ObjectRef,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProfileAttribute {
    pub name: String,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UniqueUserAttribute {
    pub name: String,
}

/// Variant payload of an action, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionKind {
    #[serde(rename_all = "camelCase")]
    Login {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recovery: Option<Enabled>,
    },
    #[serde(rename_all = "camelCase")]
    IdentifierFirst {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        recovery: Option<Enabled>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        discovery_rules: Vec<DiscoveryRule>,
    },
    #[serde(rename = "IDP", rename_all = "camelCase")]
    Idp {
        identity_provider: ObjectRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        acr_values: Option<String>,
        #[serde(default)]
        pass_user_context: bool,
    },
    #[serde(rename_all = "camelCase")]
    MultiFactorAuthentication {
        device_authentication_policy: ObjectRef,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        no_device_mode: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Agreement {
        agreement: ObjectRef,
        #[serde(default)]
        disable_decline_option: bool,
    },
    #[serde(rename_all = "camelCase")]
    ProgressiveProfiling {
        #[serde(default)]
        prevent_multiple_prompts_per_flow: bool,
        prompt_interval_seconds: i64,
        prompt_text: String,
        #[serde(default)]
        attributes: Vec<ProfileAttribute>,
    },
    #[serde(rename = "PINGID")]
    PingId,
    #[serde(rename = "PINGID_WINDOWS_LOGIN_PASSWORDLESS", rename_all = "camelCase")]
    PingIdWindowsLoginPasswordless {
        unique_user_attribute: UniqueUserAttribute,
        offline_mode: Enabled,
    },
    /// A type this client does not model
    #[serde(other)]
    Unknown,
}

impl ActionKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Login { .. } => "LOGIN",
            Self::IdentifierFirst { .. } => "IDENTIFIER_FIRST",
            Self::Idp { .. } => "IDP",
            Self::MultiFactorAuthentication { .. } => "MULTI_FACTOR_AUTHENTICATION",
            Self::Agreement { .. } => "AGREEMENT",
            Self::ProgressiveProfiling { .. } => "PROGRESSIVE_PROFILING",
            Self::PingId => "PINGID",
            Self::PingIdWindowsLoginPasswordless { .. } => "PINGID_WINDOWS_LOGIN_PASSWORDLESS",
            Self::Unknown => "UNKNOWN",
        }
    }

    /// Whether the variant accepts registration and social provider settings
    pub fn supports_registration(&self) -> bool {
        matches!(
            self,
            Self::Login { .. } | Self::IdentifierFirst { .. } | Self::Idp { .. }
        )
    }
}

impl Default for ActionKind {
    fn default() -> Self {
        Self::Login { recovery: None }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignOnPolicyAction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub priority: i64,
    #[serde(flatten)]
    pub kind: ActionKind,
    /// Compound condition document; absent means unconditional
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<Registration>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub social_providers: Vec<ObjectRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enforce_lockout_for_identity_providers: Option<bool>,
    /// Attributes shown to the user for confirmation after IdP registration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confirm_identity_provider_attributes: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sign_on_policy: Option<ObjectRef>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tagged_variants() {
        let action: SignOnPolicyAction = serde_json::from_value(json!({
            "id": "a1",
            "priority": 2,
            "type": "IDP",
            "identityProvider": {"id": "idp1"},
            "passUserContext": true,
            "registration": {"enabled": true, "population": {"id": "p1"}}
        }))
        .unwrap();
        assert_eq!(action.kind.type_name(), "IDP");
        assert!(action.kind.supports_registration());
        assert_eq!(
            action.registration.unwrap().population,
            Some(ObjectRef::new("p1"))
        );

        let out = serde_json::to_value(SignOnPolicyAction {
            priority: 1,
            kind: ActionKind::PingIdWindowsLoginPasswordless {
                unique_user_attribute: UniqueUserAttribute {
                    name: "objectGUID".into(),
                },
                offline_mode: Enabled::new(true),
            },
            ..Default::default()
        })
        .unwrap();
        assert_eq!(
            out,
            json!({
                "priority": 1,
                "type": "PINGID_WINDOWS_LOGIN_PASSWORDLESS",
                "uniqueUserAttribute": {"name": "objectGUID"},
                "offlineMode": {"enabled": true}
            })
        );
    }

    #[test]
    fn test_unit_and_unknown_variants() {
        let pingid: SignOnPolicyAction =
            serde_json::from_value(json!({"priority": 3, "type": "PINGID"})).unwrap();
        assert_eq!(pingid.kind, ActionKind::PingId);

        let future: SignOnPolicyAction =
            serde_json::from_value(json!({"priority": 4, "type": "SOMETHING_NEW"})).unwrap();
        assert_eq!(future.kind, ActionKind::Unknown);
    }
}
