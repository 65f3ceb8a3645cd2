//! External identity providers.
//!
//! Client secrets are write-only: the API accepts them but never returns
//! them, so every secret field is optional on the way back.

use crate::types::ObjectRef;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OAuthClient {
    pub client_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_secret: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdpVerification {
    #[serde(default)]
    pub certificates: Vec<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpSigning {
    pub key: ObjectRef,
}

/// Provider-specific settings, discriminated by `type`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ProviderKind {
    #[serde(rename_all = "camelCase")]
    Facebook {
        app_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        app_secret: Option<String>,
    },
    Google(OAuthClient),
    Linkedin(OAuthClient),
    Yahoo(OAuthClient),
    Amazon(OAuthClient),
    #[serde(rename_all = "camelCase")]
    Twitter {
        consumer_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        consumer_secret: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Apple {
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_secret_signing_key: Option<String>,
        key_id: String,
        team_id: String,
    },
    #[serde(rename_all = "camelCase")]
    Paypal {
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
        client_environment: String,
    },
    Microsoft(OAuthClient),
    Github(OAuthClient),
    #[serde(rename_all = "camelCase")]
    OpenidConnect {
        client_id: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        client_secret: Option<String>,
        authorization_endpoint: String,
        token_endpoint: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_info_endpoint: Option<String>,
        jwks_endpoint: String,
        issuer: String,
        scopes: Vec<String>,
        token_endpoint_auth_method: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        discovery_endpoint: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Saml {
        idp_entity_id: String,
        sso_binding: String,
        sso_endpoint: String,
        #[serde(default)]
        authn_request_signed: bool,
        idp_verification: IdpVerification,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        sp_signing: Option<SpSigning>,
    },
}

impl ProviderKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Facebook { .. } => "FACEBOOK",
            Self::Google(_) => "GOOGLE",
            Self::Linkedin(_) => "LINKEDIN",
            Self::Yahoo(_) => "YAHOO",
            Self::Amazon(_) => "AMAZON",
            Self::Twitter { .. } => "TWITTER",
            Self::Apple { .. } => "APPLE",
            Self::Paypal { .. } => "PAYPAL",
            Self::Microsoft(_) => "MICROSOFT",
            Self::Github(_) => "GITHUB",
            Self::OpenidConnect { .. } => "OPENID_CONNECT",
            Self::Saml { .. } => "SAML",
        }
    }
}

impl Default for ProviderKind {
    fn default() -> Self {
        Self::Google(OAuthClient::default())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdpRegistration {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub population: Option<ObjectRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProvider {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub registration: Option<IdpRegistration>,
    #[serde(flatten)]
    pub kind: ProviderKind,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_secret_is_optional_on_read() {
        let idp: IdentityProvider = serde_json::from_value(json!({
            "id": "i1",
            "name": "Google",
            "enabled": true,
            "type": "GOOGLE",
            "clientId": "abc"
        }))
        .unwrap();
        assert_eq!(
            idp.kind,
            ProviderKind::Google(OAuthClient {
                client_id: "abc".into(),
                client_secret: None,
            })
        );
    }

    #[test]
    fn test_serialize_flattens_kind() {
        let idp = IdentityProvider {
            name: "FB".into(),
            enabled: true,
            kind: ProviderKind::Facebook {
                app_id: "1".into(),
                app_secret: Some("s".into()),
            },
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&idp).unwrap(),
            json!({"name": "FB", "enabled": true, "type": "FACEBOOK", "appId": "1", "appSecret": "s"})
        );
    }
}
