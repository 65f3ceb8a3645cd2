//! `pingone_identity_provider`: external identity providers.
//!
//! Twelve provider kinds, one block each; exactly one is declared. Client
//! secrets are write-only, so state carries them over from the plan (or the
//! prior state) instead of reading them back.

use super::{environment_id, known, object_ref, ref_id, string_set, to_list};
use crate::api::{Api, NotFound, require};
use declarative::validators::{ExactlyOneOf, LengthAtLeast, OneOf, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{
    IdentityProvider, IdpRegistration, IdpVerification, OAuthClient, ProviderKind, SpSigning,
};
use pingone::{Client, ObjectRef, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const KIND_BLOCKS: &[&str] = &[
    "facebook",
    "google",
    "linkedin",
    "yahoo",
    "amazon",
    "twitter",
    "apple",
    "paypal",
    "microsoft",
    "github",
    "openid_connect",
    "saml",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OAuthClientModel {
    pub client_id: AttrValue<String>,
    pub client_secret: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FacebookModel {
    pub app_id: AttrValue<String>,
    pub app_secret: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwitterModel {
    pub consumer_key: AttrValue<String>,
    pub consumer_secret: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppleModel {
    pub client_id: AttrValue<String>,
    pub client_secret_signing_key: AttrValue<String>,
    pub key_id: AttrValue<String>,
    pub team_id: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PaypalModel {
    pub client_id: AttrValue<String>,
    pub client_secret: AttrValue<String>,
    pub client_environment: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenIdConnectModel {
    pub client_id: AttrValue<String>,
    pub client_secret: AttrValue<String>,
    pub authorization_endpoint: AttrValue<String>,
    pub token_endpoint: AttrValue<String>,
    pub userinfo_endpoint: AttrValue<String>,
    pub jwks_endpoint: AttrValue<String>,
    pub issuer: AttrValue<String>,
    pub scopes: AttrValue<BTreeSet<String>>,
    pub token_endpoint_auth_method: AttrValue<String>,
    pub discovery_endpoint: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamlModel {
    pub idp_entity_id: AttrValue<String>,
    pub sso_binding: AttrValue<String>,
    pub sso_endpoint: AttrValue<String>,
    pub authentication_request_signed: AttrValue<bool>,
    pub idp_verification_certificate_ids: AttrValue<BTreeSet<String>>,
    pub sp_signing_key_id: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IdentityProviderModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub enabled: AttrValue<bool>,
    pub registration_population_id: AttrValue<String>,
    pub facebook: AttrValue<FacebookModel>,
    pub google: AttrValue<OAuthClientModel>,
    pub linkedin: AttrValue<OAuthClientModel>,
    pub yahoo: AttrValue<OAuthClientModel>,
    pub amazon: AttrValue<OAuthClientModel>,
    pub twitter: AttrValue<TwitterModel>,
    pub apple: AttrValue<AppleModel>,
    pub paypal: AttrValue<PaypalModel>,
    pub microsoft: AttrValue<OAuthClientModel>,
    pub github: AttrValue<OAuthClientModel>,
    pub openid_connect: AttrValue<OpenIdConnectModel>,
    pub saml: AttrValue<SamlModel>,
}

/// A write-only field of the block in `from`, if that block is declared
fn kept<T>(from: &AttrValue<T>, field: impl Fn(&T) -> &AttrValue<String>) -> AttrValue<String> {
    from.known().map_or(AttrValue::Null, |block| field(block).clone())
}

fn oauth(block: &OAuthClientModel) -> OAuthClient {
    OAuthClient {
        client_id: block.client_id.known_or_default(),
        client_secret: block.client_secret.known().cloned(),
    }
}

fn oauth_model(client: OAuthClient, from: &AttrValue<OAuthClientModel>) -> AttrValue<OAuthClientModel> {
    AttrValue::Known(OAuthClientModel {
        client_id: AttrValue::Known(client.client_id),
        client_secret: kept(from, |b| &b.client_secret),
    })
}

impl IdentityProviderModel {
    /// Provider settings from the declared block
    fn kind(&self) -> Option<ProviderKind> {
        if let Some(b) = self.facebook.known() {
            return Some(ProviderKind::Facebook {
                app_id: b.app_id.known_or_default(),
                app_secret: b.app_secret.known().cloned(),
            });
        }
        let oauth_blocks: [(&AttrValue<OAuthClientModel>, fn(OAuthClient) -> ProviderKind); 6] = [
            (&self.google, ProviderKind::Google),
            (&self.linkedin, ProviderKind::Linkedin),
            (&self.yahoo, ProviderKind::Yahoo),
            (&self.amazon, ProviderKind::Amazon),
            (&self.microsoft, ProviderKind::Microsoft),
            (&self.github, ProviderKind::Github),
        ];
        for (block, variant) in oauth_blocks {
            if let Some(b) = block.known() {
                return Some(variant(oauth(b)));
            }
        }
        if let Some(b) = self.twitter.known() {
            return Some(ProviderKind::Twitter {
                consumer_key: b.consumer_key.known_or_default(),
                consumer_secret: b.consumer_secret.known().cloned(),
            });
        }
        if let Some(b) = self.apple.known() {
            return Some(ProviderKind::Apple {
                client_id: b.client_id.known_or_default(),
                client_secret_signing_key: b.client_secret_signing_key.known().cloned(),
                key_id: b.key_id.known_or_default(),
                team_id: b.team_id.known_or_default(),
            });
        }
        if let Some(b) = self.paypal.known() {
            return Some(ProviderKind::Paypal {
                client_id: b.client_id.known_or_default(),
                client_secret: b.client_secret.known().cloned(),
                client_environment: b.client_environment.known_or_default(),
            });
        }
        if let Some(b) = self.openid_connect.known() {
            return Some(ProviderKind::OpenidConnect {
                client_id: b.client_id.known_or_default(),
                client_secret: b.client_secret.known().cloned(),
                authorization_endpoint: b.authorization_endpoint.known_or_default(),
                token_endpoint: b.token_endpoint.known_or_default(),
                user_info_endpoint: b.userinfo_endpoint.known().cloned(),
                jwks_endpoint: b.jwks_endpoint.known_or_default(),
                issuer: b.issuer.known_or_default(),
                scopes: to_list(&b.scopes).unwrap_or_default(),
                token_endpoint_auth_method: b.token_endpoint_auth_method.known_or_default(),
                discovery_endpoint: b.discovery_endpoint.known().cloned(),
            });
        }
        if let Some(b) = self.saml.known() {
            return Some(ProviderKind::Saml {
                idp_entity_id: b.idp_entity_id.known_or_default(),
                sso_binding: b.sso_binding.known_or_default(),
                sso_endpoint: b.sso_endpoint.known_or_default(),
                authn_request_signed: b.authentication_request_signed.known_or(false),
                idp_verification: IdpVerification {
                    certificates: to_list(&b.idp_verification_certificate_ids)
                        .unwrap_or_default()
                        .into_iter()
                        .map(ObjectRef::new)
                        .collect(),
                },
                sp_signing: object_ref(&b.sp_signing_key_id).map(|key| SpSigning { key }),
            });
        }
        None
    }

    /// Replace the kind blocks with the one the API reports
    fn set_kind(&mut self, kind: ProviderKind) {
        let from = std::mem::take(self);
        *self = Self {
            id: from.id.clone(),
            environment_id: from.environment_id.clone(),
            name: from.name.clone(),
            description: from.description.clone(),
            enabled: from.enabled.clone(),
            registration_population_id: from.registration_population_id.clone(),
            ..Self::default()
        };
        match kind {
            ProviderKind::Facebook { app_id, .. } => {
                self.facebook = AttrValue::Known(FacebookModel {
                    app_id: AttrValue::Known(app_id),
                    app_secret: kept(&from.facebook, |b| &b.app_secret),
                });
            }
            ProviderKind::Google(c) => self.google = oauth_model(c, &from.google),
            ProviderKind::Linkedin(c) => self.linkedin = oauth_model(c, &from.linkedin),
            ProviderKind::Yahoo(c) => self.yahoo = oauth_model(c, &from.yahoo),
            ProviderKind::Amazon(c) => self.amazon = oauth_model(c, &from.amazon),
            ProviderKind::Microsoft(c) => self.microsoft = oauth_model(c, &from.microsoft),
            ProviderKind::Github(c) => self.github = oauth_model(c, &from.github),
            ProviderKind::Twitter { consumer_key, .. } => {
                self.twitter = AttrValue::Known(TwitterModel {
                    consumer_key: AttrValue::Known(consumer_key),
                    consumer_secret: kept(&from.twitter, |b| &b.consumer_secret),
                });
            }
            ProviderKind::Apple {
                client_id,
                key_id,
                team_id,
                ..
            } => {
                self.apple = AttrValue::Known(AppleModel {
                    client_id: AttrValue::Known(client_id),
                    client_secret_signing_key: kept(&from.apple, |b| &b.client_secret_signing_key),
                    key_id: AttrValue::Known(key_id),
                    team_id: AttrValue::Known(team_id),
                });
            }
            ProviderKind::Paypal {
                client_id,
                client_environment,
                ..
            } => {
                self.paypal = AttrValue::Known(PaypalModel {
                    client_id: AttrValue::Known(client_id),
                    client_secret: kept(&from.paypal, |b| &b.client_secret),
                    client_environment: AttrValue::Known(client_environment),
                });
            }
            ProviderKind::OpenidConnect {
                client_id,
                authorization_endpoint,
                token_endpoint,
                user_info_endpoint,
                jwks_endpoint,
                issuer,
                scopes,
                token_endpoint_auth_method,
                discovery_endpoint,
                ..
            } => {
                self.openid_connect = AttrValue::Known(OpenIdConnectModel {
                    client_id: AttrValue::Known(client_id),
                    client_secret: kept(&from.openid_connect, |b| &b.client_secret),
                    authorization_endpoint: AttrValue::Known(authorization_endpoint),
                    token_endpoint: AttrValue::Known(token_endpoint),
                    userinfo_endpoint: user_info_endpoint.into(),
                    jwks_endpoint: AttrValue::Known(jwks_endpoint),
                    issuer: AttrValue::Known(issuer),
                    scopes: string_set(Some(scopes)),
                    token_endpoint_auth_method: AttrValue::Known(token_endpoint_auth_method),
                    discovery_endpoint: discovery_endpoint.into(),
                });
            }
            ProviderKind::Saml {
                idp_entity_id,
                sso_binding,
                sso_endpoint,
                authn_request_signed,
                idp_verification,
                sp_signing,
            } => {
                self.saml = AttrValue::Known(SamlModel {
                    idp_entity_id: AttrValue::Known(idp_entity_id),
                    sso_binding: AttrValue::Known(sso_binding),
                    sso_endpoint: AttrValue::Known(sso_endpoint),
                    authentication_request_signed: AttrValue::Known(authn_request_signed),
                    idp_verification_certificate_ids: string_set(Some(
                        idp_verification.certificates.into_iter().map(|c| c.id).collect(),
                    )),
                    sp_signing_key_id: ref_id(sp_signing.as_ref().map(|s| &s.key)),
                });
            }
        }
    }
}

pub struct IdentityProviderReconciler {
    client: Arc<Client>,
}

impl IdentityProviderReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &IdentityProviderModel, kind: ProviderKind) -> IdentityProvider {
        IdentityProvider {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            enabled: plan.enabled.known_or(false),
            registration: object_ref(&plan.registration_population_id)
                .map(|population| IdpRegistration { population: Some(population) }),
            kind,
        }
    }

    fn project(idp: IdentityProvider, mut model: IdentityProviderModel) -> IdentityProviderModel {
        model.id = idp.id.into();
        model.name = AttrValue::Known(idp.name);
        model.description = idp.description.into();
        model.enabled = AttrValue::Known(idp.enabled);
        model.registration_population_id =
            ref_id(idp.registration.as_ref().and_then(|r| r.population.as_ref()));
        model.set_kind(idp.kind);
        model
    }

    fn declared_kind(plan: &IdentityProviderModel, diags: &mut Diagnostics) -> Option<ProviderKind> {
        let kind = plan.kind();
        if kind.is_none() {
            diags.error(
                "Missing provider settings",
                format!("One of the blocks {} must be declared.", KIND_BLOCKS.join(", ")),
            );
        }
        kind
    }
}

fn oauth_block(description: &'static str) -> Schema {
    Schema::new(description)
        .attribute(Attribute::string("client_id").required().validate(LengthAtLeast(1)))
        .attribute(Attribute::string("client_secret").required().sensitive().validate(LengthAtLeast(1)))
}

impl Reconciler for IdentityProviderReconciler {
    type Model = IdentityProviderModel;

    fn type_name(&self) -> &'static str {
        "pingone_identity_provider"
    }

    fn schema(&self) -> Schema {
        let facebook = Schema::new("Facebook login.")
            .attribute(Attribute::string("app_id").required())
            .attribute(Attribute::string("app_secret").required().sensitive());
        let twitter = Schema::new("Twitter login.")
            .attribute(Attribute::string("consumer_key").required())
            .attribute(Attribute::string("consumer_secret").required().sensitive());
        let apple = Schema::new("Sign in with Apple.")
            .attribute(Attribute::string("client_id").required())
            .attribute(Attribute::string("client_secret_signing_key").required().sensitive())
            .attribute(Attribute::string("key_id").required())
            .attribute(Attribute::string("team_id").required());
        let paypal = Schema::new("PayPal login.")
            .attribute(Attribute::string("client_id").required())
            .attribute(Attribute::string("client_secret").required().sensitive())
            .attribute(
                Attribute::string("client_environment")
                    .required()
                    .validate(OneOf(&["sandbox", "live"])),
            );
        let openid_connect = Schema::new("A generic OpenID Connect provider.")
            .attribute(Attribute::string("client_id").required())
            .attribute(Attribute::string("client_secret").required().sensitive())
            .attribute(Attribute::string("authorization_endpoint").required())
            .attribute(Attribute::string("token_endpoint").required())
            .attribute(Attribute::string("userinfo_endpoint").optional())
            .attribute(Attribute::string("jwks_endpoint").required())
            .attribute(Attribute::string("issuer").required())
            .attribute(Attribute::string_set("scopes").required())
            .attribute(
                Attribute::string("token_endpoint_auth_method")
                    .required()
                    .validate(OneOf(&["CLIENT_SECRET_BASIC", "CLIENT_SECRET_POST", "NONE"])),
            )
            .attribute(Attribute::string("discovery_endpoint").optional());
        let saml = Schema::new("A generic SAML identity provider.")
            .attribute(Attribute::string("idp_entity_id").required())
            .attribute(
                Attribute::string("sso_binding")
                    .required()
                    .validate(OneOf(&["HTTP_POST", "HTTP_REDIRECT"])),
            )
            .attribute(Attribute::string("sso_endpoint").required())
            .attribute(Attribute::bool("authentication_request_signed").optional_computed())
            .attribute(
                Attribute::string_set("idp_verification_certificate_ids")
                    .required()
                    .validate(UuidShape),
            )
            .attribute(Attribute::string("sp_signing_key_id").optional().validate(UuidShape));

        Schema::new("Manages an external identity provider.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(Attribute::bool("enabled").optional_computed())
            .attribute(
                Attribute::string("registration_population_id")
                    .optional()
                    .validate(UuidShape)
                    .describe("Population new users signing in through this provider are registered into."),
            )
            .attribute(Attribute::block("facebook", facebook).optional().validate(ExactlyOneOf(KIND_BLOCKS)))
            .attribute(Attribute::block("google", oauth_block("Google login.")).optional())
            .attribute(Attribute::block("linkedin", oauth_block("LinkedIn login.")).optional())
            .attribute(Attribute::block("yahoo", oauth_block("Yahoo login.")).optional())
            .attribute(Attribute::block("amazon", oauth_block("Login with Amazon.")).optional())
            .attribute(Attribute::block("twitter", twitter).optional())
            .attribute(Attribute::block("apple", apple).optional())
            .attribute(Attribute::block("paypal", paypal).optional())
            .attribute(Attribute::block("microsoft", oauth_block("Microsoft login.")).optional())
            .attribute(Attribute::block("github", oauth_block("GitHub login.")).optional())
            .attribute(Attribute::block("openid_connect", openid_connect).optional())
            .attribute(Attribute::block("saml", saml).optional())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("identity_provider_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let kind = Self::declared_kind(&plan, diags)?;
        let body = Self::expand(&plan, kind);
        let created: IdentityProvider = api
            .invoke("CreateIdentityProvider", env, NotFound::Error, diags, |c| {
                c.create(&paths::identity_providers(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateIdentityProvider", "identity provider ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let idp: IdentityProvider = api
            .invoke("ReadOneIdentityProvider", env, NotFound::Warn, diags, |c| {
                c.get(&paths::identity_provider(env, id))
            })
            .found()?;
        Some(Self::project(idp, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: IdentityProviderModel,
        prior: IdentityProviderModel,
        diags: &mut Diagnostics,
    ) -> Option<IdentityProviderModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let kind = Self::declared_kind(&plan, diags)?;
        if let Some(previous) = prior.kind()
            && previous.type_name() != kind.type_name()
        {
            diags.error(
                "Identity provider type cannot change",
                format!(
                    "Identity provider {id} is of type {}; replace it to switch to {}.",
                    previous.type_name(),
                    kind.type_name()
                ),
            );
            return None;
        }

        let body = Self::expand(&plan, kind);
        let updated: IdentityProvider = api
            .invoke(
                "UpdateIdentityProvider",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::identity_provider(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: IdentityProviderModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeleteIdentityProvider", env, &paths::identity_provider(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use serde_json::json;

    fn google(fx: &Fixture) -> IdentityProviderModel {
        IdentityProviderModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Google".into()),
            enabled: AttrValue::Known(true),
            google: AttrValue::Known(OAuthClientModel {
                client_id: AttrValue::Known("client-123".into()),
                client_secret: AttrValue::Known("s3cr3t".into()),
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_secret_is_carried_from_state() {
        let fx = Fixture::new();
        let r = IdentityProviderReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, google(&fx), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");

        // the service never echoes secrets
        let path = paths::identity_provider(&fx.env, created.id.as_str().unwrap());
        let mut stored = fx.mock.get(&path).unwrap();
        stored.as_object_mut().unwrap().remove("clientSecret");
        fx.mock.set(&path, Some(stored));

        let read = r.read(&ctx, created.clone(), &mut diags).unwrap();
        assert_eq!(read, created);
        let block = read.google.known().unwrap();
        assert_eq!(block.client_secret.as_str(), Some("s3cr3t"));
    }

    #[test]
    fn test_generic_oidc_round_trip() {
        let fx = Fixture::new();
        let r = IdentityProviderReconciler::new(fx.client.clone());
        let population = fx.population("Partners");
        let (ctx, mut diags) = fx.call();

        let plan = IdentityProviderModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Partner SSO".into()),
            registration_population_id: AttrValue::Known(population),
            openid_connect: AttrValue::Known(OpenIdConnectModel {
                client_id: AttrValue::Known("partner".into()),
                client_secret: AttrValue::Known("shh".into()),
                authorization_endpoint: AttrValue::Known("https://idp.example.com/authorize".into()),
                token_endpoint: AttrValue::Known("https://idp.example.com/token".into()),
                jwks_endpoint: AttrValue::Known("https://idp.example.com/jwks".into()),
                issuer: AttrValue::Known("https://idp.example.com".into()),
                scopes: AttrValue::Known(["openid".to_string(), "profile".to_string()].into()),
                token_endpoint_auth_method: AttrValue::Known("CLIENT_SECRET_POST".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert!(created.google.is_null());
        assert_eq!(created.enabled, AttrValue::Known(false));
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);
        assert_eq!(r.update(&ctx, created.clone(), created.clone(), &mut diags).unwrap(), created);
    }

    #[test]
    fn test_exactly_one_kind_block() {
        let fx = Fixture::new();
        let r = erase(IdentityProviderReconciler::new(fx.client.clone()));
        let (ctx, mut diags) = fx.call();

        let both = json!({
            "environment_id": fx.env,
            "name": "Social",
            "google": {"client_id": "g", "client_secret": "s"},
            "github": {"client_id": "h", "client_secret": "s"},
        });
        assert!(r.create(&ctx, &both, &mut diags).is_none());
        assert!(diags.mentions("2 attributes specified"));
        assert!(fx.mock.requests().is_empty());
    }

    #[test]
    fn test_type_change_is_rejected() {
        let fx = Fixture::new();
        let r = IdentityProviderReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, google(&fx), &mut diags).unwrap();
        let mut github = created.clone();
        github.github = github.google.clone();
        github.google = AttrValue::Null;
        assert!(r.update(&ctx, github, created, &mut diags).is_none());
        assert!(diags.mentions("replace it to switch to GITHUB"));
    }

    #[test]
    fn test_import_leaves_secret_unset() {
        let fx = Fixture::new();
        let r = erase(IdentityProviderReconciler::new(fx.client.clone()));
        let id = fx.mock.insert(
            &paths::identity_providers(&fx.env),
            json!({"name": "Sandbox PayPal", "enabled": true, "type": "PAYPAL", "clientId": "pp", "clientEnvironment": "sandbox"}),
        );
        let (ctx, mut diags) = fx.call();

        let imported = r.import_state(&ctx, &format!("{}/{id}", fx.env), &mut diags).unwrap();
        assert_eq!(imported["paypal"]["client_environment"], "sandbox");
        assert!(imported["paypal"]["client_secret"].is_null());
        assert!(imported["google"].is_null());
    }
}
