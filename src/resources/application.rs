//! `pingone_application`: administrator-defined applications.
//!
//! An application is one of three protocol variants, each with its own
//! options block. Exactly one block is declared; the protocol cannot change
//! in place. Built-in applications are adopted through
//! `pingone_system_application` instead.

use super::{environment_id, known, string_set, to_list};
use crate::api::{Api, NotFound, require};
use declarative::validators::{ExactlyOneOf, IntAtLeast, LengthAtLeast, OneOf};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{Application, PROTOCOL_EXTERNAL_LINK, PROTOCOL_OIDC, PROTOCOL_SAML};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

const OPTION_BLOCKS: &[&str] = &["oidc_options", "saml_options", "external_link_options"];

const OIDC_TYPES: &[&str] = &["WEB_APP", "NATIVE_APP", "SINGLE_PAGE_APP", "WORKER", "CUSTOM_APP"];
const GRANT_TYPES: &[&str] = &[
    "AUTHORIZATION_CODE",
    "IMPLICIT",
    "REFRESH_TOKEN",
    "CLIENT_CREDENTIALS",
    "DEVICE_CODE",
];
const RESPONSE_TYPES: &[&str] = &["CODE", "TOKEN", "ID_TOKEN"];
const AUTH_METHODS: &[&str] = &["NONE", "CLIENT_SECRET_BASIC", "CLIENT_SECRET_POST"];
const PKCE: &[&str] = &["OPTIONAL", "REQUIRED", "S256_REQUIRED"];

const SAML_DEFAULT_TYPE: &str = "WEB_APP";
const EXTERNAL_LINK_TYPE: &str = "PORTAL_LINK_APP";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OidcOptionsModel {
    #[serde(rename = "type")]
    pub application_type: AttrValue<String>,
    pub grant_types: AttrValue<BTreeSet<String>>,
    pub response_types: AttrValue<BTreeSet<String>>,
    pub redirect_uris: AttrValue<BTreeSet<String>>,
    pub post_logout_redirect_uris: AttrValue<BTreeSet<String>>,
    pub token_endpoint_auth_method: AttrValue<String>,
    pub pkce_enforcement: AttrValue<String>,
    pub home_page_url: AttrValue<String>,
    pub login_page_url: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamlOptionsModel {
    #[serde(rename = "type")]
    pub application_type: AttrValue<String>,
    pub acs_urls: AttrValue<BTreeSet<String>>,
    pub sp_entity_id: AttrValue<String>,
    pub assertion_duration: AttrValue<i64>,
    pub slo_endpoint: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExternalLinkOptionsModel {
    pub home_page_url: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub enabled: AttrValue<bool>,
    pub oidc_options: AttrValue<OidcOptionsModel>,
    pub saml_options: AttrValue<SamlOptionsModel>,
    pub external_link_options: AttrValue<ExternalLinkOptionsModel>,
}

impl ApplicationModel {
    /// Protocol of the declared options block
    fn protocol(&self) -> Option<&'static str> {
        if self.oidc_options.is_known() {
            Some(PROTOCOL_OIDC)
        } else if self.saml_options.is_known() {
            Some(PROTOCOL_SAML)
        } else if self.external_link_options.is_known() {
            Some(PROTOCOL_EXTERNAL_LINK)
        } else {
            None
        }
    }
}

pub struct ApplicationReconciler {
    client: Arc<Client>,
}

impl ApplicationReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    /// Constraints between fields of one variant that the schema cannot express
    fn check_variant(plan: &ApplicationModel, diags: &mut Diagnostics) {
        if let Some(oidc) = plan.oidc_options.known() {
            let grants = oidc.grant_types.known();
            match oidc.application_type.as_str() {
                Some("WORKER") if !grants.is_some_and(|g| g.contains("CLIENT_CREDENTIALS")) => {
                    diags.attribute_error(
                        "oidc_options.grant_types",
                        "Invalid grant types",
                        "WORKER applications must include the CLIENT_CREDENTIALS grant type.",
                    );
                }
                Some("SINGLE_PAGE_APP")
                    if oidc
                        .token_endpoint_auth_method
                        .as_str()
                        .is_some_and(|m| m != "NONE") =>
                {
                    diags.attribute_error(
                        "oidc_options.token_endpoint_auth_method",
                        "Invalid token endpoint authentication method",
                        "SINGLE_PAGE_APP applications cannot hold a secret; the method must be NONE.",
                    );
                }
                _ => {}
            }
            if grants.is_some_and(BTreeSet::is_empty) {
                diags.attribute_error(
                    "oidc_options.grant_types",
                    "Invalid grant types",
                    "At least one grant type is required.",
                );
            }
        }
        if let Some(saml) = plan.saml_options.known()
            && saml.acs_urls.known().is_some_and(BTreeSet::is_empty)
        {
            diags.attribute_error(
                "saml_options.acs_urls",
                "Invalid ACS URLs",
                "SAML applications need at least one assertion consumer service URL.",
            );
        }
    }

    fn expand(plan: &ApplicationModel) -> Application {
        let mut app = Application {
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            enabled: plan.enabled.known_or(false),
            ..Default::default()
        };
        if let Some(oidc) = plan.oidc_options.known() {
            app.protocol = PROTOCOL_OIDC.into();
            app.application_type = oidc.application_type.known_or_default();
            app.grant_types = to_list(&oidc.grant_types);
            app.response_types = to_list(&oidc.response_types);
            app.redirect_uris = to_list(&oidc.redirect_uris);
            app.post_logout_redirect_uris = to_list(&oidc.post_logout_redirect_uris);
            app.token_endpoint_auth_method = oidc.token_endpoint_auth_method.known().cloned();
            app.pkce_enforcement = oidc.pkce_enforcement.known().cloned();
            app.home_page_url = oidc.home_page_url.known().cloned();
            app.login_page_url = oidc.login_page_url.known().cloned();
        } else if let Some(saml) = plan.saml_options.known() {
            app.protocol = PROTOCOL_SAML.into();
            app.application_type = saml.application_type.known_or(SAML_DEFAULT_TYPE.into());
            app.acs_urls = to_list(&saml.acs_urls);
            app.sp_entity_id = saml.sp_entity_id.known().cloned();
            app.assertion_duration = saml.assertion_duration.known().copied();
            app.slo_endpoint = saml.slo_endpoint.known().cloned();
        } else if let Some(link) = plan.external_link_options.known() {
            app.protocol = PROTOCOL_EXTERNAL_LINK.into();
            app.application_type = EXTERNAL_LINK_TYPE.into();
            app.home_page_url = link.home_page_url.known().cloned();
        }
        app
    }

    fn project(app: Application, mut model: ApplicationModel) -> ApplicationModel {
        model.id = app.id.into();
        model.name = AttrValue::Known(app.name);
        model.description = app.description.into();
        model.enabled = AttrValue::Known(app.enabled);
        model.oidc_options = AttrValue::Null;
        model.saml_options = AttrValue::Null;
        model.external_link_options = AttrValue::Null;

        match app.protocol.as_str() {
            PROTOCOL_OIDC => {
                model.oidc_options = AttrValue::Known(OidcOptionsModel {
                    application_type: AttrValue::Known(app.application_type),
                    grant_types: string_set(app.grant_types),
                    response_types: string_set(app.response_types),
                    redirect_uris: string_set(app.redirect_uris),
                    post_logout_redirect_uris: string_set(app.post_logout_redirect_uris),
                    token_endpoint_auth_method: app.token_endpoint_auth_method.into(),
                    pkce_enforcement: app.pkce_enforcement.into(),
                    home_page_url: app.home_page_url.into(),
                    login_page_url: app.login_page_url.into(),
                });
            }
            PROTOCOL_SAML => {
                model.saml_options = AttrValue::Known(SamlOptionsModel {
                    application_type: AttrValue::Known(app.application_type),
                    acs_urls: string_set(app.acs_urls),
                    sp_entity_id: app.sp_entity_id.into(),
                    assertion_duration: app.assertion_duration.into(),
                    slo_endpoint: app.slo_endpoint.into(),
                });
            }
            PROTOCOL_EXTERNAL_LINK => {
                model.external_link_options = AttrValue::Known(ExternalLinkOptionsModel {
                    home_page_url: app.home_page_url.into(),
                });
            }
            other => log::warn!("Application {:?} has unsupported protocol {other}", model.id),
        }
        model
    }
}

impl Reconciler for ApplicationReconciler {
    type Model = ApplicationModel;

    fn type_name(&self) -> &'static str {
        "pingone_application"
    }

    fn schema(&self) -> Schema {
        let oidc = Schema::new("OpenID Connect settings.")
            .attribute(Attribute::string("type").required().validate(OneOf(OIDC_TYPES)))
            .attribute(Attribute::string_set("grant_types").required().validate(OneOf(GRANT_TYPES)))
            .attribute(Attribute::string_set("response_types").optional().validate(OneOf(RESPONSE_TYPES)))
            .attribute(Attribute::string_set("redirect_uris").optional())
            .attribute(Attribute::string_set("post_logout_redirect_uris").optional())
            .attribute(
                Attribute::string("token_endpoint_auth_method")
                    .required()
                    .validate(OneOf(AUTH_METHODS)),
            )
            .attribute(Attribute::string("pkce_enforcement").optional().validate(OneOf(PKCE)))
            .attribute(Attribute::string("home_page_url").optional())
            .attribute(Attribute::string("login_page_url").optional());

        let saml = Schema::new("SAML service provider settings.")
            .attribute(Attribute::string("type").optional_computed())
            .attribute(Attribute::string_set("acs_urls").required())
            .attribute(Attribute::string("sp_entity_id").required().validate(LengthAtLeast(1)))
            .attribute(
                Attribute::int("assertion_duration")
                    .required()
                    .validate(IntAtLeast(1))
                    .describe("Assertion lifetime in seconds."),
            )
            .attribute(Attribute::string("slo_endpoint").optional());

        let external_link = Schema::new("A link shown in the application portal.")
            .attribute(Attribute::string("home_page_url").required().validate(LengthAtLeast(1)));

        Schema::new("Manages an OpenID Connect, SAML or external link application.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(Attribute::bool("enabled").optional_computed())
            .attribute(Attribute::block("oidc_options", oidc).optional().validate(ExactlyOneOf(OPTION_BLOCKS)))
            .attribute(Attribute::block("saml_options", saml).optional())
            .attribute(Attribute::block("external_link_options", external_link).optional())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("application_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        Self::check_variant(&plan, diags);
        if diags.has_error() {
            return None;
        }

        let body = Self::expand(&plan);
        let created: Application = api
            .invoke("CreateApplication", env, NotFound::Error, diags, |c| {
                c.create(&paths::applications(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateApplication", "application ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let app: Application = api
            .invoke("ReadOneApplication", env, NotFound::Warn, diags, |c| {
                c.get(&paths::application(env, id))
            })
            .found()?;
        Some(Self::project(app, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationModel,
        prior: ApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        if prior.protocol().is_some() && plan.protocol() != prior.protocol() {
            diags.error(
                "Application protocol cannot change",
                format!(
                    "Application {id} is {}; replace it to switch protocol.",
                    prior.protocol().unwrap_or_default()
                ),
            );
            return None;
        }
        Self::check_variant(&plan, diags);
        if diags.has_error() {
            return None;
        }

        // settings outside the modelled fields survive the write
        let current: Application = api
            .invoke(
                "ReadOneApplication",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.get(&paths::application(env, id)),
            )
            .found()?;
        let mut body = Self::expand(&plan);
        body.extra = current.extra;

        let updated: Application = api
            .invoke(
                "UpdateApplication",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::application(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ApplicationModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeleteApplication", env, &paths::application(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use pingone::Method;
    use serde_json::json;

    fn set(items: &[&str]) -> AttrValue<BTreeSet<String>> {
        AttrValue::Known(items.iter().map(|s| (*s).to_string()).collect())
    }

    fn oidc_plan(fx: &Fixture, application_type: &str, grants: &[&str]) -> ApplicationModel {
        ApplicationModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Storefront".into()),
            enabled: AttrValue::Known(true),
            oidc_options: AttrValue::Known(OidcOptionsModel {
                application_type: AttrValue::Known(application_type.into()),
                grant_types: set(grants),
                response_types: set(&["CODE"]),
                redirect_uris: set(&["https://shop.example.com/callback"]),
                token_endpoint_auth_method: AttrValue::Known("CLIENT_SECRET_BASIC".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_oidc_round_trip() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r
            .create(&ctx, oidc_plan(&fx, "WEB_APP", &["AUTHORIZATION_CODE"]), &mut diags)
            .unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert!(created.saml_options.is_null());
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);

        let updated = r.update(&ctx, created.clone(), created.clone(), &mut diags).unwrap();
        assert_eq!(updated, created);
    }

    #[test]
    fn test_worker_needs_client_credentials() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, oidc_plan(&fx, "WORKER", &["AUTHORIZATION_CODE"]), &mut diags).is_none());
        assert!(diags.mentions("CLIENT_CREDENTIALS"));
        assert_eq!(fx.mock.mutations(), 0);
    }

    #[test]
    fn test_single_page_app_cannot_hold_secret() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let plan = oidc_plan(&fx, "SINGLE_PAGE_APP", &["AUTHORIZATION_CODE"]);
        assert!(r.create(&ctx, plan, &mut diags).is_none());
        assert_eq!(
            diags.errors().next().unwrap().attribute.as_deref(),
            Some("oidc_options.token_endpoint_auth_method")
        );
    }

    #[test]
    fn test_exactly_one_options_block() {
        let fx = Fixture::new();
        let r = erase(ApplicationReconciler::new(fx.client.clone()));
        let (ctx, mut diags) = fx.call();

        let config = json!({
            "environment_id": fx.env,
            "name": "Both",
            "external_link_options": {"home_page_url": "https://example.com"},
            "saml_options": {"acs_urls": ["https://sp/acs"], "sp_entity_id": "sp", "assertion_duration": 60},
        });
        assert!(r.create(&ctx, &config, &mut diags).is_none());
        assert!(diags.mentions("2 attributes specified"));

        let mut none = Diagnostics::new();
        assert!(r.create(&ctx, &json!({"environment_id": fx.env, "name": "None"}), &mut none).is_none());
        assert!(none.mentions("No attribute specified"));
        assert_eq!(fx.mock.count(Method::Post, "/environments"), 0);
    }

    #[test]
    fn test_saml_defaults_type_and_rejects_empty_acs() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let mut plan = ApplicationModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Payroll".into()),
            saml_options: AttrValue::Known(SamlOptionsModel {
                acs_urls: set(&[]),
                sp_entity_id: AttrValue::Known("payroll".into()),
                assertion_duration: AttrValue::Known(3600),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert!(r.create(&ctx, plan.clone(), &mut diags).is_none());
        assert!(diags.mentions("assertion consumer service"));

        if let AttrValue::Known(saml) = &mut plan.saml_options {
            saml.acs_urls = set(&["https://payroll.example.com/acs"]);
        }
        let mut diags = Diagnostics::new();
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        let saml = created.saml_options.known().unwrap();
        assert_eq!(saml.application_type.as_str(), Some("WEB_APP"));
        assert_eq!(created.enabled, AttrValue::Known(false));
    }

    #[test]
    fn test_update_keeps_unmodelled_settings() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r
            .create(&ctx, oidc_plan(&fx, "WEB_APP", &["AUTHORIZATION_CODE"]), &mut diags)
            .unwrap();
        let path = paths::application(&fx.env, created.id.as_str().unwrap());
        let mut stored = fx.mock.get(&path).unwrap();
        stored["icon"] = json!({"id": "icon-1"});
        fx.mock.set(&path, Some(stored));

        let mut renamed = created.clone();
        renamed.name = AttrValue::Known("Storefront v2".into());
        let updated = r.update(&ctx, renamed, created, &mut diags).unwrap();
        assert_eq!(updated.name.as_str(), Some("Storefront v2"));
        assert_eq!(fx.mock.get(&path).unwrap()["icon"], json!({"id": "icon-1"}));
    }

    #[test]
    fn test_protocol_change_is_rejected() {
        let fx = Fixture::new();
        let r = ApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r
            .create(&ctx, oidc_plan(&fx, "WEB_APP", &["AUTHORIZATION_CODE"]), &mut diags)
            .unwrap();
        let mut link = created.clone();
        link.oidc_options = AttrValue::Null;
        link.external_link_options = AttrValue::Known(ExternalLinkOptionsModel {
            home_page_url: AttrValue::Known("https://example.com".into()),
        });
        assert!(r.update(&ctx, link, created, &mut diags).is_none());
        assert!(diags.mentions("replace it"));
    }
}
