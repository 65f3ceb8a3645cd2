//! Attribute mappings of OpenID Connect and SAML applications.
//!
//! Every such application has one core mapping (`sub` or `saml_subject`)
//! created with it. `pingone_application_core_attribute_mapping` takes that
//! mapping over; `pingone_application_attribute_mapping` manages additional
//! custom mappings and refuses the names the variant reserves.

use super::{environment_id, known, parent_id};
use crate::api::{Api, NotFound, require};
use crate::lookup::fetch_application;
use crate::validators::AttributeExpression;
use declarative::validators::{LengthAtLeast, OneOf};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{ApplicationAttributeMapping, ApplicationKind, MappingType};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const CORE_NAMES: &[&str] = &["sub", "saml_subject"];

/// Expression the core mapping is reset to on destroy
const CORE_DEFAULT_VALUE: &str = "${user.id}";

/// Claims the token service sets itself on OpenID Connect applications
const RESERVED_OIDC: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "client_id", "env", "exp", "iat", "iss",
    "jti", "nbf", "nonce", "org", "scope", "sid",
];

fn mapping_type_name(mapping_type: MappingType) -> &'static str {
    match mapping_type {
        MappingType::Core => "CORE",
        MappingType::Custom => "CUSTOM",
    }
}

/// Application kind, for mapping rules; only OIDC and SAML apps take mappings
fn mappable_kind(
    api: &Api<'_>,
    env: &str,
    application_id: &str,
    diags: &mut Diagnostics,
) -> Option<ApplicationKind> {
    let application = fetch_application(api, env, application_id, false, diags)?;
    let kind = application.kind();
    if kind.core_attribute_name().is_none() {
        diags.attribute_error(
            "application_id",
            "Invalid application type",
            format!("Application {application_id} is an {kind} application, which has no attribute mappings."),
        );
        return None;
    }
    Some(kind)
}

fn put_mapping(
    api: &Api<'_>,
    env: &str,
    application_id: &str,
    id: &str,
    body: &ApplicationAttributeMapping,
    not_found: NotFound,
    diags: &mut Diagnostics,
) -> Option<ApplicationAttributeMapping> {
    api.invoke("UpdateApplicationAttributeMapping", env, not_found, diags, |c| {
        c.update(&paths::application_attribute(env, application_id, id), body)
    })
    .found()
}

fn get_mapping(
    api: &Api<'_>,
    env: &str,
    application_id: &str,
    id: &str,
    diags: &mut Diagnostics,
) -> Option<ApplicationAttributeMapping> {
    api.invoke("ReadOneApplicationAttributeMapping", env, NotFound::Warn, diags, |c| {
        c.get(&paths::application_attribute(env, application_id, id))
    })
    .found()
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationAttributeMappingModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub application_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub value: AttrValue<String>,
    pub required: AttrValue<bool>,
    pub mapping_type: AttrValue<String>,
}

pub struct ApplicationAttributeMappingReconciler {
    client: Arc<Client>,
}

impl ApplicationAttributeMappingReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &ApplicationAttributeMappingModel) -> ApplicationAttributeMapping {
        ApplicationAttributeMapping {
            name: plan.name.known_or_default(),
            value: plan.value.known_or_default(),
            required: plan.required.known_or(false),
            mapping_type: Some(MappingType::Custom),
            ..Default::default()
        }
    }

    fn project(
        mapping: ApplicationAttributeMapping,
        mut model: ApplicationAttributeMappingModel,
    ) -> ApplicationAttributeMappingModel {
        model.id = mapping.id.into();
        model.name = AttrValue::Known(mapping.name);
        model.value = AttrValue::Known(mapping.value);
        model.required = AttrValue::Known(mapping.required);
        model.mapping_type = mapping.mapping_type.map(|t| mapping_type_name(t).to_string()).into();
        model
    }

    fn check_name(kind: ApplicationKind, name: &str, diags: &mut Diagnostics) -> Option<()> {
        if CORE_NAMES.contains(&name) {
            diags.attribute_error(
                "name",
                "Invalid attribute name",
                format!("\"{name}\" is a core attribute; manage it with pingone_application_core_attribute_mapping."),
            );
            return None;
        }
        if kind != ApplicationKind::Saml && RESERVED_OIDC.contains(&name) {
            diags.attribute_error(
                "name",
                "Invalid attribute name",
                format!("\"{name}\" is a reserved claim of {kind} applications."),
            );
            return None;
        }
        Some(())
    }
}

impl Reconciler for ApplicationAttributeMappingReconciler {
    type Model = ApplicationAttributeMappingModel;

    fn type_name(&self) -> &'static str {
        "pingone_application_attribute_mapping"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a custom attribute mapping of an OpenID Connect or SAML application.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("application_id", "The ID of the application."))
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("value").required().validate(AttributeExpression))
            .attribute(Attribute::bool("required").optional_computed())
            .attribute(Attribute::string("mapping_type").computed())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("application_id", "application_attribute_mapping_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationAttributeMappingModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let name = known(&plan.name, "name", diags)?;
        let kind = mappable_kind(&api, env, application_id, diags)?;
        Self::check_name(kind, name, diags)?;

        let body = Self::expand(&plan);
        let created: ApplicationAttributeMapping = api
            .invoke("CreateApplicationAttributeMapping", env, NotFound::Error, diags, |c| {
                c.create(&paths::application_attributes(env, application_id), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateApplicationAttributeMapping", "mapping ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ApplicationAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationAttributeMappingModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let application_id = known(&state.application_id, "application_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let mapping = get_mapping(&api, env, application_id, id, diags)?;
        Some(Self::project(mapping, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationAttributeMappingModel,
        prior: ApplicationAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationAttributeMappingModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let name = known(&plan.name, "name", diags)?;
        let kind = mappable_kind(&api, env, application_id, diags)?;
        Self::check_name(kind, name, diags)?;

        let body = Self::expand(&plan);
        let mapping = put_mapping(
            &api,
            env,
            application_id,
            id,
            &body,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
        )?;
        Some(Self::project(mapping, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ApplicationAttributeMappingModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(application_id), Some(id)) = (
            state.environment_id.as_str(),
            state.application_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        api.delete(
            "DeleteApplicationAttributeMapping",
            env,
            &paths::application_attribute(env, application_id, id),
            diags,
        );
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationCoreAttributeMappingModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub application_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub value: AttrValue<String>,
    pub required: AttrValue<bool>,
    pub saml_subject_nameformat: AttrValue<String>,
}

pub struct ApplicationCoreAttributeMappingReconciler {
    client: Arc<Client>,
}

impl ApplicationCoreAttributeMappingReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &ApplicationCoreAttributeMappingModel) -> ApplicationAttributeMapping {
        ApplicationAttributeMapping {
            name: plan.name.known_or_default(),
            value: plan.value.known_or_default(),
            required: true,
            mapping_type: Some(MappingType::Core),
            name_format: plan.saml_subject_nameformat.known().cloned(),
            ..Default::default()
        }
    }

    fn project(
        mapping: ApplicationAttributeMapping,
        mut model: ApplicationCoreAttributeMappingModel,
    ) -> ApplicationCoreAttributeMappingModel {
        model.id = mapping.id.into();
        model.name = AttrValue::Known(mapping.name);
        model.value = AttrValue::Known(mapping.value);
        model.required = AttrValue::Known(mapping.required);
        model.saml_subject_nameformat = mapping.name_format.into();
        model
    }

    /// The name must be the core attribute of this application's variant
    fn check_variant(
        kind: ApplicationKind,
        application_id: &str,
        plan: &ApplicationCoreAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<()> {
        let name = plan.name.known_or_default();
        let core = kind.core_attribute_name().unwrap_or_default();
        let mut valid = true;
        if name != core {
            valid = false;
            diags.attribute_error(
                "name",
                "Invalid parameter value - Not a core attribute",
                format!(
                    "\"{name}\" is not the core attribute of {kind} application {application_id}; its core attribute is \"{core}\"."
                ),
            );
        }
        if kind != ApplicationKind::Saml && plan.saml_subject_nameformat.is_known() {
            valid = false;
            diags.attribute_error(
                "saml_subject_nameformat",
                "Invalid attribute combination",
                format!("saml_subject_nameformat only applies to SAML applications; {application_id} is {kind}."),
            );
        }
        valid.then_some(())
    }

    fn core_mapping_id(
        api: &Api<'_>,
        env: &str,
        application_id: &str,
        diags: &mut Diagnostics,
    ) -> Option<String> {
        let mappings: Vec<ApplicationAttributeMapping> = api
            .invoke("ReadAllApplicationAttributeMappings", env, NotFound::Error, diags, |c| {
                c.list(&paths::application_attributes(env, application_id))
            })
            .found()?;
        let id = mappings
            .into_iter()
            .find(|m| m.mapping_type == Some(MappingType::Core))
            .and_then(|m| m.id);
        require(id, "ReadAllApplicationAttributeMappings", "core attribute mapping", diags)
    }

    fn apply(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationCoreAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationCoreAttributeMappingModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let kind = mappable_kind(&api, env, application_id, diags)?;
        Self::check_variant(kind, application_id, &plan, diags)?;

        let id = match plan.id.non_empty() {
            Some(id) => id.to_string(),
            None => Self::core_mapping_id(&api, env, application_id, diags)?,
        };
        let body = Self::expand(&plan);
        let mapping = put_mapping(
            &api,
            env,
            application_id,
            &id,
            &body,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
        )?;
        Some(Self::project(mapping, plan))
    }
}

impl Reconciler for ApplicationCoreAttributeMappingReconciler {
    type Model = ApplicationCoreAttributeMappingModel;

    fn type_name(&self) -> &'static str {
        "pingone_application_core_attribute_mapping"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages the core attribute mapping of an OpenID Connect or SAML application.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("application_id", "The ID of the application."))
            .attribute(
                Attribute::string("name")
                    .required()
                    .force_new()
                    .validate(OneOf(CORE_NAMES))
                    .describe("sub for OpenID Connect applications, saml_subject for SAML."),
            )
            .attribute(Attribute::string("value").required().validate(AttributeExpression))
            .attribute(Attribute::bool("required").computed())
            .attribute(
                Attribute::string("saml_subject_nameformat")
                    .optional_computed()
                    .describe("NameID format of the SAML subject; SAML applications only."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("application_id", "application_attribute_mapping_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        mut plan: ApplicationCoreAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationCoreAttributeMappingModel> {
        plan.id = AttrValue::Unknown;
        self.apply(ctx, plan, diags)
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ApplicationCoreAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationCoreAttributeMappingModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let application_id = known(&state.application_id, "application_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let mapping = get_mapping(&api, env, application_id, id, diags)?;
        if mapping.mapping_type != Some(MappingType::Core) {
            diags.attribute_error(
                "id",
                "Not a core attribute mapping",
                format!("Mapping {id} is a custom mapping; manage it with pingone_application_attribute_mapping."),
            );
            return None;
        }
        Some(Self::project(mapping, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        mut plan: ApplicationCoreAttributeMappingModel,
        prior: ApplicationCoreAttributeMappingModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationCoreAttributeMappingModel> {
        plan.id = prior.id;
        self.apply(ctx, plan, diags)
    }

    fn delete(&self, ctx: &ApplyContext, state: ApplicationCoreAttributeMappingModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(application_id), Some(id)) = (
            state.environment_id.as_str(),
            state.application_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        let mut body = Self::expand(&state);
        body.value = CORE_DEFAULT_VALUE.to_string();
        let reset = put_mapping(&api, env, application_id, id, &body, NotFound::Warn, diags);
        if reset.is_some() {
            log::info!("Core attribute {} of application {application_id} reset to {CORE_DEFAULT_VALUE}", body.name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pingone::Method;

    fn custom(fx: &Fixture, app: &str, name: &str) -> ApplicationAttributeMappingModel {
        ApplicationAttributeMappingModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            application_id: AttrValue::Known(app.into()),
            name: AttrValue::Known(name.into()),
            value: AttrValue::Known("${user.email}".into()),
            ..Default::default()
        }
    }

    fn core(fx: &Fixture, app: &str, name: &str) -> ApplicationCoreAttributeMappingModel {
        ApplicationCoreAttributeMappingModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            application_id: AttrValue::Known(app.into()),
            name: AttrValue::Known(name.into()),
            value: AttrValue::Known("${user.email}".into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_custom_mapping_lifecycle() {
        let fx = Fixture::new();
        let r = ApplicationAttributeMappingReconciler::new(fx.client.clone());
        let app = fx.oidc_application("Storefront");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, custom(&fx, &app, "email"), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.mapping_type.as_str(), Some("CUSTOM"));
        assert_eq!(created.required, AttrValue::Known(false));

        let mut required = created.clone();
        required.required = AttrValue::Known(true);
        let updated = r.update(&ctx, required, created, &mut diags).unwrap();
        assert_eq!(updated.required, AttrValue::Known(true));
        assert_eq!(r.read(&ctx, updated.clone(), &mut diags).unwrap(), updated);

        r.delete(&ctx, updated, &mut diags);
        assert!(diags.is_empty(), "{diags}");
    }

    #[test]
    fn test_custom_mapping_refuses_reserved_names() {
        let fx = Fixture::new();
        let r = ApplicationAttributeMappingReconciler::new(fx.client.clone());
        let oidc = fx.oidc_application("Storefront");
        let saml = fx.saml_application("Payroll");
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, custom(&fx, &oidc, "sub"), &mut diags).is_none());
        assert!(r.create(&ctx, custom(&fx, &oidc, "aud"), &mut diags).is_none());
        assert!(r.create(&ctx, custom(&fx, &saml, "saml_subject"), &mut diags).is_none());
        assert_eq!(diags.error_count(), 3);

        let mut diags = Diagnostics::new();
        assert!(r.create(&ctx, custom(&fx, &saml, "aud"), &mut diags).is_some());
    }

    #[test]
    fn test_core_name_must_match_variant() {
        let fx = Fixture::new();
        let r = ApplicationCoreAttributeMappingReconciler::new(fx.client.clone());
        let app = fx.oidc_application("Storefront");
        fx.mock.clear_requests();
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, core(&fx, &app, "saml_subject"), &mut diags).is_none());
        let error = diags.errors().next().unwrap();
        assert_eq!(error.attribute.as_deref(), Some("name"));
        assert!(error.summary.contains("Not a core attribute"));
        assert!(error.detail.contains("saml_subject"));
        assert_eq!(fx.mock.mutations(), 0);
    }

    #[test]
    fn test_core_mapping_takeover_and_reset() {
        let fx = Fixture::new();
        let r = ApplicationCoreAttributeMappingReconciler::new(fx.client.clone());
        let app = fx.oidc_application("Storefront");
        let mappings = paths::application_attributes(&fx.env, &app);
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, core(&fx, &app, "sub"), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.required, AttrValue::Known(true));
        assert_eq!(fx.mock.count(Method::Post, &mappings), 0);
        assert_eq!(fx.mock.list(&mappings).len(), 1);

        r.delete(&ctx, created.clone(), &mut diags);
        assert!(diags.is_empty(), "{diags}");
        let stored = fx
            .mock
            .get(&paths::application_attribute(&fx.env, &app, created.id.as_str().unwrap()))
            .unwrap();
        assert_eq!(stored["value"], "${user.id}");
        assert_eq!(stored["mappingType"], "CORE");
    }

    #[test]
    fn test_saml_name_format() {
        let fx = Fixture::new();
        let r = ApplicationCoreAttributeMappingReconciler::new(fx.client.clone());
        let oidc = fx.oidc_application("Storefront");
        let saml = fx.saml_application("Payroll");
        let (ctx, mut diags) = fx.call();
        let email_format = "urn:oasis:names:tc:SAML:1.1:nameid-format:emailAddress";

        let mut on_oidc = core(&fx, &oidc, "sub");
        on_oidc.saml_subject_nameformat = AttrValue::Known(email_format.into());
        assert!(r.create(&ctx, on_oidc, &mut diags).is_none());
        assert!(diags.mentions("only applies to SAML"));

        let mut diags = Diagnostics::new();
        let mut on_saml = core(&fx, &saml, "saml_subject");
        on_saml.saml_subject_nameformat = AttrValue::Known(email_format.into());
        let created = r.create(&ctx, on_saml, &mut diags).unwrap();
        assert_eq!(created.saml_subject_nameformat.as_str(), Some(email_format));
    }
}
