//! `pingone_resource_attribute`: claims a resource releases in its tokens.
//!
//! Names that collide with an existing core or predefined attribute take
//! that attribute over and update it in place; destroying a core attribute
//! resets it to its default expression instead of deleting it.

use super::{environment_id, known, parent_id};
use crate::api::{Api, NotFound, require};
use crate::lookup::fetch_resource_from_id;
use crate::validators::AttributeExpression;
use declarative::validators::LengthAtLeast;
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{ResourceAttribute, ResourceAttributeType, ResourceType};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Claim names the service reserves on custom resources
const RESERVED_CUSTOM: &[&str] = &[
    "acr", "amr", "aud", "auth_time", "client_id", "env", "exp", "iat", "iss", "jti", "org",
    "scope", "sid",
];

/// Claim names the service reserves on the OpenID Connect resource
const RESERVED_OPENID: &[&str] = &[
    "acr", "amr", "at_hash", "aud", "auth_time", "azp", "client_id", "exp", "iat", "iss", "jti",
    "nbf", "nonce", "org", "scope", "sid",
];

/// Default expression a core attribute is reset to on destroy
fn core_default(name: &str) -> Option<&'static str> {
    match name {
        "sub" => Some("${user.id}"),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceAttributeModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub resource_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub value: AttrValue<String>,
    #[serde(rename = "type")]
    pub attribute_type: AttrValue<String>,
    pub id_token_enabled: AttrValue<bool>,
    pub userinfo_enabled: AttrValue<bool>,
}

pub struct ResourceAttributeReconciler {
    client: Arc<Client>,
}

fn type_name(attribute_type: ResourceAttributeType) -> &'static str {
    match attribute_type {
        ResourceAttributeType::Core => "CORE",
        ResourceAttributeType::Custom => "CUSTOM",
        ResourceAttributeType::Predefined => "PREDEFINED",
    }
}

impl ResourceAttributeReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &ResourceAttributeModel) -> ResourceAttribute {
        ResourceAttribute {
            name: plan.name.known_or_default(),
            value: plan.value.known_or_default(),
            id_token: plan.id_token_enabled.known().copied(),
            user_info: plan.userinfo_enabled.known().copied(),
            ..Default::default()
        }
    }

    fn project(attribute: ResourceAttribute, mut model: ResourceAttributeModel) -> ResourceAttributeModel {
        model.id = attribute.id.into();
        model.name = AttrValue::Known(attribute.name);
        model.value = AttrValue::Known(attribute.value);
        model.attribute_type = attribute.attribute_type.map(|t| type_name(t).to_string()).into();
        model.id_token_enabled = attribute.id_token.into();
        model.userinfo_enabled = attribute.user_info.into();
        model
    }

    /// Check the parent accepts attributes and the name is not reserved.
    ///
    /// Returns the existing core or predefined attribute the name collides
    /// with, which becomes the update target.
    fn resolve_target(
        api: &Api<'_>,
        env: &str,
        resource_id: &str,
        name: &str,
        diags: &mut Diagnostics,
    ) -> Option<Option<ResourceAttribute>> {
        let resource = fetch_resource_from_id(api, env, resource_id, false, diags)?;
        let reserved = match resource.resource_type {
            Some(ResourceType::Custom) => RESERVED_CUSTOM,
            Some(ResourceType::OpenidConnect) => RESERVED_OPENID,
            Some(ResourceType::PingoneApi) | None => {
                diags.attribute_error(
                    "resource_id",
                    "Invalid resource type",
                    format!("Attributes cannot be added to resource {resource_id} ({}).", resource.name),
                );
                return None;
            }
        };

        let existing: Vec<ResourceAttribute> = api
            .invoke("ReadAllResourceAttributes", env, NotFound::Error, diags, |c| {
                c.list(&paths::resource_attributes(env, resource_id))
            })
            .found()?;
        let builtin = existing.into_iter().find(|a| {
            a.name == name
                && matches!(
                    a.attribute_type,
                    Some(ResourceAttributeType::Core | ResourceAttributeType::Predefined)
                )
        });
        if builtin.is_none() && reserved.contains(&name) {
            diags.attribute_error(
                "name",
                "Invalid attribute name",
                format!(
                    "\"{name}\" is a reserved claim name on {} resources and cannot be used for a custom attribute.",
                    resource.resource_type.map_or("these", |t| t.as_str())
                ),
            );
            return None;
        }
        Some(builtin)
    }
}

impl Reconciler for ResourceAttributeReconciler {
    type Model = ResourceAttributeModel;

    fn type_name(&self) -> &'static str {
        "pingone_resource_attribute"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages an attribute mapping of a custom or OpenID Connect resource.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("resource_id", "The ID of the resource."))
            .attribute(
                Attribute::string("name")
                    .required()
                    .force_new()
                    .validate(LengthAtLeast(1)),
            )
            .attribute(
                Attribute::string("value")
                    .required()
                    .validate(AttributeExpression)
                    .describe("Literal text or an expression such as ${user.email}."),
            )
            .attribute(
                Attribute::string("type")
                    .computed()
                    .describe("CORE, CUSTOM or PREDEFINED; derived by the service."),
            )
            .attribute(Attribute::bool("id_token_enabled").optional_computed())
            .attribute(Attribute::bool("userinfo_enabled").optional_computed())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("resource_id", "resource_attribute_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ResourceAttributeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceAttributeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;
        let name = known(&plan.name, "name", diags)?;
        let target = Self::resolve_target(&api, env, resource_id, name, diags)?;

        let body = Self::expand(&plan);
        let attribute: ResourceAttribute = match target.and_then(|t| t.id) {
            Some(id) => {
                log::info!("Taking over built-in attribute {name} of resource {resource_id}");
                api.invoke("UpdateResourceAttribute", env, NotFound::Error, diags, |c| {
                    c.update(&paths::resource_attribute(env, resource_id, &id), &body)
                })
                .found()?
            }
            None => {
                let created: ResourceAttribute = api
                    .invoke("CreateResourceAttribute", env, NotFound::Error, diags, |c| {
                        c.create(&paths::resource_attributes(env, resource_id), &body)
                    })
                    .found()?;
                require(created.id.as_ref(), "CreateResourceAttribute", "attribute ID", diags)?;
                created
            }
        };
        Some(Self::project(attribute, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ResourceAttributeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceAttributeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let resource_id = known(&state.resource_id, "resource_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let attribute: ResourceAttribute = api
            .invoke("ReadOneResourceAttribute", env, NotFound::Warn, diags, |c| {
                c.get(&paths::resource_attribute(env, resource_id, id))
            })
            .found()?;
        Some(Self::project(attribute, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ResourceAttributeModel,
        prior: ResourceAttributeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceAttributeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let attribute: ResourceAttribute = api
            .invoke(
                "UpdateResourceAttribute",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::resource_attribute(env, resource_id, id), &body),
            )
            .found()?;
        Some(Self::project(attribute, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ResourceAttributeModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(resource_id), Some(id)) = (
            state.environment_id.as_str(),
            state.resource_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        let path = paths::resource_attribute(env, resource_id, id);

        if state.attribute_type.as_str() != Some("CORE") {
            api.delete("DeleteResourceAttribute", env, &path, diags);
            return;
        }

        let name = state.name.known_or_default();
        let Some(default) = core_default(&name) else {
            diags.warning(
                "Core attribute left in place",
                format!("Core attribute \"{name}\" cannot be deleted and has no known default; it has been removed from state only."),
            );
            return;
        };
        let body = ResourceAttribute {
            name: name.clone(),
            value: default.to_string(),
            ..Default::default()
        };
        let reset = api
            .invoke::<ResourceAttribute, _>("UpdateResourceAttribute", env, NotFound::Warn, diags, |c| {
                c.update(&path, &body)
            })
            .found();
        if reset.is_some() {
            log::info!("Core attribute {name} reset to {default}");
        }
    }
}
