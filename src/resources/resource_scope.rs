//! `pingone_resource_scope`: scopes of custom resources.
//!
//! Scopes of the built-in OpenID Connect resource are managed by
//! `pingone_resource_scope_openid`; the PingOne API resource's scopes are
//! fixed.

use super::{environment_id, known, parent_id};
use crate::api::{Api, NotFound, require};
use crate::lookup::fetch_resource_from_id;
use declarative::validators::LengthAtLeast;
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{ResourceScope, ResourceType};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceScopeModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub resource_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
}

pub struct ResourceScopeReconciler {
    client: Arc<Client>,
}

impl ResourceScopeReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &ResourceScopeModel) -> ResourceScope {
        ResourceScope {
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            ..Default::default()
        }
    }

    fn project(scope: ResourceScope, mut model: ResourceScopeModel) -> ResourceScopeModel {
        model.id = scope.id.into();
        model.name = AttrValue::Known(scope.name);
        model.description = scope.description.into();
        if let Some(resource) = scope.resource {
            model.resource_id = AttrValue::Known(resource.id);
        }
        model
    }

    /// Only custom resources take administrator-defined scopes
    fn check_parent(api: &Api<'_>, env: &str, resource_id: &str, diags: &mut Diagnostics) -> Option<()> {
        let resource = fetch_resource_from_id(api, env, resource_id, false, diags)?;
        match resource.resource_type {
            Some(ResourceType::Custom) => Some(()),
            other => {
                let kind = other.map_or("unknown", |t| t.as_str());
                diags.attribute_error(
                    "resource_id",
                    "Invalid resource type",
                    format!(
                        "Resource {resource_id} is of type {kind}. Scopes can only be managed on CUSTOM resources; use pingone_resource_scope_openid for the OpenID Connect resource."
                    ),
                );
                None
            }
        }
    }
}

impl Reconciler for ResourceScopeReconciler {
    type Model = ResourceScopeModel;

    fn type_name(&self) -> &'static str {
        "pingone_resource_scope"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a scope of a custom resource.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id(
                "resource_id",
                "The ID of the custom resource the scope belongs to.",
            ))
            .attribute(
                Attribute::string("name")
                    .required()
                    .validate(LengthAtLeast(1))
                    .describe("Scope name, unique within the resource."),
            )
            .attribute(Attribute::string("description").optional())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("resource_id", "resource_scope_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ResourceScopeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;
        Self::check_parent(&api, env, resource_id, diags)?;

        let body = Self::expand(&plan);
        let created: ResourceScope = api
            .invoke("CreateResourceScope", env, NotFound::Error, diags, |c| {
                c.create(&paths::resource_scopes(env, resource_id), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateResourceScope", "scope ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ResourceScopeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let resource_id = known(&state.resource_id, "resource_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let scope: ResourceScope = api
            .invoke("ReadOneResourceScope", env, NotFound::Warn, diags, |c| {
                c.get(&paths::resource_scope(env, resource_id, id))
            })
            .found()?;
        Some(Self::project(scope, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ResourceScopeModel,
        prior: ResourceScopeModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let updated: ResourceScope = api
            .invoke(
                "UpdateResourceScope",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::resource_scope(env, resource_id, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ResourceScopeModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(resource_id), Some(id)) = (
            state.environment_id.as_str(),
            state.resource_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        api.delete(
            "DeleteResourceScope",
            env,
            &paths::resource_scope(env, resource_id, id),
            diags,
        );
    }
}
