//! `pingone_resource`: custom OAuth resource servers.

use super::{environment_id, known};
use crate::api::{Api, NotFound, require};
use declarative::validators::{IntBetween, LengthAtLeast};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{Resource, ResourceType};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    #[serde(rename = "type")]
    pub resource_type: AttrValue<String>,
    pub audience: AttrValue<String>,
    pub access_token_validity_seconds: AttrValue<i64>,
}

pub struct ResourceReconciler {
    client: Arc<Client>,
}

impl ResourceReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &ResourceModel) -> Resource {
        Resource {
            id: None,
            name: plan.name.known_or_default(),
            resource_type: Some(ResourceType::Custom),
            description: plan.description.known().cloned(),
            audience: plan.audience.non_empty().map(str::to_string),
            access_token_validity_seconds: plan.access_token_validity_seconds.known().copied(),
        }
    }

    fn project(resource: Resource, mut model: ResourceModel) -> ResourceModel {
        model.id = resource.id.into();
        model.name = AttrValue::Known(resource.name);
        model.description = resource.description.into();
        model.resource_type = resource.resource_type.map(|t| t.as_str().to_string()).into();
        model.audience = resource.audience.into();
        model.access_token_validity_seconds = resource.access_token_validity_seconds.into();
        model
    }
}

impl Reconciler for ResourceReconciler {
    type Model = ResourceModel;

    fn type_name(&self) -> &'static str {
        "pingone_resource"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a custom resource (an OAuth resource server) in an environment.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(
                Attribute::string("name")
                    .required()
                    .validate(LengthAtLeast(1))
                    .describe("Resource name, unique within the environment."),
            )
            .attribute(Attribute::string("description").optional())
            .attribute(
                Attribute::string("type")
                    .computed()
                    .describe("Resource type; always CUSTOM for managed resources."),
            )
            .attribute(
                Attribute::string("audience")
                    .optional_computed()
                    .validate(LengthAtLeast(1))
                    .describe("The aud claim of issued access tokens. Defaults to the name."),
            )
            .attribute(
                Attribute::int("access_token_validity_seconds")
                    .optional_computed()
                    .validate(IntBetween(300, 2_592_000))
                    .describe("Access token lifetime in seconds. Defaults to 3600."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("resource_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ResourceModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let body = Self::expand(&plan);
        let created: Resource = api
            .invoke("CreateResource", env, NotFound::Error, diags, |c| {
                c.create(&paths::resources(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateResource", "resource ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ResourceModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let resource: Resource = api
            .invoke("ReadOneResource", env, NotFound::Warn, diags, |c| {
                c.get(&paths::resource(env, id))
            })
            .found()?;
        Some(Self::project(resource, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ResourceModel,
        prior: ResourceModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let updated: Resource = api
            .invoke(
                "UpdateResource",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::resource(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ResourceModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeleteResource", env, &paths::resource(env, id), diags);
    }
}
