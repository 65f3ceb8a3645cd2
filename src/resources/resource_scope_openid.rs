//! `pingone_resource_scope_openid`: scopes of the OpenID Connect resource.
//!
//! The resource ships with predefined scopes (`address`, `email`, `openid`,
//! `phone`, `profile`) that cannot be created or deleted. Managing one of
//! those names adopts the existing scope and updates it in place, and
//! destroying it only clears its mapped claims: the scope itself survives.
//! Predefined descriptions are fixed. Any other name is an ordinary scope.

use super::{environment_id, known, string_set, to_list};
use crate::api::{Api, NotFound, require};
use crate::lookup::{fetch_resource_by_type, fetch_resource_scope_from_name};
use declarative::validators::{LengthAtLeast, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{ResourceScope, ResourceType, is_predefined_openid_scope};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceScopeOpenIdModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub resource_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub mapped_claims: AttrValue<BTreeSet<String>>,
}

pub struct ResourceScopeOpenIdReconciler {
    client: Arc<Client>,
}

impl ResourceScopeOpenIdReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn project(scope: ResourceScope, mut model: ResourceScopeOpenIdModel) -> ResourceScopeOpenIdModel {
        model.id = scope.id.into();
        model.name = AttrValue::Known(scope.name);
        model.description = scope.description.into();
        model.mapped_claims = string_set(scope.mapped_claims);
        if let Some(resource) = scope.resource {
            model.resource_id = AttrValue::Known(resource.id);
        }
        model
    }

    fn openid_resource_id(api: &Api<'_>, env: &str, warn: bool, diags: &mut Diagnostics) -> Option<String> {
        let resource = fetch_resource_by_type(api, env, ResourceType::OpenidConnect, warn, diags)?;
        require(resource.id, "ReadAllResources", "OpenID Connect resource ID", diags)
    }

    /// Reject a description that differs from a predefined scope's own
    fn check_description(plan: &ResourceScopeOpenIdModel, existing: &ResourceScope, diags: &mut Diagnostics) {
        if let Some(wanted) = plan.description.known()
            && existing.description.as_ref() != Some(wanted)
        {
            diags.attribute_error(
                "description",
                "Invalid attribute value",
                format!(
                    "The description of the predefined scope \"{}\" cannot be changed. Remove the description attribute from the configuration.",
                    existing.name
                ),
            );
        }
    }

    /// PUT a predefined scope, keeping its name and description
    fn override_predefined(
        api: &Api<'_>,
        op: &str,
        env: &str,
        resource_id: &str,
        existing: &ResourceScope,
        mapped_claims: Option<Vec<String>>,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScope> {
        let id = require(existing.id.as_deref(), op, "scope ID", diags)?;
        let body = ResourceScope {
            name: existing.name.clone(),
            description: existing.description.clone(),
            mapped_claims: Some(mapped_claims.unwrap_or_default()),
            ..Default::default()
        };
        log::info!("Overriding predefined OpenID Connect scope {}", existing.name);
        api.invoke(op, env, NotFound::ErrorUnlessEnvironmentGone, diags, |c| {
            c.update(&paths::resource_scope(env, resource_id, id), &body)
        })
        .found()
    }
}

impl Reconciler for ResourceScopeOpenIdReconciler {
    type Model = ResourceScopeOpenIdModel;

    fn type_name(&self) -> &'static str {
        "pingone_resource_scope_openid"
    }

    fn schema(&self) -> Schema {
        Schema::new(
            "Manages a scope of the OpenID Connect resource. Predefined scopes are adopted on create and only have their mapped claims cleared on destroy.",
        )
        .attribute(Attribute::id())
        .attribute(environment_id())
        .attribute(
            Attribute::string("resource_id")
                .computed()
                .describe("The ID of the OpenID Connect resource."),
        )
        .attribute(
            Attribute::string("name")
                .required()
                .force_new()
                .validate(LengthAtLeast(1)),
        )
        .attribute(
            Attribute::string("description")
                .optional_computed()
                .describe("Scope description. Fixed for predefined scopes."),
        )
        .attribute(
            Attribute::string_set("mapped_claims")
                .optional()
                .validate(UuidShape)
                .describe("IDs of the resource attributes released with the scope."),
        )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("resource_scope_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ResourceScopeOpenIdModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeOpenIdModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let name = known(&plan.name, "name", diags)?;
        let resource_id = Self::openid_resource_id(&api, env, false, diags)?;

        let scope = if is_predefined_openid_scope(name) {
            let existing =
                fetch_resource_scope_from_name(&api, env, &resource_id, name, false, diags)?;
            Self::check_description(&plan, &existing, diags);
            if diags.has_error() {
                return None;
            }
            Self::override_predefined(
                &api,
                "UpdateResourceScope",
                env,
                &resource_id,
                &existing,
                to_list(&plan.mapped_claims),
                diags,
            )?
        } else {
            let body = ResourceScope {
                name: name.to_string(),
                description: plan.description.known().cloned(),
                mapped_claims: to_list(&plan.mapped_claims),
                ..Default::default()
            };
            let created: ResourceScope = api
                .invoke("CreateResourceScope", env, NotFound::Error, diags, |c| {
                    c.create(&paths::resource_scopes(env, &resource_id), &body)
                })
                .found()?;
            require(created.id.as_ref(), "CreateResourceScope", "scope ID", diags)?;
            created
        };

        let mut model = Self::project(scope, plan);
        model.resource_id = AttrValue::Known(resource_id);
        Some(model)
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ResourceScopeOpenIdModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeOpenIdModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let resource_id = match state.resource_id.non_empty() {
            Some(resource_id) => resource_id.to_string(),
            None => Self::openid_resource_id(&api, env, true, diags)?,
        };
        let scope: ResourceScope = api
            .invoke("ReadOneResourceScope", env, NotFound::Warn, diags, |c| {
                c.get(&paths::resource_scope(env, &resource_id, id))
            })
            .found()?;
        let mut model = Self::project(scope, state);
        model.resource_id = AttrValue::Known(resource_id);
        Some(model)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ResourceScopeOpenIdModel,
        prior: ResourceScopeOpenIdModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceScopeOpenIdModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&prior.resource_id, "resource_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let name = known(&plan.name, "name", diags)?;

        let scope = if is_predefined_openid_scope(name) {
            let existing: ResourceScope = api
                .invoke("ReadOneResourceScope", env, NotFound::Error, diags, |c| {
                    c.get(&paths::resource_scope(env, resource_id, id))
                })
                .found()?;
            Self::check_description(&plan, &existing, diags);
            if diags.has_error() {
                return None;
            }
            Self::override_predefined(
                &api,
                "UpdateResourceScope",
                env,
                resource_id,
                &existing,
                to_list(&plan.mapped_claims),
                diags,
            )?
        } else {
            let body = ResourceScope {
                name: name.to_string(),
                description: plan.description.known().cloned(),
                mapped_claims: to_list(&plan.mapped_claims),
                ..Default::default()
            };
            api.invoke(
                "UpdateResourceScope",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::resource_scope(env, resource_id, id), &body),
            )
            .found()?
        };
        Some(Self::project(scope, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ResourceScopeOpenIdModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(resource_id), Some(id), Some(name)) = (
            state.environment_id.as_str(),
            state.resource_id.as_str(),
            state.id.as_str(),
            state.name.as_str(),
        ) else {
            return;
        };

        if !is_predefined_openid_scope(name) {
            api.delete(
                "DeleteResourceScope",
                env,
                &paths::resource_scope(env, resource_id, id),
                diags,
            );
            return;
        }

        let Some(existing) = api
            .invoke::<ResourceScope, _>("ReadOneResourceScope", env, NotFound::Warn, diags, |c| {
                c.get(&paths::resource_scope(env, resource_id, id))
            })
            .found()
        else {
            return;
        };
        if Self::override_predefined(
            &api,
            "UpdateResourceScope",
            env,
            resource_id,
            &existing,
            None,
            diags,
        )
        .is_some()
        {
            log::info!("Predefined scope {name} left in place with its mapped claims cleared");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use pingone::Method;
    use serde_json::{Value, json};

    const CLAIMS: [&str; 3] = [
        "00000000-0000-4000-8000-00000000aaa1",
        "00000000-0000-4000-8000-00000000aaa2",
        "00000000-0000-4000-8000-00000000aaa3",
    ];

    fn plan(fx: &Fixture, name: &str) -> ResourceScopeOpenIdModel {
        ResourceScopeOpenIdModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known(name.into()),
            mapped_claims: AttrValue::Known(CLAIMS.iter().map(|c| (*c).to_string()).collect()),
            id: AttrValue::Unknown,
            resource_id: AttrValue::Unknown,
            description: AttrValue::Unknown,
        }
    }

    #[test]
    fn test_predefined_scope_is_overridden_not_created() {
        let fx = Fixture::new();
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let r = ResourceScopeOpenIdReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();
        let scopes_path = paths::resource_scopes(&fx.env, &openid);

        let created = r.create(&ctx, plan(&fx, "email"), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(fx.mock.count(Method::Post, &scopes_path), 0);
        assert_eq!(fx.mock.count(Method::Put, &scopes_path), 1);
        assert_eq!(created.description.as_str(), Some("Predefined email scope"));
        assert_eq!(created.mapped_claims.known().map(BTreeSet::len), Some(3));
        assert_eq!(created.resource_id.as_str(), Some(openid.as_str()));

        r.delete(&ctx, created.clone(), &mut diags);
        assert!(diags.is_empty(), "{diags}");
        let id = created.id.as_str().unwrap();
        let stored = fx.mock.get(&paths::resource_scope(&fx.env, &openid, id)).unwrap();
        assert_eq!(stored["mappedClaims"], json!([]));
        assert_eq!(stored["description"], "Predefined email scope");
        assert_eq!(fx.mock.count(Method::Delete, &scopes_path), 0);
    }

    #[test]
    fn test_predefined_description_cannot_change() {
        let fx = Fixture::new();
        fx.mock.seed_openid_resource(&fx.env);
        let r = ResourceScopeOpenIdReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let mut wanted = plan(&fx, "profile");
        wanted.description = AttrValue::Known("My profile".into());
        assert!(r.create(&ctx, wanted, &mut diags).is_none());
        assert_eq!(diags.errors().next().unwrap().attribute.as_deref(), Some("description"));
        assert_eq!(fx.mock.mutations(), 0);
    }

    #[test]
    fn test_custom_openid_scope_lifecycle() {
        let fx = Fixture::new();
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let r = ResourceScopeOpenIdReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let mut wanted = plan(&fx, "loyalty");
        wanted.description = AttrValue::Known("Loyalty programme".into());
        let created = r.create(&ctx, wanted, &mut diags).unwrap();
        assert_eq!(fx.mock.count(Method::Post, &paths::resource_scopes(&fx.env, &openid)), 1);

        let same = r.update(&ctx, created.clone(), created.clone(), &mut diags).unwrap();
        assert_eq!(same, created);

        r.delete(&ctx, created.clone(), &mut diags);
        let id = created.id.as_str().unwrap();
        assert!(fx.mock.get(&paths::resource_scope(&fx.env, &openid, id)).is_none());
        assert!(diags.is_empty(), "{diags}");
    }

    #[test]
    fn test_import_resolves_resource() {
        let fx = Fixture::new();
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let scopes = fx.mock.list(&paths::resource_scopes(&fx.env, &openid));
        let phone = scopes
            .iter()
            .find(|s| s["name"] == "phone")
            .and_then(|s| s["id"].as_str())
            .unwrap()
            .to_string();
        let r = erase(ResourceScopeOpenIdReconciler::new(fx.client.clone()));
        let (ctx, mut diags) = fx.call();

        let imported = r
            .import_state(&ctx, &format!("{}/{phone}", fx.env), &mut diags)
            .unwrap();
        assert_eq!(imported["resource_id"], Value::String(openid));
        assert_eq!(imported["mapped_claims"], Value::Null);
    }
}
