//! `pingone_group`: directory groups, optionally scoped to one population.

use super::{environment_id, known, object_ref, ref_id};
use crate::api::{Api, NotFound, require};
use crate::lookup::fetch_population;
use declarative::validators::{LengthAtLeast, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::Group;
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub population_id: AttrValue<String>,
    pub user_filter: AttrValue<String>,
    pub external_id: AttrValue<String>,
}

pub struct GroupReconciler {
    client: Arc<Client>,
}

impl GroupReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &GroupModel) -> Group {
        Group {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            population: object_ref(&plan.population_id),
            user_filter: plan.user_filter.non_empty().map(str::to_string),
            external_id: plan.external_id.non_empty().map(str::to_string),
        }
    }

    fn project(group: Group, mut model: GroupModel) -> GroupModel {
        model.id = group.id.into();
        model.name = AttrValue::Known(group.name);
        model.description = group.description.into();
        model.population_id = ref_id(group.population.as_ref());
        model.user_filter = group.user_filter.into();
        model.external_id = group.external_id.into();
        model
    }
}

impl Reconciler for GroupReconciler {
    type Model = GroupModel;

    fn type_name(&self) -> &'static str {
        "pingone_group"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a group of users.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(
                Attribute::string("population_id")
                    .optional()
                    .force_new()
                    .validate(UuidShape)
                    .describe("Restricts membership to one population. Environment-wide when unset."),
            )
            .attribute(
                Attribute::string("user_filter")
                    .optional()
                    .describe("SCIM filter for dynamic membership."),
            )
            .attribute(Attribute::string("external_id").optional())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("group_id")
    }

    fn create(&self, ctx: &ApplyContext, plan: GroupModel, diags: &mut Diagnostics) -> Option<GroupModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        if let Some(population) = plan.population_id.non_empty() {
            fetch_population(&api, env, population, false, diags)?;
        }
        let body = Self::expand(&plan);
        let created: Group = api
            .invoke("CreateGroup", env, NotFound::Error, diags, |c| {
                c.create(&paths::groups(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateGroup", "group ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(&self, ctx: &ApplyContext, state: GroupModel, diags: &mut Diagnostics) -> Option<GroupModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let group: Group = api
            .invoke("ReadOneGroup", env, NotFound::Warn, diags, |c| c.get(&paths::group(env, id)))
            .found()?;
        Some(Self::project(group, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: GroupModel,
        prior: GroupModel,
        diags: &mut Diagnostics,
    ) -> Option<GroupModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let updated: Group = api
            .invoke(
                "UpdateGroup",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::group(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: GroupModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeleteGroup", env, &paths::group(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;

    #[test]
    fn test_population_scoped_group() {
        let fx = Fixture::new();
        let r = GroupReconciler::new(fx.client.clone());
        let staff = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let plan = GroupModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Engineering".into()),
            population_id: AttrValue::Known(staff.clone()),
            user_filter: AttrValue::Known("department eq \"eng\"".into()),
            ..Default::default()
        };
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.population_id.as_str(), Some(staff.as_str()));
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);

        let mut described = created.clone();
        described.description = AttrValue::Known("Builders".into());
        assert_eq!(r.update(&ctx, described.clone(), created, &mut diags).unwrap(), described);
    }

    #[test]
    fn test_removed_out_of_band() {
        let fx = Fixture::new();
        let r = erase(GroupReconciler::new(fx.client.clone()));
        let (ctx, mut diags) = fx.call();

        let created = r
            .create(
                &ctx,
                &serde_json::json!({"environment_id": fx.env, "name": "Ops"}),
                &mut diags,
            )
            .unwrap();
        fx.mock.set(&paths::group(&fx.env, created["id"].as_str().unwrap()), None);
        assert!(r.read(&ctx, &created, &mut diags).is_none());
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_error());
    }
}
