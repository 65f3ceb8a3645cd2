//! `pingone_population`: user populations.

use super::{environment_id, known, object_ref, ref_id};
use crate::api::{Api, NotFound, require};
use declarative::validators::{LengthAtLeast, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::Population;
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PopulationModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub password_policy_id: AttrValue<String>,
}

pub struct PopulationReconciler {
    client: Arc<Client>,
}

impl PopulationReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &PopulationModel) -> Population {
        Population {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            default: None,
            password_policy: object_ref(&plan.password_policy_id),
        }
    }

    fn project(population: Population, mut model: PopulationModel) -> PopulationModel {
        model.id = population.id.into();
        model.name = AttrValue::Known(population.name);
        model.description = population.description.into();
        model.password_policy_id = ref_id(population.password_policy.as_ref());
        model
    }
}

impl Reconciler for PopulationReconciler {
    type Model = PopulationModel;

    fn type_name(&self) -> &'static str {
        "pingone_population"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a population of users.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(
                Attribute::string("password_policy_id")
                    .optional()
                    .validate(UuidShape)
                    .describe("Password policy applied to the population's users."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("population_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: PopulationModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let body = Self::expand(&plan);
        let created: Population = api
            .invoke("CreatePopulation", env, NotFound::Error, diags, |c| {
                c.create(&paths::populations(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreatePopulation", "population ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: PopulationModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let population: Population = api
            .invoke("ReadOnePopulation", env, NotFound::Warn, diags, |c| {
                c.get(&paths::population(env, id))
            })
            .found()?;
        Some(Self::project(population, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: PopulationModel,
        prior: PopulationModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let updated: Population = api
            .invoke(
                "UpdatePopulation",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::population(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: PopulationModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeletePopulation", env, &paths::population(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use serde_json::json;

    fn plan(fx: &Fixture, name: &str) -> PopulationModel {
        PopulationModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known(name.into()),
            ..Default::default()
        }
    }

    #[test]
    fn test_lifecycle() {
        let fx = Fixture::new();
        let r = PopulationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, "Contractors"), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);

        let mut renamed = created.clone();
        renamed.description = AttrValue::Known("External staff".into());
        let updated = r.update(&ctx, renamed.clone(), created, &mut diags).unwrap();
        assert_eq!(updated, renamed);

        r.delete(&ctx, updated.clone(), &mut diags);
        assert!(diags.is_empty(), "{diags}");
        r.delete(&ctx, updated, &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_error());
    }

    #[test]
    fn test_duplicate_name_is_rejected() {
        let fx = Fixture::new();
        let r = PopulationReconciler::new(fx.client.clone());
        fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, plan(&fx, "Staff"), &mut diags).is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn test_import() {
        let fx = Fixture::new();
        let r = erase(PopulationReconciler::new(fx.client.clone()));
        let id = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let imported = r.import_state(&ctx, &format!("{}/{id}", fx.env), &mut diags).unwrap();
        assert_eq!(imported["name"], json!("Staff"));
        assert_eq!(imported["id"], json!(id));
        assert!(r.import_state(&ctx, "not-an-id", &mut diags).is_none());
    }
}
