//! `pingone_population_default`: the environment's default population.
//!
//! An environment has at most one default population. Create adopts the
//! current default when there is one and creates it otherwise; destroy only
//! forgets it, since new users need somewhere to land.

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
pub struct PopulationDefaultModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub password_policy_id: AttrValue<String>,
}

pub struct PopulationDefaultReconciler {
    client: Arc<Client>,
}

impl PopulationDefaultReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &PopulationDefaultModel) -> Population {
        Population {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            default: Some(true),
            password_policy: object_ref(&plan.password_policy_id),
        }
    }

    fn project(population: Population, mut model: PopulationDefaultModel) -> PopulationDefaultModel {
        model.id = population.id.into();
        model.name = AttrValue::Known(population.name);
        model.description = population.description.into();
        model.password_policy_id = ref_id(population.password_policy.as_ref());
        model
    }

    fn current_default(api: &Api<'_>, env: &str, diags: &mut Diagnostics) -> Option<Option<Population>> {
        let populations: Vec<Population> = api
            .invoke("ReadAllPopulations", env, NotFound::Error, diags, |c| {
                c.list(&paths::populations(env))
            })
            .found()?;
        Some(populations.into_iter().find(|p| p.default == Some(true)))
    }

    fn put(
        api: &Api<'_>,
        env: &str,
        id: &str,
        body: &Population,
        diags: &mut Diagnostics,
    ) -> Option<Population> {
        api.invoke(
            "UpdatePopulation",
            env,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
            |c| c.update(&paths::population(env, id), body),
        )
        .found()
    }
}

impl Reconciler for PopulationDefaultReconciler {
    type Model = PopulationDefaultModel;

    fn type_name(&self) -> &'static str {
        "pingone_population_default"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages the default population of an environment.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(Attribute::string("password_policy_id").optional().validate(UuidShape))
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("population_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: PopulationDefaultModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationDefaultModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let body = Self::expand(&plan);

        let population = match Self::current_default(&api, env, diags)? {
            Some(Population { id: Some(id), .. }) => {
                log::info!("Adopting default population {id}");
                Self::put(&api, env, &id, &body, diags)?
            }
            _ => {
                let created: Population = api
                    .invoke("CreatePopulation", env, NotFound::Error, diags, |c| {
                        c.create(&paths::populations(env), &body)
                    })
                    .found()?;
                require(created.id.as_ref(), "CreatePopulation", "population ID", diags)?;
                created
            }
        };
        Some(Self::project(population, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: PopulationDefaultModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationDefaultModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let population: Population = api
            .invoke("ReadOnePopulation", env, NotFound::Warn, diags, |c| {
                c.get(&paths::population(env, id))
            })
            .found()?;
        if population.default != Some(true) {
            diags.warning(
                "Population is no longer the default",
                format!("Population {id} is not the default population; it will be removed from state."),
            );
            return None;
        }
        Some(Self::project(population, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: PopulationDefaultModel,
        prior: PopulationDefaultModel,
        diags: &mut Diagnostics,
    ) -> Option<PopulationDefaultModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let updated = Self::put(&api, env, id, &Self::expand(&plan), diags)?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, _ctx: &ApplyContext, state: PopulationDefaultModel, diags: &mut Diagnostics) {
        diags.warning(
            "Default population left in place",
            format!(
                "Population {} remains the environment's default; it has been removed from state only.",
                state.id.as_str().unwrap_or("(unknown)")
            ),
        );
    }
}
