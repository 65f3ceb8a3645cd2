//! `pingone_user`: directory users.
//!
//! A user's account status and population are not part of the user object
//! on write; each has its own singleton endpoint, called only when the value
//! actually changes.

use super::{environment_id, known};
use crate::api::{Api, NotFound, require, retry_not_found};
use declarative::validators::{LengthAtLeast, OneOf, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{Enabled, User, UserName, UserPopulation};
use pingone::{Client, ObjectRef, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const ENABLED: &str = "ENABLED";
const DISABLED: &str = "DISABLED";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub username: AttrValue<String>,
    pub email: AttrValue<String>,
    pub given_name: AttrValue<String>,
    pub family_name: AttrValue<String>,
    pub population_id: AttrValue<String>,
    pub status: AttrValue<String>,
}

impl UserModel {
    fn desired_enabled(&self) -> Option<bool> {
        self.status.as_str().map(|s| s == ENABLED)
    }
}

pub struct UserReconciler {
    client: Arc<Client>,
}

impl UserReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &UserModel, population: &str) -> User {
        let name = UserName {
            given: plan.given_name.known().cloned(),
            family: plan.family_name.known().cloned(),
        };
        User {
            id: None,
            username: plan.username.known_or_default(),
            email: plan.email.known_or_default(),
            name: (name != UserName::default()).then_some(name),
            population: ObjectRef::new(population),
            enabled: None,
        }
    }

    fn project(user: User, mut model: UserModel) -> UserModel {
        let name = user.name.unwrap_or_default();
        model.id = user.id.into();
        model.username = AttrValue::Known(user.username);
        model.email = AttrValue::Known(user.email);
        model.given_name = name.given.into();
        model.family_name = name.family.into();
        model.population_id = AttrValue::Known(user.population.id);
        model.status = user
            .enabled
            .map(|enabled| if enabled { ENABLED } else { DISABLED }.to_string())
            .into();
        model
    }

    fn get(api: &Api<'_>, env: &str, id: &str, policy: NotFound, diags: &mut Diagnostics) -> Option<User> {
        api.invoke("ReadUser", env, policy, diags, |c| c.get(&paths::user(env, id)))
            .found()
    }

    /// Bring the singletons in line with the plan
    fn apply_singletons(
        api: &Api<'_>,
        env: &str,
        current: &User,
        plan: &UserModel,
        diags: &mut Diagnostics,
    ) -> Option<()> {
        let id = current.id.as_deref()?;
        if let Some(population) = plan.population_id.non_empty()
            && current.population.id != population
        {
            log::info!("Moving user {id} to population {population}");
            let body = UserPopulation {
                population: ObjectRef::new(population),
            };
            let _: UserPopulation = api
                .invoke(
                    "UpdateUserPopulation",
                    env,
                    NotFound::ErrorUnlessEnvironmentGone,
                    diags,
                    |c| c.update(&paths::user_population(env, id), &body),
                )
                .found()?;
        }
        if let Some(enabled) = plan.desired_enabled()
            && current.enabled != Some(enabled)
        {
            let _: Enabled = api
                .invoke(
                    "UpdateUserEnabled",
                    env,
                    NotFound::ErrorUnlessEnvironmentGone,
                    diags,
                    |c| c.update(&paths::user_enabled(env, id), &Enabled::new(enabled)),
                )
                .found()?;
        }
        Some(())
    }
}

impl Reconciler for UserReconciler {
    type Model = UserModel;

    fn type_name(&self) -> &'static str {
        "pingone_user"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages a user in an environment's directory.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("username").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("email").required().validate(LengthAtLeast(3)))
            .attribute(Attribute::string("given_name").optional())
            .attribute(Attribute::string("family_name").optional())
            .attribute(
                Attribute::string("population_id")
                    .required()
                    .validate(UuidShape)
                    .describe("Population the user belongs to. Changing it moves the user."),
            )
            .attribute(
                Attribute::string("status")
                    .optional_computed()
                    .validate(OneOf(&[ENABLED, DISABLED]))
                    .describe("Account status. Defaults to ENABLED."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("user_id")
    }

    fn create(&self, ctx: &ApplyContext, plan: UserModel, diags: &mut Diagnostics) -> Option<UserModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let population = known(&plan.population_id, "population_id", diags)?;
        let body = Self::expand(&plan, population);
        let created: User = api
            .invoke("CreateUser", env, NotFound::Error, diags, |c| {
                c.create(&paths::users(env), &body)
            })
            .found()?;
        let id = require(created.id.clone(), "CreateUser", "user ID", diags)?;
        if plan.desired_enabled().is_some_and(|e| created.enabled != Some(e)) {
            Self::apply_singletons(&api, env, &created, &plan, diags)?;
            let user: User = api
                .invoke_with_retry("ReadUser", env, NotFound::Error, &retry_not_found, diags, |c| {
                    c.get(&paths::user(env, &id))
                })
                .found()?;
            return Some(Self::project(user, plan));
        }
        Some(Self::project(created, plan))
    }

    fn read(&self, ctx: &ApplyContext, state: UserModel, diags: &mut Diagnostics) -> Option<UserModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let user = Self::get(&api, env, id, NotFound::Warn, diags)?;
        Some(Self::project(user, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: UserModel,
        prior: UserModel,
        diags: &mut Diagnostics,
    ) -> Option<UserModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let population = known(&plan.population_id, "population_id", diags)?;
        let body = Self::expand(&plan, population);
        let updated: User = api
            .invoke(
                "UpdateUser",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::user(env, id), &body),
            )
            .found()?;
        Self::apply_singletons(&api, env, &updated, &plan, diags)?;
        let user = Self::get(&api, env, id, NotFound::ErrorUnlessEnvironmentGone, diags)?;
        Some(Self::project(user, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: UserModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        api.delete("DeleteUser", env, &paths::user(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use pingone::Method;

    fn plan(fx: &Fixture, population: &str) -> UserModel {
        UserModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            username: AttrValue::Known("jdoe".into()),
            email: AttrValue::Known("jdoe@example.com".into()),
            given_name: AttrValue::Known("Jo".into()),
            population_id: AttrValue::Known(population.into()),
            status: AttrValue::Unknown,
            ..Default::default()
        }
    }

    #[test]
    fn test_create_defaults_to_enabled() {
        let fx = Fixture::new();
        let r = UserReconciler::new(fx.client.clone());
        let staff = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, &staff), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.status.as_str(), Some(ENABLED));
        assert!(created.family_name.is_null());
        assert_eq!(fx.mock.count(Method::Put, &paths::users(&fx.env)), 0);
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);
    }

    #[test]
    fn test_create_disabled_uses_enabled_singleton() {
        let fx = Fixture::new();
        let r = UserReconciler::new(fx.client.clone());
        let staff = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let mut disabled = plan(&fx, &staff);
        disabled.status = AttrValue::Known(DISABLED.into());
        let created = r.create(&ctx, disabled, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.status.as_str(), Some(DISABLED));
        let id = created.id.as_str().unwrap();
        assert_eq!(fx.mock.count(Method::Put, &paths::user_enabled(&fx.env, id)), 1);
    }

    #[test]
    fn test_population_move_and_status_change() {
        let fx = Fixture::new();
        let r = UserReconciler::new(fx.client.clone());
        let staff = fx.population("Staff");
        let alumni = fx.population("Alumni");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, &staff), &mut diags).unwrap();
        let id = created.id.as_str().unwrap().to_string();

        let mut moved = created.clone();
        moved.population_id = AttrValue::Known(alumni.clone());
        moved.status = AttrValue::Known(DISABLED.into());
        let updated = r.update(&ctx, moved.clone(), created, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(updated, moved);
        assert_eq!(fx.mock.count(Method::Put, &paths::user_population(&fx.env, &id)), 1);
        assert_eq!(fx.mock.count(Method::Put, &paths::user_enabled(&fx.env, &id)), 1);

        // nothing to move the second time
        r.update(&ctx, updated.clone(), updated, &mut diags).unwrap();
        assert_eq!(fx.mock.count(Method::Put, &paths::user_population(&fx.env, &id)), 1);
        assert_eq!(fx.mock.count(Method::Put, &paths::user_enabled(&fx.env, &id)), 1);
    }

    #[test]
    fn test_move_to_missing_population_fails() {
        let fx = Fixture::new();
        let r = UserReconciler::new(fx.client.clone());
        let staff = fx.population("Staff");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, &staff), &mut diags).unwrap();
        let mut moved = created.clone();
        moved.population_id = AttrValue::Known("00000000-0000-4000-8000-00000000dead".into());
        assert!(r.update(&ctx, moved, created, &mut diags).is_none());
        assert!(diags.mentions("Population does not exist"));
    }
}
