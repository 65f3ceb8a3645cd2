//! `pingone_sign_on_policy`: the container for priority-ordered sign-on actions.

use super::{environment_id, known};
use crate::api::{Api, NotFound, require};
use declarative::validators::{LengthAtLeast, MatchesRegex};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::SignOnPolicy;
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const NAME_PATTERN: &str = r"^[a-zA-Z0-9_-]+$";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SignOnPolicyModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub environment_default: AttrValue<bool>,
}

pub struct SignOnPolicyReconciler {
    client: Arc<Client>,
}

impl SignOnPolicyReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &SignOnPolicyModel) -> SignOnPolicy {
        SignOnPolicy {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            default: false,
        }
    }

    fn project(policy: SignOnPolicy, mut model: SignOnPolicyModel) -> SignOnPolicyModel {
        model.id = policy.id.into();
        model.name = AttrValue::Known(policy.name);
        model.description = policy.description.into();
        model.environment_default = AttrValue::Known(policy.default);
        model
    }
}

impl Reconciler for SignOnPolicyReconciler {
    type Model = SignOnPolicyModel;

    fn type_name(&self) -> &'static str {
        "pingone_sign_on_policy"
    }

    fn schema(&self) -> Schema {
        let mut name = Attribute::string("name").required().validate(LengthAtLeast(1));
        if let Ok(shape) = MatchesRegex::new(
            NAME_PATTERN,
            "may only contain letters, digits, underscores and hyphens",
        ) {
            name = name.validate(shape);
        }
        Schema::new("Manages a sign-on policy. Its steps are managed with pingone_sign_on_policy_action.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(name)
            .attribute(Attribute::string("description").optional())
            .attribute(Attribute::bool("environment_default").computed())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("sign_on_policy_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: SignOnPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let body = Self::expand(&plan);
        let created: SignOnPolicy = api
            .invoke("CreateSignOnPolicy", env, NotFound::Error, diags, |c| {
                c.create(&paths::sign_on_policies(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreateSignOnPolicy", "sign-on policy ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: SignOnPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let policy: SignOnPolicy = api
            .invoke("ReadOneSignOnPolicy", env, NotFound::Warn, diags, |c| {
                c.get(&paths::sign_on_policy(env, id))
            })
            .found()?;
        Some(Self::project(policy, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: SignOnPolicyModel,
        prior: SignOnPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<SignOnPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let body = Self::expand(&plan);
        let updated: SignOnPolicy = api
            .invoke(
                "UpdateSignOnPolicy",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::sign_on_policy(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: SignOnPolicyModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        if state.environment_default.known_or(false) {
            diags.warning(
                "Default sign-on policy left in place",
                format!("Sign-on policy {id} is the environment default and cannot be deleted; it has been removed from state only."),
            );
            return;
        }
        api.delete("DeleteSignOnPolicy", env, &paths::sign_on_policy(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use serde_json::json;

    #[test]
    fn test_lifecycle() {
        let fx = Fixture::new();
        let r = SignOnPolicyReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let plan = SignOnPolicyModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("step_up".into()),
            ..Default::default()
        };
        let created = r.create(&ctx, plan, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(created.environment_default, AttrValue::Known(false));
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);

        r.delete(&ctx, created.clone(), &mut diags);
        assert!(diags.is_empty(), "{diags}");
        assert!(fx.mock.get(&paths::sign_on_policy(&fx.env, created.id.as_str().unwrap())).is_none());
    }

    #[test]
    fn test_name_shape() {
        let fx = Fixture::new();
        let r = erase(SignOnPolicyReconciler::new(fx.client.clone()));
        let (ctx, mut diags) = fx.call();

        let config = json!({"environment_id": fx.env, "name": "Step up!"});
        assert!(r.create(&ctx, &config, &mut diags).is_none());
        assert!(diags.mentions("letters, digits"));
    }

    #[test]
    fn test_default_policy_survives_destroy() {
        let fx = Fixture::new();
        let r = erase(SignOnPolicyReconciler::new(fx.client.clone()));
        let id = fx.mock.insert(
            &paths::sign_on_policies(&fx.env),
            json!({"name": "Single_Factor", "default": true}),
        );
        let (ctx, mut diags) = fx.call();

        let imported = r.import_state(&ctx, &format!("{}/{id}", fx.env), &mut diags).unwrap();
        assert_eq!(imported["environment_default"], json!(true));
        r.delete(&ctx, &imported, &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(fx.mock.get(&paths::sign_on_policy(&fx.env, &id)).is_some());
    }
}
