//! `pingone_password_policy`: password complexity, history and lockout rules.

use super::{environment_id, known};
use crate::api::{Api, NotFound, require};
use declarative::validators::{IntAtLeast, IntBetween, LengthAtLeast};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{PasswordHistory, PasswordLength, PasswordLockout, PasswordPolicy};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;

const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
const NUMERIC: &str = "0123456789";
const SPECIAL: &str = "~!@#$%^&*()-_=+[]{}|;:,.<>/?";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LengthModel {
    pub min: AttrValue<i64>,
    pub max: AttrValue<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HistoryModel {
    pub count: AttrValue<i64>,
    pub retention_days: AttrValue<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LockoutModel {
    pub failure_count: AttrValue<i64>,
    pub duration_seconds: AttrValue<i64>,
}

/// Minimum number of characters drawn from each class
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MinCharactersModel {
    pub alphabetical_uppercase: AttrValue<i64>,
    pub alphabetical_lowercase: AttrValue<i64>,
    pub numeric: AttrValue<i64>,
    pub special_characters: AttrValue<i64>,
}

impl MinCharactersModel {
    fn classes(&self) -> [(&'static str, &AttrValue<i64>); 4] {
        [
            (UPPERCASE, &self.alphabetical_uppercase),
            (LOWERCASE, &self.alphabetical_lowercase),
            (NUMERIC, &self.numeric),
            (SPECIAL, &self.special_characters),
        ]
    }

    fn to_map(&self) -> Map<String, Value> {
        self.classes()
            .into_iter()
            .filter_map(|(class, count)| count.known().map(|n| (class.to_string(), json!(n))))
            .collect()
    }

    fn from_map(map: &Map<String, Value>) -> Self {
        let count = |class: &str| AttrValue::from_option(map.get(class).and_then(Value::as_i64));
        Self {
            alphabetical_uppercase: count(UPPERCASE),
            alphabetical_lowercase: count(LOWERCASE),
            numeric: count(NUMERIC),
            special_characters: count(SPECIAL),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordPolicyModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub name: AttrValue<String>,
    pub description: AttrValue<String>,
    pub exclude_commonly_used_passwords: AttrValue<bool>,
    pub exclude_profile_data: AttrValue<bool>,
    pub not_similar_to_current: AttrValue<bool>,
    pub length: AttrValue<LengthModel>,
    pub history: AttrValue<HistoryModel>,
    pub lockout: AttrValue<LockoutModel>,
    pub min_characters: AttrValue<MinCharactersModel>,
    pub max_repeated_characters: AttrValue<i64>,
    pub min_age_days: AttrValue<i64>,
    pub max_age_days: AttrValue<i64>,
    pub environment_default: AttrValue<bool>,
}

pub struct PasswordPolicyReconciler {
    client: Arc<Client>,
}

impl PasswordPolicyReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn expand(plan: &PasswordPolicyModel) -> PasswordPolicy {
        PasswordPolicy {
            id: None,
            name: plan.name.known_or_default(),
            description: plan.description.known().cloned(),
            exclude_commonly_used_passwords: plan.exclude_commonly_used_passwords.known_or(false),
            exclude_profile_data: plan.exclude_profile_data.known_or(false),
            not_similar_to_current: plan.not_similar_to_current.known_or(false),
            length: plan.length.known().map(|l| PasswordLength {
                min: l.min.known_or_default(),
                max: l.max.known_or_default(),
            }),
            history: plan.history.known().map(|h| PasswordHistory {
                count: h.count.known_or_default(),
                retention_days: h.retention_days.known_or_default(),
            }),
            lockout: plan.lockout.known().map(|l| PasswordLockout {
                failure_count: l.failure_count.known_or_default(),
                duration_seconds: l.duration_seconds.known_or_default(),
            }),
            min_characters: plan
                .min_characters
                .known()
                .map(MinCharactersModel::to_map)
                .filter(|m| !m.is_empty()),
            max_repeated_characters: plan.max_repeated_characters.known().copied(),
            min_age_days: plan.min_age_days.known().copied(),
            max_age_days: plan.max_age_days.known().copied(),
            default: false,
        }
    }

    fn project(policy: PasswordPolicy, mut model: PasswordPolicyModel) -> PasswordPolicyModel {
        model.id = policy.id.into();
        model.name = AttrValue::Known(policy.name);
        model.description = policy.description.into();
        model.exclude_commonly_used_passwords = AttrValue::Known(policy.exclude_commonly_used_passwords);
        model.exclude_profile_data = AttrValue::Known(policy.exclude_profile_data);
        model.not_similar_to_current = AttrValue::Known(policy.not_similar_to_current);
        model.length = policy
            .length
            .map(|l| LengthModel {
                min: AttrValue::Known(l.min),
                max: AttrValue::Known(l.max),
            })
            .into();
        model.history = policy
            .history
            .map(|h| HistoryModel {
                count: AttrValue::Known(h.count),
                retention_days: AttrValue::Known(h.retention_days),
            })
            .into();
        model.lockout = policy
            .lockout
            .map(|l| LockoutModel {
                failure_count: AttrValue::Known(l.failure_count),
                duration_seconds: AttrValue::Known(l.duration_seconds),
            })
            .into();
        model.min_characters = policy.min_characters.as_ref().map(MinCharactersModel::from_map).into();
        model.max_repeated_characters = policy.max_repeated_characters.into();
        model.min_age_days = policy.min_age_days.into();
        model.max_age_days = policy.max_age_days.into();
        model.environment_default = AttrValue::Known(policy.default);
        model
    }

    fn check_ranges(plan: &PasswordPolicyModel, diags: &mut Diagnostics) -> Option<()> {
        let mut valid = true;
        if let Some(length) = plan.length.known()
            && let (Some(min), Some(max)) = (length.min.known(), length.max.known())
            && min > max
        {
            diags.attribute_error(
                "length.min",
                "Invalid password length",
                format!("Minimum length {min} exceeds the maximum length {max}."),
            );
            valid = false;
        }
        if let (Some(min), Some(max)) = (plan.min_age_days.known(), plan.max_age_days.known())
            && min >= max
        {
            diags.attribute_error(
                "min_age_days",
                "Invalid password age",
                format!("Minimum age {min} days must be less than the maximum age {max} days."),
            );
            valid = false;
        }
        valid.then_some(())
    }
}

impl Reconciler for PasswordPolicyReconciler {
    type Model = PasswordPolicyModel;

    fn type_name(&self) -> &'static str {
        "pingone_password_policy"
    }

    fn schema(&self) -> Schema {
        let length = Schema::new("Password length bounds.")
            .attribute(Attribute::int("min").required().validate(IntBetween(8, 255)))
            .attribute(Attribute::int("max").required().validate(IntBetween(8, 255)));
        let history = Schema::new("Reuse prevention.")
            .attribute(Attribute::int("count").required().validate(IntBetween(2, 20)))
            .attribute(Attribute::int("retention_days").required().validate(IntBetween(1, 365)));
        let lockout = Schema::new("Lockout after repeated failures.")
            .attribute(Attribute::int("failure_count").required().validate(IntAtLeast(1)))
            .attribute(Attribute::int("duration_seconds").required().validate(IntAtLeast(1)));
        let min_characters = Schema::new("Required characters per class.")
            .attribute(Attribute::int("alphabetical_uppercase").optional().validate(IntAtLeast(1)))
            .attribute(Attribute::int("alphabetical_lowercase").optional().validate(IntAtLeast(1)))
            .attribute(Attribute::int("numeric").optional().validate(IntAtLeast(1)))
            .attribute(Attribute::int("special_characters").optional().validate(IntAtLeast(1)));

        Schema::new("Manages a password policy.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(Attribute::string("name").required().validate(LengthAtLeast(1)))
            .attribute(Attribute::string("description").optional())
            .attribute(Attribute::bool("exclude_commonly_used_passwords").optional_computed())
            .attribute(Attribute::bool("exclude_profile_data").optional_computed())
            .attribute(Attribute::bool("not_similar_to_current").optional_computed())
            .attribute(Attribute::block("length", length).optional())
            .attribute(Attribute::block("history", history).optional())
            .attribute(Attribute::block("lockout", lockout).optional())
            .attribute(Attribute::block("min_characters", min_characters).optional())
            .attribute(Attribute::int("max_repeated_characters").optional().validate(IntBetween(1, 50)))
            .attribute(Attribute::int("min_age_days").optional().validate(IntAtLeast(0)))
            .attribute(Attribute::int("max_age_days").optional().validate(IntAtLeast(1)))
            .attribute(
                Attribute::bool("environment_default")
                    .computed()
                    .describe("Whether this is the environment's default policy."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("password_policy_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: PasswordPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<PasswordPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        Self::check_ranges(&plan, diags)?;
        let body = Self::expand(&plan);
        let created: PasswordPolicy = api
            .invoke("CreatePasswordPolicy", env, NotFound::Error, diags, |c| {
                c.create(&paths::password_policies(env), &body)
            })
            .found()?;
        require(created.id.as_ref(), "CreatePasswordPolicy", "password policy ID", diags)?;
        Some(Self::project(created, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: PasswordPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<PasswordPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let policy: PasswordPolicy = api
            .invoke("ReadOnePasswordPolicy", env, NotFound::Warn, diags, |c| {
                c.get(&paths::password_policy(env, id))
            })
            .found()?;
        Some(Self::project(policy, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: PasswordPolicyModel,
        prior: PasswordPolicyModel,
        diags: &mut Diagnostics,
    ) -> Option<PasswordPolicyModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        Self::check_ranges(&plan, diags)?;
        let body = Self::expand(&plan);
        let updated: PasswordPolicy = api
            .invoke(
                "UpdatePasswordPolicy",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.update(&paths::password_policy(env, id), &body),
            )
            .found()?;
        Some(Self::project(updated, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: PasswordPolicyModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(id)) = (state.environment_id.as_str(), state.id.as_str()) else {
            return;
        };
        if state.environment_default.known_or(false) {
            diags.warning(
                "Default password policy left in place",
                format!("Password policy {id} is the environment default and cannot be deleted; it has been removed from state only."),
            );
            return;
        }
        api.delete("DeletePasswordPolicy", env, &paths::password_policy(env, id), diags);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    fn plan(fx: &Fixture) -> PasswordPolicyModel {
        PasswordPolicyModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            name: AttrValue::Known("Strict".into()),
            exclude_commonly_used_passwords: AttrValue::Known(true),
            length: AttrValue::Known(LengthModel {
                min: AttrValue::Known(12),
                max: AttrValue::Known(64),
            }),
            lockout: AttrValue::Known(LockoutModel {
                failure_count: AttrValue::Known(5),
                duration_seconds: AttrValue::Known(900),
            }),
            min_characters: AttrValue::Known(MinCharactersModel {
                numeric: AttrValue::Known(1),
                special_characters: AttrValue::Known(2),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[test]
    fn test_character_classes_on_the_wire() {
        let fx = Fixture::new();
        let r = PasswordPolicyReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        let stored = fx
            .mock
            .get(&paths::password_policy(&fx.env, created.id.as_str().unwrap()))
            .unwrap();
        assert_eq!(stored["minCharacters"][NUMERIC], json!(1));
        assert_eq!(stored["minCharacters"][SPECIAL], json!(2));
        assert!(stored["minCharacters"].get(UPPERCASE).is_none());

        assert_eq!(created.environment_default, AttrValue::Known(false));
        assert_eq!(r.read(&ctx, created.clone(), &mut diags).unwrap(), created);
        assert_eq!(r.update(&ctx, created.clone(), created.clone(), &mut diags).unwrap(), created);
    }

    #[test]
    fn test_length_bounds_are_checked() {
        let fx = Fixture::new();
        let r = PasswordPolicyReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        let mut inverted = plan(&fx);
        inverted.length = AttrValue::Known(LengthModel {
            min: AttrValue::Known(30),
            max: AttrValue::Known(20),
        });
        assert!(r.create(&ctx, inverted, &mut diags).is_none());
        assert_eq!(diags.errors().next().unwrap().attribute.as_deref(), Some("length.min"));
        assert!(fx.mock.requests().is_empty());
    }

    #[test]
    fn test_default_policy_survives_destroy() {
        let fx = Fixture::new();
        let r = PasswordPolicyReconciler::new(fx.client.clone());
        let id = fx.mock.insert(
            &paths::password_policies(&fx.env),
            json!({"name": "Standard", "default": true}),
        );
        let (ctx, mut diags) = fx.call();

        let stub = PasswordPolicyModel {
            id: AttrValue::Known(id.clone()),
            environment_id: AttrValue::Known(fx.env.clone()),
            ..Default::default()
        };
        let state = r.read(&ctx, stub, &mut diags).unwrap();
        assert_eq!(state.environment_default, AttrValue::Known(true));
        r.delete(&ctx, state, &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(fx.mock.get(&paths::password_policy(&fx.env, &id)).is_some());
    }
}
