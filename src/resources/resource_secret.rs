//! `pingone_resource_secret`: the client secret of a custom resource.
//!
//! The service generates secrets; this reconciler only adopts and rotates
//! them. Rotation happens when the content of `regenerate_trigger_values`
//! changes, compared by digest so that key order and an empty map versus an
//! unset one never cause a spurious rotation. The outgoing secret is kept as
//! `previous` until `previous.expires_at` when an expiry is configured.

use super::{environment_id, known, parent_id};
use crate::api::{Api, NotFound};
use crate::lookup::fetch_resource_from_id;
use crate::validators::Rfc3339Timestamp;
use chrono::{DateTime, SecondsFormat, Utc};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportComponent, ImportIdentifier, Reconciler,
    Schema,
};
use pingone::models::{PreviousExpiry, RegenerateSecret, ResourceSecret, ResourceType};
use pingone::{Client, SECRET_REGENERATE_CONTENT_TYPE, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviousSecretModel {
    pub secret: AttrValue<String>,
    pub expires_at: AttrValue<String>,
    pub last_used: AttrValue<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceSecretModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub resource_id: AttrValue<String>,
    pub secret: AttrValue<String>,
    pub previous: AttrValue<PreviousSecretModel>,
    pub regenerate_trigger_values: AttrValue<BTreeMap<String, String>>,
    pub created_at: AttrValue<String>,
}

/// Content digest of a trigger map; `None` for an unset or empty map
fn trigger_digest(triggers: &AttrValue<BTreeMap<String, String>>) -> Option<String> {
    let map = triggers.known().filter(|m| !m.is_empty())?;
    let mut hasher = blake3::Hasher::new();
    for (key, value) in map {
        // length prefixes keep ("ab","c") and ("a","bc") apart
        hasher.update(&(key.len() as u64).to_le_bytes());
        hasher.update(key.as_bytes());
        hasher.update(&(value.len() as u64).to_le_bytes());
        hasher.update(value.as_bytes());
    }
    Some(hasher.finalize().to_hex().to_string())
}

fn triggers_changed(plan: &ResourceSecretModel, prior: &ResourceSecretModel) -> bool {
    plan.regenerate_trigger_values.is_unknown()
        || trigger_digest(&plan.regenerate_trigger_values)
            != trigger_digest(&prior.regenerate_trigger_values)
}

fn timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Configured expiry of the outgoing secret, if any
fn configured_expiry(model: &ResourceSecretModel) -> Option<&str> {
    model.previous.known().and_then(|p| p.expires_at.as_str())
}

pub struct ResourceSecretReconciler {
    client: Arc<Client>,
}

impl ResourceSecretReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn project(secret: ResourceSecret, mut model: ResourceSecretModel) -> ResourceSecretModel {
        model.id = model.resource_id.clone();
        model.secret = AttrValue::Known(secret.secret);
        model.created_at = secret.created_at.map(timestamp).into();

        let configured = configured_expiry(&model).map(str::to_string);
        model.previous = match secret.previous {
            Some(previous) => {
                // keep the configured spelling when it names the same instant
                let expires_at = configured
                    .filter(|c| {
                        DateTime::parse_from_rfc3339(c)
                            .is_ok_and(|c| c.with_timezone(&Utc) == previous.expires_at)
                    })
                    .unwrap_or_else(|| timestamp(previous.expires_at));
                AttrValue::Known(PreviousSecretModel {
                    secret: AttrValue::Known(previous.secret),
                    expires_at: AttrValue::Known(expires_at),
                    last_used: previous.last_used.map(timestamp).into(),
                })
            }
            None => AttrValue::Null,
        };
        model
    }

    fn check_parent(api: &Api<'_>, env: &str, resource_id: &str, diags: &mut Diagnostics) -> Option<()> {
        let resource = fetch_resource_from_id(api, env, resource_id, false, diags)?;
        if resource.resource_type == Some(ResourceType::Custom) {
            return Some(());
        }
        diags.attribute_error(
            "resource_id",
            "Invalid resource type",
            format!(
                "Resource {resource_id} is of type {}. Only CUSTOM resources have a secret.",
                resource.resource_type.map_or("unknown", |t| t.as_str())
            ),
        );
        None
    }

    fn fetch(
        api: &Api<'_>,
        env: &str,
        resource_id: &str,
        not_found: NotFound,
        diags: &mut Diagnostics,
    ) -> Option<ResourceSecret> {
        api.invoke("ReadResourceSecret", env, not_found, diags, |c| {
            c.get(&paths::resource_secret(env, resource_id))
        })
        .found()
    }

    fn regenerate(
        api: &Api<'_>,
        env: &str,
        resource_id: &str,
        plan: &ResourceSecretModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceSecret> {
        let previous = match configured_expiry(plan) {
            Some(raw) => match DateTime::parse_from_rfc3339(raw) {
                Ok(expires_at) => Some(PreviousExpiry {
                    expires_at: expires_at.with_timezone(&Utc),
                }),
                Err(e) => {
                    diags.attribute_error(
                        "previous.expires_at",
                        "Invalid timestamp",
                        format!("\"{raw}\" is not an RFC 3339 timestamp: {e}"),
                    );
                    return None;
                }
            },
            None => None,
        };
        let body = RegenerateSecret { previous };
        log::info!("Regenerating secret of resource {resource_id}");
        api.invoke(
            "CreateResourceSecret",
            env,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
            |c| {
                c.post_action(
                    &paths::resource_secret(env, resource_id),
                    &body,
                    SECRET_REGENERATE_CONTENT_TYPE,
                )
            },
        )
        .found()
    }
}

impl Reconciler for ResourceSecretReconciler {
    type Model = ResourceSecretModel;

    fn type_name(&self) -> &'static str {
        "pingone_resource_secret"
    }

    fn schema(&self) -> Schema {
        let previous = Schema::new("The outgoing secret, kept after a rotation.")
            .attribute(Attribute::string("secret").computed().sensitive())
            .attribute(
                Attribute::string("expires_at")
                    .optional()
                    .validate(Rfc3339Timestamp)
                    .describe("When the outgoing secret stops being accepted. Set before rotating."),
            )
            .attribute(Attribute::string("last_used").computed());

        Schema::new("Manages the secret of a custom resource.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("resource_id", "The ID of the custom resource."))
            .attribute(Attribute::string("secret").computed().sensitive())
            .attribute(Attribute::block("previous", previous).optional_computed())
            .attribute(
                Attribute::string_map("regenerate_trigger_values")
                    .optional()
                    .describe("Arbitrary key/value pairs; any change regenerates the secret."),
            )
            .attribute(Attribute::string("created_at").computed())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::new(vec![
            ImportComponent::uuid("environment_id"),
            ImportComponent::uuid("resource_id"),
        ])
    }

    fn modify_plan(&self, plan: &mut ResourceSecretModel, prior: &ResourceSecretModel) {
        if prior.id.is_null() || triggers_changed(plan, prior) {
            plan.secret = AttrValue::Unknown;
            plan.created_at = AttrValue::Unknown;
            let expiry = configured_expiry(plan).map(str::to_string);
            plan.previous = match expiry {
                Some(expires_at) if prior.id.is_known() => AttrValue::Known(PreviousSecretModel {
                    secret: AttrValue::Unknown,
                    expires_at: AttrValue::Known(expires_at),
                    last_used: AttrValue::Unknown,
                }),
                _ => AttrValue::Unknown,
            };
            return;
        }
        plan.secret = prior.secret.clone();
        plan.created_at = prior.created_at.clone();
        plan.previous = prior.previous.clone();
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ResourceSecretModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceSecretModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;
        Self::check_parent(&api, env, resource_id, diags)?;

        // the service issues a secret with the resource; adopt it as is
        let secret = Self::fetch(&api, env, resource_id, NotFound::Error, diags)?;
        Some(Self::project(secret, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ResourceSecretModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceSecretModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let resource_id = known(&state.resource_id, "resource_id", diags)?;
        let secret = Self::fetch(&api, env, resource_id, NotFound::Warn, diags)?;
        Some(Self::project(secret, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ResourceSecretModel,
        prior: ResourceSecretModel,
        diags: &mut Diagnostics,
    ) -> Option<ResourceSecretModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let resource_id = known(&plan.resource_id, "resource_id", diags)?;

        let secret = if triggers_changed(&plan, &prior) {
            Self::regenerate(&api, env, resource_id, &plan, diags)?
        } else {
            Self::fetch(&api, env, resource_id, NotFound::ErrorUnlessEnvironmentGone, diags)?
        };
        Some(Self::project(secret, plan))
    }

    fn delete(&self, _ctx: &ApplyContext, state: ResourceSecretModel, _diags: &mut Diagnostics) {
        // a resource always has a secret; it goes away with the resource
        log::info!(
            "Removing secret of resource {} from state; the secret stays valid",
            state.resource_id.as_str().unwrap_or("<unknown>")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use pingone::Method;

    fn plan(fx: &Fixture, resource_id: &str) -> ResourceSecretModel {
        ResourceSecretModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            resource_id: AttrValue::Known(resource_id.into()),
            ..Default::default()
        }
    }

    fn triggers(pairs: &[(&str, &str)]) -> AttrValue<BTreeMap<String, String>> {
        AttrValue::Known(
            pairs
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_trigger_digest() {
        assert_eq!(trigger_digest(&AttrValue::Null), None);
        assert_eq!(trigger_digest(&triggers(&[])), None);
        assert_eq!(
            trigger_digest(&triggers(&[("a", "1"), ("b", "2")])),
            trigger_digest(&triggers(&[("b", "2"), ("a", "1")]))
        );
        assert_ne!(
            trigger_digest(&triggers(&[("ab", "c")])),
            trigger_digest(&triggers(&[("a", "bc")]))
        );
    }

    #[test]
    fn test_rotation_keeps_previous_secret() {
        let fx = Fixture::new();
        let r = ResourceSecretReconciler::new(fx.client.clone());
        let resource = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();

        let mut first = plan(&fx, &resource);
        first.regenerate_trigger_values = triggers(&[]);
        let created = r.create(&ctx, first, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        let original = created.secret.known_or_default();
        assert!(original.starts_with("mock-secret-"));
        assert!(created.previous.is_null());
        assert_eq!(created.id.as_str(), Some(resource.as_str()));

        let mut second = created.clone();
        second.regenerate_trigger_values = triggers(&[("triggerA", "v1")]);
        second.previous = AttrValue::Known(PreviousSecretModel {
            expires_at: AttrValue::Known("2026-10-18T12:00:00Z".into()),
            ..Default::default()
        });
        r.modify_plan(&mut second, &created);
        assert!(second.secret.is_unknown());

        let rotated = r.update(&ctx, second, created, &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_ne!(rotated.secret.known_or_default(), original);
        let previous = rotated.previous.known().unwrap();
        assert_eq!(previous.secret.as_str(), Some(original.as_str()));
        assert_eq!(previous.expires_at.as_str(), Some("2026-10-18T12:00:00Z"));
        assert_eq!(
            fx.mock.count(Method::Post, &paths::resource_secret(&fx.env, &resource)),
            1
        );
    }

    #[test]
    fn test_unchanged_triggers_keep_secret() {
        let fx = Fixture::new();
        let r = ResourceSecretReconciler::new(fx.client.clone());
        let resource = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();

        let mut first = plan(&fx, &resource);
        first.regenerate_trigger_values = triggers(&[("rev", "1")]);
        let created = r.create(&ctx, first, &mut diags).unwrap();

        let mut next = created.clone();
        next.regenerate_trigger_values = triggers(&[("rev", "1")]);
        r.modify_plan(&mut next, &created);
        assert_eq!(next.secret, created.secret);

        let updated = r.update(&ctx, next, created.clone(), &mut diags).unwrap();
        assert_eq!(updated.secret, created.secret);
        assert_eq!(fx.mock.count(Method::Post, &paths::resource_secret(&fx.env, &resource)), 0);
    }

    #[test]
    fn test_rotation_without_expiry_drops_previous() {
        let fx = Fixture::new();
        let r = ResourceSecretReconciler::new(fx.client.clone());
        let resource = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, &resource), &mut diags).unwrap();
        let mut next = created.clone();
        next.regenerate_trigger_values = triggers(&[("rev", "2")]);
        let rotated = r.update(&ctx, next, created.clone(), &mut diags).unwrap();
        assert_ne!(rotated.secret, created.secret);
        assert!(rotated.previous.is_null());
    }

    #[test]
    fn test_builtin_resource_has_no_secret() {
        let fx = Fixture::new();
        let r = ResourceSecretReconciler::new(fx.client.clone());
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, plan(&fx, &openid), &mut diags).is_none());
        assert!(diags.mentions("Only CUSTOM resources"));
    }

    #[test]
    fn test_import_by_resource() {
        let fx = Fixture::new();
        let r = erase(ResourceSecretReconciler::new(fx.client.clone()));
        let resource = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();

        let imported = r
            .import_state(&ctx, &format!("{}/{resource}", fx.env), &mut diags)
            .unwrap();
        assert_eq!(imported["id"], resource.as_str());
        assert!(imported["secret"].as_str().unwrap().starts_with("mock-secret-"));
        assert!(imported["regenerate_trigger_values"].is_null());
    }

    #[test]
    fn test_delete_leaves_secret() {
        let fx = Fixture::new();
        let r = ResourceSecretReconciler::new(fx.client.clone());
        let resource = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();

        let created = r.create(&ctx, plan(&fx, &resource), &mut diags).unwrap();
        fx.mock.clear_requests();
        r.delete(&ctx, created, &mut diags);
        assert!(diags.is_empty());
        assert_eq!(fx.mock.mutations(), 0);
    }
}
