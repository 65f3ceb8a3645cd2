//! `pingone_system_application`: the built-in portal and self-service apps.
//!
//! These exist in every environment and cannot be created or deleted. The
//! reconciler adopts the one of the configured type and manages its
//! `enabled` flag; destroy leaves the application in place.

use super::{environment_id, known};
use crate::api::{Api, NotFound};
use crate::lookup::fetch_application_by_type;
use declarative::validators::OneOf;
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{Application, TYPE_PORTAL, TYPE_SELF_SERVICE};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

const SYSTEM_TYPES: &[&str] = &[TYPE_PORTAL, TYPE_SELF_SERVICE];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SystemApplicationModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    #[serde(rename = "type")]
    pub application_type: AttrValue<String>,
    pub name: AttrValue<String>,
    pub enabled: AttrValue<bool>,
}

pub struct SystemApplicationReconciler {
    client: Arc<Client>,
}

impl SystemApplicationReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn project(app: Application, mut model: SystemApplicationModel) -> SystemApplicationModel {
        model.id = app.id.into();
        model.application_type = AttrValue::Known(app.application_type);
        model.name = AttrValue::Known(app.name);
        model.enabled = AttrValue::Known(app.enabled);
        model
    }

    /// Write the enabled flag, sending the application back otherwise unchanged
    fn set_enabled(
        api: &Api<'_>,
        env: &str,
        mut app: Application,
        enabled: bool,
        diags: &mut Diagnostics,
    ) -> Option<Application> {
        let id = app.id.clone()?;
        if app.enabled == enabled {
            return Some(app);
        }
        app.enabled = enabled;
        api.invoke(
            "UpdateApplication",
            env,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
            |c| c.update(&paths::application(env, &id), &app),
        )
        .found()
    }
}

impl Reconciler for SystemApplicationReconciler {
    type Model = SystemApplicationModel;

    fn type_name(&self) -> &'static str {
        "pingone_system_application"
    }

    fn schema(&self) -> Schema {
        Schema::new("Manages the built-in application portal or self-service application.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(
                Attribute::string("type")
                    .required()
                    .force_new()
                    .validate(OneOf(SYSTEM_TYPES)),
            )
            .attribute(Attribute::string("name").computed())
            .attribute(Attribute::bool("enabled").required())
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::environment_child("application_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: SystemApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<SystemApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_type = known(&plan.application_type, "type", diags)?;
        let existing = fetch_application_by_type(&api, env, application_type, false, diags)?;
        log::info!(
            "Adopting {} application {}",
            existing.kind(),
            existing.id.as_deref().unwrap_or_default()
        );
        let app = Self::set_enabled(&api, env, existing, plan.enabled.known_or(false), diags)?;
        Some(Self::project(app, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: SystemApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<SystemApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let app: Application = api
            .invoke("ReadOneApplication", env, NotFound::Warn, diags, |c| {
                c.get(&paths::application(env, id))
            })
            .found()?;
        if !app.kind().is_system() {
            diags.attribute_error(
                "id",
                "Not a system application",
                format!("Application {id} is a {} application; manage it with pingone_application.", app.kind()),
            );
            return None;
        }
        Some(Self::project(app, state))
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: SystemApplicationModel,
        prior: SystemApplicationModel,
        diags: &mut Diagnostics,
    ) -> Option<SystemApplicationModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let current: Application = api
            .invoke(
                "ReadOneApplication",
                env,
                NotFound::ErrorUnlessEnvironmentGone,
                diags,
                |c| c.get(&paths::application(env, id)),
            )
            .found()?;
        let app = Self::set_enabled(&api, env, current, plan.enabled.known_or(false), diags)?;
        Some(Self::project(app, plan))
    }

    fn delete(&self, _ctx: &ApplyContext, state: SystemApplicationModel, diags: &mut Diagnostics) {
        diags.warning(
            "System application left in place",
            format!(
                "{} applications cannot be deleted; {} has been removed from state only.",
                state.application_type.as_str().unwrap_or("System"),
                state.id.as_str().unwrap_or("the application")
            ),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;
    use declarative::erase;
    use pingone::Method;

    fn plan(fx: &Fixture, enabled: bool) -> SystemApplicationModel {
        SystemApplicationModel {
            environment_id: AttrValue::Known(fx.env.clone()),
            application_type: AttrValue::Known(TYPE_PORTAL.into()),
            enabled: AttrValue::Known(enabled),
            ..Default::default()
        }
    }

    #[test]
    fn test_adopts_and_toggles() {
        let fx = Fixture::new();
        let r = SystemApplicationReconciler::new(fx.client.clone());
        let portal = fx.mock.seed_system_application(&fx.env, TYPE_PORTAL);
        let (ctx, mut diags) = fx.call();

        let adopted = r.create(&ctx, plan(&fx, true), &mut diags).unwrap();
        assert!(diags.is_empty(), "{diags}");
        assert_eq!(adopted.id.as_str(), Some(portal.as_str()));
        assert_eq!(adopted.enabled, AttrValue::Known(true));
        assert_eq!(fx.mock.count(Method::Post, &paths::applications(&fx.env)), 0);

        let same = r.update(&ctx, adopted.clone(), adopted.clone(), &mut diags).unwrap();
        assert_eq!(same, adopted);
        assert_eq!(fx.mock.count(Method::Put, &paths::application(&fx.env, &portal)), 1);
    }

    #[test]
    fn test_missing_system_application() {
        let fx = Fixture::new();
        let r = SystemApplicationReconciler::new(fx.client.clone());
        let (ctx, mut diags) = fx.call();

        assert!(r.create(&ctx, plan(&fx, true), &mut diags).is_none());
        assert!(diags.has_error());
    }

    #[test]
    fn test_delete_leaves_application() {
        let fx = Fixture::new();
        let r = SystemApplicationReconciler::new(fx.client.clone());
        let portal = fx.mock.seed_system_application(&fx.env, TYPE_PORTAL);
        let (ctx, mut diags) = fx.call();

        let adopted = r.create(&ctx, plan(&fx, false), &mut diags).unwrap();
        r.delete(&ctx, adopted, &mut diags);
        assert_eq!(diags.warning_count(), 1);
        assert!(fx.mock.get(&paths::application(&fx.env, &portal)).is_some());
    }

    #[test]
    fn test_import_rejects_regular_application() {
        let fx = Fixture::new();
        let r = erase(SystemApplicationReconciler::new(fx.client.clone()));
        let app = fx.oidc_application("Storefront");
        let (ctx, mut diags) = fx.call();

        assert!(r.import_state(&ctx, &format!("{}/{app}", fx.env), &mut diags).is_none());
        assert!(diags.mentions("pingone_application"));
    }
}
