//! `pingone_application_resource_grant`: scopes of one resource granted to
//! an application.
//!
//! Every granted scope must belong to the granted resource; all offending
//! scopes are reported together before anything is written. The built-in
//! portal and self-service applications hold at most one grant per
//! resource, so creating a grant for them replaces an existing one in
//! place. The admin console takes no grants at all.

use super::{environment_id, known, parent_id};
use crate::api::{Api, NotFound, require};
use crate::lookup::{
    fetch_application, fetch_resource_by_type, fetch_resource_from_id,
    fetch_resource_scopes_from_ids,
};
use declarative::validators::{ConflictsIfSiblingEquals, OneOf, RequiredIfSiblingEquals, UuidShape};
use declarative::{
    ApplyContext, AttrValue, Attribute, Diagnostics, ImportIdentifier, Reconciler, Schema,
};
use pingone::models::{Application, ApplicationKind, ApplicationResourceGrant, Resource, ResourceType};
use pingone::{Client, paths};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationResourceGrantModel {
    pub id: AttrValue<String>,
    pub environment_id: AttrValue<String>,
    pub application_id: AttrValue<String>,
    pub resource_type: AttrValue<String>,
    pub custom_resource_id: AttrValue<String>,
    pub resource_id: AttrValue<String>,
    pub scopes: AttrValue<BTreeSet<String>>,
}

pub struct ApplicationResourceGrantReconciler {
    client: Arc<Client>,
}

/// Grant body resolved and validated against the live resource and application
struct Resolved {
    resource_id: String,
    kind: ApplicationKind,
    body: ApplicationResourceGrant,
}

impl ApplicationResourceGrantReconciler {
    pub fn new(client: Arc<Client>) -> Self {
        Self { client }
    }

    fn project(
        grant: ApplicationResourceGrant,
        mut model: ApplicationResourceGrantModel,
    ) -> ApplicationResourceGrantModel {
        model.id = grant.id.clone().into();
        model.resource_id = AttrValue::Known(grant.resource.id.clone());
        model.scopes = AttrValue::Known(grant.scope_ids().into_iter().collect());
        if let Some(application) = grant.application {
            model.application_id = AttrValue::Known(application.id);
        }
        model
    }

    /// The granted resource: by ID for custom resources, by type for the built-in ones
    fn resolve_resource(
        api: &Api<'_>,
        env: &str,
        plan: &ApplicationResourceGrantModel,
        diags: &mut Diagnostics,
    ) -> Option<Resource> {
        let raw_type = known(&plan.resource_type, "resource_type", diags)?;
        let Some(resource_type) = ResourceType::parse(raw_type) else {
            diags.attribute_error(
                "resource_type",
                "Invalid resource type",
                format!("\"{raw_type}\" is not one of {}.", ResourceType::ALL.join(", ")),
            );
            return None;
        };

        if resource_type != ResourceType::Custom {
            return fetch_resource_by_type(api, env, resource_type, false, diags);
        }
        let custom_id = known(&plan.custom_resource_id, "custom_resource_id", diags)?;
        let resource = fetch_resource_from_id(api, env, custom_id, false, diags)?;
        if resource.resource_type != Some(ResourceType::Custom) {
            diags.attribute_error(
                "custom_resource_id",
                "Invalid resource type",
                format!(
                    "Resource {custom_id} is of type {}; set resource_type accordingly instead of custom_resource_id.",
                    resource.resource_type.map_or("unknown", |t| t.as_str())
                ),
            );
            return None;
        }
        Some(resource)
    }

    /// Steps shared by create and update; nothing is written until all pass
    fn resolve(
        api: &Api<'_>,
        env: &str,
        plan: &ApplicationResourceGrantModel,
        diags: &mut Diagnostics,
    ) -> Option<Resolved> {
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let resource = Self::resolve_resource(api, env, plan, diags)?;
        let resource_id = require(resource.id, "ReadOneResource", "resource ID", diags)?;

        let wanted = plan.scopes.known().cloned().unwrap_or_default();
        let scopes = fetch_resource_scopes_from_ids(api, env, &resource_id, &wanted, diags)?;
        let scope_ids: Vec<String> = scopes.into_iter().filter_map(|s| s.id).collect();

        let application = fetch_application(api, env, application_id, false, diags)?;
        Self::check_application(&application, application_id, diags)?;

        Some(Resolved {
            body: ApplicationResourceGrant::new(&resource_id, &scope_ids),
            kind: application.kind(),
            resource_id,
        })
    }

    fn check_application(application: &Application, id: &str, diags: &mut Diagnostics) -> Option<()> {
        if application.kind() == ApplicationKind::AdminConsole {
            diags.attribute_error(
                "application_id",
                "Unmappable application type",
                format!("Application {id} is the {}, which cannot be granted resource access.", application.kind()),
            );
            return None;
        }
        Some(())
    }

    /// The grant a system application already holds for the resource
    fn existing_grant(
        api: &Api<'_>,
        env: &str,
        application_id: &str,
        resource_id: &str,
        diags: &mut Diagnostics,
    ) -> Option<Option<String>> {
        let grants: Vec<ApplicationResourceGrant> = api
            .invoke("ReadAllApplicationGrants", env, NotFound::Error, diags, |c| {
                c.list(&paths::application_grants(env, application_id))
            })
            .found()?;
        Some(
            grants
                .into_iter()
                .find(|g| g.resource.id == resource_id)
                .and_then(|g| g.id),
        )
    }

    fn put(
        api: &Api<'_>,
        env: &str,
        application_id: &str,
        id: &str,
        body: &ApplicationResourceGrant,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationResourceGrant> {
        api.invoke(
            "UpdateApplicationGrant",
            env,
            NotFound::ErrorUnlessEnvironmentGone,
            diags,
            |c| c.update(&paths::application_grant(env, application_id, id), body),
        )
        .found()
    }
}

impl Reconciler for ApplicationResourceGrantReconciler {
    type Model = ApplicationResourceGrantModel;

    fn type_name(&self) -> &'static str {
        "pingone_application_resource_grant"
    }

    fn schema(&self) -> Schema {
        Schema::new("Grants an application access to scopes of one resource.")
            .attribute(Attribute::id())
            .attribute(environment_id())
            .attribute(parent_id("application_id", "The ID of the application receiving the grant."))
            .attribute(
                Attribute::string("resource_type")
                    .required()
                    .force_new()
                    .validate(OneOf(&ResourceType::ALL)),
            )
            .attribute(
                Attribute::string("custom_resource_id")
                    .optional()
                    .force_new()
                    .validate(UuidShape)
                    .validate(RequiredIfSiblingEquals {
                        sibling: "resource_type",
                        values: &["CUSTOM"],
                    })
                    .validate(ConflictsIfSiblingEquals {
                        sibling: "resource_type",
                        values: &["OPENID_CONNECT", "PINGONE_API"],
                    })
                    .describe("The custom resource to grant; only with resource_type CUSTOM."),
            )
            .attribute(
                Attribute::string("resource_id")
                    .computed()
                    .describe("The ID of the granted resource, resolved from the type for built-in resources."),
            )
            .attribute(
                Attribute::string_set("scopes")
                    .required()
                    .validate(UuidShape)
                    .describe("IDs of the granted scopes; each must belong to the granted resource."),
            )
    }

    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::nested("application_id", "application_resource_grant_id")
    }

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationResourceGrantModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationResourceGrantModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let resolved = Self::resolve(&api, env, &plan, diags)?;

        let target = if resolved.kind.is_system() {
            Self::existing_grant(&api, env, application_id, &resolved.resource_id, diags)?
        } else {
            None
        };
        let grant = match target {
            Some(id) => {
                log::info!(
                    "{} application {application_id} already has grant {id} for resource {}; replacing it",
                    resolved.kind,
                    resolved.resource_id
                );
                Self::put(&api, env, application_id, &id, &resolved.body, diags)?
            }
            None => {
                let created: ApplicationResourceGrant = api
                    .invoke("CreateApplicationGrant", env, NotFound::Error, diags, |c| {
                        c.create(&paths::application_grants(env, application_id), &resolved.body)
                    })
                    .found()?;
                require(created.id.as_ref(), "CreateApplicationGrant", "grant ID", diags)?;
                created
            }
        };
        Some(Self::project(grant, plan))
    }

    fn read(
        &self,
        ctx: &ApplyContext,
        state: ApplicationResourceGrantModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationResourceGrantModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&state.environment_id, "environment_id", diags)?.to_string();
        let application_id = known(&state.application_id, "application_id", diags)?;
        let id = known(&state.id, "id", diags)?;
        let grant: ApplicationResourceGrant = api
            .invoke("ReadOneApplicationGrant", &env, NotFound::Warn, diags, |c| {
                c.get(&paths::application_grant(&env, application_id, id))
            })
            .found()?;

        let mut model = Self::project(grant, state);
        if model.resource_type.is_null() {
            // imported: derive the resource selector from the granted resource
            let resource_id = model.resource_id.known_or_default();
            let resource = fetch_resource_from_id(&api, &env, &resource_id, true, diags)?;
            let resource_type = resource.resource_type.unwrap_or(ResourceType::Custom);
            model.resource_type = AttrValue::Known(resource_type.as_str().to_string());
            if resource_type == ResourceType::Custom {
                model.custom_resource_id = AttrValue::Known(resource_id);
            }
        }
        Some(model)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: ApplicationResourceGrantModel,
        prior: ApplicationResourceGrantModel,
        diags: &mut Diagnostics,
    ) -> Option<ApplicationResourceGrantModel> {
        let api = Api::new(&self.client, ctx);
        let env = known(&plan.environment_id, "environment_id", diags)?;
        let application_id = known(&plan.application_id, "application_id", diags)?;
        let id = known(&prior.id, "id", diags)?;
        let resolved = Self::resolve(&api, env, &plan, diags)?;
        let grant = Self::put(&api, env, application_id, id, &resolved.body, diags)?;
        Some(Self::project(grant, plan))
    }

    fn delete(&self, ctx: &ApplyContext, state: ApplicationResourceGrantModel, diags: &mut Diagnostics) {
        let api = Api::new(&self.client, ctx);
        let (Some(env), Some(application_id), Some(id)) = (
            state.environment_id.as_str(),
            state.application_id.as_str(),
            state.id.as_str(),
        ) else {
            return;
        };
        api.delete(
            "DeleteApplicationGrant",
            env,
            &paths::application_grant(env, application_id, id),
            diags,
        );
    }
}
