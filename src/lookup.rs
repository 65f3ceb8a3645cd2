//! Lookups of parent and cross-referenced objects.
//!
//! Each helper takes a `warn_if_not_found` flag: `true` turns "not found"
//! into a warning and a `None` result (read and delete paths), `false` into
//! an error (create and update paths).

use crate::api::{Api, NotFound};
use declarative::Diagnostics;
use pingone::models::{Application, Population, Resource, ResourceScope, ResourceType, SignOnPolicy};
use pingone::paths;
use std::collections::{BTreeMap, BTreeSet};

fn policy(warn_if_not_found: bool) -> NotFound {
    if warn_if_not_found {
        NotFound::Warn
    } else {
        NotFound::Error
    }
}

fn missing(warn_if_not_found: bool, summary: &str, detail: String, diags: &mut Diagnostics) {
    if warn_if_not_found {
        diags.warning(summary, detail);
    } else {
        diags.error(summary, detail);
    }
}

/// Fetch a resource by ID with a single GET
pub fn fetch_resource_from_id(
    api: &Api<'_>,
    env: &str,
    id: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Resource> {
    api.invoke("ReadOneResource", env, policy(warn_if_not_found), diags, |c| {
        c.get(&paths::resource(env, id))
    })
    .found()
}

fn list_resources(
    api: &Api<'_>,
    env: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Vec<Resource>> {
    api.invoke("ReadAllResources", env, policy(warn_if_not_found), diags, |c| {
        c.list(&paths::resources(env))
    })
    .found()
}

/// Fetch a resource by name: list the environment's resources and filter
pub fn fetch_resource_from_name(
    api: &Api<'_>,
    env: &str,
    name: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Resource> {
    let resource = list_resources(api, env, warn_if_not_found, diags)?
        .into_iter()
        .find(|r| r.name == name);
    if resource.is_none() {
        missing(
            warn_if_not_found,
            "Cannot find resource",
            format!("No resource named \"{name}\" exists in environment {env}."),
            diags,
        );
    }
    resource
}

/// Fetch the built-in resource of a non-custom type
pub fn fetch_resource_by_type(
    api: &Api<'_>,
    env: &str,
    resource_type: ResourceType,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Resource> {
    let resource = list_resources(api, env, warn_if_not_found, diags)?
        .into_iter()
        .find(|r| r.resource_type == Some(resource_type));
    if resource.is_none() {
        missing(
            warn_if_not_found,
            "Cannot find resource",
            format!("No resource of type {resource_type} exists in environment {env}."),
            diags,
        );
    }
    resource
}

/// Fetch a resource's scopes
pub fn fetch_resource_scopes(
    api: &Api<'_>,
    env: &str,
    resource_id: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Vec<ResourceScope>> {
    api.invoke("ReadAllResourceScopes", env, policy(warn_if_not_found), diags, |c| {
        c.list(&paths::resource_scopes(env, resource_id))
    })
    .found()
}

/// Fetch a scope of a resource by name
pub fn fetch_resource_scope_from_name(
    api: &Api<'_>,
    env: &str,
    resource_id: &str,
    name: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<ResourceScope> {
    let scope = fetch_resource_scopes(api, env, resource_id, warn_if_not_found, diags)?
        .into_iter()
        .find(|s| s.name == name);
    if scope.is_none() {
        missing(
            warn_if_not_found,
            "Cannot find resource scope",
            format!("Resource {resource_id} has no scope named \"{name}\"."),
            diags,
        );
    }
    scope
}

/// Resolve a set of scope IDs and check every one belongs to `resource_id`.
///
/// All offenders are reported in one pass. Scopes missing from the expected
/// resource are searched for in the environment's other resources so the
/// diagnostic can name the resource they actually belong to.
pub fn fetch_resource_scopes_from_ids(
    api: &Api<'_>,
    env: &str,
    resource_id: &str,
    scope_ids: &BTreeSet<String>,
    diags: &mut Diagnostics,
) -> Option<Vec<ResourceScope>> {
    if scope_ids.is_empty() {
        diags.attribute_error(
            "scopes",
            "Invalid scopes",
            "At least one scope must be specified for the grant.",
        );
        return None;
    }

    let owned: BTreeMap<String, ResourceScope> =
        fetch_resource_scopes(api, env, resource_id, false, diags)?
            .into_iter()
            .filter_map(|s| Some((s.id.clone()?, s)))
            .collect();

    let strays: Vec<&String> = scope_ids.iter().filter(|id| !owned.contains_key(*id)).collect();
    if !strays.is_empty() {
        let mut owners: BTreeMap<String, String> = BTreeMap::new();
        for resource in list_resources(api, env, false, diags)? {
            let Some(other_id) = resource.id.filter(|id| id != resource_id) else {
                continue;
            };
            let scopes = fetch_resource_scopes(api, env, &other_id, false, diags)?;
            for scope in scopes {
                if let Some(id) = scope.id {
                    owners.insert(id, other_id.clone());
                }
            }
        }

        for stray in strays {
            let detail = match owners.get(stray) {
                Some(owner) => format!(
                    "Scope {stray} belongs to resource {owner}, not to the granted resource {resource_id}."
                ),
                None => format!(
                    "Scope {stray} does not exist in environment {env}, so it cannot belong to resource {resource_id}."
                ),
            };
            diags.attribute_error("scopes", "Invalid scope", detail);
        }
        return None;
    }

    Some(
        scope_ids
            .iter()
            .filter_map(|id| owned.get(id).cloned())
            .collect(),
    )
}

pub fn fetch_application(
    api: &Api<'_>,
    env: &str,
    id: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Application> {
    api.invoke("ReadOneApplication", env, policy(warn_if_not_found), diags, |c| {
        c.get(&paths::application(env, id))
    })
    .found()
}

/// Fetch the first application of a built-in type, e.g. the portal
pub fn fetch_application_by_type(
    api: &Api<'_>,
    env: &str,
    application_type: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Application> {
    let applications: Vec<Application> = api
        .invoke("ReadAllApplications", env, policy(warn_if_not_found), diags, |c| {
            c.list(&paths::applications(env))
        })
        .found()?;
    let application = applications
        .into_iter()
        .find(|a| a.application_type == application_type);
    if application.is_none() {
        missing(
            warn_if_not_found,
            "Cannot find application",
            format!("No application of type {application_type} exists in environment {env}."),
            diags,
        );
    }
    application
}

pub fn fetch_population(
    api: &Api<'_>,
    env: &str,
    id: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<Population> {
    api.invoke("ReadOnePopulation", env, policy(warn_if_not_found), diags, |c| {
        c.get(&paths::population(env, id))
    })
    .found()
}

pub fn fetch_sign_on_policy(
    api: &Api<'_>,
    env: &str,
    id: &str,
    warn_if_not_found: bool,
    diags: &mut Diagnostics,
) -> Option<SignOnPolicy> {
    api.invoke("ReadOneSignOnPolicy", env, policy(warn_if_not_found), diags, |c| {
        c.get(&paths::sign_on_policy(env, id))
    })
    .found()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Fixture;

    #[test]
    fn test_resource_by_name_and_type() {
        let fx = Fixture::new();
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let custom = fx.custom_resource("orders");
        let (ctx, mut diags) = fx.call();
        let api = fx.api(&ctx);

        let found = fetch_resource_from_name(&api, &fx.env, "orders", false, &mut diags).unwrap();
        assert_eq!(found.id.as_deref(), Some(custom.as_str()));

        let builtin =
            fetch_resource_by_type(&api, &fx.env, ResourceType::OpenidConnect, false, &mut diags)
                .unwrap();
        assert_eq!(builtin.id.as_deref(), Some(openid.as_str()));
        assert!(diags.is_empty());

        assert!(fetch_resource_from_name(&api, &fx.env, "missing", true, &mut diags).is_none());
        assert!(!diags.has_error());
        assert_eq!(diags.warning_count(), 1);
    }

    #[test]
    fn test_scope_membership_reports_every_offender() {
        let fx = Fixture::new();
        let openid = fx.mock.seed_openid_resource(&fx.env);
        let custom = fx.custom_resource("orders");
        let custom_scope = fx.custom_scope(&custom, "orders:read");
        let (ctx, mut diags) = fx.call();
        let api = fx.api(&ctx);

        let email = fetch_resource_scope_from_name(&api, &fx.env, &openid, "email", false, &mut diags)
            .unwrap()
            .id
            .unwrap();
        let bogus = "00000000-0000-4000-8000-00000000ffff".to_string();
        let wanted = BTreeSet::from([email, custom_scope.clone(), bogus.clone()]);

        let out = fetch_resource_scopes_from_ids(&api, &fx.env, &openid, &wanted, &mut diags);
        assert!(out.is_none());
        assert_eq!(diags.error_count(), 2);
        assert!(diags.mentions(&custom_scope));
        assert!(diags.mentions(&custom));
        assert!(diags.mentions(&bogus));
        assert!(diags.mentions("Invalid scope"));
    }

    #[test]
    fn test_empty_scope_set_is_invalid() {
        let fx = Fixture::new();
        let (ctx, mut diags) = fx.call();
        let api = fx.api(&ctx);
        let out = fetch_resource_scopes_from_ids(&api, &fx.env, "r", &BTreeSet::new(), &mut diags);
        assert!(out.is_none());
        assert!(diags.mentions("Invalid scopes"));
    }

    #[test]
    fn test_parent_lookups_follow_warn_flag() {
        let fx = Fixture::new();
        let staff = fx.population("Staff");
        let policy = fx.sign_on_policy("Single_Factor");
        let missing = "00000000-0000-4000-8000-00000000beef";
        let (ctx, mut diags) = fx.call();
        let api = fx.api(&ctx);

        assert_eq!(
            fetch_population(&api, &fx.env, &staff, false, &mut diags).unwrap().name,
            "Staff"
        );
        assert!(fetch_sign_on_policy(&api, &fx.env, &policy, false, &mut diags).is_some());
        assert!(diags.is_empty(), "{diags}");

        assert!(fetch_sign_on_policy(&api, &fx.env, missing, true, &mut diags).is_none());
        assert_eq!(diags.warning_count(), 1);
        assert!(!diags.has_error());

        assert!(fetch_population(&api, &fx.env, missing, false, &mut diags).is_none());
        assert!(diags.mentions("ReadOnePopulation"));
        assert!(diags.has_error());
    }
}
