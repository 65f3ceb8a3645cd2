//! Parent-scoped REST paths, relative to the API base URL.
//!
//! Every managed object lives under `/environments/{env}`; nested objects
//! add their parent collection and ID before their own.

pub fn environment(env: &str) -> String {
    format!("/environments/{env}")
}

pub fn resources(env: &str) -> String {
    format!("/environments/{env}/resources")
}

pub fn resource(env: &str, id: &str) -> String {
    format!("{}/{id}", resources(env))
}

pub fn resource_scopes(env: &str, resource_id: &str) -> String {
    format!("{}/scopes", resource(env, resource_id))
}

pub fn resource_scope(env: &str, resource_id: &str, id: &str) -> String {
    format!("{}/{id}", resource_scopes(env, resource_id))
}

pub fn resource_attributes(env: &str, resource_id: &str) -> String {
    format!("{}/attributes", resource(env, resource_id))
}

pub fn resource_attribute(env: &str, resource_id: &str, id: &str) -> String {
    format!("{}/{id}", resource_attributes(env, resource_id))
}

/// Singleton secret of a custom resource; POST regenerates it
pub fn resource_secret(env: &str, resource_id: &str) -> String {
    format!("{}/secret", resource(env, resource_id))
}

pub fn applications(env: &str) -> String {
    format!("/environments/{env}/applications")
}

pub fn application(env: &str, id: &str) -> String {
    format!("{}/{id}", applications(env))
}

pub fn application_grants(env: &str, application_id: &str) -> String {
    format!("{}/grants", application(env, application_id))
}

pub fn application_grant(env: &str, application_id: &str, id: &str) -> String {
    format!("{}/{id}", application_grants(env, application_id))
}

pub fn application_attributes(env: &str, application_id: &str) -> String {
    format!("{}/attributes", application(env, application_id))
}

pub fn application_attribute(env: &str, application_id: &str, id: &str) -> String {
    format!("{}/{id}", application_attributes(env, application_id))
}

pub fn sign_on_policies(env: &str) -> String {
    format!("/environments/{env}/signOnPolicies")
}

pub fn sign_on_policy(env: &str, id: &str) -> String {
    format!("{}/{id}", sign_on_policies(env))
}

pub fn sign_on_policy_actions(env: &str, policy_id: &str) -> String {
    format!("{}/actions", sign_on_policy(env, policy_id))
}

pub fn sign_on_policy_action(env: &str, policy_id: &str, id: &str) -> String {
    format!("{}/{id}", sign_on_policy_actions(env, policy_id))
}

pub fn identity_providers(env: &str) -> String {
    format!("/environments/{env}/identityProviders")
}

pub fn identity_provider(env: &str, id: &str) -> String {
    format!("{}/{id}", identity_providers(env))
}

pub fn populations(env: &str) -> String {
    format!("/environments/{env}/populations")
}

pub fn population(env: &str, id: &str) -> String {
    format!("{}/{id}", populations(env))
}

pub fn password_policies(env: &str) -> String {
    format!("/environments/{env}/passwordPolicies")
}

pub fn password_policy(env: &str, id: &str) -> String {
    format!("{}/{id}", password_policies(env))
}

pub fn users(env: &str) -> String {
    format!("/environments/{env}/users")
}

pub fn user(env: &str, id: &str) -> String {
    format!("{}/{id}", users(env))
}

/// Singleton `{ "enabled": bool }` of a user
pub fn user_enabled(env: &str, id: &str) -> String {
    format!("{}/enabled", user(env, id))
}

/// Singleton population reference of a user; PUT moves the user
pub fn user_population(env: &str, id: &str) -> String {
    format!("{}/population", user(env, id))
}

pub fn groups(env: &str) -> String {
    format!("/environments/{env}/groups")
}

pub fn group(env: &str, id: &str) -> String {
    format!("{}/{id}", groups(env))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_paths() {
        assert_eq!(
            resource_scope("e", "r", "s"),
            "/environments/e/resources/r/scopes/s"
        );
        assert_eq!(
            application_grant("e", "a", "g"),
            "/environments/e/applications/a/grants/g"
        );
        assert_eq!(
            sign_on_policy_action("e", "p", "x"),
            "/environments/e/signOnPolicies/p/actions/x"
        );
        assert_eq!(resource_secret("e", "r"), "/environments/e/resources/r/secret");
    }
}
