//! Reconcilers, one per managed object kind.
//!
//! Every reconciler holds the shared [`Client`](pingone::Client) and follows
//! the same shape: resolve parents and cross-references, stop at the first
//! synchronization point with an error, call the API through
//! [`Api`](crate::api::Api), then project the response back onto the model.
//! Objects the API computes (IDs, derived types) are read back from the
//! response, never assumed.

pub mod application;
pub mod application_attribute_mapping;
pub mod application_resource_grant;
pub mod group;
pub mod identity_provider;
pub mod password_policy;
pub mod population;
pub mod population_default;
pub mod resource;
pub mod resource_attribute;
pub mod resource_scope;
pub mod resource_scope_openid;
pub mod resource_secret;
pub mod sign_on_policy;
pub mod sign_on_policy_action;
pub mod system_application;
pub mod user;

use declarative::validators::UuidShape;
use declarative::{AttrValue, Attribute, Diagnostics};
use pingone::ObjectRef;
use std::collections::BTreeSet;

pub use application::ApplicationReconciler;
pub use application_attribute_mapping::{
    ApplicationAttributeMappingReconciler, ApplicationCoreAttributeMappingReconciler,
};
pub use application_resource_grant::ApplicationResourceGrantReconciler;
pub use group::GroupReconciler;
pub use identity_provider::IdentityProviderReconciler;
pub use password_policy::PasswordPolicyReconciler;
pub use population::PopulationReconciler;
pub use population_default::PopulationDefaultReconciler;
pub use resource::ResourceReconciler;
pub use resource_attribute::ResourceAttributeReconciler;
pub use resource_scope::ResourceScopeReconciler;
pub use resource_scope_openid::ResourceScopeOpenIdReconciler;
pub use resource_secret::ResourceSecretReconciler;
pub use sign_on_policy::SignOnPolicyReconciler;
pub use sign_on_policy_action::SignOnPolicyActionReconciler;
pub use system_application::SystemApplicationReconciler;
pub use user::UserReconciler;

/// `environment_id`: every object lives in exactly one environment
pub(crate) fn environment_id() -> Attribute {
    Attribute::string("environment_id")
        .required()
        .force_new()
        .validate(UuidShape)
        .describe("The ID of the environment the object belongs to.")
}

/// A required reference to the owning object; changing it replaces the object
pub(crate) fn parent_id(name: &'static str, description: &'static str) -> Attribute {
    Attribute::string(name)
        .required()
        .force_new()
        .validate(UuidShape)
        .describe(description)
}

/// Borrow a value the reconciler cannot proceed without.
///
/// Schema validation has already rejected missing required values, so an
/// error here means an unknown value reached apply.
pub(crate) fn known<'a>(
    value: &'a AttrValue<String>,
    attribute: &str,
    diags: &mut Diagnostics,
) -> Option<&'a str> {
    let found = value.non_empty();
    if found.is_none() {
        diags.attribute_error(
            attribute,
            "Missing value",
            format!("Attribute \"{attribute}\" must be known before the object can be managed."),
        );
    }
    found
}

/// Set attribute from an API list; an empty list reads back as null
pub(crate) fn string_set(items: Option<Vec<String>>) -> AttrValue<BTreeSet<String>> {
    match items {
        Some(items) if !items.is_empty() => AttrValue::Known(items.into_iter().collect()),
        _ => AttrValue::Null,
    }
}

/// API list from a set attribute; null becomes `None`
pub(crate) fn to_list(set: &AttrValue<BTreeSet<String>>) -> Option<Vec<String>> {
    set.known()
        .filter(|s| !s.is_empty())
        .map(|s| s.iter().cloned().collect())
}

pub(crate) fn object_ref(id: &AttrValue<String>) -> Option<ObjectRef> {
    id.non_empty().map(ObjectRef::new)
}

pub(crate) fn ref_id(reference: Option<&ObjectRef>) -> AttrValue<String> {
    AttrValue::from_option(reference.map(|r| r.id.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_projection_treats_empty_as_null() {
        assert!(string_set(Some(Vec::new())).is_null());
        assert!(string_set(None).is_null());
        let set = string_set(Some(vec!["b".into(), "a".into(), "b".into()]));
        assert_eq!(set.known().map(BTreeSet::len), Some(2));
        assert_eq!(to_list(&set), Some(vec!["a".to_string(), "b".to_string()]));
        assert_eq!(to_list(&AttrValue::Known(BTreeSet::new())), None);
    }

    #[test]
    fn test_known_reports_missing_values() {
        let mut diags = Diagnostics::new();
        assert_eq!(known(&AttrValue::Known("x".into()), "name", &mut diags), Some("x"));
        assert!(known(&AttrValue::Unknown, "resource_id", &mut diags).is_none());
        assert_eq!(diags.errors().next().unwrap().attribute.as_deref(), Some("resource_id"));
    }
}
