//! Provider wiring: one shared client, one registry of reconcilers.

use crate::config::ProviderConfig;
use crate::resources::{
    ApplicationAttributeMappingReconciler, ApplicationCoreAttributeMappingReconciler,
    ApplicationReconciler, ApplicationResourceGrantReconciler, GroupReconciler,
    IdentityProviderReconciler, PasswordPolicyReconciler, PopulationDefaultReconciler,
    PopulationReconciler, ResourceAttributeReconciler, ResourceReconciler,
    ResourceScopeOpenIdReconciler, ResourceScopeReconciler, ResourceSecretReconciler,
    SignOnPolicyActionReconciler, SignOnPolicyReconciler, SystemApplicationReconciler,
    UserReconciler,
};
use anyhow::Result;
use declarative::Registry;
use pingone::{Backend, Client, RetryConfig, UreqBackend};
use std::sync::Arc;

/// A configured provider
pub struct Provider {
    client: Arc<Client>,
}

impl Provider {
    /// Validate the configuration and build the HTTP client
    pub fn configure(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        log::debug!(
            "Configuring provider for {} (timeout {}s, {} attempt(s))",
            config.api_url(),
            config.request_timeout_secs,
            config.retry.max_attempts
        );
        let backend = UreqBackend::new(
            config.api_url(),
            config.access_token.clone(),
            config.request_timeout(),
        );
        Ok(Self::with_backend(Arc::new(backend), config.retry_config()))
    }

    /// A provider whose client carries no credentials.
    ///
    /// Enough for schemas and planning, which never reach the API.
    pub fn offline(config: &ProviderConfig) -> Self {
        let backend = UreqBackend::new(config.api_url(), String::new(), config.request_timeout());
        Self::with_backend(Arc::new(backend), config.retry_config())
    }

    /// Build a provider over an explicit transport
    pub fn with_backend(backend: Arc<dyn Backend>, retry: RetryConfig) -> Self {
        Self {
            client: Arc::new(Client::new(backend).with_retry(retry)),
        }
    }

    pub fn client(&self) -> &Arc<Client> {
        &self.client
    }

    /// Every managed type, sharing this provider's client
    pub fn registry(&self) -> Registry {
        let c = &self.client;
        let mut registry = Registry::new();
        registry.register(ResourceReconciler::new(c.clone()));
        registry.register(ResourceAttributeReconciler::new(c.clone()));
        registry.register(ResourceScopeReconciler::new(c.clone()));
        registry.register(ResourceScopeOpenIdReconciler::new(c.clone()));
        registry.register(ResourceSecretReconciler::new(c.clone()));
        registry.register(ApplicationReconciler::new(c.clone()));
        registry.register(SystemApplicationReconciler::new(c.clone()));
        registry.register(ApplicationResourceGrantReconciler::new(c.clone()));
        registry.register(ApplicationAttributeMappingReconciler::new(c.clone()));
        registry.register(ApplicationCoreAttributeMappingReconciler::new(c.clone()));
        registry.register(IdentityProviderReconciler::new(c.clone()));
        registry.register(PopulationReconciler::new(c.clone()));
        registry.register(PopulationDefaultReconciler::new(c.clone()));
        registry.register(PasswordPolicyReconciler::new(c.clone()));
        registry.register(UserReconciler::new(c.clone()));
        registry.register(GroupReconciler::new(c.clone()));
        registry.register(SignOnPolicyReconciler::new(c.clone()));
        registry.register(SignOnPolicyActionReconciler::new(c.clone()));
        log::debug!("Registered {} resource types", registry.len());
        registry
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::{
        ApplyContext, ChangeAction, Diagnostics, ExecuteOptions, ExecutionPlan, execute, plan_change,
    };
    use pingone::MockBackend;
    use serde_json::json;

    #[test]
    fn test_configure_rejects_empty_token() {
        let config = ProviderConfig::default();
        let err = Provider::configure(&config).err().unwrap();
        assert!(err.to_string().contains("access_token"));
    }

    #[test]
    fn test_configure_with_token() {
        let config = ProviderConfig {
            access_token: "token".into(),
            ..Default::default()
        };
        let provider = Provider::configure(&config).unwrap();
        assert_eq!(provider.client().retry_config().max_attempts, config.retry.max_attempts);
    }

    #[test]
    fn test_registry_covers_every_type() {
        let provider = Provider::with_backend(Arc::new(MockBackend::new()), RetryConfig::default());
        let registry = provider.registry();
        assert_eq!(registry.len(), 18);
        for name in [
            "pingone_resource",
            "pingone_resource_attribute",
            "pingone_resource_scope",
            "pingone_resource_scope_openid",
            "pingone_resource_secret",
            "pingone_application",
            "pingone_system_application",
            "pingone_application_resource_grant",
            "pingone_application_attribute_mapping",
            "pingone_application_core_attribute_mapping",
            "pingone_identity_provider",
            "pingone_population",
            "pingone_population_default",
            "pingone_password_policy",
            "pingone_user",
            "pingone_group",
            "pingone_sign_on_policy",
            "pingone_sign_on_policy_action",
        ] {
            assert!(registry.get(name).is_some(), "{name} not registered");
        }
    }

    #[test]
    fn test_plan_and_apply_through_registry() {
        crate::logging::try_init_for_tests();
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let provider = Provider::with_backend(Arc::new(mock.clone()), RetryConfig::default());
        let registry = provider.registry();
        let reconciler = registry.get("pingone_population").unwrap();

        let mut diags = Diagnostics::new();
        let mut plan = ExecutionPlan::new();
        let change = plan_change(
            reconciler,
            "pingone_population.staff",
            None,
            Some(json!({"environment_id": env, "name": "Staff"})),
            &mut diags,
        );
        assert_eq!(change.action, ChangeAction::Create);
        plan.push(change);
        assert!(diags.is_empty(), "{diags}");

        let (summary, outcomes) =
            execute(&registry, plan, &ExecuteOptions::default(), &ApplyContext::new()).unwrap();
        assert!(summary.is_success());
        assert_eq!(summary.created, 1);
        let state = outcomes[0].state.clone().unwrap();
        assert_eq!(state["name"], json!("Staff"));
        assert!(state["id"].as_str().is_some());
    }
}
