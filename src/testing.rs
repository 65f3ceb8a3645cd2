//! Shared fixture for reconciler tests.

use crate::api::Api;
use declarative::{ApplyContext, Diagnostics};
use pingone::{Client, MockBackend, RetryConfig, paths};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// A mock API with one environment and a client with millisecond retries
pub(crate) struct Fixture {
    pub(crate) mock: MockBackend,
    pub(crate) client: Arc<Client>,
    pub(crate) env: String,
}

impl Fixture {
    pub(crate) fn new() -> Self {
        crate::logging::try_init_for_tests();
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = Client::new(Arc::new(mock.clone())).with_retry(RetryConfig {
            max_attempts: 2,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(2),
        });
        Self {
            mock,
            client: Arc::new(client),
            env,
        }
    }

    pub(crate) fn call(&self) -> (ApplyContext, Diagnostics) {
        (ApplyContext::new(), Diagnostics::new())
    }

    pub(crate) fn api<'a>(&'a self, ctx: &'a ApplyContext) -> Api<'a> {
        Api::new(&self.client, ctx)
    }

    fn post(&self, path: &str, body: Value) -> String {
        let created: Value = self.client.create(path, &body).unwrap();
        created["id"].as_str().unwrap().to_string()
    }

    /// Create a CUSTOM resource through the API so server defaults apply
    pub(crate) fn custom_resource(&self, name: &str) -> String {
        self.post(&paths::resources(&self.env), json!({"name": name}))
    }

    pub(crate) fn custom_scope(&self, resource_id: &str, name: &str) -> String {
        self.post(
            &paths::resource_scopes(&self.env, resource_id),
            json!({"name": name}),
        )
    }

    pub(crate) fn oidc_application(&self, name: &str) -> String {
        self.post(
            &paths::applications(&self.env),
            json!({"name": name, "protocol": "OPENID_CONNECT", "type": "WEB_APP", "enabled": true}),
        )
    }

    pub(crate) fn saml_application(&self, name: &str) -> String {
        self.post(
            &paths::applications(&self.env),
            json!({
                "name": name,
                "protocol": "SAML",
                "type": "WEB_APP",
                "enabled": true,
                "acsUrls": ["https://sp.example.com/acs"],
                "spEntityId": name,
            }),
        )
    }

    pub(crate) fn population(&self, name: &str) -> String {
        self.post(&paths::populations(&self.env), json!({"name": name}))
    }

    pub(crate) fn sign_on_policy(&self, name: &str) -> String {
        self.post(&paths::sign_on_policies(&self.env), json!({"name": name}))
    }
}
