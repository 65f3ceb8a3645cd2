//! Typed facade over a [`Backend`].
//!
//! Every call is a single attempt: non-2xx responses become [`Error::Api`]
//! with the problem document attached, and retry policy is left to the
//! caller (see [`crate::retry`]). Collection reads follow pagination cursors
//! until the server stops returning a `next` link.

use crate::backend::Backend;
use crate::error::{Error, Result};
use crate::paths;
use crate::types::{Request, Response, RetryConfig};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

/// Content type of the resource secret regeneration action
pub const SECRET_REGENERATE_CONTENT_TYPE: &str = "application/vnd.pingidentity.resource.secret.regenerate+json";

/// Shared, thread-safe API client
#[derive(Clone)]
pub struct Client {
    backend: Arc<dyn Backend>,
    retry: RetryConfig,
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("retry", &self.retry)
            .finish_non_exhaustive()
    }
}

fn decode<T: DeserializeOwned>(request: &Request, response: &Response) -> Result<T> {
    serde_json::from_slice(&response.body)
        .map_err(|e| Error::Decode(format!("{} {}: {e}", request.method, request.path)))
}

fn encode<B: Serialize>(body: &B) -> Result<Value> {
    Ok(serde_json::to_value(body)?)
}

/// Collection name used as the `_embedded` key: last path segment, query stripped
fn embedded_key(path: &str) -> &str {
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.rsplit('/').next().unwrap_or(path)
}

impl Client {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self {
            backend,
            retry: RetryConfig::default(),
        }
    }

    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    pub fn retry_config(&self) -> &RetryConfig {
        &self.retry
    }

    /// Execute a request, turning non-2xx responses into errors.
    pub fn execute(&self, request: &Request) -> Result<Response> {
        let response = self.backend.execute(request)?;
        if response.is_success() {
            Ok(response)
        } else {
            log::debug!(
                "{} {} failed with HTTP {}",
                request.method,
                request.path,
                response.status
            );
            Err(Error::api(
                response.status,
                request.method.as_str(),
                &request.path,
                &response.body,
            ))
        }
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let request = Request::get(path);
        let response = self.execute(&request)?;
        decode(&request, &response)
    }

    /// Read every page of a collection.
    pub fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let key = embedded_key(path).to_string();
        let mut items = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(path.to_string());

        while let Some(page_path) = next.take() {
            if !seen.insert(page_path.clone()) {
                return Err(Error::InvalidResponse(format!(
                    "pagination cycle at {page_path}"
                )));
            }
            let request = Request::get(page_path);
            let response = self.execute(&request)?;
            let mut page: Value = decode(&request, &response)?;

            if let Some(embedded) = page
                .get_mut("_embedded")
                .and_then(|e| e.get_mut(&key))
                .map(Value::take)
            {
                let batch: Vec<T> = serde_json::from_value(embedded).map_err(|e| {
                    Error::Decode(format!("{} {}: {e}", request.method, request.path))
                })?;
                items.extend(batch);
            }

            next = page
                .pointer("/_links/next/href")
                .and_then(Value::as_str)
                .map(str::to_string);
        }

        log::debug!("Listed {} item(s) from {path}", items.len());
        Ok(items)
    }

    /// POST to a collection
    pub fn create<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = Request::post(path, encode(body)?);
        let response = self.execute(&request)?;
        decode(&request, &response)
    }

    /// PUT an item
    pub fn update<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        let request = Request::put(path, encode(body)?);
        let response = self.execute(&request)?;
        decode(&request, &response)
    }

    pub fn delete(&self, path: &str) -> Result<()> {
        self.execute(&Request::delete(path)).map(|_| ())
    }

    /// POST an action with a vendor content type, e.g. secret regeneration
    pub fn post_action<B: Serialize, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
        content_type: &'static str,
    ) -> Result<T> {
        let request = Request::post(path, encode(body)?).with_content_type(content_type);
        let response = self.execute(&request)?;
        decode(&request, &response)
    }

    /// Whether the environment exists.
    ///
    /// Used to tell "child gone" from "whole environment gone".
    pub fn environment_exists(&self, env: &str) -> Result<bool> {
        match self.execute(&Request::get(paths::environment(env))) {
            Ok(_) => Ok(true),
            Err(e) if e.is_not_found() => Ok(false),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockBackend;
    use crate::models::{Population, Resource};
    use crate::types::Method;
    use serde_json::json;

    fn client(mock: &MockBackend) -> Client {
        Client::new(Arc::new(mock.clone()))
    }

    #[test]
    fn test_embedded_key() {
        assert_eq!(embedded_key("/environments/e/resources"), "resources");
        assert_eq!(embedded_key("/environments/e/groups?cursor=2"), "groups");
    }

    #[test]
    fn test_create_get_update_delete() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = client(&mock);

        let created: Resource = client
            .create(
                &paths::resources(&env),
                &Resource {
                    name: "api".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        let id = created.id.clone().unwrap();
        assert_eq!(created.audience.as_deref(), Some("api"));

        let mut fetched: Resource = client.get(&paths::resource(&env, &id)).unwrap();
        assert_eq!(fetched, created);

        fetched.description = Some("Orders".into());
        let updated: Resource = client.update(&paths::resource(&env, &id), &fetched).unwrap();
        assert_eq!(updated.description.as_deref(), Some("Orders"));

        client.delete(&paths::resource(&env, &id)).unwrap();
        let gone = client.get::<Resource>(&paths::resource(&env, &id)).unwrap_err();
        assert!(gone.is_not_found());
    }

    #[test]
    fn test_list_follows_cursors() {
        let mock = MockBackend::new().with_page_size(2);
        let env = mock.add_environment();
        for n in 0..5 {
            mock.insert(&paths::populations(&env), json!({"name": format!("p{n}")}));
        }
        let client = client(&mock);
        mock.clear_requests();

        let all: Vec<Population> = client.list(&paths::populations(&env)).unwrap();
        assert_eq!(all.len(), 5);
        assert_eq!(all[4].name, "p4");
        assert_eq!(mock.count(Method::Get, &paths::populations(&env)), 3);
    }

    #[test]
    fn test_environment_probe() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = client(&mock);
        assert!(client.environment_exists(&env).unwrap());
        mock.remove_environment(&env);
        assert!(!client.environment_exists(&env).unwrap());

        mock.fail_next(502, json!({}));
        assert!(client.environment_exists(&env).unwrap_err().is_retryable());
    }

    #[test]
    fn test_problem_document_surfaces() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = client(&mock);
        let body = Resource {
            name: "dup".into(),
            ..Default::default()
        };
        let _: Resource = client.create(&paths::resources(&env), &body).unwrap();
        let err = client
            .create::<_, Resource>(&paths::resources(&env), &body)
            .unwrap_err();
        assert_eq!(err.status(), Some(400));
        assert!(err.problem().unwrap().has_detail_code("UNIQUENESS_VIOLATION"));
    }
}
