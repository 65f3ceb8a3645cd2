//! Response handling and retry harness for API calls.
//!
//! Every reconciler call into the API goes through [`Api::invoke`]. It
//! retries transient failures within the host's deadline, turns a 404 into
//! either a "gone" outcome or an error according to a [`NotFound`] policy,
//! and records everything else as a diagnostic naming the operation.
//!
//! A 404 on a child is checked against the parent environment first: when
//! the environment itself no longer exists the child is reported as gone
//! with a warning, whatever the caller was doing.

use declarative::{ApplyContext, Diagnostic, Diagnostics};
use pingone::{Client, Error, RetryBudget, with_retry};

/// What a 404 means to the caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFound {
    /// The object is expected to exist; a 404 is an error
    Error,
    /// The object may have been removed out of band; warn and report it gone
    Warn,
    /// An error, unless the whole environment is gone
    ErrorUnlessEnvironmentGone,
}

/// Result of an API invocation
#[derive(Debug)]
pub enum Outcome<T> {
    Found(T),
    /// Not found under a permissive policy; a warning has been recorded
    Gone,
    /// An error diagnostic has been recorded
    Failed,
}

impl<T> Outcome<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            _ => None,
        }
    }

    pub fn is_gone(&self) -> bool {
        matches!(self, Self::Gone)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed)
    }
}

/// Retry predicate that adds nothing to the always-retried transient classes
pub fn transient_only(_: &Error) -> bool {
    false
}

/// Retry predicate for reads that may race eventual consistency after a write
pub fn retry_not_found(error: &Error) -> bool {
    error.is_not_found()
}

/// Client bound to the context of one reconciler call
pub struct Api<'a> {
    client: &'a Client,
    ctx: &'a ApplyContext,
}

impl<'a> Api<'a> {
    pub fn new(client: &'a Client, ctx: &'a ApplyContext) -> Self {
        Self { client, ctx }
    }

    pub fn client(&self) -> &Client {
        self.client
    }

    /// Invoke `call`, retrying transient failures only.
    pub fn invoke<T, F>(
        &self,
        op: &str,
        env: &str,
        not_found: NotFound,
        diags: &mut Diagnostics,
        call: F,
    ) -> Outcome<T>
    where
        F: FnMut(&Client) -> pingone::Result<T>,
    {
        self.invoke_with_retry(op, env, not_found, &transient_only, diags, call)
    }

    /// Invoke `call`, also retrying errors `retry_if` accepts.
    pub fn invoke_with_retry<T, F>(
        &self,
        op: &str,
        env: &str,
        not_found: NotFound,
        retry_if: &dyn Fn(&Error) -> bool,
        diags: &mut Diagnostics,
        mut call: F,
    ) -> Outcome<T>
    where
        F: FnMut(&Client) -> pingone::Result<T>,
    {
        let cancelled = || self.ctx.cancel.is_cancelled();
        let budget = RetryBudget {
            deadline: self.ctx.deadline,
            cancelled: &cancelled,
        };
        log::debug!("Calling {op}");

        match with_retry(self.client.retry_config(), &budget, retry_if, || call(self.client)) {
            Ok(value) => Outcome::Found(value),
            Err(e) if e.is_not_found() => self.handle_not_found(op, env, not_found, &e, diags),
            Err(Error::Cancelled) => {
                diags.error(
                    "Operation cancelled",
                    format!("`{op}` was cancelled or ran out of time before it completed."),
                );
                Outcome::Failed
            }
            Err(e) => {
                record_error(op, &e, diags);
                Outcome::Failed
            }
        }
    }

    /// Delete an object; a 404 is a warning, not an error.
    pub fn delete(&self, op: &str, env: &str, path: &str, diags: &mut Diagnostics) -> Outcome<()> {
        self.invoke(op, env, NotFound::Warn, diags, |c| c.delete(path))
    }

    fn environment_gone(&self, env: &str) -> bool {
        if env.is_empty() {
            return false;
        }
        match self.client.environment_exists(env) {
            Ok(exists) => !exists,
            Err(e) => {
                log::debug!("Environment probe for {env} failed: {e}");
                false
            }
        }
    }

    fn handle_not_found<T>(
        &self,
        op: &str,
        env: &str,
        policy: NotFound,
        error: &Error,
        diags: &mut Diagnostics,
    ) -> Outcome<T> {
        if policy == NotFound::Error {
            record_error(op, error, diags);
            return Outcome::Failed;
        }

        if self.environment_gone(env) {
            diags.warning(
                "Environment not found",
                format!(
                    "Environment {env} no longer exists, so the object `{op}` refers to is gone as well. It will be removed from state."
                ),
            );
            return Outcome::Gone;
        }

        if policy == NotFound::Warn {
            diags.warning(
                "Requested object not found",
                format!("`{op}` found nothing ({error}). The object will be removed from state."),
            );
            Outcome::Gone
        } else {
            record_error(op, error, diags);
            Outcome::Failed
        }
    }
}

/// Record an API error, pointing at the offending attribute when the problem
/// document names exactly one.
fn record_error(op: &str, error: &Error, diags: &mut Diagnostics) {
    let mut diagnostic = Diagnostic::error(
        format!("Error when calling `{op}`"),
        format!("{error}\n\n{}.", error.category().advice()),
    );
    if let Some(problem) = error.problem() {
        let mut targets = problem.details.iter().filter_map(|d| d.target.as_deref());
        if let (Some(target), None) = (targets.next(), targets.next()) {
            diagnostic = diagnostic.with_attribute(target);
        }
    }
    diags.push(diagnostic);
}

/// Report a response that lacks something the API contract promises
pub fn unexpected_response(op: &str, what: &str, diags: &mut Diagnostics) {
    diags.error(
        "Unexpected API response",
        format!(
            "`{op}` returned no {what}. This is always a problem with the provider; please report it to the provider developers."
        ),
    );
}

/// Unwrap a value the API must return, reporting a contract break otherwise
pub fn require<T>(value: Option<T>, op: &str, what: &str, diags: &mut Diagnostics) -> Option<T> {
    if value.is_none() {
        unexpected_response(op, what, diags);
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use declarative::CancelToken;
    use pingone::models::Resource;
    use pingone::{MockBackend, RetryConfig, paths};
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;

    fn fast_client(mock: &MockBackend) -> Client {
        Client::new(Arc::new(mock.clone())).with_retry(RetryConfig {
            max_attempts: 3,
            base_delay: Duration::from_millis(1),
            backoff_factor: 1.0,
            max_delay: Duration::from_millis(5),
        })
    }

    #[test]
    fn test_transient_errors_are_retried() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = fast_client(&mock);
        let ctx = ApplyContext::new();
        let api = Api::new(&client, &ctx);
        let mut diags = Diagnostics::new();

        mock.fail_next(429, json!({"code": "REQUEST_LIMITED", "message": "slow down"}));
        mock.fail_next(502, json!({}));
        let out = api.invoke("ReadResources", &env, NotFound::Error, &mut diags, |c| {
            c.list::<Resource>(&paths::resources(&env))
        });
        assert!(out.found().unwrap().is_empty());
        assert!(diags.is_empty());
    }

    #[test]
    fn test_validation_error_surfaces_verbatim() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = fast_client(&mock);
        let ctx = ApplyContext::new();
        let api = Api::new(&client, &ctx);
        let mut diags = Diagnostics::new();

        mock.fail_next(
            400,
            json!({
                "code": "INVALID_DATA",
                "message": "Validation failed",
                "details": [{
                    "code": "INVALID_VALUE",
                    "target": "type",
                    "message": "Invalid parameter value",
                    "innerError": {"allowedValues": ["CUSTOM"]}
                }]
            }),
        );
        let out: Outcome<Resource> = api.invoke("CreateResource", &env, NotFound::Error, &mut diags, |c| {
            c.create(&paths::resources(&env), &json!({"name": "x"}))
        });
        assert!(out.is_failed());
        assert_eq!(mock.requests().len(), 1);
        let error = diags.errors().next().unwrap();
        assert!(error.summary.contains("CreateResource"));
        assert_eq!(error.attribute.as_deref(), Some("type"));
        assert!(error.detail.contains("Allowed values: CUSTOM"));
    }

    #[test]
    fn test_not_found_policies() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = fast_client(&mock);
        let ctx = ApplyContext::new();
        let api = Api::new(&client, &ctx);
        let missing = paths::resource(&env, "00000000-0000-4000-8000-0000000000ff");

        let mut diags = Diagnostics::new();
        let out = api.invoke("ReadOneResource", &env, NotFound::Warn, &mut diags, |c| {
            c.get::<Resource>(&missing)
        });
        assert!(out.is_gone());
        assert!(!diags.has_error());
        assert_eq!(diags.warning_count(), 1);

        let mut diags = Diagnostics::new();
        let out = api.invoke(
            "ReadOneResource",
            &env,
            NotFound::ErrorUnlessEnvironmentGone,
            &mut diags,
            |c| c.get::<Resource>(&missing),
        );
        assert!(out.is_failed());
        assert!(diags.mentions("ReadOneResource"));
    }

    #[test]
    fn test_environment_gone_downgrades_error() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = fast_client(&mock);
        let ctx = ApplyContext::new();
        let api = Api::new(&client, &ctx);
        mock.remove_environment(&env);

        let mut diags = Diagnostics::new();
        let out = api.invoke(
            "ReadOneResource",
            &env,
            NotFound::ErrorUnlessEnvironmentGone,
            &mut diags,
            |c| c.get::<Resource>(&paths::resource(&env, "r")),
        );
        assert!(out.is_gone());
        assert!(!diags.has_error());
        assert!(diags.mentions("Environment"));
    }

    #[test]
    fn test_cancelled_context_aborts() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let client = fast_client(&mock);
        let token = CancelToken::new();
        token.cancel();
        let ctx = ApplyContext::new().with_cancel(token);
        let api = Api::new(&client, &ctx);

        let mut diags = Diagnostics::new();
        let out = api.invoke("ReadResources", &env, NotFound::Error, &mut diags, |c| {
            c.list::<Resource>(&paths::resources(&env))
        });
        assert!(out.is_failed());
        assert!(mock.requests().is_empty());
        assert!(diags.mentions("cancelled"));
    }

    #[test]
    fn test_require_reports_contract_break() {
        let mut diags = Diagnostics::new();
        assert!(require::<String>(None, "CreateResource", "ID", &mut diags).is_none());
        assert!(diags.mentions("please report"));
    }
}
