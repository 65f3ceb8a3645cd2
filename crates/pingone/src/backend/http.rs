//! ureq-based backend for the PingOne management API.

use crate::backend::Backend;
use crate::error::Result;
use crate::types::{Method, Request, Response};
use std::fmt;
use std::time::Duration;

const USER_AGENT: &str = concat!("pingone-rs/", env!("CARGO_PKG_VERSION"));

/// Blocking HTTP backend authenticated with a bearer token.
pub struct UreqBackend {
    /// HTTP agent for requests.
    agent: ureq::Agent,
    /// Regional API base, e.g. `https://api.pingone.com/v1`.
    api_base: String,
    access_token: String,
}

impl UreqBackend {
    /// Create a backend for the given API base.
    ///
    /// `timeout` bounds each request end to end.
    #[must_use]
    pub fn new(api_base: impl Into<String>, access_token: impl Into<String>, timeout: Duration) -> Self {
        let config = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(timeout))
            .build();
        Self {
            agent: config.into(),
            api_base: api_base.into().trim_end_matches('/').to_string(),
            access_token: access_token.into(),
        }
    }

    /// Get the current API base URL.
    #[must_use]
    pub fn api_base(&self) -> &str {
        &self.api_base
    }

    /// Absolute URL for a request path; pagination links are already absolute.
    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}{path}", self.api_base)
        }
    }
}

impl fmt::Debug for UreqBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqBackend")
            .field("api_base", &self.api_base)
            .finish_non_exhaustive()
    }
}

impl Backend for UreqBackend {
    fn execute(&self, request: &Request) -> Result<Response> {
        let url = self.url(&request.path);
        let auth = format!("Bearer {}", self.access_token);
        log::debug!("{} {url}", request.method);

        let mut response = match request.method {
            Method::Get => self
                .agent
                .get(&url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call()?,
            Method::Delete => self
                .agent
                .delete(&url)
                .header("Authorization", &auth)
                .header("User-Agent", USER_AGENT)
                .call()?,
            Method::Post | Method::Put => {
                let body = match &request.body {
                    Some(body) => serde_json::to_vec(body)?,
                    None => Vec::new(),
                };
                let builder = if request.method == Method::Post {
                    self.agent.post(&url)
                } else {
                    self.agent.put(&url)
                };
                builder
                    .header("Authorization", &auth)
                    .header("User-Agent", USER_AGENT)
                    .header(
                        "Content-Type",
                        request.content_type.unwrap_or("application/json"),
                    )
                    .send(body.as_slice())?
            }
        };

        let status = response.status().as_u16();
        let body = response.body_mut().read_to_vec()?;
        log::debug!("{} {url} -> {status}", request.method);
        Ok(Response { status, body })
    }
}
