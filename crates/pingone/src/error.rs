//! Error types for PingOne API operations.
//!
//! Errors are categorized to enable smart retry logic and appropriate
//! feedback. Remote rejections carry the server's problem document verbatim
//! so callers can surface the offending attribute and allowed values.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Result type alias for PingOne operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Categories of API errors for retry logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Connection, DNS or timeout failures (transient, retryable).
    Network,
    /// HTTP 429 (transient, retryable).
    RateLimited,
    /// HTTP 5xx, including gateway errors (transient, retryable).
    Server,
    /// HTTP 404.
    NotFound,
    /// Other 4xx: the request itself was rejected.
    Validation,
    /// HTTP 401/403.
    Auth,
    /// The caller cancelled the operation or its deadline passed.
    Cancelled,
    /// The response could not be decoded.
    Decode,
    /// Other/unknown errors.
    Other,
}

impl ErrorCategory {
    /// Whether this error category is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Network | Self::RateLimited | Self::Server)
    }

    /// Get a user-friendly description of this error category.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Network => "Network connectivity issue",
            Self::RateLimited => "Rate limit exceeded",
            Self::Server => "PingOne service error",
            Self::NotFound => "Object not found",
            Self::Validation => "Request rejected by PingOne",
            Self::Auth => "Not authorized",
            Self::Cancelled => "Operation cancelled",
            Self::Decode => "Unexpected response format",
            Self::Other => "Unexpected error",
        }
    }

    /// Get actionable advice for resolving this error category.
    #[must_use]
    pub fn advice(&self) -> &'static str {
        match self {
            Self::Network => "Check your network connection and the configured region",
            Self::RateLimited => "Reduce parallelism or retry later",
            Self::Server => "Retry later; if the problem persists contact PingOne support",
            Self::NotFound => "The object may have been deleted outside of this configuration",
            Self::Validation => "Correct the configuration using the details returned by the service",
            Self::Auth => "Check that the access token is valid and has the required roles",
            Self::Cancelled => "Increase the operation timeout if the cancellation was unexpected",
            Self::Decode => "This is a bug in the provider; please report it",
            Self::Other => "Check the error details for more information",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

/// One entry of a problem document's `details` array
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblemDetail {
    #[serde(default)]
    pub code: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inner_error: Option<Value>,
}

impl ProblemDetail {
    /// `innerError.allowedValues`, when the server lists them
    pub fn allowed_values(&self) -> Vec<String> {
        self.inner_error
            .as_ref()
            .and_then(|inner| inner.get("allowedValues"))
            .and_then(Value::as_array)
            .map(|values| {
                values
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// JSON problem document returned with 4xx/5xx responses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProblemDocument {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<ProblemDetail>,
}

impl ProblemDocument {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            code: code.into(),
            message: message.into(),
            details: Vec::new(),
        }
    }

    pub fn with_detail(
        mut self,
        code: impl Into<String>,
        target: Option<&str>,
        message: impl Into<String>,
    ) -> Self {
        self.details.push(ProblemDetail {
            code: code.into(),
            target: target.map(str::to_string),
            message: message.into(),
            inner_error: None,
        });
        self
    }

    /// Whether any detail carries the given code
    pub fn has_detail_code(&self, code: &str) -> bool {
        self.details.iter().any(|d| d.code == code)
    }
}

impl fmt::Display for ProblemDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)?;
        if !self.code.is_empty() {
            write!(f, " ({})", self.code)?;
        }
        for detail in &self.details {
            write!(f, "\n  - ")?;
            if let Some(target) = &detail.target {
                write!(f, "[{target}] ")?;
            }
            write!(f, "{}", detail.message)?;
            if !detail.code.is_empty() {
                write!(f, " ({})", detail.code)?;
            }
            let allowed = detail.allowed_values();
            if !allowed.is_empty() {
                write!(f, " Allowed values: {}", allowed.join(", "))?;
            }
        }
        Ok(())
    }
}

/// Errors that can occur during PingOne API operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Transport failure before a response was received.
    #[error("network error: {message}")]
    Network {
        /// Error message from the transport.
        message: String,
    },

    /// The API answered with a non-success status.
    #[error("{method} {path} returned HTTP {status}: {}", describe_body(.problem.as_ref(), .body))]
    Api {
        /// HTTP status code.
        status: u16,
        /// HTTP method of the failed request.
        method: String,
        /// Request path relative to the API base.
        path: String,
        /// Parsed problem document, when the body carried one.
        problem: Option<ProblemDocument>,
        /// Raw response body.
        body: String,
    },

    /// The operation was cancelled or its deadline passed.
    #[error("operation cancelled")]
    Cancelled,

    /// Response body could not be decoded into the expected model.
    #[error("failed to decode response: {0}")]
    Decode(String),

    /// Response was well-formed but missing something required.
    #[error("invalid API response: {0}")]
    InvalidResponse(String),

    /// Generic error.
    #[error("{0}")]
    Other(String),
}

fn describe_body(problem: Option<&ProblemDocument>, body: &str) -> String {
    match problem {
        Some(problem) => problem.to_string(),
        None if body.is_empty() => "no response body".to_string(),
        None => body.to_string(),
    }
}

impl Error {
    /// Create an API error from a status and body, parsing the problem document if present.
    pub fn api(status: u16, method: &str, path: &str, body: &[u8]) -> Self {
        let problem = serde_json::from_slice::<ProblemDocument>(body)
            .ok()
            .filter(|p| !p.code.is_empty() || !p.message.is_empty());
        Self::Api {
            status,
            method: method.to_string(),
            path: path.to_string(),
            problem,
            body: String::from_utf8_lossy(body).into_owned(),
        }
    }

    /// Get the error category for retry logic.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Error::Network { .. } => ErrorCategory::Network,
            Error::Api { status, .. } => match status {
                404 => ErrorCategory::NotFound,
                429 => ErrorCategory::RateLimited,
                401 | 403 => ErrorCategory::Auth,
                500..=599 => ErrorCategory::Server,
                _ => ErrorCategory::Validation,
            },
            Error::Cancelled => ErrorCategory::Cancelled,
            Error::Decode(_) | Error::InvalidResponse(_) => ErrorCategory::Decode,
            Error::Other(_) => ErrorCategory::Other,
        }
    }

    /// Whether this error is typically transient and worth retrying.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.category().is_retryable()
    }

    #[must_use]
    pub fn is_not_found(&self) -> bool {
        self.category() == ErrorCategory::NotFound
    }

    /// HTTP status, if the server answered
    #[must_use]
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Problem document, if the server returned one
    #[must_use]
    pub fn problem(&self) -> Option<&ProblemDocument> {
        match self {
            Error::Api { problem, .. } => problem.as_ref(),
            _ => None,
        }
    }
}

impl From<ureq::Error> for Error {
    fn from(err: ureq::Error) -> Self {
        match err {
            ureq::Error::StatusCode(code) => Self::Api {
                status: code,
                method: String::new(),
                path: String::new(),
                problem: None,
                body: String::new(),
            },
            other => Self::Network {
                message: other.to_string(),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
