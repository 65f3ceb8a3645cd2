//! # PingOne
//!
//! Blocking client for the PingOne management API.
//!
//! Every administrative object lives under an environment, so every path is
//! parent-scoped (`/environments/{env}/resources/{id}/scopes`, ...). The
//! crate provides:
//!
//! - **Models**: typed request/response payloads, including the tagged
//!   unions behind sign-on policy actions and identity providers
//! - **Client**: typed CRUD over a [`Backend`], cursor pagination, and the
//!   environment probe used to tell a missing child from a missing parent
//! - **Errors**: HTTP outcomes classified into retry categories, with the
//!   server's problem document kept verbatim
//! - **Retry**: exponential backoff bounded by the caller's deadline and
//!   cancellation
//!
//! ## Example
//!
//! ```no_run
//! use pingone::{Client, UreqBackend, models::Resource, paths};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let backend = UreqBackend::new("https://api.pingone.com/v1", "token", Duration::from_secs(30));
//! let client = Client::new(Arc::new(backend));
//! let resources: Vec<Resource> = client.list(&paths::resources("env-id")).unwrap();
//! ```

pub mod backend;
pub mod client;
pub mod error;
pub mod models;
pub mod paths;
pub mod retry;
pub mod types;

pub use backend::{Backend, MockBackend, RecordedRequest, UreqBackend};
pub use client::{Client, SECRET_REGENERATE_CONTENT_TYPE};
pub use error::{Error, ErrorCategory, ProblemDetail, ProblemDocument, Result};
pub use retry::{RetryBudget, should_retry, with_retry};
pub use types::{Method, ObjectRef, Request, Response, RetryConfig};
