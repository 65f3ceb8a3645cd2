//! Transport backends.
//!
//! The [`Backend`] trait executes one request against the management API
//! and returns the raw response, whatever its status. Status classification,
//! retries and decoding live in [`crate::Client`].
//!
//! # Testing
//!
//! Use [`MockBackend`] for testing without network access:
//!
//! ```
//! use pingone::backend::{Backend, MockBackend};
//! use pingone::Request;
//!
//! let mock = MockBackend::new();
//! let env = mock.add_environment();
//! let response = mock
//!     .execute(&Request::get(format!("/environments/{env}/resources")))
//!     .unwrap();
//! assert_eq!(response.status, 200);
//! ```

pub mod http;
pub mod mock;

pub use http::UreqBackend;
pub use mock::{MockBackend, RecordedRequest};

use crate::error::Result;
use crate::types::{Request, Response};

/// Backend trait for executing API requests.
///
/// Implementations must be safe to share between threads; reconcilers for
/// distinct records call into the same backend concurrently.
pub trait Backend: Send + Sync {
    /// Execute a request.
    ///
    /// Returns `Err` only for transport failures. Non-2xx responses are
    /// returned as [`Response`] so the caller can read the problem document.
    fn execute(&self, request: &Request) -> Result<Response>;
}
