//! # Declarative
//!
//! A framework for reconciling host-managed records against a remote API.
//!
//! The host runtime owns desired and observed state; this crate provides the
//! pieces a provider needs to converge one towards the other.
//!
//! ## Core Concepts
//!
//! - **Reconciler**: Create/Read/Update/Delete/Import for one record kind
//! - **AttrValue**: the null / unknown / known trichotomy of host values
//! - **Diagnostics**: append-only errors and warnings, checked at sync points
//! - **Schema**: attribute kinds, presence, validators and replacement rules
//! - **ExecutionPlan**: prior state and configuration turned into changes
//! - **Executor**: applies changes in parallel across records
//!
//! ## Example
//!
//! ```ignore
//! use declarative::{
//!     ApplyContext, Diagnostics, ExecuteOptions, ExecutionPlan, Registry, execute, plan_change,
//! };
//!
//! let mut registry = Registry::new();
//! registry.register(NoteReconciler::new(client));
//!
//! let mut diags = Diagnostics::new();
//! let mut plan = ExecutionPlan::new();
//! plan.push(plan_change(
//!     registry.get("note").unwrap(),
//!     "note.hello",
//!     None,
//!     Some(serde_json::json!({"text": "hello"})),
//!     &mut diags,
//! ));
//!
//! let (summary, outcomes) =
//!     execute(&registry, plan, &ExecuteOptions::default(), &ApplyContext::new())?;
//! ```

pub mod context;
pub mod diagnostics;
pub mod diff;
pub mod executor;
pub mod import;
pub mod planner;
pub mod resource;
pub mod schema;
pub mod types;
pub mod validators;
pub mod value;

// Re-export main types at crate root
pub use context::{ApplyContext, CancelToken};
pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use diff::{AttributeChange, ResourceDiff, attribute_changes, group_by_type};
pub use executor::{ChangeOutcome, execute};
pub use import::{ImportComponent, ImportError, ImportIdentifier, ImportedId, SegmentPattern};
pub use planner::{ChangeAction, DiffSummary, ExecutionPlan, PlannedChange, plan_change};
pub use resource::{BoxedReconciler, DynReconciler, Reconciler, Registry, erase};
pub use schema::{Attribute, AttributeKind, Presence, Schema};
pub use types::{ApplyResult, ExecuteOptions, ExecuteSummary};
pub use value::{AttrValue, UNKNOWN_SENTINEL};
