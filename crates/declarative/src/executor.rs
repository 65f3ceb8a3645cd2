//! Execution engine - applies planned changes in parallel across records

use crate::context::ApplyContext;
use crate::diagnostics::Diagnostics;
use crate::planner::{ChangeAction, ExecutionPlan, PlannedChange};
use crate::resource::Registry;
use crate::types::{ApplyResult, ExecuteOptions, ExecuteSummary};
use anyhow::Result;
use rayon::prelude::*;
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};

/// Outcome of applying one planned change
#[derive(Debug, Clone)]
pub struct ChangeOutcome {
    pub address: String,
    pub type_name: String,
    pub result: ApplyResult,
    /// Observed state to persist; `None` erases the record
    pub state: Option<Value>,
    pub diagnostics: Diagnostics,
}

/// Execute a plan against the registered reconcilers
///
/// Each record is applied on its own; records run in parallel on a pool of
/// `opts.jobs` threads. Results come back in plan order.
pub fn execute(
    registry: &Registry,
    plan: ExecutionPlan,
    opts: &ExecuteOptions,
    ctx: &ApplyContext,
) -> Result<(ExecuteSummary, Vec<ChangeOutcome>)> {
    let summary_plan = plan.summary();
    if !summary_plan.has_changes() {
        log::debug!("Nothing to apply for {} record(s)", plan.len());
    }

    let outcomes = if opts.jobs <= 1 || plan.len() <= 1 {
        plan.changes
            .iter()
            .map(|change| apply_change(registry, change, opts, ctx))
            .collect()
    } else {
        execute_parallel(registry, &plan.changes, opts, ctx)?
    };

    let mut summary = ExecuteSummary::default();
    for outcome in &outcomes {
        summary.add_result(&outcome.result);
    }
    log::info!(
        "Applied {} change(s): {} created, {} modified, {} replaced, {} removed, {} failed",
        summary.total_changes(),
        summary.created,
        summary.modified,
        summary.replaced,
        summary.removed,
        summary.failed
    );
    Ok((summary, outcomes))
}

/// Execute changes in parallel using rayon
fn execute_parallel(
    registry: &Registry,
    changes: &[PlannedChange],
    opts: &ExecuteOptions,
    ctx: &ApplyContext,
) -> Result<Vec<ChangeOutcome>> {
    let results: Arc<Mutex<Vec<(usize, ChangeOutcome)>>> = Arc::new(Mutex::new(Vec::new()));

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.jobs)
        .build()
        .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {e}"))?;

    pool.install(|| {
        changes.par_iter().enumerate().for_each(|(i, change)| {
            let outcome = apply_change(registry, change, opts, ctx);
            results
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((i, outcome));
        });
    });

    let mut results = Arc::try_unwrap(results)
        .map_err(|_| anyhow::anyhow!("Failed to unwrap results"))?
        .into_inner()
        .unwrap_or_else(PoisonError::into_inner);
    results.sort_by_key(|(i, _)| *i);

    Ok(results.into_iter().map(|(_, outcome)| outcome).collect())
}

/// Apply a single planned change
fn apply_change(
    registry: &Registry,
    change: &PlannedChange,
    opts: &ExecuteOptions,
    ctx: &ApplyContext,
) -> ChangeOutcome {
    let mut diags = Diagnostics::new();
    let outcome = |result, state, diags| ChangeOutcome {
        address: change.address.clone(),
        type_name: change.type_name.clone(),
        result,
        state,
        diagnostics: diags,
    };

    if change.action == ChangeAction::NoOp {
        return outcome(ApplyResult::NoChange, change.prior.clone(), diags);
    }

    if opts.dry_run {
        return outcome(
            ApplyResult::Skipped {
                reason: "Dry run".into(),
            },
            change.prior.clone(),
            diags,
        );
    }

    let Some(reconciler) = registry.get(&change.type_name) else {
        diags.error(
            "Unknown resource type",
            format!("No reconciler is registered for {}", change.type_name),
        );
        return outcome(failed(&diags), change.prior.clone(), diags);
    };

    if ctx.is_cancelled() {
        diags.error("Operation cancelled", format!("{} was not applied", change.address));
        return outcome(failed(&diags), change.prior.clone(), diags);
    }

    log::debug!("Applying {:?} to {}", change.action, change.address);
    let null = Value::Null;
    let prior = change.prior.as_ref().unwrap_or(&null);
    let planned = change.planned.as_ref().unwrap_or(&null);

    let (result, state) = match change.action {
        ChangeAction::Create => {
            let state = reconciler.create(ctx, planned, &mut diags);
            (ApplyResult::Created, state)
        }
        ChangeAction::Update => {
            let state = reconciler.update(ctx, planned, prior, &mut diags);
            (ApplyResult::Modified, state)
        }
        ChangeAction::Replace => {
            reconciler.delete(ctx, prior, &mut diags);
            if diags.has_error() {
                return outcome(failed(&diags), change.prior.clone(), diags);
            }
            let state = reconciler.create(ctx, planned, &mut diags);
            (ApplyResult::Replaced, state)
        }
        ChangeAction::Delete => {
            reconciler.delete(ctx, prior, &mut diags);
            (ApplyResult::Removed, None)
        }
        ChangeAction::NoOp => (ApplyResult::NoChange, change.prior.clone()),
    };

    if diags.has_error() {
        // A failed create leaves nothing to track; other failures keep prior state
        let state = match change.action {
            ChangeAction::Create | ChangeAction::Replace => None,
            _ => change.prior.clone(),
        };
        return outcome(failed(&diags), state, diags);
    }

    outcome(result, state, diags)
}

fn failed(diags: &Diagnostics) -> ApplyResult {
    ApplyResult::Failed {
        error: diags
            .errors()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; "),
    }
}
