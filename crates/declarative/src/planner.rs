//! Execution planner - turns prior state and configuration into changes

use crate::diagnostics::Diagnostics;
use crate::diff::ResourceDiff;
use crate::resource::DynReconciler;
use crate::schema::{Presence, Schema};
use crate::value::UNKNOWN_SENTINEL;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// What the executor will do with a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeAction {
    Create,
    Update,
    /// Destroy then create
    Replace,
    Delete,
    NoOp,
}

/// A planned change for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlannedChange {
    /// Host address, e.g. `pingone_resource_scope.email`
    pub address: String,
    pub type_name: String,
    pub action: ChangeAction,
    pub prior: Option<Value>,
    pub planned: Option<Value>,
    pub diff: Option<ResourceDiff>,
}

/// Plan a single record.
///
/// `prior` is the last observed state, `config` the desired configuration;
/// either may be absent. Computed attributes the configuration leaves unset
/// are carried from prior state on update and marked unknown on create.
pub fn plan_change(
    reconciler: &dyn DynReconciler,
    address: &str,
    prior: Option<Value>,
    config: Option<Value>,
    diags: &mut Diagnostics,
) -> PlannedChange {
    let type_name = reconciler.type_name().to_string();
    let schema = reconciler.schema();

    let Some(config) = config else {
        let action = if prior.is_some() {
            ChangeAction::Delete
        } else {
            ChangeAction::NoOp
        };
        return PlannedChange {
            address: address.to_string(),
            type_name,
            action,
            prior,
            planned: None,
            diff: None,
        };
    };

    reconciler.validate_config(&config, diags);

    let mut planned = config.as_object().cloned().unwrap_or_default();
    fill_computed(&schema, &mut planned, prior.as_ref());
    let mut planned = Value::Object(planned);

    let Some(prior) = prior else {
        return PlannedChange {
            address: address.to_string(),
            type_name,
            action: ChangeAction::Create,
            prior: None,
            planned: Some(planned),
            diff: None,
        };
    };

    if let Some(modified) = reconciler.modify_plan(&planned, &prior, diags) {
        planned = modified;
    }

    let diff = ResourceDiff::between(address, &type_name, &schema, &prior, &planned);
    let action = match &diff {
        None => ChangeAction::NoOp,
        Some(d) if d.requires_replace() => {
            // The replacement is a fresh object; its computed values are unknown again
            if let Value::Object(map) = &mut planned {
                mark_computed_unknown(&schema, map, &config);
            }
            ChangeAction::Replace
        }
        Some(_) => ChangeAction::Update,
    };

    PlannedChange {
        address: address.to_string(),
        type_name,
        action,
        prior: Some(prior),
        planned: Some(planned),
        diff,
    }
}

fn fill_computed(schema: &Schema, planned: &mut Map<String, Value>, prior: Option<&Value>) {
    for attribute in &schema.attributes {
        if !attribute.presence.is_computed() {
            continue;
        }
        let configured = planned.get(attribute.name).is_some_and(|v| !v.is_null());
        if configured && attribute.presence == Presence::OptionalComputed {
            continue;
        }
        let carried = prior
            .and_then(|p| p.get(attribute.name))
            .filter(|v| !v.is_null())
            .cloned();
        let value = carried.unwrap_or_else(|| Value::String(UNKNOWN_SENTINEL.to_string()));
        planned.insert(attribute.name.to_string(), value);
    }
}

fn mark_computed_unknown(schema: &Schema, planned: &mut Map<String, Value>, config: &Value) {
    for attribute in &schema.attributes {
        let configured = config.get(attribute.name).is_some_and(|v| !v.is_null());
        if attribute.presence == Presence::Computed
            || (attribute.presence == Presence::OptionalComputed && !configured)
        {
            planned.insert(
                attribute.name.to_string(),
                Value::String(UNKNOWN_SENTINEL.to_string()),
            );
        }
    }
}

/// Counts of planned actions
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffSummary {
    pub additions: usize,
    pub removals: usize,
    pub modifications: usize,
    pub replacements: usize,
}

impl DiffSummary {
    pub fn total(&self) -> usize {
        self.additions + self.removals + self.modifications + self.replacements
    }

    pub fn has_changes(&self) -> bool {
        self.total() > 0
    }
}

/// An ordered set of planned changes
#[derive(Debug, Clone, Default)]
pub struct ExecutionPlan {
    pub changes: Vec<PlannedChange>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, change: PlannedChange) {
        self.changes.push(change);
    }

    /// Filter plan to only include changes matching a predicate
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&PlannedChange) -> bool,
    {
        Self {
            changes: self.changes.into_iter().filter(|c| predicate(c)).collect(),
        }
    }

    /// Filter plan to only include changes matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (type_name, name) = parse_target(t);
                self.filter(|c| matches_filter(c, type_name.as_deref(), name.as_deref()))
            }
        }
    }

    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for change in &self.changes {
            match change.action {
                ChangeAction::Create => summary.additions += 1,
                ChangeAction::Delete => summary.removals += 1,
                ChangeAction::Update => summary.modifications += 1,
                ChangeAction::Replace => summary.replacements += 1,
                ChangeAction::NoOp => {}
            }
        }
        summary
    }

    /// Total number of records in the plan
    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }
}

/// Parse a target string like "type.name" into (type, name)
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    let parts: Vec<&str> = target.split('.').collect();
    match parts.len() {
        1 => (Some(parts[0].to_string()), None),
        2 => (Some(parts[0].to_string()), Some(parts[1].to_string())),
        _ => (None, Some(target.to_string())),
    }
}

fn matches_filter(change: &PlannedChange, type_name: Option<&str>, name: Option<&str>) -> bool {
    if let Some(t) = type_name
        && change.type_name != t
    {
        return false;
    }

    if let Some(n) = name
        && !change.address.ends_with(&format!(".{n}"))
        && change.address != n
    {
        return false;
    }

    true
}
