//! Attribute-level diff between prior state and planned state

use crate::schema::{AttributeKind, Presence, Schema};
use crate::value::is_unknown;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// A single changed attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeChange {
    pub path: String,
    pub before: Value,
    pub after: Value,
    /// Values must not be shown
    pub sensitive: bool,
    /// Changing this attribute forces replacement
    pub forces_replacement: bool,
}

impl AttributeChange {
    /// Value as shown to an operator
    pub fn display_after(&self) -> String {
        if self.sensitive {
            "(sensitive value)".to_string()
        } else if is_unknown(&self.after) {
            "(known after apply)".to_string()
        } else {
            self.after.to_string()
        }
    }
}

/// Diff for one record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceDiff {
    /// Host address, e.g. `pingone_resource.api`
    pub address: String,
    pub type_name: String,
    pub changes: Vec<AttributeChange>,
}

impl ResourceDiff {
    /// Diff two records, returning None if nothing changed
    pub fn between(
        address: &str,
        type_name: &str,
        schema: &Schema,
        prior: &Value,
        planned: &Value,
    ) -> Option<Self> {
        let changes = attribute_changes(schema, prior, planned);
        if changes.is_empty() {
            return None;
        }
        Some(Self {
            address: address.to_string(),
            type_name: type_name.to_string(),
            changes,
        })
    }

    pub fn requires_replace(&self) -> bool {
        self.changes.iter().any(|c| c.forces_replacement)
    }

    /// Paths of the changes that force replacement
    pub fn replace_paths(&self) -> Vec<String> {
        self.changes
            .iter()
            .filter(|c| c.forces_replacement)
            .map(|c| c.path.clone())
            .collect()
    }

    pub fn changed(&self, path: &str) -> bool {
        self.changes.iter().any(|c| c.path == path)
    }
}

/// Compare the top-level attributes of two records.
///
/// Server-owned attributes the plan leaves null are not changes; sets are
/// compared without regard to order.
pub fn attribute_changes(schema: &Schema, prior: &Value, planned: &Value) -> Vec<AttributeChange> {
    let mut changes = Vec::new();
    for attribute in &schema.attributes {
        let before = prior.get(attribute.name).cloned().unwrap_or(Value::Null);
        let after = planned.get(attribute.name).cloned().unwrap_or(Value::Null);

        if after.is_null() && attribute.presence.is_computed() {
            continue;
        }
        if attribute.presence == Presence::Computed && !is_unknown(&after) {
            continue;
        }
        if normalize(&attribute.kind, &before) == normalize(&attribute.kind, &after) {
            continue;
        }

        changes.push(AttributeChange {
            path: attribute.name.to_string(),
            before,
            after,
            sensitive: attribute.sensitive,
            forces_replacement: attribute.force_new,
        });
    }
    changes
}

fn normalize(kind: &AttributeKind, value: &Value) -> Value {
    match (kind, value) {
        (AttributeKind::StringSet, Value::Array(items)) => {
            let mut items: Vec<String> = items
                .iter()
                .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                .collect();
            items.sort();
            items.dedup();
            Value::from(items)
        }
        // An empty collection and an unset one mean the same thing
        (
            AttributeKind::StringSet
            | AttributeKind::StringList
            | AttributeKind::BlockList(_),
            Value::Null,
        ) => Value::Array(Vec::new()),
        (AttributeKind::StringMap, Value::Null) => Value::Object(serde_json::Map::new()),
        _ => value.clone(),
    }
}

/// Group diffs by record type
pub fn group_by_type(diffs: &[ResourceDiff]) -> HashMap<String, Vec<&ResourceDiff>> {
    let mut groups: HashMap<String, Vec<&ResourceDiff>> = HashMap::new();
    for diff in diffs {
        groups.entry(diff.type_name.clone()).or_default().push(diff);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Attribute;
    use crate::value::UNKNOWN_SENTINEL;
    use serde_json::json;

    fn schema() -> Schema {
        Schema::new("grant")
            .attribute(Attribute::id())
            .attribute(Attribute::string("application_id").required().force_new())
            .attribute(Attribute::string_set("scopes").required())
            .attribute(Attribute::string("secret").computed().sensitive())
            .attribute(Attribute::string_map("triggers").optional())
    }

    #[test]
    fn test_set_order_is_ignored() {
        let prior = json!({"id": "g", "application_id": "a", "scopes": ["s1", "s2"]});
        let planned = json!({"id": "g", "application_id": "a", "scopes": ["s2", "s1"]});
        assert!(attribute_changes(&schema(), &prior, &planned).is_empty());
    }

    #[test]
    fn test_force_new_marks_replacement() {
        let prior = json!({"id": "g", "application_id": "a", "scopes": ["s1"]});
        let planned = json!({"id": "g", "application_id": "b", "scopes": ["s1", "s3"]});
        let diff = ResourceDiff::between("pingone_grant.x", "pingone_grant", &schema(), &prior, &planned)
            .unwrap();
        assert!(diff.requires_replace());
        assert_eq!(diff.replace_paths(), vec!["application_id".to_string()]);
        assert!(diff.changed("scopes"));
    }

    #[test]
    fn test_computed_unknown_is_a_change() {
        let prior = json!({"application_id": "a", "scopes": [], "secret": "old"});
        let same = json!({"application_id": "a", "scopes": [], "secret": "old"});
        assert!(attribute_changes(&schema(), &prior, &same).is_empty());

        let rotated = json!({"application_id": "a", "scopes": [], "secret": UNKNOWN_SENTINEL});
        let changes = attribute_changes(&schema(), &prior, &rotated);
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].display_after(), "(sensitive value)");
    }

    #[test]
    fn test_empty_map_equals_null() {
        let prior = json!({"application_id": "a", "scopes": ["s"], "triggers": {}});
        let planned = json!({"application_id": "a", "scopes": ["s"]});
        assert!(attribute_changes(&schema(), &prior, &planned).is_empty());
    }
}
