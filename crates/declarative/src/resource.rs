//! Reconciler trait for host-managed records
//!
//! A [`Reconciler`] converges one kind of remote object towards the desired
//! state the host hands it. It works on a typed model; the host protocol
//! works on JSON, so every reconciler is registered through the erased
//! [`DynReconciler`] view which decodes, validates and re-encodes records.

use crate::context::ApplyContext;
use crate::diagnostics::Diagnostics;
use crate::import::ImportIdentifier;
use crate::schema::Schema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Core trait for a managed record kind
///
/// Operations never return `Result`: failures are appended to `diags`.
/// Returning `None` without an error diagnostic means the remote object is
/// gone and the host should erase the record.
pub trait Reconciler: Send + Sync {
    /// Typed record, mirroring the schema attribute for attribute
    type Model: Clone + fmt::Debug + Default + Serialize + DeserializeOwned + Send + Sync;

    /// Host-facing type name, e.g. `pingone_resource_scope`
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Shape of the composite import identifier; empty if import is unsupported
    fn import_identifier(&self) -> ImportIdentifier {
        ImportIdentifier::default()
    }

    /// Adjust a planned update before it is shown to the host.
    ///
    /// Used to mark server-computed values unknown when an input that drives
    /// them changes.
    fn modify_plan(&self, _plan: &mut Self::Model, _prior: &Self::Model) {}

    fn create(
        &self,
        ctx: &ApplyContext,
        plan: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    fn read(
        &self,
        ctx: &ApplyContext,
        state: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: Self::Model,
        prior: Self::Model,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model>;

    fn delete(&self, ctx: &ApplyContext, state: Self::Model, diags: &mut Diagnostics);

    /// Import an existing object by composite identifier.
    ///
    /// The default parses the identifier into a stub record and reads it.
    fn import_state(
        &self,
        ctx: &ApplyContext,
        id: &str,
        diags: &mut Diagnostics,
    ) -> Option<Self::Model> {
        let parsed = match self.import_identifier().parse(id) {
            Ok(parsed) => parsed,
            Err(e) => {
                diags.error("Unexpected Import Identifier", e.to_string());
                return None;
            }
        };

        let stub: Self::Model = match serde_json::from_value(parsed.to_state_json()) {
            Ok(stub) => stub,
            Err(e) => {
                diags.error(
                    "Unexpected Import Identifier",
                    format!("Cannot build import stub for \"{id}\": {e}"),
                );
                return None;
            }
        };

        let state = self.read(ctx, stub, diags);
        if state.is_none() && !diags.has_error() {
            diags.error(
                "Cannot import non-existent remote object",
                format!(
                    "No {} exists with import ID \"{id}\".",
                    self.type_name()
                ),
            );
        }
        state
    }
}

/// JSON view of a reconciler, as the host protocol sees it
pub trait DynReconciler: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    /// Run schema validation on a configuration value
    fn validate_config(&self, config: &Value, diags: &mut Diagnostics);

    /// Apply reconciler plan modifiers to a planned update
    fn modify_plan(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value>;

    fn create(&self, ctx: &ApplyContext, plan: &Value, diags: &mut Diagnostics) -> Option<Value>;

    fn read(&self, ctx: &ApplyContext, state: &Value, diags: &mut Diagnostics) -> Option<Value>;

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: &Value,
        prior: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value>;

    fn delete(&self, ctx: &ApplyContext, state: &Value, diags: &mut Diagnostics);

    fn import_state(&self, ctx: &ApplyContext, id: &str, diags: &mut Diagnostics) -> Option<Value>;
}

/// A boxed reconciler for type-erased storage
pub type BoxedReconciler = Box<dyn DynReconciler>;

/// Erase a typed reconciler into its JSON view
pub fn erase<R: Reconciler + 'static>(reconciler: R) -> BoxedReconciler {
    Box::new(Erased(reconciler))
}

struct Erased<R>(R);

impl<R: Reconciler> Erased<R> {
    fn decode(&self, what: &str, value: &Value, diags: &mut Diagnostics) -> Option<R::Model> {
        match serde_json::from_value(value.clone()) {
            Ok(model) => Some(model),
            Err(e) => {
                diags.error(
                    format!("Unable to decode {what}"),
                    format!("{} {what} could not be decoded: {e}", self.0.type_name()),
                );
                None
            }
        }
    }

    fn encode(&self, model: Option<R::Model>, diags: &mut Diagnostics) -> Option<Value> {
        match serde_json::to_value(model?) {
            Ok(value) => Some(value),
            Err(e) => {
                diags.error(
                    "Unable to encode state",
                    format!("{} state could not be encoded: {e}", self.0.type_name()),
                );
                None
            }
        }
    }
}

impl<R: Reconciler> DynReconciler for Erased<R> {
    fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    fn schema(&self) -> Schema {
        self.0.schema()
    }

    fn validate_config(&self, config: &Value, diags: &mut Diagnostics) {
        self.0.schema().validate(config, diags);
    }

    fn modify_plan(&self, plan: &Value, prior: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let mut plan = self.decode("plan", plan, diags)?;
        let prior = self.decode("prior state", prior, diags)?;
        self.0.modify_plan(&mut plan, &prior);
        self.encode(Some(plan), diags)
    }

    fn create(&self, ctx: &ApplyContext, plan: &Value, diags: &mut Diagnostics) -> Option<Value> {
        self.validate_config(plan, diags);
        if diags.has_error() {
            return None;
        }
        let plan = self.decode("plan", plan, diags)?;
        let state = self.0.create(ctx, plan, diags);
        if diags.has_error() {
            return None;
        }
        self.encode(state, diags)
    }

    fn read(&self, ctx: &ApplyContext, state: &Value, diags: &mut Diagnostics) -> Option<Value> {
        let state = self.decode("state", state, diags)?;
        let state = self.0.read(ctx, state, diags);
        if diags.has_error() {
            return None;
        }
        self.encode(state, diags)
    }

    fn update(
        &self,
        ctx: &ApplyContext,
        plan: &Value,
        prior: &Value,
        diags: &mut Diagnostics,
    ) -> Option<Value> {
        self.validate_config(plan, diags);
        if diags.has_error() {
            return None;
        }
        let plan = self.decode("plan", plan, diags)?;
        let prior = self.decode("prior state", prior, diags)?;
        let state = self.0.update(ctx, plan, prior, diags);
        if diags.has_error() {
            return None;
        }
        self.encode(state, diags)
    }

    fn delete(&self, ctx: &ApplyContext, state: &Value, diags: &mut Diagnostics) {
        if let Some(state) = self.decode("state", state, diags) {
            self.0.delete(ctx, state, diags);
        }
    }

    fn import_state(&self, ctx: &ApplyContext, id: &str, diags: &mut Diagnostics) -> Option<Value> {
        let state = self.0.import_state(ctx, id, diags);
        if diags.has_error() {
            return None;
        }
        self.encode(state, diags)
    }
}

/// Reconcilers keyed by type name
#[derive(Default)]
pub struct Registry {
    reconcilers: BTreeMap<&'static str, BoxedReconciler>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<R: Reconciler + 'static>(&mut self, reconciler: R) {
        let boxed = erase(reconciler);
        log::debug!("Registering reconciler {}", boxed.type_name());
        self.reconcilers.insert(boxed.type_name(), boxed);
    }

    pub fn get(&self, type_name: &str) -> Option<&dyn DynReconciler> {
        self.reconcilers.get(type_name).map(|r| &**r)
    }

    pub fn type_names(&self) -> Vec<&'static str> {
        self.reconcilers.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.reconcilers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reconcilers.is_empty()
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("reconcilers", &self.type_names())
            .finish()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::import::ImportIdentifier;
    use crate::schema::Attribute;
    use crate::validators::UuidShape;
    use crate::value::AttrValue;
    use serde::{Deserialize, Serialize};
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    /// In-memory reconciler used by the framework tests
    #[derive(Default)]
    pub(crate) struct MemoryReconciler {
        pub(crate) store: Mutex<BTreeMap<String, String>>,
        pub(crate) next_id: Mutex<u32>,
    }

    #[derive(Debug, Clone, Default, Serialize, Deserialize)]
    #[serde(default)]
    pub(crate) struct Note {
        pub(crate) id: AttrValue<String>,
        pub(crate) environment_id: AttrValue<String>,
        pub(crate) text: AttrValue<String>,
    }

    pub(crate) const ENV: &str = "6d2b1c55-2f3a-4b67-9d1e-3a4b5c6d7e8f";

    impl Reconciler for MemoryReconciler {
        type Model = Note;

        fn type_name(&self) -> &'static str {
            "test_note"
        }

        fn schema(&self) -> Schema {
            Schema::new("A note")
                .attribute(Attribute::id())
                .attribute(
                    Attribute::string("environment_id")
                        .required()
                        .force_new()
                        .validate(UuidShape),
                )
                .attribute(Attribute::string("text").required())
        }

        fn import_identifier(&self) -> ImportIdentifier {
            ImportIdentifier::environment_child("note_id")
        }

        fn create(&self, _ctx: &ApplyContext, mut plan: Note, _diags: &mut Diagnostics) -> Option<Note> {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            let id = format!("00000000-0000-4000-8000-{:012x}", *next);
            self.store
                .lock()
                .unwrap()
                .insert(id.clone(), plan.text.known_or_default());
            plan.id = AttrValue::Known(id);
            Some(plan)
        }

        fn read(&self, _ctx: &ApplyContext, mut state: Note, _diags: &mut Diagnostics) -> Option<Note> {
            let id = state.id.known_or_default();
            let text = self.store.lock().unwrap().get(&id).cloned()?;
            state.text = AttrValue::Known(text);
            Some(state)
        }

        fn update(
            &self,
            _ctx: &ApplyContext,
            mut plan: Note,
            prior: Note,
            _diags: &mut Diagnostics,
        ) -> Option<Note> {
            let id = prior.id.known_or_default();
            self.store
                .lock()
                .unwrap()
                .insert(id.clone(), plan.text.known_or_default());
            plan.id = AttrValue::Known(id);
            Some(plan)
        }

        fn delete(&self, _ctx: &ApplyContext, state: Note, diags: &mut Diagnostics) {
            if self
                .store
                .lock()
                .unwrap()
                .remove(&state.id.known_or_default())
                .is_none()
            {
                diags.warning("Note not found", "already deleted");
            }
        }
    }

    #[test]
    fn test_erased_round_trip() {
        let r = erase(MemoryReconciler::default());
        let ctx = ApplyContext::new();
        let mut diags = Diagnostics::new();

        let created = r
            .create(&ctx, &json!({"environment_id": ENV, "text": "hi"}), &mut diags)
            .unwrap();
        assert!(!diags.has_error());
        let read = r.read(&ctx, &created, &mut diags).unwrap();
        assert_eq!(read, created);
    }

    #[test]
    fn test_schema_validation_blocks_create() {
        let r = erase(MemoryReconciler::default());
        let mut diags = Diagnostics::new();
        let out = r.create(
            &ApplyContext::new(),
            &json!({"environment_id": "nope", "text": "hi"}),
            &mut diags,
        );
        assert!(out.is_none());
        assert!(diags.mentions("valid UUID"));
    }

    #[test]
    fn test_import_missing_object_is_error() {
        let r = erase(MemoryReconciler::default());
        let mut diags = Diagnostics::new();
        let out = r.import_state(
            &ApplyContext::new(),
            &format!("{ENV}/00000000-0000-4000-8000-000000000009"),
            &mut diags,
        );
        assert!(out.is_none());
        assert!(diags.mentions("non-existent"));
    }

    #[test]
    fn test_import_existing_object() {
        let reconciler = MemoryReconciler::default();
        let ctx = ApplyContext::new();
        let mut diags = Diagnostics::new();
        let created = reconciler
            .create(
                &ctx,
                Note {
                    environment_id: AttrValue::Known(ENV.into()),
                    text: AttrValue::Known("hello".into()),
                    ..Default::default()
                },
                &mut diags,
            )
            .unwrap();
        let id = created.id.known_or_default();
        let imported = reconciler
            .import_state(&ctx, &format!("{ENV}/{id}"), &mut diags)
            .unwrap();
        assert_eq!(imported.text.as_str(), Some("hello"));
        assert_eq!(imported.environment_id.as_str(), Some(ENV));
    }

    #[test]
    fn test_registry() {
        let mut registry = Registry::new();
        registry.register(MemoryReconciler::default());
        assert_eq!(registry.type_names(), vec!["test_note"]);
        assert!(registry.get("test_note").is_some());
        assert!(registry.get("other").is_none());
    }
}
