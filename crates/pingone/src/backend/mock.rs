//! In-memory emulation of the parent-scoped management API.
//!
//! Objects are stored by path. A path with an odd number of segments after
//! `/environments/{env}` is a collection, an even number is an item, and a
//! handful of well-known trailing names (`secret`, `enabled`, `population`)
//! are singletons of their parent item. Every request checks that the
//! environment and each ancestor item exist, so removing an environment or a
//! parent turns every child request into a 404, as the real service does.

use crate::backend::Backend;
use crate::error::{ProblemDocument, Result};
use crate::models::{PREDEFINED_OPENID_SCOPES, TYPE_ADMIN_CONSOLE};
use crate::types::{Method, Request, Response};
use chrono::{SecondsFormat, Utc};
use serde_json::{Map, Value, json};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

const DEFAULT_PAGE_SIZE: usize = 100;

/// Singleton sub-resources and the parent collections that own them
const SINGLETONS: &[(&str, &str)] = &[
    ("resources", "secret"),
    ("users", "enabled"),
    ("users", "population"),
];

/// Fields that must be unique among siblings of a collection
const UNIQUE_FIELDS: &[(&str, &str)] = &[
    ("resources", "name"),
    ("scopes", "name"),
    ("attributes", "name"),
    ("actions", "priority"),
    ("signOnPolicies", "name"),
    ("identityProviders", "name"),
    ("populations", "name"),
    ("passwordPolicies", "name"),
    ("users", "username"),
    ("groups", "name"),
];

/// Fields the server owns; a PUT that omits them keeps the stored value
const SERVER_FIELDS: &[&str] = &[
    "id",
    "environment",
    "resource",
    "application",
    "signOnPolicy",
    "type",
    "createdAt",
    "default",
];

/// A request as the mock received it
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct MockState {
    environments: BTreeSet<String>,
    objects: BTreeMap<String, Value>,
    next_id: u64,
    page_size: Option<usize>,
    failures: VecDeque<(u16, Value)>,
    requests: Vec<RecordedRequest>,
}

/// Mock backend for testing without network access.
///
/// Cloning shares the underlying store, so a test can keep a handle for
/// inspection after handing a clone to the client.
#[derive(Debug, Clone, Default)]
pub struct MockBackend {
    state: Arc<Mutex<MockState>>,
}

/// Shape of a request path
#[derive(Debug, PartialEq, Eq)]
enum Target {
    Environment,
    Collection { name: String },
    Item { collection: String },
    Singleton { name: String, parent: String },
}

struct ParsedPath {
    env: String,
    /// Path without query string
    path: String,
    target: Target,
    /// Item paths that must exist for the request to be served
    ancestors: Vec<String>,
    cursor: usize,
    limit: Option<usize>,
}

fn parse_path(raw: &str) -> Option<ParsedPath> {
    let (path, query) = raw.split_once('?').unwrap_or((raw, ""));
    let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();
    if segments.len() < 2 || segments[0] != "environments" || segments.iter().any(|s| s.is_empty()) {
        return None;
    }
    let env = segments[1].to_string();
    let rest = &segments[2..];

    let mut cursor = 0;
    let mut limit = None;
    for pair in query.split('&').filter(|p| !p.is_empty()) {
        match pair.split_once('=') {
            Some(("cursor", v)) => cursor = v.parse().ok()?,
            Some(("limit", v)) => limit = Some(v.parse().ok()?),
            _ => {}
        }
    }

    let prefix = |n: usize| format!("/environments/{env}/{}", rest[..n].join("/"));
    let mut ancestors = Vec::new();

    let target = if rest.is_empty() {
        Target::Environment
    } else if rest.len() % 2 == 1 {
        let last = rest[rest.len() - 1];
        let singleton_parent = (rest.len() >= 3)
            .then(|| rest[rest.len() - 3])
            .filter(|parent| SINGLETONS.contains(&(*parent, last)));
        for n in (2..rest.len()).step_by(2) {
            ancestors.push(prefix(n));
        }
        match singleton_parent {
            Some(_) => Target::Singleton {
                name: last.to_string(),
                parent: prefix(rest.len() - 1),
            },
            None => Target::Collection {
                name: last.to_string(),
            },
        }
    } else {
        for n in (2..rest.len()).step_by(2) {
            ancestors.push(prefix(n));
        }
        Target::Item {
            collection: rest[rest.len() - 2].to_string(),
        }
    };

    Some(ParsedPath {
        env,
        path: path.trim_end_matches('/').to_string(),
        target,
        ancestors,
        cursor,
        limit,
    })
}

fn json_response(status: u16, value: &Value) -> Response {
    Response {
        status,
        body: serde_json::to_vec(value).unwrap_or_default(),
    }
}

fn empty_response(status: u16) -> Response {
    Response {
        status,
        body: Vec::new(),
    }
}

fn problem_response(status: u16, problem: &ProblemDocument) -> Response {
    Response {
        status,
        body: serde_json::to_vec(problem).unwrap_or_default(),
    }
}

fn not_found(path: &str) -> Response {
    problem_response(
        404,
        &ProblemDocument::new(
            "NOT_FOUND",
            format!("Unable to find resource with path {path}"),
        ),
    )
}

fn invalid_data(target: &str, code: &str, message: impl Into<String>) -> Response {
    problem_response(
        400,
        &ProblemDocument::new(
            "INVALID_DATA",
            "The request could not be completed. One or more validation errors were in the request.",
        )
        .with_detail(code, Some(target), message),
    )
}

fn request_error(message: impl Into<String>) -> Response {
    problem_response(400, &ProblemDocument::new("INVALID_REQUEST", message))
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Singular reference key a nested object carries for its parent
fn parent_key(parent_collection: &str) -> Option<&'static str> {
    match parent_collection {
        "resources" => Some("resource"),
        "applications" => Some("application"),
        "signOnPolicies" => Some("signOnPolicy"),
        _ => None,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn ref_id<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(|r| r.get("id")).and_then(Value::as_str)
}

impl MockState {
    fn new_id(&mut self) -> String {
        self.next_id += 1;
        format!("00000000-0000-4000-8000-{:012x}", self.next_id)
    }

    fn new_secret(&mut self) -> String {
        self.next_id += 1;
        format!("mock-secret-{:08x}", self.next_id)
    }

    fn children(&self, collection: &str) -> Vec<&Value> {
        let prefix = format!("{collection}/");
        self.objects
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .filter(|(key, _)| !key[prefix.len()..].contains('/'))
            .map(|(_, v)| v)
            .collect()
    }

    /// Parent item path and its collection name:
    /// `/environments/e/resources/r/scopes/s` gives `(/environments/e/resources/r, resources)`
    fn parent_of(path: &str) -> Option<(&str, &str)> {
        let (collection, _) = path.rsplit_once('/')?;
        let (parent, _) = collection.rsplit_once('/')?;
        let (parent_collection_path, _) = parent.rsplit_once('/')?;
        let (_, parent_collection) = parent_collection_path.rsplit_once('/')?;
        Some((parent, parent_collection))
    }

    fn check_unique(&self, collection_path: &str, name: &str, body: &Value, own_id: Option<&str>) -> Option<Response> {
        for (unique_collection, field) in UNIQUE_FIELDS {
            if *unique_collection != name {
                continue;
            }
            let Some(wanted) = body.get(*field).filter(|v| !v.is_null()) else {
                continue;
            };
            let clash = self.children(collection_path).into_iter().any(|existing| {
                existing.get(*field) == Some(wanted) && str_field(existing, "id") != own_id
            });
            if clash {
                return Some(invalid_data(
                    field,
                    "UNIQUENESS_VIOLATION",
                    format!("{field} is unique for this collection and {wanted} is already in use"),
                ));
            }
        }
        None
    }

    /// Per-collection rules the real service enforces on writes
    fn check_write(&self, collection_path: &str, collection: &str, body: &Value) -> Option<Response> {
        let parent = collection_path.rsplit_once('/').map(|(p, _)| p).unwrap_or_default();
        let parent_object = self.objects.get(parent);
        match collection {
            "grants" => {
                let app = parent_object?;
                if str_field(app, "type") == Some(TYPE_ADMIN_CONSOLE) {
                    return Some(request_error("Unmappable application type"));
                }
                let resource_id = ref_id(body, "resource")?;
                let env_path = collection_path.split("/applications/").next().unwrap_or_default();
                let scopes_path = format!("{env_path}/resources/{resource_id}/scopes");
                for scope in body.get("scopes").and_then(Value::as_array).into_iter().flatten() {
                    let Some(id) = scope.get("id").and_then(Value::as_str) else {
                        continue;
                    };
                    if !self.objects.contains_key(&format!("{scopes_path}/{id}")) {
                        return Some(invalid_data(
                            "scopes",
                            "INVALID_VALUE",
                            format!("Scope {id} does not belong to resource {resource_id}"),
                        ));
                    }
                }
                None
            }
            "attributes" if parent.contains("/applications/") => {
                let app = parent_object?;
                let core = match str_field(app, "protocol") {
                    Some("SAML") => "saml_subject",
                    _ => "sub",
                };
                let name = str_field(body, "name").unwrap_or_default();
                let reserved = ["sub", "saml_subject"];
                if reserved.contains(&name) && name != core {
                    return Some(invalid_data(
                        "name",
                        "INVALID_VALUE",
                        "Invalid parameter value - Not a core attribute",
                    ));
                }
                None
            }
            _ => None,
        }
    }

    fn apply_defaults(collection: &str, parent: Option<&str>, body: &mut Map<String, Value>) {
        match collection {
            "resources" => {
                body.entry("type").or_insert_with(|| json!("CUSTOM"));
                if let Some(name) = body.get("name").cloned() {
                    body.entry("audience").or_insert(name);
                }
                body.entry("accessTokenValiditySeconds")
                    .or_insert_with(|| json!(3600));
            }
            "attributes" if parent.is_some_and(|p| p.contains("/resources/")) => {
                body.entry("type").or_insert_with(|| json!("CUSTOM"));
            }
            "attributes" => {
                body.entry("mappingType").or_insert_with(|| json!("CUSTOM"));
                body.entry("required").or_insert_with(|| json!(false));
            }
            "scopes" => {
                body.entry("mappedClaims").or_insert_with(|| json!([]));
            }
            "users" => {
                body.entry("enabled").or_insert_with(|| json!(true));
            }
            _ => {}
        }
        body.entry("createdAt").or_insert_with(|| json!(now()));
    }

    fn create(&mut self, parsed: &ParsedPath, name: &str, body: Option<&Value>) -> Response {
        let Some(body) = body.filter(|b| b.is_object()) else {
            return request_error("Request body must be a JSON object");
        };
        if let Some(rejected) = self
            .check_unique(&parsed.path, name, body, None)
            .or_else(|| self.check_write(&parsed.path, name, body))
        {
            return rejected;
        }

        let mut object = body.as_object().cloned().unwrap_or_default();
        let id = self.new_id();
        let parent = parsed.ancestors.last().cloned();
        object.insert("id".into(), json!(id));
        object.insert("environment".into(), json!({"id": parsed.env}));
        if let Some(parent) = &parent {
            let parent_collection = parent.rsplit('/').nth(1).unwrap_or_default();
            if let Some(key) = parent_key(parent_collection) {
                let parent_id = parent.rsplit('/').next().unwrap_or_default();
                object.insert(key.into(), json!({"id": parent_id}));
            }
        }
        Self::apply_defaults(name, parent.as_deref(), &mut object);

        let path = format!("{}/{id}", parsed.path);
        let value = Value::Object(object);
        self.after_create(name, &path, &value);
        self.objects.insert(path, value.clone());
        json_response(201, &value)
    }

    fn after_create(&mut self, collection: &str, path: &str, value: &Value) {
        match collection {
            "resources" if str_field(value, "type") == Some("CUSTOM") => {
                let secret = self.new_secret();
                self.objects.insert(
                    format!("{path}/secret"),
                    json!({"secret": secret, "createdAt": now()}),
                );
            }
            "applications" => {
                let (name, format) = match str_field(value, "protocol") {
                    Some("SAML") => (
                        "saml_subject",
                        Some("urn:oasis:names:tc:SAML:1.1:nameid-format:unspecified"),
                    ),
                    Some("OPENID_CONNECT") => ("sub", None),
                    _ => return,
                };
                let id = self.new_id();
                let app_id = str_field(value, "id").unwrap_or_default();
                let mut core = json!({
                    "id": id,
                    "name": name,
                    "value": "${user.id}",
                    "required": true,
                    "mappingType": "CORE",
                    "application": {"id": app_id},
                });
                if let (Some(format), Some(map)) = (format, core.as_object_mut()) {
                    map.insert("nameFormat".into(), json!(format));
                }
                self.objects.insert(format!("{path}/attributes/{id}"), core);
            }
            _ => {}
        }
    }

    fn replace(&mut self, parsed: &ParsedPath, collection: &str, body: Option<&Value>) -> Response {
        let Some(existing) = self.objects.get(&parsed.path).cloned() else {
            return not_found(&parsed.path);
        };
        let Some(body) = body.and_then(Value::as_object) else {
            return request_error("Request body must be a JSON object");
        };
        let collection_path = parsed.path.rsplit_once('/').map(|(c, _)| c).unwrap_or_default();
        let own_id = str_field(&existing, "id");
        let body_value = Value::Object(body.clone());
        if let Some(rejected) = self
            .check_unique(collection_path, collection, &body_value, own_id)
            .or_else(|| self.check_write(collection_path, collection, &body_value))
        {
            return rejected;
        }

        let mut object = body.clone();
        for field in SERVER_FIELDS {
            if let Some(value) = existing.get(*field)
                && (*field == "id" || !object.contains_key(*field))
            {
                object.insert((*field).to_string(), value.clone());
            }
        }
        if collection == "users" {
            // enabled and population are only writable through their singletons
            for field in ["enabled", "population"] {
                if let Some(value) = existing.get(field) {
                    object.insert(field.to_string(), value.clone());
                }
            }
        }
        let value = Value::Object(object);
        self.objects.insert(parsed.path.clone(), value.clone());
        json_response(200, &value)
    }

    fn delete(&mut self, parsed: &ParsedPath) -> Response {
        let Some(existing) = self.objects.get(&parsed.path) else {
            return not_found(&parsed.path);
        };
        if let Some((parent, parent_collection)) = Self::parent_of(&parsed.path)
            && parent_collection == "resources"
        {
            let parent_type = self.objects.get(parent).and_then(|p| str_field(p, "type"));
            let name = str_field(existing, "name").unwrap_or_default();
            if parsed.path.contains("/scopes/")
                && parent_type == Some("OPENID_CONNECT")
                && PREDEFINED_OPENID_SCOPES.contains(&name)
            {
                return request_error(format!("Predefined scope {name} cannot be deleted"));
            }
            if str_field(existing, "type") == Some("CORE") {
                return request_error(format!("Core attribute {name} cannot be deleted"));
            }
        }
        if str_field(existing, "mappingType") == Some("CORE") {
            return request_error("Core attribute mappings cannot be deleted");
        }

        let prefix = format!("{}/", parsed.path);
        self.objects
            .retain(|key, _| key != &parsed.path && !key.starts_with(&prefix));
        empty_response(204)
    }

    fn list(&self, parsed: &ParsedPath, name: &str) -> Response {
        let all = self.children(&parsed.path);
        let page_size = parsed
            .limit
            .or(self.page_size)
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .max(1);
        let page: Vec<&Value> = all.iter().skip(parsed.cursor).take(page_size).copied().collect();
        let mut links = json!({"self": {"href": parsed.path}});
        let next = parsed.cursor + page.len();
        if next < all.len()
            && let Some(map) = links.as_object_mut()
        {
            map.insert(
                "next".into(),
                json!({"href": format!("{}?cursor={next}&limit={page_size}", parsed.path)}),
            );
        }
        json_response(
            200,
            &json!({
                "_links": links,
                "_embedded": {name: page},
                "count": all.len(),
                "size": page.len(),
            }),
        )
    }

    fn singleton(&mut self, parsed: &ParsedPath, method: Method, name: &str, parent: &str, body: Option<&Value>) -> Response {
        let Some(parent_object) = self.objects.get(parent).cloned() else {
            return not_found(parent);
        };
        match (name, method) {
            ("secret", Method::Get) => match self.objects.get(&parsed.path) {
                Some(secret) => json_response(200, secret),
                None => not_found(&parsed.path),
            },
            ("secret", Method::Post) => {
                let Some(current) = self.objects.get(&parsed.path).cloned() else {
                    return not_found(&parsed.path);
                };
                let secret = self.new_secret();
                let mut next = json!({"secret": secret, "createdAt": now()});
                let expires_at = body
                    .and_then(|b| b.get("previous"))
                    .and_then(|p| p.get("expiresAt"))
                    .filter(|v| !v.is_null())
                    .cloned();
                if let (Some(expires_at), Some(map)) = (expires_at, next.as_object_mut()) {
                    map.insert(
                        "previous".into(),
                        json!({"secret": current.get("secret"), "expiresAt": expires_at}),
                    );
                }
                self.objects.insert(parsed.path.clone(), next.clone());
                json_response(200, &next)
            }
            ("enabled" | "population", Method::Get) => {
                let value = parent_object.get(name).cloned().unwrap_or(Value::Null);
                json_response(200, &json!({ name: value }))
            }
            ("enabled" | "population", Method::Put) => {
                let Some(value) = body.and_then(|b| b.get(name)).cloned() else {
                    return invalid_data(name, "REQUIRED_VALUE", format!("{name} is required"));
                };
                if name == "population" {
                    let env_path = format!("/environments/{}/populations", parsed.env);
                    let target = value.get("id").and_then(Value::as_str).unwrap_or_default();
                    if !self.objects.contains_key(&format!("{env_path}/{target}")) {
                        return invalid_data("population", "INVALID_VALUE", "Population does not exist");
                    }
                }
                let mut updated = parent_object;
                if let Some(map) = updated.as_object_mut() {
                    map.insert(name.to_string(), value.clone());
                }
                self.objects.insert(parent.to_string(), updated);
                json_response(200, &json!({ name: value }))
            }
            _ => problem_response(
                405,
                &ProblemDocument::new("METHOD_NOT_ALLOWED", format!("{method} not allowed on {}", parsed.path)),
            ),
        }
    }

    fn handle(&mut self, request: &Request) -> Response {
        if let Some((status, body)) = self.failures.pop_front() {
            return json_response(status, &body);
        }

        let Some(parsed) = parse_path(&request.path) else {
            return not_found(&request.path);
        };
        if !self.environments.contains(&parsed.env) {
            return not_found(&format!("/environments/{}", parsed.env));
        }
        if let Some(missing) = parsed.ancestors.iter().find(|a| !self.objects.contains_key(*a)) {
            return not_found(missing);
        }

        let body = request.body.as_ref();
        match (&parsed.target, request.method) {
            (Target::Environment, Method::Get) => {
                json_response(200, &json!({"id": parsed.env, "name": parsed.env}))
            }
            (Target::Collection { name }, Method::Get) => self.list(&parsed, name),
            (Target::Collection { name }, Method::Post) => {
                let name = name.clone();
                self.create(&parsed, &name, body)
            }
            (Target::Item { .. }, Method::Get) => match self.objects.get(&parsed.path) {
                Some(object) => json_response(200, object),
                None => not_found(&parsed.path),
            },
            (Target::Item { collection }, Method::Put) => {
                let collection = collection.clone();
                self.replace(&parsed, &collection, body)
            }
            (Target::Item { .. }, Method::Delete) => self.delete(&parsed),
            (Target::Singleton { name, parent }, method) => {
                let (name, parent) = (name.clone(), parent.clone());
                self.singleton(&parsed, method, &name, &parent, body)
            }
            (_, method) => problem_response(
                405,
                &ProblemDocument::new(
                    "METHOD_NOT_ALLOWED",
                    format!("{method} not allowed on {}", parsed.path),
                ),
            ),
        }
    }
}

impl MockBackend {
    /// Create a new empty mock backend.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Serve lists in pages of `size` items.
    #[must_use]
    pub fn with_page_size(self, size: usize) -> Self {
        self.lock().page_size = Some(size);
        self
    }

    /// Create an environment and return its ID.
    pub fn add_environment(&self) -> String {
        let mut state = self.lock();
        let id = state.new_id();
        state.environments.insert(id.clone());
        id
    }

    /// Delete an environment and everything it owns, out of band.
    pub fn remove_environment(&self, env: &str) {
        let mut state = self.lock();
        state.environments.remove(env);
        let prefix = format!("/environments/{env}/");
        state.objects.retain(|key, _| !key.starts_with(&prefix));
    }

    /// Store an object directly under a collection path and return its ID.
    ///
    /// No defaults or constraints are applied.
    pub fn insert(&self, collection_path: &str, mut object: Value) -> String {
        let mut state = self.lock();
        let id = state.new_id();
        if let Some(map) = object.as_object_mut() {
            map.insert("id".into(), json!(id));
        }
        state
            .objects
            .insert(format!("{}/{id}", collection_path.trim_end_matches('/')), object);
        id
    }

    /// Overwrite or remove an object at `path`, out of band.
    pub fn set(&self, path: &str, object: Option<Value>) {
        let mut state = self.lock();
        match object {
            Some(object) => {
                state.objects.insert(path.to_string(), object);
            }
            None => {
                let prefix = format!("{path}/");
                state
                    .objects
                    .retain(|key, _| key != path && !key.starts_with(&prefix));
            }
        }
    }

    /// Stored object at `path`, if any.
    pub fn get(&self, path: &str) -> Option<Value> {
        self.lock().objects.get(path).cloned()
    }

    /// Direct children of a collection path.
    pub fn list(&self, collection_path: &str) -> Vec<Value> {
        self.lock()
            .children(collection_path)
            .into_iter()
            .cloned()
            .collect()
    }

    /// Seed the built-in OpenID Connect resource with its predefined scopes
    /// and `sub` core attribute. Returns the resource ID.
    pub fn seed_openid_resource(&self, env: &str) -> String {
        let resources = format!("/environments/{env}/resources");
        let id = self.insert(
            &resources,
            json!({"name": "openid", "type": "OPENID_CONNECT", "environment": {"id": env}}),
        );
        let scopes = format!("{resources}/{id}/scopes");
        for name in PREDEFINED_OPENID_SCOPES {
            self.insert(
                &scopes,
                json!({
                    "name": name,
                    "description": format!("Predefined {name} scope"),
                    "mappedClaims": [],
                    "resource": {"id": id},
                }),
            );
        }
        self.insert(
            &format!("{resources}/{id}/attributes"),
            json!({"name": "sub", "value": "${user.id}", "type": "CORE", "resource": {"id": id}}),
        );
        id
    }

    /// Seed the built-in PingOne API resource. Returns the resource ID.
    pub fn seed_pingone_api_resource(&self, env: &str) -> String {
        let resources = format!("/environments/{env}/resources");
        let id = self.insert(
            &resources,
            json!({"name": "PingOne API", "type": "PINGONE_API", "environment": {"id": env}}),
        );
        for name in ["p1:read:user", "p1:update:user"] {
            self.insert(
                &format!("{resources}/{id}/scopes"),
                json!({"name": name, "resource": {"id": id}}),
            );
        }
        id
    }

    /// Seed a built-in application of the given type. Returns its ID.
    pub fn seed_system_application(&self, env: &str, application_type: &str) -> String {
        self.insert(
            &format!("/environments/{env}/applications"),
            json!({
                "name": application_type,
                "protocol": "OPENID_CONNECT",
                "type": application_type,
                "enabled": false,
                "environment": {"id": env},
            }),
        )
    }

    /// Answer the next request with `status` and `body`, whatever it is.
    pub fn fail_next(&self, status: u16, body: Value) {
        self.lock().failures.push_back((status, body));
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.lock().requests.clone()
    }

    /// Number of requests with `method` whose path starts with `path_prefix`.
    pub fn count(&self, method: Method, path_prefix: &str) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method == method && r.path.starts_with(path_prefix))
            .count()
    }

    /// Number of mutating requests received so far.
    pub fn mutations(&self) -> usize {
        self.lock()
            .requests
            .iter()
            .filter(|r| r.method != Method::Get)
            .count()
    }

    pub fn clear_requests(&self) {
        self.lock().requests.clear();
    }
}

impl Backend for MockBackend {
    fn execute(&self, request: &Request) -> Result<Response> {
        let mut state = self.lock();
        state.requests.push(RecordedRequest {
            method: request.method,
            path: request.path.clone(),
            body: request.body.clone(),
        });
        let response = state.handle(request);
        log::trace!("mock {} {} -> {}", request.method, request.path, response.status);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn body(response: &Response) -> Value {
        serde_json::from_slice(&response.body).unwrap()
    }

    #[test]
    fn test_parse_path_shapes() {
        let p = parse_path("/environments/e/resources/r/scopes?cursor=2&limit=5").unwrap();
        assert_eq!(p.target, Target::Collection { name: "scopes".into() });
        assert_eq!(p.ancestors, vec!["/environments/e/resources/r"]);
        assert_eq!((p.cursor, p.limit), (2, Some(5)));

        let p = parse_path("/environments/e/resources/r/secret").unwrap();
        assert_eq!(
            p.target,
            Target::Singleton {
                name: "secret".into(),
                parent: "/environments/e/resources/r".into()
            }
        );

        let p = parse_path("/environments/e/users/u").unwrap();
        assert_eq!(p.target, Target::Item { collection: "users".into() });
        assert!(parse_path("/organizations/o").is_none());
    }

    #[test]
    fn test_create_applies_defaults_and_secret() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let created = mock
            .execute(&Request::post(
                format!("/environments/{env}/resources"),
                json!({"name": "api"}),
            ))
            .unwrap();
        assert_eq!(created.status, 201);
        let created = body(&created);
        assert_eq!(created["type"], "CUSTOM");
        assert_eq!(created["audience"], "api");

        let id = created["id"].as_str().unwrap();
        let secret = mock
            .execute(&Request::get(format!("/environments/{env}/resources/{id}/secret")))
            .unwrap();
        assert_eq!(secret.status, 200);
        assert!(body(&secret)["secret"].as_str().unwrap().starts_with("mock-secret-"));
    }

    #[test]
    fn test_uniqueness_violation() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let path = format!("/environments/{env}/populations");
        mock.execute(&Request::post(&path, json!({"name": "staff"}))).unwrap();
        let clash = mock.execute(&Request::post(&path, json!({"name": "staff"}))).unwrap();
        assert_eq!(clash.status, 400);
        assert_eq!(body(&clash)["details"][0]["code"], "UNIQUENESS_VIOLATION");
    }

    #[test]
    fn test_missing_environment_and_parent() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let resource = mock.insert(&format!("/environments/{env}/resources"), json!({"name": "r"}));
        let scopes = format!("/environments/{env}/resources/{resource}/scopes");
        assert_eq!(mock.execute(&Request::get(&scopes)).unwrap().status, 200);

        mock.set(&format!("/environments/{env}/resources/{resource}"), None);
        assert_eq!(mock.execute(&Request::get(&scopes)).unwrap().status, 404);

        mock.remove_environment(&env);
        let env_probe = mock.execute(&Request::get(format!("/environments/{env}"))).unwrap();
        assert_eq!(env_probe.status, 404);
    }

    #[test]
    fn test_pagination_links() {
        let mock = MockBackend::new().with_page_size(2);
        let env = mock.add_environment();
        let path = format!("/environments/{env}/groups");
        for n in 0..3 {
            mock.insert(&path, json!({"name": format!("g{n}")}));
        }
        let first = body(&mock.execute(&Request::get(&path)).unwrap());
        assert_eq!(first["_embedded"]["groups"].as_array().unwrap().len(), 2);
        let next = first["_links"]["next"]["href"].as_str().unwrap().to_string();

        let second = body(&mock.execute(&Request::get(next)).unwrap());
        assert_eq!(second["_embedded"]["groups"].as_array().unwrap().len(), 1);
        assert!(second["_links"].get("next").is_none());
    }

    #[test]
    fn test_secret_regeneration_keeps_previous() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let resources = format!("/environments/{env}/resources");
        let created = body(&mock.execute(&Request::post(&resources, json!({"name": "api"}))).unwrap());
        let secret_path = format!("{resources}/{}/secret", created["id"].as_str().unwrap());
        let before = body(&mock.execute(&Request::get(&secret_path)).unwrap());

        let rotated = body(
            &mock
                .execute(&Request::post(
                    &secret_path,
                    json!({"previous": {"expiresAt": "2026-10-18T12:00:00Z"}}),
                ))
                .unwrap(),
        );
        assert_ne!(rotated["secret"], before["secret"]);
        assert_eq!(rotated["previous"]["secret"], before["secret"]);
        assert_eq!(rotated["previous"]["expiresAt"], "2026-10-18T12:00:00Z");
    }

    #[test]
    fn test_predefined_scope_cannot_be_deleted() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        let openid = mock.seed_openid_resource(&env);
        let scopes = mock.list(&format!("/environments/{env}/resources/{openid}/scopes"));
        let email = scopes.iter().find(|s| s["name"] == "email").unwrap();
        let path = format!(
            "/environments/{env}/resources/{openid}/scopes/{}",
            email["id"].as_str().unwrap()
        );
        assert_eq!(mock.execute(&Request::delete(&path)).unwrap().status, 400);
    }

    #[test]
    fn test_fail_next_and_recording() {
        let mock = MockBackend::new();
        let env = mock.add_environment();
        mock.fail_next(503, json!({"code": "SERVICE_UNAVAILABLE", "message": "try later"}));
        let path = format!("/environments/{env}");
        assert_eq!(mock.execute(&Request::get(&path)).unwrap().status, 503);
        assert_eq!(mock.execute(&Request::get(&path)).unwrap().status, 200);
        assert_eq!(mock.count(Method::Get, &path), 2);
        assert_eq!(mock.mutations(), 0);
    }
}
