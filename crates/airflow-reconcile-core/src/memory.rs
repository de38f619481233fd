//! In-memory stand-in for the remote service.
//!
//! [`MemoryTransport`] keeps objects in a `DashMap`, answers with the same
//! status semantics as the real API (404, 409, `update_mask` patches,
//! server-computed pool counters, unechoed secrets) and records every call
//! so tests can assert exactly which remote calls a reconciliation issued.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::{Map, Value, json};
use tokio::sync::Mutex;

use crate::field::FieldRole;
use crate::resources::field_map;
use crate::transport::{Kind, RemoteFailure, RemoteOutcome, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CallKind {
    Create,
    Read,
    Update,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RecordedCall {
    Create {
        kind: Kind,
        payload: Value,
    },
    Read {
        kind: Kind,
        id: String,
    },
    Update {
        kind: Kind,
        id: String,
        payload: Value,
        update_mask: Vec<String>,
    },
    Delete {
        kind: Kind,
        id: String,
    },
}

impl RecordedCall {
    pub fn call_kind(&self) -> CallKind {
        match self {
            Self::Create { .. } => CallKind::Create,
            Self::Read { .. } => CallKind::Read,
            Self::Update { .. } => CallKind::Update,
            Self::Delete { .. } => CallKind::Delete,
        }
    }

    pub fn is_write(&self) -> bool {
        self.call_kind() != CallKind::Read
    }
}

#[derive(Debug)]
pub struct MemoryTransport {
    objects: DashMap<(Kind, String), Value>,
    ignored: DashMap<Kind, Vec<String>>,
    calls: Mutex<Vec<RecordedCall>>,
    faults: Mutex<Vec<(CallKind, RemoteOutcome<()>)>>,
    echo_secrets: bool,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    /// A service that never returns secrets on reads.
    pub fn new() -> Self {
        Self {
            objects: DashMap::new(),
            ignored: DashMap::new(),
            calls: Mutex::new(Vec::new()),
            faults: Mutex::new(Vec::new()),
            echo_secrets: false,
        }
    }

    /// Echo secret fields back on reads.
    pub fn with_echoed_secrets(mut self) -> Self {
        self.echo_secrets = true;
        self
    }

    /// Stores an object as if created out-of-band. Not recorded as a call.
    pub fn insert(&self, kind: Kind, id: impl Into<String>, object: Value) {
        let mut object = object;
        derive_computed(kind, &mut object);
        self.objects.insert((kind, id.into()), object);
    }

    /// Registers a parsed DAG, the only way DAGs come into existence.
    pub fn register_dag(&self, dag_id: &str, is_paused: bool) {
        self.insert(
            Kind::Dag,
            dag_id,
            json!({
                "dag_id": dag_id,
                "is_paused": is_paused,
                "is_stale": false,
                "description": null,
                "fileloc": format!("/opt/airflow/dags/{dag_id}.py"),
                "file_token": format!("token-{dag_id}"),
            }),
        );
    }

    /// The stored object, secrets included.
    pub fn get(&self, kind: Kind, id: &str) -> Option<Value> {
        self.objects
            .get(&(kind, id.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Makes the next call of `call` return `outcome` without touching state.
    pub async fn fail_next(&self, call: CallKind, outcome: RemoteOutcome<()>) {
        self.faults.lock().await.push((call, outcome));
    }

    /// Accepts writes to `field` but silently keeps the stored value.
    pub fn ignore_writes_to(&self, kind: Kind, field: &str) {
        self.ignored.entry(kind).or_default().push(field.to_string());
    }

    pub async fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().await.clone()
    }

    pub async fn writes(&self) -> Vec<RecordedCall> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|c| c.is_write())
            .cloned()
            .collect()
    }

    pub async fn clear_calls(&self) {
        self.calls.lock().await.clear();
    }

    async fn record(&self, call: RecordedCall) -> Option<RemoteOutcome<()>> {
        let call_kind = call.call_kind();
        self.calls.lock().await.push(call);
        let mut faults = self.faults.lock().await;
        let pos = faults.iter().position(|(k, _)| *k == call_kind)?;
        Some(faults.remove(pos).1)
    }

    fn is_ignored(&self, kind: Kind, field: &str) -> bool {
        self.ignored
            .get(&kind)
            .is_some_and(|fields| fields.iter().any(|f| f == field))
    }

    fn public_view(&self, kind: Kind, object: &Value) -> Value {
        let mut view = object.clone();
        if !self.echo_secrets
            && let Some(obj) = view.as_object_mut()
        {
            for name in field_map(kind).names(FieldRole::Secret) {
                obj.remove(name);
            }
        }
        view
    }

    fn materialize(&self, kind: Kind, payload: &Map<String, Value>) -> Value {
        let mut object = Map::new();
        for def in field_map(kind).fields() {
            match def.role {
                FieldRole::Identifier | FieldRole::Required | FieldRole::OptionalClearable => {
                    let keep =
                        def.role == FieldRole::Identifier || !self.is_ignored(kind, def.name);
                    let value = match payload.get(def.name) {
                        Some(v) if keep => v.clone(),
                        _ => Value::Null,
                    };
                    object.insert(def.name.to_string(), value);
                }
                FieldRole::Secret => {
                    if let Some(v) = payload.get(def.name) {
                        object.insert(def.name.to_string(), v.clone());
                    }
                }
                FieldRole::Computed | FieldRole::LocalOnly => {}
            }
        }
        let mut object = Value::Object(object);
        derive_computed(kind, &mut object);
        object
    }
}

fn not_found(kind: Kind, id: &str) -> String {
    format!(
        "The {kind} with {}: `{id}` was not found",
        kind.identifier_field()
    )
}

fn derive_computed(kind: Kind, object: &mut Value) {
    let Some(obj) = object.as_object_mut() else {
        return;
    };
    if kind == Kind::Pool {
        for counter in ["occupied_slots", "running_slots", "queued_slots", "deferred_slots"] {
            obj.entry(counter).or_insert(json!(0));
        }
        let slots = obj.get("slots").and_then(Value::as_i64).unwrap_or(0);
        let occupied = obj
            .get("occupied_slots")
            .and_then(Value::as_i64)
            .unwrap_or(0);
        let open = if slots < 0 { -1 } else { slots - occupied };
        obj.insert("open_slots".to_string(), json!(open));
    }
}

fn injected<T>(outcome: RemoteOutcome<()>) -> Option<RemoteOutcome<T>> {
    match outcome {
        RemoteOutcome::Success(()) => None,
        RemoteOutcome::NotFound(m) => Some(RemoteOutcome::NotFound(m)),
        RemoteOutcome::Conflict(m) => Some(RemoteOutcome::Conflict(m)),
        RemoteOutcome::Failure(f) => Some(RemoteOutcome::Failure(f)),
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn create(&self, kind: Kind, payload: &Value) -> RemoteOutcome<Value> {
        let fault = self
            .record(RecordedCall::Create {
                kind,
                payload: payload.clone(),
            })
            .await;
        if let Some(outcome) = fault.and_then(injected) {
            return outcome;
        }

        if kind == Kind::Dag {
            return RemoteOutcome::Failure(RemoteFailure::new(
                405,
                "DAGs cannot be created through the API",
            ));
        }
        let Some(obj) = payload.as_object() else {
            return RemoteOutcome::Failure(RemoteFailure::new(422, "body must be an object"));
        };
        let Some(id) = obj.get(kind.identifier_field()).and_then(Value::as_str) else {
            return RemoteOutcome::Failure(RemoteFailure::new(
                422,
                format!("field `{}` is required", kind.identifier_field()),
            ));
        };

        let key = (kind, id.to_string());
        if self.objects.contains_key(&key) {
            return RemoteOutcome::Conflict(format!(
                "The {kind} with {}: `{id}` already exists",
                kind.identifier_field()
            ));
        }
        let object = self.materialize(kind, obj);
        let view = self.public_view(kind, &object);
        self.objects.insert(key, object);
        RemoteOutcome::Success(view)
    }

    async fn read(&self, kind: Kind, id: &str) -> RemoteOutcome<Value> {
        let fault = self
            .record(RecordedCall::Read {
                kind,
                id: id.to_string(),
            })
            .await;
        if let Some(outcome) = fault.and_then(injected) {
            return outcome;
        }

        match self.objects.get(&(kind, id.to_string())) {
            Some(entry) => RemoteOutcome::Success(self.public_view(kind, entry.value())),
            None => RemoteOutcome::NotFound(not_found(kind, id)),
        }
    }

    async fn update(
        &self,
        kind: Kind,
        id: &str,
        payload: &Value,
        update_mask: &[&str],
    ) -> RemoteOutcome<Value> {
        let fault = self
            .record(RecordedCall::Update {
                kind,
                id: id.to_string(),
                payload: payload.clone(),
                update_mask: update_mask.iter().map(|f| f.to_string()).collect(),
            })
            .await;
        if let Some(outcome) = fault.and_then(injected) {
            return outcome;
        }

        let Some(mut entry) = self.objects.get_mut(&(kind, id.to_string())) else {
            return RemoteOutcome::NotFound(not_found(kind, id));
        };
        let mut patched = entry.value().clone();
        let Some(target) = patched.as_object_mut() else {
            return RemoteOutcome::Failure(RemoteFailure::new(500, "stored object is corrupt"));
        };
        for field in update_mask {
            let Some(value) = payload.get(*field) else {
                return RemoteOutcome::Failure(RemoteFailure::new(
                    400,
                    format!("update_mask field `{field}` is missing from the body"),
                ));
            };
            if !self.is_ignored(kind, field) {
                target.insert(field.to_string(), value.clone());
            }
        }
        derive_computed(kind, &mut patched);
        let view = self.public_view(kind, &patched);
        *entry.value_mut() = patched;
        RemoteOutcome::Success(view)
    }

    async fn delete(&self, kind: Kind, id: &str) -> RemoteOutcome<()> {
        let fault = self
            .record(RecordedCall::Delete {
                kind,
                id: id.to_string(),
            })
            .await;
        if let Some(outcome) = fault.and_then(injected) {
            return outcome;
        }

        match self.objects.remove(&(kind, id.to_string())) {
            Some(_) => RemoteOutcome::Success(()),
            None => RemoteOutcome::NotFound(not_found(kind, id)),
        }
    }
}
