//! Pools: named slot budgets shared by tasks.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::Diff;
use crate::field::{Field, FieldDef, FieldMap, FieldRole};
use crate::kind::ResourceKind;
use crate::transport::Kind;

/// Built-in pool that always exists and cannot be deleted.
pub const DEFAULT_POOL: &str = "default_pool";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolSpec {
    pub name: String,
    /// `-1` means unlimited.
    pub slots: i32,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub description: Field<String>,
}

impl PoolSpec {
    pub fn new(name: impl Into<String>, slots: i32) -> Self {
        Self {
            name: name.into(),
            slots,
            description: Field::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PoolState {
    pub name: String,
    pub slots: i32,
    pub description: Option<String>,
    pub occupied_slots: i32,
    pub running_slots: i32,
    pub queued_slots: i32,
    pub open_slots: i32,
    pub deferred_slots: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PoolResponse {
    pub name: String,
    pub slots: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub occupied_slots: i32,
    #[serde(default)]
    pub running_slots: i32,
    #[serde(default)]
    pub queued_slots: i32,
    #[serde(default)]
    pub open_slots: i32,
    #[serde(default)]
    pub deferred_slots: i32,
}

#[derive(Serialize)]
struct PoolCreateBody<'a> {
    name: &'a str,
    slots: i32,
    #[serde(skip_serializing_if = "Field::is_unset")]
    description: Field<&'a String>,
}

#[derive(Serialize)]
struct PoolPatchBody<'a> {
    slots: i32,
    description: Field<&'a String>,
}

pub struct Pool;

impl ResourceKind for Pool {
    const KIND: Kind = Kind::Pool;
    const FIELDS: FieldMap = FieldMap::new(&[
        FieldDef::new("name", FieldRole::Identifier),
        FieldDef::new("slots", FieldRole::Required),
        FieldDef::new("description", FieldRole::OptionalClearable),
        FieldDef::new("occupied_slots", FieldRole::Computed),
        FieldDef::new("running_slots", FieldRole::Computed),
        FieldDef::new("queued_slots", FieldRole::Computed),
        FieldDef::new("open_slots", FieldRole::Computed),
        FieldDef::new("deferred_slots", FieldRole::Computed),
    ]);

    type Spec = PoolSpec;
    type Observed = PoolState;
    type Remote = PoolResponse;
    type Local = ();

    fn spec_id(spec: &PoolSpec) -> &str {
        &spec.name
    }

    fn observed_id(observed: &PoolState) -> &str {
        &observed.name
    }

    fn validate(spec: &PoolSpec) -> Result<(), String> {
        if spec.slots < -1 {
            return Err(format!("`slots` must be -1 (unlimited) or more, got {}", spec.slots));
        }
        Ok(())
    }

    fn create_body(spec: &PoolSpec) -> serde_json::Result<Value> {
        serde_json::to_value(PoolCreateBody {
            name: &spec.name,
            slots: spec.slots,
            description: spec.description.for_create(),
        })
    }

    fn update_body(spec: &PoolSpec) -> serde_json::Result<Value> {
        serde_json::to_value(PoolPatchBody {
            slots: spec.slots,
            description: spec.description.for_replace(),
        })
    }

    fn observe(remote: PoolResponse, _local: &()) -> PoolState {
        PoolState {
            name: remote.name,
            slots: remote.slots,
            description: remote.description,
            occupied_slots: remote.occupied_slots,
            running_slots: remote.running_slots,
            queued_slots: remote.queued_slots,
            open_slots: remote.open_slots,
            deferred_slots: remote.deferred_slots,
        }
    }

    fn local_state(_observed: &PoolState) {}

    fn desired_local(_spec: &PoolSpec, _prior: &()) {}

    fn diff(observed: &PoolState, spec: &PoolSpec) -> Vec<&'static str> {
        let mut diff = Diff::new();
        diff.value("slots", &spec.slots, &observed.slots);
        diff.optional("description", &spec.description, observed.description.as_ref());
        diff.into_fields()
    }

    fn spec_from_observed(observed: &PoolState) -> PoolSpec {
        PoolSpec {
            name: observed.name.clone(),
            slots: observed.slots,
            description: Field::from_observed(observed.description.clone()),
        }
    }

    fn delete_guard(id: &str, _prior: Option<&PoolState>) -> Option<&'static str> {
        (id == DEFAULT_POOL).then_some("the default pool cannot be deleted")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_create_body() {
        let body = Pool::create_body(&PoolSpec::new("pool-a", 5)).unwrap();
        assert_eq!(body, json!({"name": "pool-a", "slots": 5}));
    }

    #[test]
    fn test_update_body_clears_description() {
        let body = Pool::update_body(&PoolSpec::new("pool-a", 8)).unwrap();
        assert_eq!(body, json!({"slots": 8, "description": null}));
        assert_eq!(
            Pool::FIELDS.update_mask(&body).unwrap(),
            vec!["slots", "description"]
        );
    }

    #[test]
    fn test_validate_slots() {
        assert!(Pool::validate(&PoolSpec::new("p", -1)).is_ok());
        assert!(Pool::validate(&PoolSpec::new("p", 0)).is_ok());
        assert!(Pool::validate(&PoolSpec::new("p", -2)).is_err());
    }

    #[test]
    fn test_default_pool_is_protected() {
        assert!(Pool::delete_guard(DEFAULT_POOL, None).is_some());
        assert!(Pool::delete_guard("pool-a", None).is_none());
    }
}
