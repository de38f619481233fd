//! DAGs: only the paused flag is managed.
//!
//! The service registers DAGs when it parses DAG files, so Create adopts an
//! existing DAG and never creates one. Remote deletion is opt-in through
//! `delete_dag`, which lives in local state only.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::Diff;
use crate::field::{FieldDef, FieldMap, FieldRole};
use crate::kind::{CreatePolicy, ResourceKind};
use crate::transport::Kind;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DagSpec {
    pub dag_id: String,
    pub is_paused: bool,
    #[serde(default)]
    pub delete_dag: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DagState {
    pub dag_id: String,
    pub is_paused: bool,
    /// Neither paused nor stale.
    pub is_active: bool,
    pub description: Option<String>,
    pub file_token: Option<String>,
    pub fileloc: Option<String>,
    #[serde(default)]
    pub delete_dag: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DagResponse {
    pub dag_id: String,
    pub is_paused: bool,
    #[serde(default)]
    pub is_stale: bool,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub file_token: Option<String>,
    #[serde(default)]
    pub fileloc: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DagLocal {
    pub delete_dag: bool,
}

#[derive(Serialize)]
struct DagPatchBody {
    is_paused: bool,
}

pub struct Dag;

impl ResourceKind for Dag {
    const KIND: Kind = Kind::Dag;
    const FIELDS: FieldMap = FieldMap::new(&[
        FieldDef::new("dag_id", FieldRole::Identifier),
        FieldDef::new("is_paused", FieldRole::Required),
        FieldDef::new("delete_dag", FieldRole::LocalOnly),
        FieldDef::new("description", FieldRole::Computed),
        FieldDef::new("file_token", FieldRole::Computed),
        FieldDef::new("fileloc", FieldRole::Computed),
        FieldDef::new("is_active", FieldRole::Computed),
    ]);
    const CREATE_POLICY: CreatePolicy = CreatePolicy::AdoptExisting;

    type Spec = DagSpec;
    type Observed = DagState;
    type Remote = DagResponse;
    type Local = DagLocal;

    fn spec_id(spec: &DagSpec) -> &str {
        &spec.dag_id
    }

    fn observed_id(observed: &DagState) -> &str {
        &observed.dag_id
    }

    // Never called remotely; DAG creation goes through adoption.
    fn create_body(spec: &DagSpec) -> serde_json::Result<Value> {
        Self::update_body(spec)
    }

    fn update_body(spec: &DagSpec) -> serde_json::Result<Value> {
        serde_json::to_value(DagPatchBody {
            is_paused: spec.is_paused,
        })
    }

    fn observe(remote: DagResponse, local: &DagLocal) -> DagState {
        DagState {
            is_active: !remote.is_paused && !remote.is_stale,
            dag_id: remote.dag_id,
            is_paused: remote.is_paused,
            description: remote.description,
            file_token: remote.file_token,
            fileloc: remote.fileloc,
            delete_dag: local.delete_dag,
        }
    }

    fn local_state(observed: &DagState) -> DagLocal {
        DagLocal {
            delete_dag: observed.delete_dag,
        }
    }

    fn desired_local(spec: &DagSpec, _prior: &DagLocal) -> DagLocal {
        DagLocal {
            delete_dag: spec.delete_dag,
        }
    }

    fn diff(observed: &DagState, spec: &DagSpec) -> Vec<&'static str> {
        let mut diff = Diff::new();
        diff.value("is_paused", &spec.is_paused, &observed.is_paused);
        diff.into_fields()
    }

    fn spec_from_observed(observed: &DagState) -> DagSpec {
        DagSpec {
            dag_id: observed.dag_id.clone(),
            is_paused: observed.is_paused,
            delete_dag: observed.delete_dag,
        }
    }

    fn delete_guard(_id: &str, prior: Option<&DagState>) -> Option<&'static str> {
        if prior.is_some_and(|p| p.delete_dag) {
            None
        } else {
            Some("delete_dag is not enabled; the DAG is only dropped from local state")
        }
    }
}
