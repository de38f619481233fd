//! Read, import and delete, plus the adopt-only DAG lifecycle.

use airflow_reconcile_core::resources::{
    DEFAULT_POOL, Connection, Dag, DagSpec, Pool, PoolSpec, Variable, VariableSpec,
};
use airflow_reconcile_core::{
    CallKind, Field, Kind, MemoryTransport, Operation, ReconcileError, Reconciler, RecordedCall,
    RemoteFailure, RemoteOutcome,
};
use serde_json::json;

#[tokio::test]
async fn test_read_missing_object_is_not_an_error() {
    let transport = MemoryTransport::new();
    let state = Reconciler::<Variable>::new(&transport)
        .read("missing", None)
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_delete_missing_object_succeeds() {
    let transport = MemoryTransport::new();
    Reconciler::<Pool>::new(&transport)
        .delete("missing", None)
        .await
        .unwrap();

    assert_eq!(
        transport.calls().await,
        vec![RecordedCall::Delete {
            kind: Kind::Pool,
            id: "missing".into(),
        }]
    );
}

#[tokio::test]
async fn test_delete_failure_is_reported_once() {
    let transport = MemoryTransport::new();
    transport.insert(Kind::Pool, "p", json!({"name": "p", "slots": 1}));
    transport
        .fail_next(
            CallKind::Delete,
            RemoteOutcome::Failure(RemoteFailure::new(500, "boom")),
        )
        .await;

    let err = Reconciler::<Pool>::new(&transport)
        .delete("p", None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::RemoteWrite {
            operation: Operation::Delete,
            ..
        }
    ));
    assert_eq!(transport.calls().await.len(), 1);
    assert!(transport.get(Kind::Pool, "p").is_some());
}

#[tokio::test]
async fn test_default_pool_is_never_deleted() {
    let transport = MemoryTransport::new();
    transport.insert(
        Kind::Pool,
        DEFAULT_POOL,
        json!({"name": DEFAULT_POOL, "slots": 128, "description": "Default pool"}),
    );

    Reconciler::<Pool>::new(&transport)
        .delete(DEFAULT_POOL, None)
        .await
        .unwrap();

    assert!(transport.calls().await.is_empty());
    assert!(transport.get(Kind::Pool, DEFAULT_POOL).is_some());
}

#[tokio::test]
async fn test_default_pool_can_be_resized() {
    let transport = MemoryTransport::new();
    transport.insert(
        Kind::Pool,
        DEFAULT_POOL,
        json!({"name": DEFAULT_POOL, "slots": 128, "description": "Default pool"}),
    );
    let mut spec = PoolSpec::new(DEFAULT_POOL, 64);
    spec.description = Field::Value("Default pool".into());

    let state = Reconciler::<Pool>::new(&transport)
        .converge(&spec, None)
        .await
        .unwrap();

    assert_eq!(state.slots, 64);
    assert_eq!(state.description.as_deref(), Some("Default pool"));
}

#[tokio::test]
async fn test_import_reproduces_remote_object() {
    let transport = MemoryTransport::new();
    transport.insert(
        Kind::Variable,
        "env",
        json!({"key": "env", "value": "prod", "description": "deployment stage"}),
    );
    let variables = Reconciler::<Variable>::new(&transport);

    let (spec, state) = variables.import("env").await.unwrap().unwrap();
    assert_eq!(spec.value, "prod");
    assert_eq!(spec.description, Field::Value("deployment stage".into()));

    transport.clear_calls().await;
    variables.converge(&spec, Some(&state)).await.unwrap();
    assert!(transport.writes().await.is_empty());
}

#[tokio::test]
async fn test_import_missing_object() {
    let transport = MemoryTransport::new();
    let imported = Reconciler::<Connection>::new(&transport)
        .import("nope")
        .await
        .unwrap();
    assert!(imported.is_none());
}

#[tokio::test]
async fn test_explicit_update() {
    let transport = MemoryTransport::new();
    let variables = Reconciler::<Variable>::new(&transport);
    let mut spec = VariableSpec::new("k", "v1");
    spec.description = Field::Value("d".into());
    let prior = variables.converge(&spec, None).await.unwrap();

    let state = variables
        .update("k", &VariableSpec::new("k", "v2"), Some(&prior))
        .await
        .unwrap();

    assert_eq!(state.value, "v2");
    assert_eq!(state.description, None);
}

// =============================================================================
// DAGs
// =============================================================================

fn dag(dag_id: &str, is_paused: bool) -> DagSpec {
    DagSpec {
        dag_id: dag_id.into(),
        is_paused,
        delete_dag: false,
    }
}

#[tokio::test]
async fn test_dag_is_adopted_not_created() {
    let transport = MemoryTransport::new();
    transport.register_dag("etl", true);

    let state = Reconciler::<Dag>::new(&transport)
        .converge(&dag("etl", false), None)
        .await
        .unwrap();

    assert!(!state.is_paused);
    assert!(state.is_active);
    assert_eq!(state.fileloc.as_deref(), Some("/opt/airflow/dags/etl.py"));
    assert_eq!(
        transport.writes().await,
        vec![RecordedCall::Update {
            kind: Kind::Dag,
            id: "etl".into(),
            payload: json!({"is_paused": false}),
            update_mask: vec!["is_paused".into()],
        }]
    );
}

#[tokio::test]
async fn test_unregistered_dag_fails_without_write() {
    let transport = MemoryTransport::new();

    let err = Reconciler::<Dag>::new(&transport)
        .converge(&dag("ghost", true), None)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ReconcileError::RemoteWrite {
            operation: Operation::Create,
            ..
        }
    ));
    assert_eq!(err.status(), Some(404));
    assert!(transport.writes().await.is_empty());
}

#[tokio::test]
async fn test_dag_delete_is_opt_in() {
    let transport = MemoryTransport::new();
    transport.register_dag("etl", false);
    let dags = Reconciler::<Dag>::new(&transport);

    let kept = dags.converge(&dag("etl", false), None).await.unwrap();
    dags.delete("etl", Some(&kept)).await.unwrap();
    assert!(transport.get(Kind::Dag, "etl").is_some());
    assert!(transport.writes().await.is_empty());

    let mut spec = dag("etl", false);
    spec.delete_dag = true;
    let opted_in = dags.converge(&spec, Some(&kept)).await.unwrap();
    assert!(opted_in.delete_dag);
    assert!(transport.writes().await.is_empty());

    dags.delete("etl", Some(&opted_in)).await.unwrap();
    assert!(transport.get(Kind::Dag, "etl").is_none());
}

#[tokio::test]
async fn test_dag_fetch_failure_is_a_read_error() {
    let transport = MemoryTransport::new();
    transport.register_dag("etl", true);
    transport
        .fail_next(
            CallKind::Read,
            RemoteOutcome::Failure(RemoteFailure::new(500, "scheduler unavailable")),
        )
        .await;

    let err = Reconciler::<Dag>::new(&transport)
        .converge(&dag("etl", false), None)
        .await
        .unwrap_err();

    assert!(matches!(err, ReconcileError::RemoteRead { .. }));
    assert_eq!(err.status(), Some(500));
    assert!(transport.writes().await.is_empty());
}
