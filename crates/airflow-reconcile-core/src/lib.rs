//! Declarative reconciliation of Airflow connections, DAGs, pools and
//! variables.
//!
//! A [`Reconciler`] converges one remote object toward a desired
//! state through a [`Transport`]. Each resource kind plugs in via
//! [`ResourceKind`], which supplies its payload builders, its field table
//! and its equality rules.
//!
//! ```no_run
//! use airflow_reconcile_core::{MemoryTransport, Reconciler};
//! use airflow_reconcile_core::resources::{Pool, PoolSpec};
//!
//! # async fn run() -> airflow_reconcile_core::ReconcileResult<()> {
//! let transport = MemoryTransport::new();
//! let pools = Reconciler::<Pool>::new(&transport);
//! let state = pools.converge(&PoolSpec::new("etl", 4), None).await?;
//! assert_eq!(state.open_slots, 4);
//! # Ok(())
//! # }
//! ```

pub mod diff;
pub mod equivalence;
pub mod error;
pub mod field;
pub mod kind;
pub mod memory;
pub mod reconciler;
pub mod resources;
pub mod transport;

pub use diff::Diff;
pub use equivalence::json_text_equivalent;
pub use error::{ErrorCategory, Operation, ReconcileError};
pub use field::{Field, FieldDef, FieldMap, FieldRole};
pub use kind::{CreatePolicy, ResourceKind};
pub use memory::{CallKind, MemoryTransport, RecordedCall};
pub use reconciler::{ReconcileResult, Reconciler};
pub use transport::{Kind, RemoteFailure, RemoteOutcome, Transport};
