//! The managed resource kinds.

mod connection;
mod dag;
mod pool;
mod variable;

pub use connection::{
    Connection, ConnectionLocal, ConnectionResponse, ConnectionSpec, ConnectionState,
};
pub use dag::{Dag, DagLocal, DagResponse, DagSpec, DagState};
pub use pool::{DEFAULT_POOL, Pool, PoolResponse, PoolSpec, PoolState};
pub use variable::{Variable, VariableResponse, VariableSpec, VariableState};

use crate::field::FieldMap;
use crate::kind::ResourceKind;
use crate::transport::Kind;

/// Field table of `kind`.
pub fn field_map(kind: Kind) -> FieldMap {
    match kind {
        Kind::Connection => Connection::FIELDS,
        Kind::Dag => Dag::FIELDS,
        Kind::Pool => Pool::FIELDS,
        Kind::Variable => Variable::FIELDS,
    }
}
