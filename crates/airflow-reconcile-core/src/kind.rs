//! Per-kind description consumed by the generic [`Reconciler`](crate::Reconciler).

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::field::FieldMap;
use crate::transport::Kind;

/// What Create does for a kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreatePolicy {
    /// Issue a remote create; an "already exists" answer triggers adoption.
    CreateOrAdopt,
    /// The service registers objects on its own. Create never calls the
    /// remote create; it adopts the existing object and fails if absent.
    AdoptExisting,
}

/// A resource kind: its types, field table and mapping rules.
///
/// `Local` holds values the reconciler keeps across reads that the service
/// never returns: write-only secrets and local-only switches.
pub trait ResourceKind: Send + Sync + 'static {
    const KIND: Kind;
    const FIELDS: FieldMap;
    const CREATE_POLICY: CreatePolicy = CreatePolicy::CreateOrAdopt;

    /// Desired state.
    type Spec: Send + Sync;
    /// Last-known remote state plus retained local values.
    type Observed: Send + Sync;
    /// Response body of a read.
    type Remote: DeserializeOwned + Clone + Send;
    type Local: Default + Clone + Send + Sync;

    fn spec_id(spec: &Self::Spec) -> &str;

    fn observed_id(observed: &Self::Observed) -> &str;

    /// Kind-specific constraints, checked before any remote call.
    fn validate(_spec: &Self::Spec) -> Result<(), String> {
        Ok(())
    }

    /// Create payload: required fields plus present optional fields.
    fn create_body(spec: &Self::Spec) -> serde_json::Result<Value>;

    /// Full-replacement update payload.
    fn update_body(spec: &Self::Spec) -> serde_json::Result<Value>;

    fn observe(remote: Self::Remote, local: &Self::Local) -> Self::Observed;

    fn local_state(observed: &Self::Observed) -> Self::Local;

    /// Local values after writing `spec`, falling back to `prior` where the
    /// spec says nothing.
    fn desired_local(spec: &Self::Spec, prior: &Self::Local) -> Self::Local;

    /// Names of the writable fields where `observed` does not match `spec`.
    fn diff(observed: &Self::Observed, spec: &Self::Spec) -> Vec<&'static str>;

    /// A desired spec reproducing `observed`, used when importing.
    fn spec_from_observed(observed: &Self::Observed) -> Self::Spec;

    /// Reason to skip the remote delete of `id`, if any.
    fn delete_guard(_id: &str, _prior: Option<&Self::Observed>) -> Option<&'static str> {
        None
    }
}
