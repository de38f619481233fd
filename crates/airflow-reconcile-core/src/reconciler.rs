//! The converge algorithm, generic over [`ResourceKind`].
//!
//! Every operation is a short sequential chain of remote calls
//! (create, conflict, fetch, update, read at most). Reconciliations of
//! different identifiers are independent; reconciliations of the same
//! identifier must be serialized by the caller.

use std::future::Future;
use std::marker::PhantomData;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{Operation, ReconcileError};
use crate::kind::{CreatePolicy, ResourceKind};
use crate::transport::{RemoteFailure, RemoteOutcome, Transport};

pub type ReconcileResult<T> = Result<T, ReconcileError>;

/// Drives remote objects of kind `K` to their desired state.
pub struct Reconciler<'a, K: ResourceKind> {
    transport: &'a dyn Transport,
    cancel: Option<CancellationToken>,
    _kind: PhantomData<fn() -> K>,
}

impl<'a, K: ResourceKind> Reconciler<'a, K> {
    pub fn new(transport: &'a dyn Transport) -> Self {
        Self {
            transport,
            cancel: None,
            _kind: PhantomData,
        }
    }

    /// Aborts in-flight remote calls once `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    /// Converges the remote object to `desired`.
    ///
    /// `prior` is the last-known observed state, if the object is already
    /// managed; without it the object is created (or adopted). A prior whose
    /// remote object has disappeared is re-created.
    pub async fn converge(
        &self,
        desired: &K::Spec,
        prior: Option<&K::Observed>,
    ) -> ReconcileResult<K::Observed> {
        let Some(prior) = prior else {
            return self.create(desired).await;
        };
        self.validate(desired)?;
        let id = K::spec_id(desired);
        self.ensure_same_identity(K::observed_id(prior), id)?;

        let local = K::local_state(prior);
        match self.fetch(Operation::Read, id).await? {
            RemoteOutcome::Success(remote) => {
                self.reconcile_existing(id, remote, desired, &local).await
            }
            RemoteOutcome::NotFound(_) => {
                info!(kind = %K::KIND, id, "object removed remotely, re-creating");
                self.create(desired).await
            }
            other => Err(ReconcileError::remote_read(K::KIND, id, other.into_failure())),
        }
    }

    /// Creates the remote object, adopting it if it already exists.
    pub async fn create(&self, desired: &K::Spec) -> ReconcileResult<K::Observed> {
        self.validate(desired)?;
        let id = K::spec_id(desired);

        if K::CREATE_POLICY == CreatePolicy::AdoptExisting {
            return self.adopt(id, desired).await;
        }

        let body = K::create_body(desired)
            .map_err(|e| ReconcileError::validation(K::KIND, id, e.to_string()))?;
        K::FIELDS
            .check_create_payload(&body)
            .map_err(|m| ReconcileError::validation(K::KIND, id, m))?;

        match self
            .call(Operation::Create, id, self.transport.create(K::KIND, &body))
            .await?
        {
            RemoteOutcome::Success(_) => {
                info!(kind = %K::KIND, id, "created");
                let local = K::desired_local(desired, &K::Local::default());
                self.read_back(Operation::Create, id, desired, &local).await
            }
            RemoteOutcome::Conflict(message) => {
                info!(kind = %K::KIND, id, %message, "already exists, adopting");
                self.adopt(id, desired).await
            }
            other => Err(ReconcileError::remote_write(
                K::KIND,
                id,
                Operation::Create,
                other.into_failure(),
            )),
        }
    }

    /// Reads the remote object. `Ok(None)` means it no longer exists and the
    /// caller should drop its local state.
    ///
    /// Values the service does not echo back are taken from `prior`.
    pub async fn read(
        &self,
        id: &str,
        prior: Option<&K::Observed>,
    ) -> ReconcileResult<Option<K::Observed>> {
        let local = prior.map(K::local_state).unwrap_or_default();
        match self.fetch(Operation::Read, id).await? {
            RemoteOutcome::Success(remote) => Ok(Some(K::observe(remote, &local))),
            RemoteOutcome::NotFound(_) => {
                debug!(kind = %K::KIND, id, "absent remotely");
                Ok(None)
            }
            other => Err(ReconcileError::remote_read(K::KIND, id, other.into_failure())),
        }
    }

    /// Reads an object created out-of-band and returns a desired spec that
    /// reproduces it.
    pub async fn import(&self, id: &str) -> ReconcileResult<Option<(K::Spec, K::Observed)>> {
        Ok(self
            .read(id, None)
            .await?
            .map(|observed| (K::spec_from_observed(&observed), observed)))
    }

    /// Replaces the remote object's writable fields with `desired`.
    pub async fn update(
        &self,
        id: &str,
        desired: &K::Spec,
        prior: Option<&K::Observed>,
    ) -> ReconcileResult<K::Observed> {
        self.validate(desired)?;
        self.ensure_same_identity(id, K::spec_id(desired))?;
        let local = prior.map(K::local_state).unwrap_or_default();
        self.write_update(id, desired, &local).await
    }

    /// Deletes the remote object. Already-absent objects and protected
    /// instances succeed without a remote write. Attempted exactly once.
    pub async fn delete(&self, id: &str, prior: Option<&K::Observed>) -> ReconcileResult<()> {
        if let Some(reason) = K::delete_guard(id, prior) {
            warn!(kind = %K::KIND, id, reason, "skipping remote delete");
            return Ok(());
        }

        match self
            .call(Operation::Delete, id, self.transport.delete(K::KIND, id))
            .await?
        {
            RemoteOutcome::Success(()) => {
                info!(kind = %K::KIND, id, "deleted");
                Ok(())
            }
            RemoteOutcome::NotFound(_) => {
                debug!(kind = %K::KIND, id, "already deleted");
                Ok(())
            }
            other => Err(ReconcileError::remote_write(
                K::KIND,
                id,
                Operation::Delete,
                other.into_failure(),
            )),
        }
    }

    async fn adopt(&self, id: &str, desired: &K::Spec) -> ReconcileResult<K::Observed> {
        let adopt_only = K::CREATE_POLICY == CreatePolicy::AdoptExisting;
        match self.fetch(Operation::Adopt, id).await? {
            RemoteOutcome::Success(remote) => {
                info!(kind = %K::KIND, id, "adopted existing object");
                self.reconcile_existing(id, remote, desired, &K::Local::default())
                    .await
            }
            RemoteOutcome::NotFound(message) if adopt_only => Err(ReconcileError::remote_write(
                K::KIND,
                id,
                Operation::Create,
                RemoteFailure::new(
                    404,
                    format!("{} is not registered remotely: {message}", K::KIND),
                ),
            )),
            // No conflict was signalled for adopt-only kinds; this is a plain failed read.
            other if adopt_only => Err(ReconcileError::remote_read(
                K::KIND,
                id,
                other.into_failure(),
            )),
            other => Err(ReconcileError::adoption(K::KIND, id, other.into_failure())),
        }
    }

    async fn reconcile_existing(
        &self,
        id: &str,
        remote: K::Remote,
        desired: &K::Spec,
        local: &K::Local,
    ) -> ReconcileResult<K::Observed> {
        let observed = K::observe(remote.clone(), local);
        let changed = K::diff(&observed, desired);
        if changed.is_empty() {
            debug!(kind = %K::KIND, id, "in sync");
            return Ok(K::observe(remote, &K::desired_local(desired, local)));
        }
        debug!(kind = %K::KIND, id, fields = ?changed, "drift detected");
        self.write_update(id, desired, local).await
    }

    async fn write_update(
        &self,
        id: &str,
        desired: &K::Spec,
        local: &K::Local,
    ) -> ReconcileResult<K::Observed> {
        let body = K::update_body(desired)
            .map_err(|e| ReconcileError::validation(K::KIND, id, e.to_string()))?;
        let mask = K::FIELDS
            .update_mask(&body)
            .map_err(|m| ReconcileError::validation(K::KIND, id, m))?;

        match self
            .call(
                Operation::Update,
                id,
                self.transport.update(K::KIND, id, &body, &mask),
            )
            .await?
        {
            RemoteOutcome::Success(_) => {
                info!(kind = %K::KIND, id, fields = ?mask, "updated");
                let local = K::desired_local(desired, local);
                self.read_back(Operation::Update, id, desired, &local).await
            }
            other => Err(ReconcileError::remote_write(
                K::KIND,
                id,
                Operation::Update,
                other.into_failure(),
            )),
        }
    }

    /// Reads the object after a write and checks it holds what was written.
    async fn read_back(
        &self,
        operation: Operation,
        id: &str,
        desired: &K::Spec,
        local: &K::Local,
    ) -> ReconcileResult<K::Observed> {
        match self.fetch(Operation::Read, id).await? {
            RemoteOutcome::Success(remote) => {
                let observed = K::observe(remote, local);
                let mismatched = K::diff(&observed, desired);
                if mismatched.is_empty() {
                    Ok(observed)
                } else {
                    Err(ReconcileError::readback_mismatch(K::KIND, id, operation, mismatched))
                }
            }
            RemoteOutcome::NotFound(message) => Err(ReconcileError::remote_read(
                K::KIND,
                id,
                RemoteFailure::new(404, format!("absent right after {operation}: {message}")),
            )),
            other => Err(ReconcileError::remote_read(K::KIND, id, other.into_failure())),
        }
    }

    async fn fetch(
        &self,
        operation: Operation,
        id: &str,
    ) -> ReconcileResult<RemoteOutcome<K::Remote>> {
        let outcome = self
            .call(operation, id, self.transport.read(K::KIND, id))
            .await?;
        Ok(outcome.try_map(serde_json::from_value::<K::Remote>))
    }

    async fn call<T, F>(&self, operation: Operation, id: &str, call: F) -> ReconcileResult<T>
    where
        F: Future<Output = T> + Send,
    {
        debug!(kind = %K::KIND, id, %operation, "remote call");
        let Some(token) = &self.cancel else {
            return Ok(call.await);
        };
        tokio::select! {
            biased;
            () = token.cancelled() => {
                warn!(kind = %K::KIND, id, %operation, "cancelled");
                Err(ReconcileError::cancelled(K::KIND, id, operation))
            }
            outcome = call => Ok(outcome),
        }
    }

    fn validate(&self, desired: &K::Spec) -> ReconcileResult<()> {
        let id = K::spec_id(desired);
        if id.trim().is_empty() {
            return Err(ReconcileError::validation(
                K::KIND,
                id,
                format!("`{}` must not be empty", K::KIND.identifier_field()),
            ));
        }
        K::validate(desired).map_err(|m| ReconcileError::validation(K::KIND, id, m))
    }

    fn ensure_same_identity(&self, current: &str, desired: &str) -> ReconcileResult<()> {
        if current == desired {
            return Ok(());
        }
        Err(ReconcileError::validation(
            K::KIND,
            desired,
            format!(
                "identifier cannot change from `{current}`; replace the resource instead"
            ),
        ))
    }
}
