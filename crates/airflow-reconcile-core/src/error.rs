//! Error taxonomy of the reconciler.
//!
//! Every variant names the resource kind and identifier, and remote
//! variants carry the remote status and message verbatim.

use std::fmt;

use crate::transport::{Kind, RemoteFailure};

/// The reconciler step an error or log line refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
    Adopt,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Adopt => "adopt",
        })
    }
}

/// Errors returned by reconciler operations.
#[derive(Debug, thiserror::Error)]
pub enum ReconcileError {
    /// The desired spec violates the kind's field constraints. Raised before
    /// any remote call.
    #[error("invalid {kind} `{id}`: {message}")]
    Validation {
        kind: Kind,
        id: String,
        message: String,
    },

    /// A fetch failed for a reason other than not-found.
    #[error("failed to read {kind} `{id}`: {failure}")]
    RemoteRead {
        kind: Kind,
        id: String,
        failure: RemoteFailure,
    },

    /// A create, update or delete failed.
    #[error("failed to {operation} {kind} `{id}`: {failure}")]
    RemoteWrite {
        kind: Kind,
        id: String,
        operation: Operation,
        failure: RemoteFailure,
    },

    /// Create reported a conflict but the existing object could not be fetched.
    #[error("{kind} `{id}` already exists, but failed to fetch it: {failure}")]
    Adoption {
        kind: Kind,
        id: String,
        failure: RemoteFailure,
    },

    /// The object read back after a write does not hold the written values.
    #[error(
        "{kind} `{id}` does not reflect the values written by {operation}: {}",
        .fields.join(", ")
    )]
    ReadbackMismatch {
        kind: Kind,
        id: String,
        operation: Operation,
        fields: Vec<&'static str>,
    },

    /// The caller cancelled the operation while a remote call was in flight.
    #[error("{operation} of {kind} `{id}` was cancelled")]
    Cancelled {
        kind: Kind,
        id: String,
        operation: Operation,
    },
}

impl ReconcileError {
    #[must_use]
    pub fn validation(kind: Kind, id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            kind,
            id: id.into(),
            message: message.into(),
        }
    }

    #[must_use]
    pub fn remote_read(kind: Kind, id: impl Into<String>, failure: RemoteFailure) -> Self {
        Self::RemoteRead {
            kind,
            id: id.into(),
            failure,
        }
    }

    #[must_use]
    pub fn remote_write(
        kind: Kind,
        id: impl Into<String>,
        operation: Operation,
        failure: RemoteFailure,
    ) -> Self {
        Self::RemoteWrite {
            kind,
            id: id.into(),
            operation,
            failure,
        }
    }

    #[must_use]
    pub fn adoption(kind: Kind, id: impl Into<String>, failure: RemoteFailure) -> Self {
        Self::Adoption {
            kind,
            id: id.into(),
            failure,
        }
    }

    #[must_use]
    pub fn readback_mismatch(
        kind: Kind,
        id: impl Into<String>,
        operation: Operation,
        fields: Vec<&'static str>,
    ) -> Self {
        Self::ReadbackMismatch {
            kind,
            id: id.into(),
            operation,
            fields,
        }
    }

    #[must_use]
    pub fn cancelled(kind: Kind, id: impl Into<String>, operation: Operation) -> Self {
        Self::Cancelled {
            kind,
            id: id.into(),
            operation,
        }
    }

    pub fn kind(&self) -> Kind {
        match self {
            Self::Validation { kind, .. }
            | Self::RemoteRead { kind, .. }
            | Self::RemoteWrite { kind, .. }
            | Self::Adoption { kind, .. }
            | Self::ReadbackMismatch { kind, .. }
            | Self::Cancelled { kind, .. } => *kind,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Self::Validation { id, .. }
            | Self::RemoteRead { id, .. }
            | Self::RemoteWrite { id, .. }
            | Self::Adoption { id, .. }
            | Self::ReadbackMismatch { id, .. }
            | Self::Cancelled { id, .. } => id,
        }
    }

    /// The remote failure behind this error, if any.
    pub fn failure(&self) -> Option<&RemoteFailure> {
        match self {
            Self::RemoteRead { failure, .. }
            | Self::RemoteWrite { failure, .. }
            | Self::Adoption { failure, .. } => Some(failure),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        self.failure().and_then(|f| f.status)
    }

    #[must_use]
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation { .. })
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// Returns the error category for logging purposes.
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Validation { .. } => ErrorCategory::Validation,
            Self::RemoteRead { .. } | Self::RemoteWrite { .. } => ErrorCategory::Remote,
            Self::Adoption { .. } | Self::ReadbackMismatch { .. } => ErrorCategory::Consistency,
            Self::Cancelled { .. } => ErrorCategory::Cancelled,
        }
    }
}

/// Categories of reconcile errors for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Desired spec rejected locally.
    Validation,
    /// The remote service refused or failed a call.
    Remote,
    /// The remote service contradicts itself.
    Consistency,
    /// Aborted by the caller.
    Cancelled,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Remote => write!(f, "remote"),
            Self::Consistency => write!(f, "consistency"),
            Self::Cancelled => write!(f, "cancelled"),
        }
    }
}
