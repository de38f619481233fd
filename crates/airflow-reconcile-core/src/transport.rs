//! Transport collaborator contract.
//!
//! The reconciler never talks HTTP itself. It hands payloads to a
//! [`Transport`] and branches on the typed [`RemoteOutcome`] it gets back.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The resource kinds managed by the reconciler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Kind {
    Connection,
    Dag,
    Pool,
    Variable,
}

impl Kind {
    pub const ALL: [Kind; 4] = [Kind::Connection, Kind::Dag, Kind::Pool, Kind::Variable];

    /// Collection segment of the remote API path (`/api/v2/<collection>`).
    pub fn collection(self) -> &'static str {
        match self {
            Self::Connection => "connections",
            Self::Dag => "dags",
            Self::Pool => "pools",
            Self::Variable => "variables",
        }
    }

    /// Name of the identifier member in payloads and responses.
    pub fn identifier_field(self) -> &'static str {
        match self {
            Self::Connection => "connection_id",
            Self::Dag => "dag_id",
            Self::Pool => "name",
            Self::Variable => "key",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Connection => "connection",
            Self::Dag => "dag",
            Self::Pool => "pool",
            Self::Variable => "variable",
        }
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Kind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Kind::ALL
            .into_iter()
            .find(|k| k.as_str() == s || k.collection() == s)
            .ok_or_else(|| format!("unknown resource kind `{s}`"))
    }
}

/// A remote call that did not succeed.
///
/// `status` is `None` when no HTTP response was received at all.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFailure {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// A failure without any response, e.g. connection refused.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }
}

impl fmt::Display for RemoteFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(f, "HTTP {status}: {}", self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Typed outcome of a single remote call.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteOutcome<T> {
    Success(T),
    /// 404: the object does not exist.
    NotFound(String),
    /// 409: the object already exists.
    Conflict(String),
    /// Any other non-2xx status, or no response.
    Failure(RemoteFailure),
}

impl<T> RemoteOutcome<T> {
    /// Classifies a non-success HTTP status.
    pub fn from_error_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            404 => Self::NotFound(message.into()),
            409 => Self::Conflict(message.into()),
            _ => Self::Failure(RemoteFailure::new(status, message)),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    /// Maps a successful body, turning a decoding error into a failure.
    pub fn try_map<U, E: fmt::Display>(
        self,
        f: impl FnOnce(T) -> Result<U, E>,
    ) -> RemoteOutcome<U> {
        match self {
            Self::Success(body) => match f(body) {
                Ok(value) => RemoteOutcome::Success(value),
                Err(e) => RemoteOutcome::Failure(RemoteFailure::unreachable(format!(
                    "unexpected response body: {e}"
                ))),
            },
            Self::NotFound(m) => RemoteOutcome::NotFound(m),
            Self::Conflict(m) => RemoteOutcome::Conflict(m),
            Self::Failure(f) => RemoteOutcome::Failure(f),
        }
    }

    /// Converts into a plain result, keeping 404/409 as failures with their status.
    pub fn into_result(self) -> Result<T, RemoteFailure> {
        match self {
            Self::Success(value) => Ok(value),
            Self::NotFound(m) => Err(RemoteFailure::new(404, m)),
            Self::Conflict(m) => Err(RemoteFailure::new(409, m)),
            Self::Failure(f) => Err(f),
        }
    }

    /// The failure carried by a non-success outcome.
    ///
    /// A `Success` is reported as an unexpected success so callers that only
    /// reach this on error paths still produce a readable message.
    pub fn into_failure(self) -> RemoteFailure {
        match self.into_result() {
            Ok(_) => RemoteFailure::unreachable("unexpected success"),
            Err(f) => f,
        }
    }
}

/// Uniform CRUD contract consumed by the reconciler, one call per method.
///
/// Implementations must not retry; retry policy belongs to the caller.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn create(&self, kind: Kind, payload: &Value) -> RemoteOutcome<Value>;

    async fn read(&self, kind: Kind, id: &str) -> RemoteOutcome<Value>;

    /// `update_mask` names every field the payload sets or clears.
    async fn update(
        &self,
        kind: Kind,
        id: &str,
        payload: &Value,
        update_mask: &[&str],
    ) -> RemoteOutcome<Value>;

    async fn delete(&self, kind: Kind, id: &str) -> RemoteOutcome<()>;
}
