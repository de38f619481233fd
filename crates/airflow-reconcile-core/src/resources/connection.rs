//! Connections: credentials and endpoints for external systems.
//!
//! `extra` is JSON text compared structurally. `password` is write-only:
//! the service may not echo it, so the last known value is retained locally.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::Diff;
use crate::field::{Field, FieldDef, FieldMap, FieldRole};
use crate::kind::ResourceKind;
use crate::transport::Kind;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionSpec {
    pub connection_id: String,
    pub conn_type: String,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub description: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub host: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub login: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub schema: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub port: Field<i32>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub extra: Field<String>,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub password: Field<String>,
}

impl ConnectionSpec {
    pub fn new(connection_id: impl Into<String>, conn_type: impl Into<String>) -> Self {
        Self {
            connection_id: connection_id.into(),
            conn_type: conn_type.into(),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConnectionState {
    pub connection_id: String,
    pub conn_type: String,
    pub description: Option<String>,
    pub host: Option<String>,
    pub login: Option<String>,
    pub schema: Option<String>,
    pub port: Option<i32>,
    pub extra: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionResponse {
    pub connection_id: String,
    pub conn_type: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub host: Option<String>,
    #[serde(default)]
    pub login: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub port: Option<i32>,
    #[serde(default)]
    pub extra: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionLocal {
    pub password: Option<String>,
}

#[derive(Serialize)]
struct ConnectionBody<'a> {
    connection_id: &'a str,
    conn_type: &'a str,
    #[serde(skip_serializing_if = "Field::is_unset")]
    description: Field<&'a String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    host: Field<&'a String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    login: Field<&'a String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    schema: Field<&'a String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    port: Field<&'a i32>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    extra: Field<&'a String>,
    #[serde(skip_serializing_if = "Field::is_unset")]
    password: Field<&'a String>,
}

/// Sent only when a non-empty value is desired.
fn secret(field: &Field<String>) -> Field<&String> {
    match field {
        Field::Value(v) if !v.is_empty() => Field::Value(v),
        _ => Field::Unset,
    }
}

pub struct Connection;

impl ResourceKind for Connection {
    const KIND: Kind = Kind::Connection;
    const FIELDS: FieldMap = FieldMap::new(&[
        FieldDef::new("connection_id", FieldRole::Identifier),
        FieldDef::new("conn_type", FieldRole::Required),
        FieldDef::new("description", FieldRole::OptionalClearable),
        FieldDef::new("host", FieldRole::OptionalClearable),
        FieldDef::new("login", FieldRole::OptionalClearable),
        FieldDef::new("schema", FieldRole::OptionalClearable),
        FieldDef::new("port", FieldRole::OptionalClearable),
        FieldDef::new("extra", FieldRole::OptionalClearable),
        FieldDef::new("password", FieldRole::Secret),
    ]);

    type Spec = ConnectionSpec;
    type Observed = ConnectionState;
    type Remote = ConnectionResponse;
    type Local = ConnectionLocal;

    fn spec_id(spec: &ConnectionSpec) -> &str {
        &spec.connection_id
    }

    fn observed_id(observed: &ConnectionState) -> &str {
        &observed.connection_id
    }

    fn validate(spec: &ConnectionSpec) -> Result<(), String> {
        if spec.conn_type.trim().is_empty() {
            return Err("`conn_type` must not be empty".into());
        }
        if let Some(port) = spec.port.value()
            && !(0..=65535).contains(port)
        {
            return Err(format!("`port` must be between 0 and 65535, got {port}"));
        }
        Ok(())
    }

    fn create_body(spec: &ConnectionSpec) -> serde_json::Result<Value> {
        serde_json::to_value(ConnectionBody {
            connection_id: &spec.connection_id,
            conn_type: &spec.conn_type,
            description: spec.description.for_create(),
            host: spec.host.for_create(),
            login: spec.login.for_create(),
            schema: spec.schema.for_create(),
            port: spec.port.for_create(),
            extra: spec.extra.for_create(),
            password: secret(&spec.password),
        })
    }

    fn update_body(spec: &ConnectionSpec) -> serde_json::Result<Value> {
        serde_json::to_value(ConnectionBody {
            connection_id: &spec.connection_id,
            conn_type: &spec.conn_type,
            description: spec.description.for_replace(),
            host: spec.host.for_replace(),
            login: spec.login.for_replace(),
            schema: spec.schema.for_replace(),
            port: spec.port.for_replace(),
            extra: spec.extra.for_replace(),
            password: secret(&spec.password),
        })
    }

    fn observe(remote: ConnectionResponse, local: &ConnectionLocal) -> ConnectionState {
        let password = remote
            .password
            .filter(|p| !p.is_empty())
            .or_else(|| local.password.clone());
        ConnectionState {
            connection_id: remote.connection_id,
            conn_type: remote.conn_type,
            description: remote.description,
            host: remote.host,
            login: remote.login,
            schema: remote.schema,
            port: remote.port,
            extra: remote.extra,
            password,
        }
    }

    fn local_state(observed: &ConnectionState) -> ConnectionLocal {
        ConnectionLocal {
            password: observed.password.clone(),
        }
    }

    fn desired_local(spec: &ConnectionSpec, prior: &ConnectionLocal) -> ConnectionLocal {
        ConnectionLocal {
            password: secret(&spec.password)
                .value()
                .map(|p| (*p).clone())
                .or_else(|| prior.password.clone()),
        }
    }

    fn diff(observed: &ConnectionState, spec: &ConnectionSpec) -> Vec<&'static str> {
        let mut diff = Diff::new();
        diff.value("conn_type", spec.conn_type.as_str(), observed.conn_type.as_str());
        diff.optional("description", &spec.description, observed.description.as_ref());
        diff.optional("host", &spec.host, observed.host.as_ref());
        diff.optional("login", &spec.login, observed.login.as_ref());
        diff.optional("schema", &spec.schema, observed.schema.as_ref());
        diff.optional("port", &spec.port, observed.port.as_ref());
        diff.structured_text("extra", &spec.extra, observed.extra.as_deref());
        diff.secret("password", &spec.password, observed.password.as_deref());
        diff.into_fields()
    }

    fn spec_from_observed(observed: &ConnectionState) -> ConnectionSpec {
        ConnectionSpec {
            connection_id: observed.connection_id.clone(),
            conn_type: observed.conn_type.clone(),
            description: Field::from_observed(observed.description.clone()),
            host: Field::from_observed(observed.host.clone()),
            login: Field::from_observed(observed.login.clone()),
            schema: Field::from_observed(observed.schema.clone()),
            port: Field::from_observed(observed.port),
            extra: Field::from_observed(observed.extra.clone()),
            password: Field::from_observed(observed.password.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn remote(extra: Option<&str>) -> ConnectionResponse {
        serde_json::from_value(json!({
            "connection_id": "warehouse",
            "conn_type": "postgres",
            "host": "db.internal",
            "port": 5432,
            "extra": extra,
        }))
        .unwrap()
    }

    #[test]
    fn test_create_body_omits_unspecified_and_cleared() {
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        spec.host = Field::Value("db.internal".into());
        spec.login = Field::Clear;
        spec.password = Field::Value(String::new());

        let body = Connection::create_body(&spec).unwrap();
        assert_eq!(
            body,
            json!({"connection_id": "warehouse", "conn_type": "postgres", "host": "db.internal"})
        );
        assert!(Connection::FIELDS.check_create_payload(&body).is_ok());
    }

    #[test]
    fn test_update_body_clears_every_unspecified_optional() {
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        spec.port = Field::Value(5433);

        let body = Connection::update_body(&spec).unwrap();
        assert_eq!(
            body,
            json!({
                "connection_id": "warehouse",
                "conn_type": "postgres",
                "description": null,
                "host": null,
                "login": null,
                "schema": null,
                "port": 5433,
                "extra": null,
            })
        );

        let mask = Connection::FIELDS.update_mask(&body).unwrap();
        assert!(!mask.contains(&"connection_id"));
        assert!(!mask.contains(&"password"));
        assert_eq!(mask.len(), 7);
    }

    #[test]
    fn test_update_body_sends_non_empty_password() {
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        spec.password = Field::Value("s3cret".into());

        let body = Connection::update_body(&spec).unwrap();
        assert_eq!(body["password"], "s3cret");
        assert!(Connection::FIELDS.update_mask(&body).unwrap().contains(&"password"));
    }

    #[test]
    fn test_observe_retains_unechoed_password() {
        let local = ConnectionLocal {
            password: Some("kept".into()),
        };
        let state = Connection::observe(remote(None), &local);
        assert_eq!(state.password.as_deref(), Some("kept"));

        let mut echoed = remote(None);
        echoed.password = Some("server".into());
        let state = Connection::observe(echoed, &local);
        assert_eq!(state.password.as_deref(), Some("server"));
    }

    #[test]
    fn test_diff_extra_is_structural() {
        let state = Connection::observe(
            remote(Some(r#"{"sslmode":"require","timeout":5}"#)),
            &ConnectionLocal::default(),
        );
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        spec.host = Field::Value("db.internal".into());
        spec.port = Field::Value(5432);
        spec.extra = Field::Value("{ \"timeout\": 5, \"sslmode\": \"require\" }".into());
        assert!(Connection::diff(&state, &spec).is_empty());

        spec.extra = Field::Value(r#"{"sslmode":"disable"}"#.into());
        assert_eq!(Connection::diff(&state, &spec), vec!["extra"]);
    }

    #[test]
    fn test_validate_port_range() {
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        spec.port = Field::Value(70000);
        assert!(Connection::validate(&spec).unwrap_err().contains("port"));

        spec.port = Field::Value(0);
        assert!(Connection::validate(&spec).is_ok());

        let spec = ConnectionSpec::new("warehouse", " ");
        assert!(Connection::validate(&spec).is_err());
    }

    #[test]
    fn test_desired_local_prefers_spec_password() {
        let prior = ConnectionLocal {
            password: Some("old".into()),
        };
        let mut spec = ConnectionSpec::new("warehouse", "postgres");
        assert_eq!(Connection::desired_local(&spec, &prior), prior);

        spec.password = Field::Value("new".into());
        assert_eq!(
            Connection::desired_local(&spec, &prior).password.as_deref(),
            Some("new")
        );
    }
}
