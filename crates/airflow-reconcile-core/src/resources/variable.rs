//! Variables: global key/value settings.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::diff::Diff;
use crate::field::{Field, FieldDef, FieldMap, FieldRole};
use crate::kind::ResourceKind;
use crate::transport::Kind;

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableSpec {
    pub key: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "Field::is_unset")]
    pub description: Field<String>,
}

impl VariableSpec {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            description: Field::Unset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct VariableState {
    pub key: String,
    pub value: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VariableResponse {
    pub key: String,
    #[serde(default)]
    pub value: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Serialize)]
struct VariableBody<'a> {
    key: &'a str,
    value: &'a str,
    #[serde(skip_serializing_if = "Field::is_unset")]
    description: Field<&'a String>,
}

pub struct Variable;

impl ResourceKind for Variable {
    const KIND: Kind = Kind::Variable;
    const FIELDS: FieldMap = FieldMap::new(&[
        FieldDef::new("key", FieldRole::Identifier),
        FieldDef::new("value", FieldRole::Required),
        FieldDef::new("description", FieldRole::OptionalClearable),
    ]);

    type Spec = VariableSpec;
    type Observed = VariableState;
    type Remote = VariableResponse;
    type Local = ();

    fn spec_id(spec: &VariableSpec) -> &str {
        &spec.key
    }

    fn observed_id(observed: &VariableState) -> &str {
        &observed.key
    }

    fn create_body(spec: &VariableSpec) -> serde_json::Result<Value> {
        serde_json::to_value(VariableBody {
            key: &spec.key,
            value: &spec.value,
            description: spec.description.for_create(),
        })
    }

    fn update_body(spec: &VariableSpec) -> serde_json::Result<Value> {
        serde_json::to_value(VariableBody {
            key: &spec.key,
            value: &spec.value,
            description: spec.description.for_replace(),
        })
    }

    fn observe(remote: VariableResponse, _local: &()) -> VariableState {
        VariableState {
            key: remote.key,
            value: remote.value.unwrap_or_default(),
            description: remote.description,
        }
    }

    fn local_state(_observed: &VariableState) {}

    fn desired_local(_spec: &VariableSpec, _prior: &()) {}

    fn diff(observed: &VariableState, spec: &VariableSpec) -> Vec<&'static str> {
        let mut diff = Diff::new();
        diff.value("value", spec.value.as_str(), observed.value.as_str());
        diff.optional("description", &spec.description, observed.description.as_ref());
        diff.into_fields()
    }

    fn spec_from_observed(observed: &VariableState) -> VariableSpec {
        VariableSpec {
            key: observed.key.clone(),
            value: observed.value.clone(),
            description: Field::from_observed(observed.description.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_update_body_full_replacement() {
        let body = Variable::update_body(&VariableSpec::new("k", "v2")).unwrap();
        assert_eq!(body, json!({"key": "k", "value": "v2", "description": null}));
        assert_eq!(
            Variable::FIELDS.update_mask(&body).unwrap(),
            vec!["value", "description"]
        );
    }

    #[test]
    fn test_diff_compares_value_and_description() {
        let state = VariableState {
            key: "k".into(),
            value: "v1".into(),
            description: Some("d".into()),
        };
        assert_eq!(
            Variable::diff(&state, &VariableSpec::new("k", "v2")),
            vec!["value", "description"]
        );

        let mut spec = VariableSpec::new("k", "v1");
        spec.description = Field::Value("d".into());
        assert!(Variable::diff(&state, &spec).is_empty());
    }
}
