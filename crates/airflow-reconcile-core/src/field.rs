//! Tri-state desired fields and per-kind field tables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// Desired value of an optional field.
///
/// Deserializes a missing member as `Unset` (with `#[serde(default)]`),
/// `null` as `Clear` and anything else as `Value`. Serializes `Clear` as
/// `null`; `Unset` members must be skipped with
/// `#[serde(skip_serializing_if = "Field::is_unset")]`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Field<T> {
    #[default]
    Unset,
    Clear,
    Value(T),
}

impl<T> Field<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Self::Unset)
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Self::Value(v) => Some(v),
            _ => None,
        }
    }

    /// Wire form for a create call: creation has no clear, so anything but
    /// an explicit value is omitted and the remote default applies.
    pub fn for_create(&self) -> Field<&T> {
        match self {
            Self::Value(v) => Field::Value(v),
            _ => Field::Unset,
        }
    }

    /// Wire form for a full-replacement update: anything but an explicit
    /// value is sent as an explicit clear.
    pub fn for_replace(&self) -> Field<&T> {
        match self {
            Self::Value(v) => Field::Value(v),
            _ => Field::Clear,
        }
    }
}

impl<T: Default + PartialEq> Field<T> {
    /// Spec value for an observed field; the empty sentinel becomes `Unset`.
    pub fn from_observed(observed: Option<T>) -> Self {
        match observed {
            Some(v) if v != T::default() => Self::Value(v),
            _ => Self::Unset,
        }
    }
}

impl<T: Serialize> Serialize for Field<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Value(v) => v.serialize(serializer),
            Self::Unset | Self::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Field<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match Option::<T>::deserialize(deserializer)? {
            Some(v) => Self::Value(v),
            None => Self::Clear,
        })
    }
}

/// How a field participates in remote writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldRole {
    /// Immutable key; changing it means a different resource.
    Identifier,
    /// Sent on every create and update.
    Required,
    /// Omitted on create when unspecified, explicitly cleared on update.
    OptionalClearable,
    /// Write-only; sent only when a non-empty value is desired.
    Secret,
    /// Server-computed; never written.
    Computed,
    /// Kept in local state only; never written.
    LocalOnly,
}

impl FieldRole {
    pub fn is_writable(self) -> bool {
        matches!(
            self,
            Self::Identifier | Self::Required | Self::OptionalClearable | Self::Secret
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldDef {
    pub name: &'static str,
    pub role: FieldRole,
}

impl FieldDef {
    pub const fn new(name: &'static str, role: FieldRole) -> Self {
        Self { name, role }
    }
}

/// Static field table of one resource kind.
#[derive(Debug, Clone, Copy)]
pub struct FieldMap {
    fields: &'static [FieldDef],
}

impl FieldMap {
    pub const fn new(fields: &'static [FieldDef]) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &'static [FieldDef] {
        self.fields
    }

    pub fn role(&self, name: &str) -> Option<FieldRole> {
        self.fields.iter().find(|f| f.name == name).map(|f| f.role)
    }

    pub fn names(&self, role: FieldRole) -> impl Iterator<Item = &'static str> + '_ {
        self.fields
            .iter()
            .filter(move |f| f.role == role)
            .map(|f| f.name)
    }

    /// Checks that a create payload carries the identifier and every
    /// required field, and nothing that is not writable.
    pub fn check_create_payload(&self, payload: &Value) -> Result<(), String> {
        let obj = payload
            .as_object()
            .ok_or_else(|| "create payload must be an object".to_string())?;
        self.check_writable_keys(obj)?;
        for def in self.fields {
            if matches!(def.role, FieldRole::Identifier | FieldRole::Required)
                && obj.get(def.name).is_none_or(Value::is_null)
            {
                return Err(format!("missing required field `{}`", def.name));
            }
        }
        Ok(())
    }

    /// Checks that an update payload replaces every required and clearable
    /// field, and returns the update mask: every non-identifier key sent.
    pub fn update_mask(&self, payload: &Value) -> Result<Vec<&'static str>, String> {
        let obj = payload
            .as_object()
            .ok_or_else(|| "update payload must be an object".to_string())?;
        self.check_writable_keys(obj)?;
        let mut mask = Vec::new();
        for def in self.fields {
            let sent = obj.contains_key(def.name);
            match def.role {
                FieldRole::Required if !sent || obj[def.name].is_null() => {
                    return Err(format!("missing required field `{}`", def.name));
                }
                FieldRole::OptionalClearable if !sent => {
                    return Err(format!("field `{}` is neither set nor cleared", def.name));
                }
                FieldRole::Required | FieldRole::OptionalClearable | FieldRole::Secret
                    if sent =>
                {
                    mask.push(def.name);
                }
                _ => {}
            }
        }
        Ok(mask)
    }

    fn check_writable_keys(&self, obj: &serde_json::Map<String, Value>) -> Result<(), String> {
        for key in obj.keys() {
            match self.role(key) {
                Some(role) if role.is_writable() => {}
                Some(_) => return Err(format!("field `{key}` is not writable")),
                None => return Err(format!("unknown field `{key}`")),
            }
        }
        Ok(())
    }
}
