//! Field-level comparison of observed state against a desired spec.

use crate::equivalence::json_text_equivalent;
use crate::field::Field;

/// Collects the names of fields whose observed value does not match.
///
/// For optional fields the type's `Default` is the empty sentinel: a
/// desired `Unset`, `Clear` or empty value matches an absent or empty
/// observed value.
#[derive(Debug, Default)]
pub struct Diff {
    fields: Vec<&'static str>,
}

impl Diff {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn value<T: PartialEq + ?Sized>(&mut self, name: &'static str, desired: &T, observed: &T) {
        if desired != observed {
            self.fields.push(name);
        }
    }

    pub fn optional<T: PartialEq + Default>(
        &mut self,
        name: &'static str,
        desired: &Field<T>,
        observed: Option<&T>,
    ) {
        if non_empty(desired.value()) != non_empty(observed) {
            self.fields.push(name);
        }
    }

    /// Like [`Diff::optional`], comparing present values with
    /// [`json_text_equivalent`].
    pub fn structured_text(
        &mut self,
        name: &'static str,
        desired: &Field<String>,
        observed: Option<&str>,
    ) {
        let desired = desired.value().map(String::as_str).filter(|s| !s.is_empty());
        let observed = observed.filter(|s| !s.is_empty());
        let same = match (desired, observed) {
            (None, None) => true,
            (Some(d), Some(o)) => json_text_equivalent(o, d),
            _ => false,
        };
        if !same {
            self.fields.push(name);
        }
    }

    /// Secrets only diff when a non-empty value is desired and differs from
    /// the last known one; an unspecified secret is never cleared.
    ///
    /// Adoption starts without a known value because the remote secret is
    /// never readable, so a desired secret always costs one update there.
    pub fn secret(&mut self, name: &'static str, desired: &Field<String>, known: Option<&str>) {
        if let Some(d) = desired.value().filter(|s| !s.is_empty())
            && known != Some(d.as_str())
        {
            self.fields.push(name);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_fields(self) -> Vec<&'static str> {
        self.fields
    }
}

fn non_empty<T: PartialEq + Default>(value: Option<&T>) -> Option<&T> {
    value.filter(|v| **v != T::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_optional_empty_sentinel() {
        let mut diff = Diff::new();
        diff.optional("a", &Field::<String>::Unset, None);
        diff.optional("b", &Field::<String>::Clear, Some(&String::new()));
        diff.optional("c", &Field::Value(String::new()), None);
        diff.optional("d", &Field::Value(0), None);
        assert!(diff.is_empty());
    }

    #[test]
    fn test_optional_detects_stale_value() {
        let mut diff = Diff::new();
        diff.optional("host", &Field::<String>::Unset, Some(&"db".to_string()));
        diff.optional("port", &Field::Value(5432), Some(&5433));
        diff.optional("login", &Field::Value("me".to_string()), Some(&"me".to_string()));
        assert_eq!(diff.into_fields(), vec!["host", "port"]);
    }

    #[test]
    fn test_structured_text() {
        let mut diff = Diff::new();
        diff.structured_text(
            "extra",
            &Field::Value("{ \"b\": 1, \"a\": 2 }".to_string()),
            Some(r#"{"a":2,"b":1}"#),
        );
        assert!(diff.is_empty());

        diff.structured_text("extra", &Field::Unset, Some(r#"{"a":2}"#));
        assert_eq!(diff.into_fields(), vec!["extra"]);
    }

    #[test]
    fn test_secret() {
        let mut diff = Diff::new();
        diff.secret("password", &Field::Unset, Some("old"));
        diff.secret("password", &Field::Value(String::new()), None);
        diff.secret("password", &Field::Value("same".to_string()), Some("same"));
        assert!(diff.is_empty());

        diff.secret("password", &Field::Value("new".to_string()), Some("old"));
        diff.secret("password", &Field::Value("new".to_string()), None);
        assert_eq!(diff.into_fields().len(), 2);
    }
}
