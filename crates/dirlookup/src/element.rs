//! Lookup elements: one (field, value) key each.

use serde::{Deserialize, Serialize};

use crate::error::{DirectoryError, DirectoryResult};
use crate::types::CaseMode;

/// One lookup key.
///
/// Elements without a base location share the builder's default search
/// base; scoped elements are searched under their own base location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryElement {
    field: String,
    value: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    base_location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    result_key_field: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    case_mode: Option<CaseMode>,
}

impl QueryElement {
    /// Create an element matching `field=value`.
    ///
    /// # Errors
    /// Returns [`DirectoryError::InvalidQuery`] if `field` or `value` is empty.
    pub fn new(field: impl Into<String>, value: impl Into<String>) -> DirectoryResult<Self> {
        let field = field.into();
        let value = value.into();
        if field.is_empty() {
            return Err(DirectoryError::invalid_query("element field must not be empty"));
        }
        if value.is_empty() {
            return Err(DirectoryError::invalid_query(format!(
                "element value for field '{field}' must not be empty"
            )));
        }
        Ok(Self {
            field,
            value,
            base_location: None,
            result_key_field: None,
            case_mode: None,
        })
    }

    /// Search this element under its own base location.
    #[must_use]
    pub fn with_base_location(mut self, base_location: impl Into<String>) -> Self {
        self.base_location = Some(base_location.into());
        self
    }

    /// Derive the correlation key from another record field.
    #[must_use]
    pub fn with_result_key_field(mut self, field: impl Into<String>) -> Self {
        self.result_key_field = Some(field.into());
        self
    }

    /// Override the builder-wide case mode for this element.
    #[must_use]
    pub fn with_case_mode(mut self, case_mode: CaseMode) -> Self {
        self.case_mode = Some(case_mode);
        self
    }

    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn base_location(&self) -> Option<&str> {
        self.base_location.as_deref()
    }

    pub fn result_key_field(&self) -> Option<&str> {
        self.result_key_field.as_deref()
    }

    pub fn case_mode(&self) -> Option<CaseMode> {
        self.case_mode
    }

    /// Whether this element matches any value of its field.
    pub fn is_wildcard(&self) -> bool {
        self.value == "*"
    }

    /// Filter clause for this element, `(field=value)`.
    pub fn filter_clause(&self, escape: bool) -> String {
        if escape {
            format!("({}={})", self.field, escape_filter_value(&self.value))
        } else {
            format!("({}={})", self.field, self.value)
        }
    }
}

/// Escape special characters in filter values (RFC 4515).
pub fn escape_filter_value(value: &str) -> String {
    value
        .replace('\\', "\\5c")
        .replace('*', "\\2a")
        .replace('(', "\\28")
        .replace(')', "\\29")
        .replace('\0', "\\00")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_element_new() {
        let element = QueryElement::new("sAMAccountName", "jdoe").unwrap();
        assert_eq!(element.field(), "sAMAccountName");
        assert_eq!(element.value(), "jdoe");
        assert_eq!(element.base_location(), None);
        assert_eq!(element.case_mode(), None);
        assert!(!element.is_wildcard());
    }

    #[test]
    fn test_element_rejects_empty_parts() {
        assert!(matches!(
            QueryElement::new("", "jdoe"),
            Err(DirectoryError::InvalidQuery { .. })
        ));
        assert!(matches!(
            QueryElement::new("cn", ""),
            Err(DirectoryError::InvalidQuery { .. })
        ));
    }

    #[test]
    fn test_element_builders() {
        let element = QueryElement::new("mail", "a@x.com")
            .unwrap()
            .with_base_location("ou=staff,dc=example,dc=com")
            .with_result_key_field("sAMAccountName")
            .with_case_mode(CaseMode::Upper);

        assert_eq!(element.base_location(), Some("ou=staff,dc=example,dc=com"));
        assert_eq!(element.result_key_field(), Some("sAMAccountName"));
        assert_eq!(element.case_mode(), Some(CaseMode::Upper));
    }

    #[test]
    fn test_filter_clause_verbatim() {
        let element = QueryElement::new("cn", "Smith*").unwrap();
        assert_eq!(element.filter_clause(false), "(cn=Smith*)");
    }

    #[test]
    fn test_filter_clause_escaped() {
        let element = QueryElement::new("cn", "a*b(c)d\\e").unwrap();
        assert_eq!(element.filter_clause(true), "(cn=a\\2ab\\28c\\29d\\5ce)");
    }

    #[test]
    fn test_escape_filter_value_nul() {
        assert_eq!(escape_filter_value("a\0b"), "a\\00b");
    }
}
