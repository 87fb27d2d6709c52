//! Requested attributes and their output field names.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Fixed output field names for the common user lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StandardField {
    #[serde(rename = "dn")]
    Dn,
    Username,
    Mail,
    Firstname,
    Lastname,
    Groups,
}

impl StandardField {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            StandardField::Dn => "dn",
            StandardField::Username => "Username",
            StandardField::Mail => "Mail",
            StandardField::Firstname => "Firstname",
            StandardField::Lastname => "Lastname",
            StandardField::Groups => "Groups",
        }
    }
}

/// Name of a field in a [`NormalizedRecord`](crate::record::NormalizedRecord).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutputField {
    Standard(StandardField),
    Named(String),
}

impl OutputField {
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            OutputField::Standard(field) => field.as_str(),
            OutputField::Named(name) => name,
        }
    }
}

impl fmt::Display for OutputField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<StandardField> for OutputField {
    fn from(field: StandardField) -> Self {
        OutputField::Standard(field)
    }
}

impl From<&str> for OutputField {
    fn from(name: &str) -> Self {
        OutputField::Named(name.to_string())
    }
}

impl From<String> for OutputField {
    fn from(name: String) -> Self {
        OutputField::Named(name)
    }
}

/// One requested directory attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Attribute name sent to the server.
    search: String,
    /// Field name in the normalized record.
    output: OutputField,
}

impl Attribute {
    /// Request `search` and expose it under the same name.
    pub fn new(search: impl Into<String>) -> Self {
        let search = search.into();
        let output = OutputField::Named(search.clone());
        Self { search, output }
    }

    /// Request `search` and expose it as `output`.
    pub fn mapped(search: impl Into<String>, output: impl Into<OutputField>) -> Self {
        Self {
            search: search.into(),
            output: output.into(),
        }
    }

    pub fn search_attribute(&self) -> &str {
        &self.search
    }

    pub fn output_field(&self) -> &OutputField {
        &self.output
    }
}

/// Ordered, case-insensitively keyed set of requested attributes.
///
/// Built once per lookup batch and read by the runner, the record parser and
/// the correlation step.
#[derive(Debug, Clone, Default)]
pub struct AttributeMap {
    attributes: Vec<Attribute>,
    /// Lower-cased search attribute -> position in `attributes`.
    index: HashMap<String, usize>,
}

impl AttributeMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an attribute; an existing attribute with the same name (ignoring
    /// case) is replaced in place.
    pub fn add(&mut self, attribute: Attribute) {
        let key = attribute.search.to_lowercase();
        match self.index.get(&key) {
            Some(&pos) => self.attributes[pos] = attribute,
            None => {
                self.index.insert(key, self.attributes.len());
                self.attributes.push(attribute);
            }
        }
    }

    /// Add an attribute using builder pattern.
    #[must_use]
    pub fn with(mut self, attribute: Attribute) -> Self {
        self.add(attribute);
        self
    }

    /// Shorthand for `with(Attribute::mapped(search, output))`.
    #[must_use]
    pub fn map(self, search: impl Into<String>, output: impl Into<OutputField>) -> Self {
        self.with(Attribute::mapped(search, output))
    }

    /// Attribute names to request from the server, in insertion order.
    pub fn search_attributes(&self) -> Vec<String> {
        self.attributes.iter().map(|a| a.search.clone()).collect()
    }

    /// Output field for a directory attribute name (case-insensitive).
    pub fn output_for(&self, attribute: &str) -> Option<&str> {
        self.index
            .get(&attribute.to_lowercase())
            .map(|&pos| self.attributes[pos].output.as_str())
    }

    pub fn contains(&self, attribute: &str) -> bool {
        self.index.contains_key(&attribute.to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Attribute> {
        self.attributes.iter()
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl FromIterator<Attribute> for AttributeMap {
    fn from_iter<T: IntoIterator<Item = Attribute>>(iter: T) -> Self {
        let mut map = AttributeMap::new();
        for attribute in iter {
            map.add(attribute);
        }
        map
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_defaults_output_to_search_name() {
        let attr = Attribute::new("sAMAccountName");
        assert_eq!(attr.output_field().as_str(), "sAMAccountName");
    }

    #[test]
    fn test_map_lookup_is_case_insensitive() {
        let map = AttributeMap::new()
            .map("sAMAccountName", StandardField::Username)
            .map("mail", "Email");

        assert_eq!(map.output_for("samaccountname"), Some("Username"));
        assert_eq!(map.output_for("MAIL"), Some("Email"));
        assert_eq!(map.output_for("cn"), None);
        assert!(map.contains("SAMACCOUNTNAME"));
    }

    #[test]
    fn test_duplicate_attribute_replaces_in_place() {
        let map = AttributeMap::new()
            .map("mail", "Email")
            .map("cn", "Name")
            .map("MAIL", "PrimaryMail");

        assert_eq!(map.len(), 2);
        assert_eq!(map.search_attributes(), vec!["MAIL", "cn"]);
        assert_eq!(map.output_for("mail"), Some("PrimaryMail"));
    }

    #[test]
    fn test_from_iterator() {
        let map: AttributeMap = vec![
            Attribute::new("uid"),
            Attribute::mapped("memberOf", StandardField::Groups),
        ]
        .into_iter()
        .collect();
        assert_eq!(map.search_attributes(), vec!["uid", "memberOf"]);
        assert_eq!(map.output_for("memberof"), Some("Groups"));
    }

    #[test]
    fn test_output_field_serde() {
        let standard = serde_json::to_string(&OutputField::from(StandardField::Dn)).unwrap();
        assert_eq!(standard, "\"dn\"");
        let named: OutputField = serde_json::from_str("\"Email\"").unwrap();
        assert_eq!(named, OutputField::Named("Email".to_string()));
    }
}
