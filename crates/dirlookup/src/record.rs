//! Raw and normalized directory records, and the result set handed back to
//! callers.

use base64::Engine;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// One attribute of a raw search entry: name as returned by the server and
/// its values in server order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawAttribute {
    pub name: String,
    pub values: Vec<Vec<u8>>,
}

/// A search entry as returned by the directory client.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawRecord {
    /// Distinguished name of the entry.
    pub dn: String,
    /// Attributes in server order.
    pub attributes: Vec<RawAttribute>,
}

impl RawRecord {
    pub fn new(dn: impl Into<String>) -> Self {
        Self {
            dn: dn.into(),
            attributes: Vec::new(),
        }
    }

    /// Add an attribute using builder pattern.
    #[must_use]
    pub fn with_attribute<I, V>(mut self, name: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Vec<u8>>,
    {
        self.attributes.push(RawAttribute {
            name: name.into(),
            values: values.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Find an attribute by name, ignoring case.
    pub fn attribute(&self, name: &str) -> Option<&RawAttribute> {
        self.attributes
            .iter()
            .find(|a| a.name.eq_ignore_ascii_case(name))
    }
}

/// A value in a normalized record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(untagged)]
pub enum RecordValue {
    /// Requested but not returned by the directory.
    #[default]
    Absent,
    /// A single textual value.
    Text(String),
    /// A single value that is not valid UTF-8 (base64 encoded in JSON).
    #[serde(serialize_with = "serialize_base64")]
    Binary(Vec<u8>),
    /// Multiple values in server order.
    Multi(Vec<RecordValue>),
}

fn serialize_base64<T, S>(bytes: &T, serializer: S) -> Result<S::Ok, S::Error>
where
    T: AsRef<[u8]>,
    S: Serializer,
{
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}

impl RecordValue {
    /// Text value for raw bytes, falling back to [`RecordValue::Binary`].
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(text) => RecordValue::Text(text),
            Err(e) => RecordValue::Binary(e.into_bytes()),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RecordValue::Absent)
    }

    /// Get as a string if this is a single text value.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RecordValue::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Get as strings (works for both single and multi-valued).
    pub fn as_texts(&self) -> Vec<&str> {
        match self {
            RecordValue::Text(s) => vec![s.as_str()],
            RecordValue::Multi(values) => values.iter().filter_map(|v| v.as_text()).collect(),
            _ => vec![],
        }
    }

    pub fn is_multi_valued(&self) -> bool {
        matches!(self, RecordValue::Multi(_))
    }
}

impl From<&str> for RecordValue {
    fn from(s: &str) -> Self {
        RecordValue::Text(s.to_string())
    }
}

impl From<String> for RecordValue {
    fn from(s: String) -> Self {
        RecordValue::Text(s)
    }
}

/// A directory entry reshaped into output fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NormalizedRecord {
    #[serde(flatten)]
    fields: HashMap<String, RecordValue>,
}

impl NormalizedRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<RecordValue>) {
        self.fields.insert(field.into(), value.into());
    }

    /// Set a field using builder pattern.
    #[must_use]
    pub fn with(mut self, field: impl Into<String>, value: impl Into<RecordValue>) -> Self {
        self.set(field, value);
        self
    }

    /// Get a field by its exact name.
    pub fn get(&self, field: &str) -> Option<&RecordValue> {
        self.fields.get(field)
    }

    /// Get a field by exact name, else by case-insensitive name.
    pub fn get_ignore_case(&self, field: &str) -> Option<&RecordValue> {
        self.fields.get(field).or_else(|| {
            self.fields
                .iter()
                .find(|(name, _)| name.eq_ignore_ascii_case(field))
                .map(|(_, value)| value)
        })
    }

    /// Get a single-valued text field.
    pub fn get_text(&self, field: &str) -> Option<&str> {
        self.get(field).and_then(|v| v.as_text())
    }

    /// Whether the field exists in the record shape (it may still be absent).
    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &RecordValue)> {
        self.fields.iter()
    }

    pub fn into_map(self) -> HashMap<String, RecordValue> {
        self.fields
    }
}

/// Outcome of one lookup key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LookupResult {
    /// A directory record matched the key.
    Found(NormalizedRecord),
    /// No directory record matched the key.
    NotFound,
}

impl LookupResult {
    /// Whether no directory record matched.
    pub fn is_lookup_error(&self) -> bool {
        matches!(self, LookupResult::NotFound)
    }

    pub fn record(&self) -> Option<&NormalizedRecord> {
        match self {
            LookupResult::Found(record) => Some(record),
            LookupResult::NotFound => None,
        }
    }
}

impl Serialize for LookupResult {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            LookupResult::Found(record) => {
                let mut map = serializer.serialize_map(Some(record.len() + 1))?;
                for (name, value) in record.iter() {
                    map.serialize_entry(name, value)?;
                }
                map.serialize_entry("lookupError", &false)?;
                map.end()
            }
            LookupResult::NotFound => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("lookupError", &true)?;
                map.end()
            }
        }
    }
}

/// Results of a lookup batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum ResultSet {
    /// Correlation key -> result, including negative results.
    Keyed(HashMap<String, LookupResult>),
    /// Records of a literal filter search, unordered and uncorrelated.
    Raw(Vec<NormalizedRecord>),
}

impl ResultSet {
    /// Get the result for a correlation key (always `None` for raw results).
    pub fn get(&self, key: &str) -> Option<&LookupResult> {
        match self {
            ResultSet::Keyed(map) => map.get(key),
            ResultSet::Raw(_) => None,
        }
    }

    pub fn as_keyed(&self) -> Option<&HashMap<String, LookupResult>> {
        match self {
            ResultSet::Keyed(map) => Some(map),
            ResultSet::Raw(_) => None,
        }
    }

    pub fn as_raw(&self) -> Option<&[NormalizedRecord]> {
        match self {
            ResultSet::Keyed(_) => None,
            ResultSet::Raw(records) => Some(records),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ResultSet::Keyed(map) => map.len(),
            ResultSet::Raw(records) => records.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
