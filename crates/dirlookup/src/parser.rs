//! Conversion of raw search entries into normalized records.

use tracing::debug;

use crate::attributes::AttributeMap;
use crate::guid::{binary_id_to_string, is_binary_identifier};
use crate::record::{NormalizedRecord, RawAttribute, RawRecord, RecordValue};

/// How raw entries are shaped into output records.
#[derive(Debug, Clone, Copy)]
pub enum RecordShape<'a> {
    /// Every mapped output field is present on every record (absent when the
    /// directory did not return the attribute); unmapped attributes are
    /// dropped.
    Mapped(&'a AttributeMap),
    /// Every returned attribute under the name the server used.
    PassThrough,
}

impl<'a> RecordShape<'a> {
    /// `Mapped` for a non-empty attribute map, `PassThrough` otherwise.
    pub fn for_attributes(attributes: Option<&'a AttributeMap>) -> Self {
        match attributes {
            Some(map) if !map.is_empty() => RecordShape::Mapped(map),
            _ => RecordShape::PassThrough,
        }
    }
}

/// Turns raw search entries into [`NormalizedRecord`]s.
#[derive(Debug, Clone)]
pub struct RecordParser {
    decode_binary_identifiers: bool,
}

impl Default for RecordParser {
    fn default() -> Self {
        Self {
            decode_binary_identifiers: true,
        }
    }
}

impl RecordParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable GUID decoding of `objectGUID`/`objectSid`.
    #[must_use]
    pub fn with_binary_identifier_decoding(mut self, enabled: bool) -> Self {
        self.decode_binary_identifiers = enabled;
        self
    }

    /// Normalize a page of raw entries.
    pub fn parse(&self, records: Vec<RawRecord>, shape: &RecordShape<'_>) -> Vec<NormalizedRecord> {
        records
            .into_iter()
            .map(|record| match shape {
                RecordShape::Mapped(map) => self.parse_mapped(record, map),
                RecordShape::PassThrough => self.parse_pass_through(record),
            })
            .collect()
    }

    fn parse_mapped(&self, record: RawRecord, map: &AttributeMap) -> NormalizedRecord {
        let mut out = NormalizedRecord::new();
        for attribute in map.iter() {
            out.set(attribute.output_field().as_str(), RecordValue::Absent);
        }

        for attribute in &record.attributes {
            if let Some(output) = map.output_for(&attribute.name) {
                if let Some(value) = self.convert(attribute) {
                    out.set(output, value);
                }
            }
        }

        // The DN is not an attribute of the entry; fill it in when requested.
        for name in ["dn", "distinguishedName"] {
            if let Some(output) = map.output_for(name) {
                if record.attribute(name).is_none() && !record.dn.is_empty() {
                    out.set(output, record.dn.clone());
                }
            }
        }

        out
    }

    fn parse_pass_through(&self, record: RawRecord) -> NormalizedRecord {
        let mut out = NormalizedRecord::new();
        if !record.dn.is_empty() {
            out.set("dn", record.dn.clone());
        }
        for attribute in &record.attributes {
            if let Some(value) = self.convert(attribute) {
                out.set(attribute.name.clone(), value);
            }
        }
        out
    }

    /// Scalar for one value, sequence for several, nothing for none.
    fn convert(&self, attribute: &RawAttribute) -> Option<RecordValue> {
        match attribute.values.as_slice() {
            [] => None,
            [single] => Some(self.convert_single(&attribute.name, single)),
            many => Some(RecordValue::Multi(
                many.iter()
                    .map(|v| RecordValue::from_bytes(v.clone()))
                    .collect(),
            )),
        }
    }

    fn convert_single(&self, name: &str, bytes: &[u8]) -> RecordValue {
        if self.decode_binary_identifiers && is_binary_identifier(name) {
            match binary_id_to_string(bytes) {
                Some(text) => return RecordValue::Text(text),
                None => debug!(
                    attribute = %name,
                    len = bytes.len(),
                    "Binary identifier too short to decode, passing through raw"
                ),
            }
        }
        RecordValue::from_bytes(bytes.to_vec())
    }
}
