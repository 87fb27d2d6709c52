//! Reverse index from returned values back to lookup elements.

use std::collections::HashMap;

use crate::types::CaseMode;

/// Key of the entry matching any returned value of a field.
pub const WILDCARD: &str = "*";

/// What is remembered about one lookup element until it is matched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexEntry {
    /// Effective case mode of the element.
    pub case_mode: CaseMode,
    /// The lookup value exactly as given.
    pub query_value: String,
    /// Record field the correlation key is read from instead of the matched one.
    pub result_key_field: Option<String>,
}

impl IndexEntry {
    /// Key under which a miss is reported.
    pub fn negative_key(&self) -> String {
        self.case_mode.apply(&self.query_value)
    }
}

/// A successful lookup of a returned value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexHit {
    pub entry: IndexEntry,
    /// False when only the wildcard entry of the field matched.
    pub exact: bool,
}

type ValueMap = HashMap<String, IndexEntry>;
type FieldMap = HashMap<String, ValueMap>;

/// `location -> field -> value -> entry`, every level keyed lower-case.
#[derive(Debug, Clone, Default)]
pub struct ReverseIndex {
    locations: HashMap<String, FieldMap>,
}

impl ReverseIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an element; a later element with the same location, field and
    /// value replaces the earlier one.
    pub fn insert(&mut self, location: &str, field: &str, value: &str, entry: IndexEntry) {
        self.locations
            .entry(location.to_lowercase())
            .or_default()
            .entry(field.to_lowercase())
            .or_default()
            .insert(value.to_lowercase(), entry);
    }

    /// Snapshot of the fields still awaiting matches at `location`.
    pub fn fields(&self, location: &str) -> Vec<String> {
        self.locations
            .get(&location.to_lowercase())
            .map(|fields| fields.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Exact entry for `value`, else the field's wildcard entry.
    pub fn lookup(&self, location: &str, field: &str, value: &str) -> Option<IndexHit> {
        let values = self
            .locations
            .get(&location.to_lowercase())?
            .get(&field.to_lowercase())?;

        if let Some(entry) = values.get(&value.to_lowercase()) {
            return Some(IndexHit {
                entry: entry.clone(),
                exact: true,
            });
        }
        values.get(WILDCARD).map(|entry| IndexHit {
            entry: entry.clone(),
            exact: false,
        })
    }

    /// Consume an exact entry. Wildcard entries are never consumed.
    ///
    /// Drops the field once it has no entries left.
    pub fn consume(&mut self, location: &str, field: &str, value: &str) -> Option<IndexEntry> {
        let value = value.to_lowercase();
        if value == WILDCARD {
            return None;
        }
        let fields = self.locations.get_mut(&location.to_lowercase())?;
        let field = field.to_lowercase();
        let values = fields.get_mut(&field)?;
        let removed = values.remove(&value);
        if values.is_empty() {
            fields.remove(&field);
        }
        removed
    }

    /// Unconsumed exact entries, across all locations.
    pub fn pending(&self) -> impl Iterator<Item = &IndexEntry> {
        self.locations
            .values()
            .flat_map(|fields| fields.values())
            .flat_map(|values| values.iter())
            .filter(|(value, _)| value.as_str() != WILDCARD)
            .map(|(_, entry)| entry)
    }

    /// Number of unconsumed entries, wildcards included.
    pub fn len(&self) -> usize {
        self.locations
            .values()
            .flat_map(|fields| fields.values())
            .map(|values| values.len())
            .sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.locations.clear();
    }
}
