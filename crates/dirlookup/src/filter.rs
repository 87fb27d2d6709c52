//! Filter builder and result correlation.
//!
//! A [`FilterBuilder`] collects lookup elements, groups them by base location
//! and compiles one OR-filter per group. Once the attribute map of the batch
//! is known it builds a [`ReverseIndex`] so that every returned record can be
//! traced back to the element(s) it satisfies. Elements nothing matched are
//! reported as negative results.
//!
//! ```
//! use dirlookup::filter::FilterBuilder;
//! use dirlookup::element::QueryElement;
//!
//! let mut builder = FilterBuilder::new("dc=example,dc=com");
//! builder.add_elements([
//!     QueryElement::new("cn", "alice").unwrap(),
//!     QueryElement::new("cn", "bob").unwrap(),
//! ]);
//! builder.set_prefix("objectClass=person");
//!
//! let filters = builder.compile_filters();
//! assert_eq!(filters[0].expression, "(objectClass=person(|(cn=alice)(cn=bob)))");
//! ```

use std::collections::HashMap;

use tracing::debug;

use crate::attributes::AttributeMap;
use crate::element::QueryElement;
use crate::index::{IndexEntry, IndexHit, ReverseIndex};
use crate::record::{LookupResult, NormalizedRecord, RecordValue, ResultSet};
use crate::types::CaseMode;

/// One search to run: a filter expression under a base location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub base_location: String,
    pub expression: String,
}

/// Effective case mode of an element.
///
/// An element's own mode always wins. Otherwise the builder default applies,
/// except that elements scoped to their own base location never echo the
/// query literal: under an `UnchangedQuery` default they use
/// `UnchangedDirectory`.
pub fn resolve_case_mode(
    builder_default: CaseMode,
    element_mode: Option<CaseMode>,
    scoped: bool,
) -> CaseMode {
    match (element_mode, builder_default) {
        (Some(mode), _) => mode,
        (None, CaseMode::UnchangedQuery) if scoped => CaseMode::UnchangedDirectory,
        (None, default) => default,
    }
}

/// Builds search filters for a batch of lookups and correlates the results.
#[derive(Debug, Clone)]
pub struct FilterBuilder {
    base_location: String,
    default_elements: Vec<QueryElement>,
    /// Location-scoped groups in insertion order.
    scoped_elements: Vec<(String, Vec<QueryElement>)>,
    prefix: Option<String>,
    raw_filter: Option<String>,
    default_case_mode: CaseMode,
    escape_values: bool,
    attributes: Option<AttributeMap>,
    index: ReverseIndex,
    results: HashMap<String, LookupResult>,
    raw_results: Vec<NormalizedRecord>,
}

impl FilterBuilder {
    /// Create a builder whose unscoped elements are searched under
    /// `base_location`.
    pub fn new(base_location: impl Into<String>) -> Self {
        Self {
            base_location: base_location.into(),
            default_elements: Vec::new(),
            scoped_elements: Vec::new(),
            prefix: None,
            raw_filter: None,
            default_case_mode: CaseMode::default(),
            escape_values: false,
            attributes: None,
            index: ReverseIndex::new(),
            results: HashMap::new(),
            raw_results: Vec::new(),
        }
    }

    pub fn base_location(&self) -> &str {
        &self.base_location
    }

    /// Add lookup elements, grouping them by base location.
    pub fn add_elements(&mut self, elements: impl IntoIterator<Item = QueryElement>) -> &mut Self {
        for element in elements {
            match element.base_location() {
                None => self.default_elements.push(element),
                Some(location) => {
                    match self
                        .scoped_elements
                        .iter_mut()
                        .find(|(existing, _)| existing == location)
                    {
                        Some((_, group)) => group.push(element),
                        None => {
                            let location = location.to_string();
                            self.scoped_elements.push((location, vec![element]));
                        }
                    }
                }
            }
        }
        self
    }

    pub fn set_default_case_mode(&mut self, mode: CaseMode) -> &mut Self {
        self.default_case_mode = mode;
        self
    }

    pub fn default_case_mode(&self) -> CaseMode {
        self.default_case_mode
    }

    /// Clause every group filter is wrapped in, without parentheses
    /// (`objectClass=person`).
    pub fn set_prefix(&mut self, prefix: impl Into<String>) -> &mut Self {
        self.prefix = Some(prefix.into());
        self
    }

    /// Run `filter` verbatim under the builder's base location instead of
    /// building filters from elements. Results are returned uncorrelated.
    pub fn set_raw_filter(&mut self, filter: impl Into<String>) -> &mut Self {
        self.raw_filter = Some(filter.into());
        self
    }

    pub fn is_raw(&self) -> bool {
        self.raw_filter.is_some()
    }

    /// Escape filter metacharacters in element values. Off by default, so
    /// values such as `Smith*` act as substring patterns.
    pub fn escape_values(&mut self, enabled: bool) -> &mut Self {
        self.escape_values = enabled;
        self
    }

    /// Number of lookup elements across all groups.
    pub fn element_count(&self) -> usize {
        self.default_elements.len()
            + self
                .scoped_elements
                .iter()
                .map(|(_, group)| group.len())
                .sum::<usize>()
    }

    /// Filters to run, default location first, then scoped locations in the
    /// order they were first seen. Groups without elements are skipped.
    pub fn compile_filters(&self) -> Vec<CompiledFilter> {
        if let Some(raw) = &self.raw_filter {
            return vec![CompiledFilter {
                base_location: self.base_location.clone(),
                expression: raw.clone(),
            }];
        }

        let mut filters = Vec::with_capacity(self.scoped_elements.len() + 1);
        if !self.default_elements.is_empty() {
            filters.push(CompiledFilter {
                base_location: self.base_location.clone(),
                expression: self.group_expression(&self.default_elements),
            });
        }
        for (location, group) in &self.scoped_elements {
            if group.is_empty() {
                continue;
            }
            filters.push(CompiledFilter {
                base_location: location.clone(),
                expression: self.group_expression(group),
            });
        }
        filters
    }

    fn group_expression(&self, group: &[QueryElement]) -> String {
        let clauses: String = group
            .iter()
            .map(|element| element.filter_clause(self.escape_values))
            .collect();
        match &self.prefix {
            Some(prefix) => format!("({prefix}(|{clauses}))"),
            None => format!("(|{clauses})"),
        }
    }

    /// Index every element for correlation. Must be called once the
    /// attribute map of the batch is final and before the first record is
    /// correlated. Without a map, fields are looked up by their own name.
    pub fn build_reverse_index(&mut self, attributes: Option<&AttributeMap>) {
        self.attributes = attributes.filter(|map| !map.is_empty()).cloned();
        self.index.clear();
        if self.raw_filter.is_some() {
            return;
        }

        for element in &self.default_elements {
            let case_mode = resolve_case_mode(self.default_case_mode, element.case_mode(), false);
            self.index.insert(
                &self.base_location,
                element.field(),
                element.value(),
                index_entry(element, case_mode),
            );
        }
        for (location, group) in &self.scoped_elements {
            for element in group {
                let case_mode =
                    resolve_case_mode(self.default_case_mode, element.case_mode(), true);
                self.index.insert(
                    location,
                    element.field(),
                    element.value(),
                    index_entry(element, case_mode),
                );
            }
        }

        debug!(
            elements = self.element_count(),
            indexed = self.index.len(),
            mapped = self.attributes.is_some(),
            "Built reverse index"
        );
    }

    /// Correlate one record returned by a search under `base_location`.
    ///
    /// Every field still awaiting matches at that location is checked; a
    /// record may satisfy several elements. Exact entries are consumed so a
    /// second record with the same value is not correlated again.
    pub fn correlate(&mut self, record: NormalizedRecord, base_location: &str) {
        if self.raw_filter.is_some() {
            self.raw_results.push(record);
            return;
        }

        for field in self.index.fields(base_location) {
            let output = self.output_name(&field);
            let Some(value) = record.get_ignore_case(&output).and_then(RecordValue::as_text) else {
                continue;
            };
            let Some(hit) = self.index.lookup(base_location, &field, value) else {
                continue;
            };

            if let Some(key) = self.correlation_key(&record, &hit, &output) {
                debug!(
                    key = %key,
                    field = %field,
                    location = %base_location,
                    wildcard = !hit.exact,
                    "Correlated record"
                );
                self.results
                    .entry(key)
                    .or_insert_with(|| LookupResult::Found(record.clone()));
            }
            if hit.exact {
                let reverse_key = value.to_lowercase();
                self.index.consume(base_location, &field, &reverse_key);
            }
        }
    }

    /// Output field a directory attribute is exposed under.
    fn output_name(&self, attribute: &str) -> String {
        self.attributes
            .as_ref()
            .and_then(|map| map.output_for(attribute))
            .unwrap_or(attribute)
            .to_string()
    }

    fn correlation_key(
        &self,
        record: &NormalizedRecord,
        hit: &IndexHit,
        matched_output: &str,
    ) -> Option<String> {
        let entry = &hit.entry;
        if entry.case_mode == CaseMode::UnchangedQuery && hit.exact {
            return Some(entry.query_value.clone());
        }

        let source = entry
            .result_key_field
            .as_deref()
            .and_then(|field| self.text_field(record, field))
            .or_else(|| record.get_ignore_case(matched_output).and_then(RecordValue::as_text))?;
        Some(entry.case_mode.apply(source))
    }

    /// Text value of `field`, looked up through the attribute map first.
    fn text_field<'r>(&self, record: &'r NormalizedRecord, field: &str) -> Option<&'r str> {
        let output = self.output_name(field);
        record
            .get_ignore_case(&output)
            .and_then(RecordValue::as_text)
            .or_else(|| record.get_ignore_case(field).and_then(RecordValue::as_text))
    }

    /// Finish the batch.
    ///
    /// Raw mode returns the collected records. Otherwise every element that
    /// nothing matched is added as [`LookupResult::NotFound`]; a key that was
    /// found is never replaced by a miss.
    pub fn into_result(mut self) -> ResultSet {
        if self.raw_filter.is_some() {
            return ResultSet::Raw(self.raw_results);
        }

        let mut misses = 0usize;
        for entry in self.index.pending() {
            self.results
                .entry(entry.negative_key())
                .or_insert_with(|| {
                    misses += 1;
                    LookupResult::NotFound
                });
        }
        debug!(
            results = self.results.len(),
            not_found = misses,
            "Lookup batch complete"
        );
        ResultSet::Keyed(self.results)
    }
}

fn index_entry(element: &QueryElement, case_mode: CaseMode) -> IndexEntry {
    IndexEntry {
        case_mode,
        query_value: element.value().to_string(),
        result_key_field: element.result_key_field().map(str::to_string),
    }
}
