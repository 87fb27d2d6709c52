//! Paged search execution.

use std::collections::HashSet;

use tracing::{debug, instrument, warn};

use crate::attributes::AttributeMap;
use crate::client::{DirectoryClient, PagingCookie, SearchRequest};
use crate::config::DirectoryConfig;
use crate::error::DirectoryResult;
use crate::parser::{RecordParser, RecordShape};
use crate::record::{NormalizedRecord, RawRecord};
use crate::session::Connection;

/// Runs the search of one base location, following paging cookies, and
/// hands every normalized record to a sink page by page.
#[derive(Debug, Clone)]
pub struct PagedSearchRunner {
    page_size: Option<u32>,
    size_limit: Option<u32>,
    time_limit_secs: u32,
    parser: RecordParser,
}

impl Default for PagedSearchRunner {
    fn default() -> Self {
        Self {
            page_size: None,
            size_limit: None,
            time_limit_secs: 0,
            parser: RecordParser::default(),
        }
    }
}

impl PagedSearchRunner {
    /// Runner paging with `page_size`, or issuing single searches for `None`.
    pub fn new(page_size: Option<u32>) -> Self {
        Self {
            page_size,
            ..Self::default()
        }
    }

    pub fn from_config(config: &DirectoryConfig) -> Self {
        Self {
            page_size: config.page_size,
            size_limit: config.connection.size_limit,
            time_limit_secs: config.connection.time_limit_secs,
            parser: RecordParser::new()
                .with_binary_identifier_decoding(config.decode_binary_identifiers),
        }
    }

    #[must_use]
    pub fn with_parser(mut self, parser: RecordParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn page_size(&self) -> Option<u32> {
        self.page_size
    }

    /// Search `filter` under `base_location` and deliver every record to
    /// `sink`. Returns the number of records delivered.
    ///
    /// Does nothing on an unbound connection. Protocol v2 connections and
    /// runners without a page size issue exactly one search.
    #[instrument(skip(self, connection, attributes, sink), fields(base = %base_location))]
    pub async fn run<C, F>(
        &self,
        connection: &mut Connection<C>,
        base_location: &str,
        filter: &str,
        attributes: Option<&AttributeMap>,
        mut sink: F,
    ) -> DirectoryResult<usize>
    where
        C: DirectoryClient,
        F: FnMut(NormalizedRecord),
    {
        if !connection.is_bound() {
            debug!("Connection not bound, skipping search");
            return Ok(0);
        }

        let shape = RecordShape::for_attributes(attributes);
        let requested = attributes
            .map(AttributeMap::search_attributes)
            .unwrap_or_default();
        let request = SearchRequest::new(base_location, filter)
            .with_attributes(requested)
            .with_limits(self.size_limit, self.time_limit_secs);

        let page_size = self
            .page_size
            .filter(|_| connection.protocol().is_some_and(|p| p.supports_paging()));

        let Some(page_size) = page_size else {
            let page = connection.client_mut().search(&request).await?;
            let delivered = self.deliver(page.records, &shape, &mut sink);
            debug!(filter = %filter, records = delivered, "Search completed");
            return Ok(delivered);
        };

        let mut delivered = 0;
        let mut pages = 0u32;
        let mut cookie = PagingCookie::initial();
        let mut seen: HashSet<Vec<u8>> = HashSet::new();
        loop {
            let paged = request.clone().with_paging(page_size, cookie.clone());
            let page = connection.client_mut().search(&paged).await?;
            pages += 1;
            delivered += self.deliver(page.records, &shape, &mut sink);

            match page.cookie {
                Some(next) if !next.is_empty() => {
                    if !seen.insert(next.as_bytes().to_vec()) {
                        warn!(pages, "Server repeated paging cookie, stopping");
                        break;
                    }
                    cookie = next;
                }
                _ => break,
            }
        }

        debug!(
            filter = %filter,
            pages,
            page_size,
            records = delivered,
            "Paged search completed"
        );
        Ok(delivered)
    }

    fn deliver<F>(&self, records: Vec<RawRecord>, shape: &RecordShape<'_>, sink: &mut F) -> usize
    where
        F: FnMut(NormalizedRecord),
    {
        let parsed = self.parser.parse(records, shape);
        let count = parsed.len();
        parsed.into_iter().for_each(|record| sink(record));
        count
    }
}
