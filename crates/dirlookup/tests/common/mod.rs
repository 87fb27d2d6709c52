//! Scripted in-memory directory client shared by the integration tests.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};

use dirlookup::async_trait;
use dirlookup::auth::BindDiagnostic;
use dirlookup::client::{DirectoryClient, Endpoint, SearchPage, SearchRequest};
use dirlookup::config::DirectoryConfig;
use dirlookup::error::{DirectoryError, DirectoryResult};
use dirlookup::record::RawRecord;
use dirlookup::types::ProtocolVersion;

pub const BASE: &str = "dc=example,dc=com";

/// Directory client answering searches from scripted pages.
#[derive(Debug, Default)]
pub struct MockDirectory {
    pub unreachable: bool,
    pub accepted_versions: Vec<ProtocolVersion>,
    /// Bind name -> password.
    pub accounts: HashMap<String, String>,
    /// Diagnostic reported for a rejected bind.
    pub reject_with: Option<BindDiagnostic>,
    /// Lower-cased base -> queued responses.
    pub responses: HashMap<String, VecDeque<DirectoryResult<SearchPage>>>,

    pub connected_to: Option<Endpoint>,
    pub binds: Vec<String>,
    pub searches: Vec<SearchRequest>,
    pub closes: usize,
    last_diagnostic: Option<BindDiagnostic>,
    open: bool,
}

impl MockDirectory {
    pub fn new() -> Self {
        Self {
            accepted_versions: vec![ProtocolVersion::V3, ProtocolVersion::V2],
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::new()
        }
    }

    pub fn with_account(mut self, bind_name: &str, password: &str) -> Self {
        self.accounts
            .insert(bind_name.to_string(), password.to_string());
        self
    }

    pub fn with_versions(mut self, versions: Vec<ProtocolVersion>) -> Self {
        self.accepted_versions = versions;
        self
    }

    pub fn rejecting_with(mut self, diagnostic: BindDiagnostic) -> Self {
        self.reject_with = Some(diagnostic);
        self
    }

    /// Queue a page for the next search under `base`.
    pub fn with_page(mut self, base: &str, page: SearchPage) -> Self {
        self.responses
            .entry(base.to_lowercase())
            .or_default()
            .push_back(Ok(page));
        self
    }

    /// Queue a failure for the next search under `base`.
    pub fn with_failure(mut self, base: &str, error: DirectoryError) -> Self {
        self.responses
            .entry(base.to_lowercase())
            .or_default()
            .push_back(Err(error));
        self
    }

    pub fn search_filters(&self) -> Vec<(String, String)> {
        self.searches
            .iter()
            .map(|s| (s.base.clone(), s.filter.clone()))
            .collect()
    }
}

#[async_trait]
impl DirectoryClient for MockDirectory {
    async fn connect(&mut self, endpoint: &Endpoint) -> DirectoryResult<()> {
        if self.unreachable {
            return Err(DirectoryError::unreachable(&endpoint.host, endpoint.port));
        }
        self.connected_to = Some(endpoint.clone());
        self.open = true;
        Ok(())
    }

    fn try_protocol_version(&mut self, version: ProtocolVersion) -> bool {
        self.accepted_versions.contains(&version)
    }

    async fn bind(&mut self, username: &str, password: &str) -> DirectoryResult<bool> {
        self.binds.push(username.to_string());
        if self.accounts.get(username).map(String::as_str) == Some(password) {
            self.last_diagnostic = None;
            return Ok(true);
        }
        self.last_diagnostic = Some(
            self.reject_with
                .clone()
                .unwrap_or_else(|| BindDiagnostic::new(49, "Invalid credentials")),
        );
        Ok(false)
    }

    fn last_diagnostic(&self) -> Option<BindDiagnostic> {
        self.last_diagnostic.clone()
    }

    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<SearchPage> {
        self.searches.push(request.clone());
        self.responses
            .get_mut(&request.base.to_lowercase())
            .and_then(VecDeque::pop_front)
            .unwrap_or_else(|| Ok(SearchPage::default()))
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if self.open {
            self.closes += 1;
            self.open = false;
        }
        Ok(())
    }
}

pub fn config() -> DirectoryConfig {
    DirectoryConfig::new("ldap://dc1.example.com")
}

pub fn user(dn: &str, sam: &str, mail: &str) -> RawRecord {
    RawRecord::new(dn)
        .with_attribute("sAMAccountName", [sam])
        .with_attribute("mail", [mail])
}
