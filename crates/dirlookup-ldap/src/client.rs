//! `ldap3`-backed directory client.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use ldap3::asn1::{parse_tag, StructureTag, TagClass, Types, PL};
use ldap3::controls::{Control, ControlType, PagedResults, RawControl};
use ldap3::{
    DerefAliases, Ldap, LdapConnAsync, LdapConnSettings, LdapError, Scope, SearchEntry,
    SearchOptions, SearchResult,
};
use tracing::{debug, instrument, warn};

use dirlookup::auth::{BindDiagnostic, RESULT_INVALID_CREDENTIALS};
use dirlookup::client::{DirectoryClient, Endpoint, PagingCookie, SearchPage, SearchRequest};
use dirlookup::config::DirectoryConfig;
use dirlookup::error::{DirectoryError, DirectoryResult};
use dirlookup::record::{RawAttribute, RawRecord};
use dirlookup::types::ProtocolVersion;

/// Result codes a search may end with and still deliver its entries.
const RC_SUCCESS: u32 = 0;
const RC_SIZE_LIMIT_EXCEEDED: u32 = 4;
const RC_REFERRAL: u32 = 10;

/// Directory client speaking LDAPv3 through `ldap3`.
pub struct Ldap3Client {
    connection_timeout: Duration,
    network_timeout: Duration,
    use_starttls: bool,
    follow_referrals: bool,
    ldap: Option<Ldap>,
    last_diagnostic: Option<BindDiagnostic>,
}

impl std::fmt::Debug for Ldap3Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ldap3Client")
            .field("connection_timeout", &self.connection_timeout)
            .field("network_timeout", &self.network_timeout)
            .field("use_starttls", &self.use_starttls)
            .field("connected", &self.ldap.is_some())
            .finish()
    }
}

impl Ldap3Client {
    pub fn new(config: &DirectoryConfig) -> Self {
        Self {
            connection_timeout: Duration::from_secs(config.connection.connection_timeout_secs),
            network_timeout: Duration::from_secs(config.connection.network_timeout_secs),
            use_starttls: config.tls.use_starttls,
            follow_referrals: config.connection.follow_referrals,
            ldap: None,
            last_diagnostic: None,
        }
    }

    fn settings(&self, endpoint: &Endpoint) -> LdapConnSettings {
        LdapConnSettings::new()
            .set_conn_timeout(self.connection_timeout)
            .set_starttls(self.use_starttls && !endpoint.use_tls)
            .set_no_tls_verify(!endpoint.verify_certificate)
    }

    fn ldap(&mut self) -> DirectoryResult<&mut Ldap> {
        self.ldap.as_mut().ok_or(DirectoryError::NotConnected)
    }

    fn map_transport_error(&self, context: &str, error: LdapError) -> DirectoryError {
        match error {
            LdapError::Timeout { .. } => DirectoryError::Timeout {
                timeout_secs: self.network_timeout.as_secs(),
            },
            other => DirectoryError::network_with_source(context.to_string(), other),
        }
    }
}

#[async_trait]
impl DirectoryClient for Ldap3Client {
    #[instrument(skip(self), fields(url = %endpoint.url()))]
    async fn connect(&mut self, endpoint: &Endpoint) -> DirectoryResult<()> {
        let url = endpoint.url();
        debug!("Connecting to LDAP server");

        let (conn, ldap) = LdapConnAsync::with_settings(self.settings(endpoint), &url)
            .await
            .map_err(|e| DirectoryError::unreachable_with_source(&endpoint.host, endpoint.port, e))?;

        // Spawn the connection driver
        tokio::spawn(async move {
            if let Err(e) = conn.drive().await {
                warn!(error = %e, "LDAP connection driver error");
            }
        });

        self.ldap = Some(ldap);
        self.last_diagnostic = None;
        Ok(())
    }

    /// `ldap3` only speaks LDAPv3.
    fn try_protocol_version(&mut self, version: ProtocolVersion) -> bool {
        version == ProtocolVersion::V3
    }

    async fn bind(&mut self, username: &str, password: &str) -> DirectoryResult<bool> {
        let timeout = self.network_timeout;
        let bound = {
            let ldap = self.ldap()?;
            ldap.with_timeout(timeout)
                .simple_bind(username, password)
                .await
        };
        let result = match bound {
            Ok(result) => result,
            Err(e) => return Err(self.map_transport_error("LDAP bind failed", e)),
        };

        if result.rc == RC_SUCCESS {
            self.last_diagnostic = None;
            return Ok(true);
        }

        debug!(rc = result.rc, text = %result.text, "LDAP bind rejected");
        self.last_diagnostic = Some(bind_diagnostic(result.rc, &result.text));
        Ok(false)
    }

    fn last_diagnostic(&self) -> Option<BindDiagnostic> {
        self.last_diagnostic.clone()
    }

    #[instrument(skip(self, request), fields(base = %request.base, filter = %request.filter))]
    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<SearchPage> {
        let timeout = self.network_timeout;
        let attributes = requested_attributes(&request.attributes);
        let controls: Vec<RawControl> = request
            .paging
            .iter()
            .map(|paging| {
                PagedResults {
                    size: i32::try_from(paging.page_size).unwrap_or(i32::MAX),
                    cookie: paging.cookie.as_bytes().to_vec(),
                }
                .into()
            })
            .collect();

        let ldap = self.ldap()?;
        ldap.with_search_options(search_options(request))
            .with_timeout(timeout);
        if !controls.is_empty() {
            ldap.with_controls(controls);
        }
        let searched = ldap
            .search(&request.base, Scope::Subtree, &request.filter, attributes)
            .await;

        let SearchResult(entries, result) = match searched {
            Ok(result) => result,
            Err(e) => return Err(self.map_transport_error("LDAP search failed", e)),
        };

        match result.rc {
            RC_SUCCESS => {}
            RC_SIZE_LIMIT_EXCEEDED => {
                warn!(entries = entries.len(), "Size limit exceeded, results are partial");
            }
            RC_REFERRAL => {
                if self.follow_referrals {
                    warn!(refs = ?result.refs, "Referral returned, chasing referrals is not supported");
                } else {
                    debug!(refs = ?result.refs, "Referral ignored");
                }
            }
            rc => {
                return Err(DirectoryError::search_failed(
                    &request.base,
                    format!("result code {rc}: {}", result.text),
                ));
            }
        }

        let records = entries
            .into_iter()
            .map(SearchEntry::construct)
            .map(entry_to_raw_record)
            .collect::<Vec<_>>();
        let cookie = paging_cookie(&result.ctrls);

        debug!(
            records = records.len(),
            more = cookie.as_ref().map_or(false, |c| !c.is_empty()),
            "LDAP search page received"
        );
        Ok(SearchPage { records, cookie })
    }

    async fn close(&mut self) -> DirectoryResult<()> {
        if let Some(mut ldap) = self.ldap.take() {
            if let Err(e) = ldap.unbind().await {
                warn!(error = %e, "Error during LDAP unbind");
            }
        }
        self.last_diagnostic = None;
        Ok(())
    }
}

fn requested_attributes(attributes: &[String]) -> Vec<String> {
    if attributes.is_empty() {
        vec!["*".to_string()]
    } else {
        attributes.to_vec()
    }
}

fn search_options(request: &SearchRequest) -> SearchOptions {
    let mut options = SearchOptions::new()
        .deref(DerefAliases::Never)
        .timelimit(i32::try_from(request.time_limit_secs).unwrap_or(i32::MAX));
    if let Some(limit) = request.size_limit {
        options = options.sizelimit(i32::try_from(limit).unwrap_or(i32::MAX));
    }
    options
}

fn bind_diagnostic(rc: u32, text: &str) -> BindDiagnostic {
    let code = i32::try_from(rc).unwrap_or(RESULT_INVALID_CREDENTIALS);
    BindDiagnostic::new(code, text)
}

/// Cookie of the paged-results response control, if the server sent one.
///
/// A control whose value is not a `SEQUENCE { INTEGER, OCTET STRING }` is
/// treated as absent, which ends paging.
fn paging_cookie(controls: &[Control]) -> Option<PagingCookie> {
    controls.iter().find_map(|control| match control {
        Control(Some(ControlType::PagedResults), raw) => {
            let val = raw.val.as_deref()?;
            let cookie = decode_paged_results(val);
            if cookie.is_none() {
                warn!(len = val.len(), "Undecodable paged results control, stopping paging");
            }
            cookie
        }
        _ => None,
    })
}

fn decode_paged_results(val: &[u8]) -> Option<PagingCookie> {
    let (_, tag) = parse_tag(val).ok()?;
    if !is_universal(&tag, Types::Sequence) {
        return None;
    }
    let PL::C(components) = tag.payload else {
        return None;
    };
    match components.as_slice() {
        [size, cookie]
            if is_universal(size, Types::Integer) && is_universal(cookie, Types::OctetString) =>
        {
            match (&size.payload, &cookie.payload) {
                (PL::P(_), PL::P(bytes)) => Some(PagingCookie::from(bytes.clone())),
                _ => None,
            }
        }
        _ => None,
    }
}

fn is_universal(tag: &StructureTag, kind: Types) -> bool {
    tag.class == TagClass::Universal && tag.id == kind as u64
}

/// Convert a search entry, text and binary attributes alike.
fn entry_to_raw_record(entry: SearchEntry) -> RawRecord {
    let mut attributes: HashMap<String, RawAttribute> = HashMap::new();

    for (name, values) in entry.attrs {
        let values = values.into_iter().map(String::into_bytes).collect();
        attributes.insert(name.clone(), RawAttribute { name, values });
    }
    for (name, values) in entry.bin_attrs {
        attributes
            .entry(name.clone())
            .or_insert_with(|| RawAttribute {
                name,
                values: Vec::new(),
            })
            .values
            .extend(values);
    }

    let mut attributes: Vec<RawAttribute> = attributes.into_values().collect();
    attributes.sort_by(|a, b| a.name.cmp(&b.name));

    RawRecord {
        dn: entry.dn,
        attributes,
    }
}
