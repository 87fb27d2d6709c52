//! Directory client capability.
//!
//! The engine never speaks the wire protocol itself. Everything it needs from
//! a directory server goes through [`DirectoryClient`].

use async_trait::async_trait;
use tracing::debug;

use crate::auth::BindDiagnostic;
use crate::error::{DirectoryError, DirectoryResult};
use crate::record::RawRecord;
use crate::types::ProtocolVersion;

/// Where and how to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Host name without scheme.
    pub host: String,
    pub port: u16,
    /// Connect with LDAPS.
    pub use_tls: bool,
    /// Verify the server certificate for LDAPS and STARTTLS.
    pub verify_certificate: bool,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            use_tls: false,
            verify_certificate: true,
        }
    }

    /// Connection URL, `ldap://host:port` or `ldaps://host:port`.
    pub fn url(&self) -> String {
        let scheme = if self.use_tls { "ldaps" } else { "ldap" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

/// Opaque continuation token of a paged search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagingCookie(pub Vec<u8>);

impl PagingCookie {
    /// The cookie of the first page.
    pub fn initial() -> Self {
        Self::default()
    }

    /// An empty cookie from the server ends the paging sequence.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for PagingCookie {
    fn from(bytes: Vec<u8>) -> Self {
        PagingCookie(bytes)
    }
}

impl From<&str> for PagingCookie {
    fn from(value: &str) -> Self {
        PagingCookie(value.as_bytes().to_vec())
    }
}

/// Paged-results control of one search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingControl {
    pub page_size: u32,
    pub cookie: PagingCookie,
}

/// One search request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchRequest {
    pub base: String,
    pub filter: String,
    /// Attributes to return; empty means all user attributes.
    pub attributes: Vec<String>,
    pub paging: Option<PagingControl>,
    /// Maximum number of entries, `None` for the server limit.
    pub size_limit: Option<u32>,
    /// Server-side time limit in seconds, `0` for none.
    pub time_limit_secs: u32,
}

impl SearchRequest {
    pub fn new(base: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            base: base.into(),
            filter: filter.into(),
            attributes: Vec::new(),
            paging: None,
            size_limit: None,
            time_limit_secs: 0,
        }
    }

    /// Set the requested attributes using builder pattern.
    #[must_use]
    pub fn with_attributes(mut self, attributes: Vec<String>) -> Self {
        self.attributes = attributes;
        self
    }

    /// Request a page using builder pattern.
    #[must_use]
    pub fn with_paging(mut self, page_size: u32, cookie: PagingCookie) -> Self {
        self.paging = Some(PagingControl { page_size, cookie });
        self
    }

    #[must_use]
    pub fn with_limits(mut self, size_limit: Option<u32>, time_limit_secs: u32) -> Self {
        self.size_limit = size_limit;
        self.time_limit_secs = time_limit_secs;
        self
    }
}

/// Entries of one search response.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPage {
    pub records: Vec<RawRecord>,
    /// Cookie of the next page. Missing when the server sent no paging
    /// control or one that could not be decoded.
    pub cookie: Option<PagingCookie>,
}

impl SearchPage {
    pub fn new(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            cookie: None,
        }
    }

    #[must_use]
    pub fn with_cookie(mut self, cookie: impl Into<PagingCookie>) -> Self {
        self.cookie = Some(cookie.into());
        self
    }

    /// Whether another page has to be requested.
    pub fn has_more(&self) -> bool {
        self.cookie.as_ref().map_or(false, |c| !c.is_empty())
    }
}

/// Capability of talking to one directory server over one connection.
///
/// Calls are strictly sequential; timeouts are enforced by the
/// implementation.
#[async_trait]
pub trait DirectoryClient: Send {
    /// Open a connection.
    ///
    /// # Errors
    /// [`DirectoryError::Unreachable`] when the server cannot be reached.
    async fn connect(&mut self, endpoint: &Endpoint) -> DirectoryResult<()>;

    /// Try to switch the connection to `version`.
    fn try_protocol_version(&mut self, version: ProtocolVersion) -> bool;

    /// Settle on a protocol version: `preferred`, then v3, then v2.
    ///
    /// # Errors
    /// [`DirectoryError::NoValidProtocol`] when none is accepted.
    fn negotiate_protocol_version(
        &mut self,
        preferred: ProtocolVersion,
        host: &str,
    ) -> DirectoryResult<ProtocolVersion> {
        for version in [preferred, ProtocolVersion::V3, ProtocolVersion::V2] {
            if self.try_protocol_version(version) {
                debug!(host = %host, version = %version, "Negotiated protocol version");
                return Ok(version);
            }
        }
        Err(DirectoryError::NoValidProtocol {
            host: host.to_string(),
        })
    }

    /// Simple bind. `Ok(false)` when the server rejected the credentials;
    /// the reason is available from [`DirectoryClient::last_diagnostic`].
    async fn bind(&mut self, username: &str, password: &str) -> DirectoryResult<bool>;

    /// Result code and message of the last failed bind.
    fn last_diagnostic(&self) -> Option<BindDiagnostic>;

    /// Run one search (one page when paging is requested).
    async fn search(&mut self, request: &SearchRequest) -> DirectoryResult<SearchPage>;

    /// Close the connection. Closing a closed client is a no-op.
    async fn close(&mut self) -> DirectoryResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VersionOnly {
        accepted: Vec<ProtocolVersion>,
        tried: Vec<ProtocolVersion>,
    }

    #[async_trait]
    impl DirectoryClient for VersionOnly {
        async fn connect(&mut self, _endpoint: &Endpoint) -> DirectoryResult<()> {
            Ok(())
        }

        fn try_protocol_version(&mut self, version: ProtocolVersion) -> bool {
            self.tried.push(version);
            self.accepted.contains(&version)
        }

        async fn bind(&mut self, _username: &str, _password: &str) -> DirectoryResult<bool> {
            Ok(true)
        }

        fn last_diagnostic(&self) -> Option<BindDiagnostic> {
            None
        }

        async fn search(&mut self, _request: &SearchRequest) -> DirectoryResult<SearchPage> {
            Ok(SearchPage::default())
        }

        async fn close(&mut self) -> DirectoryResult<()> {
            Ok(())
        }
    }

    fn client(accepted: Vec<ProtocolVersion>) -> VersionOnly {
        VersionOnly {
            accepted,
            tried: Vec::new(),
        }
    }

    #[test]
    fn test_negotiate_prefers_requested() {
        let mut c = client(vec![ProtocolVersion::V2, ProtocolVersion::V3]);
        assert_eq!(
            c.negotiate_protocol_version(ProtocolVersion::V2, "dc1").unwrap(),
            ProtocolVersion::V2
        );
        assert_eq!(c.tried, vec![ProtocolVersion::V2]);
    }

    #[test]
    fn test_negotiate_falls_back_to_v2() {
        let mut c = client(vec![ProtocolVersion::V2]);
        assert_eq!(
            c.negotiate_protocol_version(ProtocolVersion::V3, "dc1").unwrap(),
            ProtocolVersion::V2
        );
        assert_eq!(
            c.tried,
            vec![ProtocolVersion::V3, ProtocolVersion::V3, ProtocolVersion::V2]
        );
    }

    #[test]
    fn test_negotiate_no_valid_protocol() {
        let mut c = client(vec![]);
        let err = c
            .negotiate_protocol_version(ProtocolVersion::V3, "dc1")
            .unwrap_err();
        assert!(matches!(err, DirectoryError::NoValidProtocol { host } if host == "dc1"));
    }

    #[test]
    fn test_endpoint_url() {
        let mut endpoint = Endpoint::new("dc1.example.com", 389);
        assert_eq!(endpoint.url(), "ldap://dc1.example.com:389");
        endpoint.use_tls = true;
        endpoint.port = 636;
        assert_eq!(endpoint.url(), "ldaps://dc1.example.com:636");
    }

    #[test]
    fn test_search_page_has_more() {
        assert!(!SearchPage::default().has_more());
        assert!(!SearchPage::default().with_cookie("").has_more());
        assert!(SearchPage::default().with_cookie("A").has_more());
    }

    #[test]
    fn test_search_request_builder() {
        let request = SearchRequest::new("dc=x", "(cn=a)")
            .with_attributes(vec!["cn".to_string()])
            .with_paging(500, PagingCookie::initial())
            .with_limits(Some(1000), 30);
        assert_eq!(request.attributes, vec!["cn"]);
        assert_eq!(request.paging.unwrap().page_size, 500);
        assert_eq!(request.size_limit, Some(1000));
        assert_eq!(request.time_limit_secs, 30);
    }
}
