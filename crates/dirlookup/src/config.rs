//! Directory connection configuration.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::client::Endpoint;
use crate::error::{DirectoryError, DirectoryResult};
use crate::types::ProtocolVersion;

/// Timeouts and server-side limits.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Connection timeout in seconds.
    #[serde(default = "default_connection_timeout")]
    pub connection_timeout_secs: u64,

    /// Timeout of a single request in seconds.
    #[serde(default = "default_network_timeout")]
    pub network_timeout_secs: u64,

    /// Server-side search time limit in seconds (`0` for none).
    #[serde(default = "default_time_limit")]
    pub time_limit_secs: u32,

    /// Maximum number of entries per search.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_limit: Option<u32>,

    /// Follow referrals returned by the server.
    #[serde(default)]
    pub follow_referrals: bool,
}

fn default_connection_timeout() -> u64 {
    15
}

fn default_network_timeout() -> u64 {
    15
}

fn default_time_limit() -> u32 {
    30
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            connection_timeout_secs: default_connection_timeout(),
            network_timeout_secs: default_network_timeout(),
            time_limit_secs: default_time_limit(),
            size_limit: None,
            follow_referrals: false,
        }
    }
}

impl ConnectionSettings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection timeout.
    #[must_use]
    pub fn with_connection_timeout(mut self, secs: u64) -> Self {
        self.connection_timeout_secs = secs;
        self
    }

    /// Set the per-request timeout.
    #[must_use]
    pub fn with_network_timeout(mut self, secs: u64) -> Self {
        self.network_timeout_secs = secs;
        self
    }

    #[must_use]
    pub fn with_time_limit(mut self, secs: u32) -> Self {
        self.time_limit_secs = secs;
        self
    }

    #[must_use]
    pub fn with_size_limit(mut self, limit: u32) -> Self {
        self.size_limit = Some(limit);
        self
    }
}

/// TLS settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TlsConfig {
    /// Upgrade a plain connection with STARTTLS.
    #[serde(default)]
    pub use_starttls: bool,

    /// Whether to verify the server certificate.
    #[serde(default = "default_true")]
    pub verify_certificate: bool,
}

fn default_true() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            use_starttls: false,
            verify_certificate: true,
        }
    }
}

/// Configuration of one directory server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Server host name or IP address, optionally with a `scheme://` prefix.
    pub host: String,

    /// Server port (389 for LDAP, 636 for LDAPS).
    #[serde(default = "default_port")]
    pub port: u16,

    /// Use LDAPS.
    #[serde(default)]
    pub use_ssl: bool,

    #[serde(default)]
    pub tls: TlsConfig,

    #[serde(default)]
    pub connection: ConnectionSettings,

    /// Protocol version tried first.
    #[serde(default)]
    pub protocol_version: ProtocolVersion,

    /// Page size of paged searches; `None` disables paging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_size: Option<u32>,

    /// Logon domain appended to user names that are not e-mail addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,

    /// Decode `objectGUID`/`objectSid` values to GUID text.
    #[serde(default = "default_true")]
    pub decode_binary_identifiers: bool,
}

fn default_port() -> u16 {
    389
}

impl DirectoryConfig {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: default_port(),
            use_ssl: false,
            tls: TlsConfig::default(),
            connection: ConnectionSettings::default(),
            protocol_version: ProtocolVersion::default(),
            page_size: None,
            domain: None,
            decode_binary_identifiers: true,
        }
    }

    /// Set the port.
    #[must_use]
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Enable SSL (LDAPS).
    #[must_use]
    pub fn with_ssl(mut self) -> Self {
        self.use_ssl = true;
        self.port = 636;
        self
    }

    /// Enable STARTTLS.
    #[must_use]
    pub fn with_starttls(mut self) -> Self {
        self.tls.use_starttls = true;
        self
    }

    /// Enable paged searches.
    #[must_use]
    pub fn with_paging(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    #[must_use]
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.protocol_version = version;
        self
    }

    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    #[must_use]
    pub fn with_connection(mut self, connection: ConnectionSettings) -> Self {
        self.connection = connection;
        self
    }

    /// Host with any `scheme://` prefix removed.
    #[must_use]
    pub fn normalized_host(&self) -> &str {
        match self.host.split_once("://") {
            Some((_, rest)) => rest,
            None => &self.host,
        }
    }

    /// Endpoint to connect to.
    #[must_use]
    pub fn endpoint(&self) -> Endpoint {
        Endpoint {
            host: self.normalized_host().to_string(),
            port: self.port,
            use_tls: self.use_ssl,
            verify_certificate: self.tls.verify_certificate,
        }
    }

    /// Get the connection URL.
    #[must_use]
    pub fn url(&self) -> String {
        self.endpoint().url()
    }

    /// Validate the configuration.
    ///
    /// # Errors
    /// [`DirectoryError::InvalidConfiguration`] describing the first problem.
    pub fn validate(&self) -> DirectoryResult<()> {
        if self.normalized_host().is_empty() {
            return Err(DirectoryError::invalid_configuration("host is required"));
        }
        if self.port == 0 {
            return Err(DirectoryError::invalid_configuration("port must not be 0"));
        }
        if self.use_ssl && self.tls.use_starttls {
            return Err(DirectoryError::invalid_configuration(
                "cannot use both SSL and STARTTLS",
            ));
        }
        if self.page_size == Some(0) {
            return Err(DirectoryError::invalid_configuration(
                "page_size must be greater than 0",
            ));
        }
        if self.tls.use_starttls && self.protocol_version == ProtocolVersion::V2 {
            return Err(DirectoryError::invalid_configuration(
                "STARTTLS requires protocol version 3",
            ));
        }
        if (self.use_ssl || self.tls.use_starttls) && !self.tls.verify_certificate {
            warn!(
                host = %self.normalized_host(),
                "TLS certificate verification is disabled"
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DirectoryConfig::new("dc1.example.com");
        assert_eq!(config.port, 389);
        assert_eq!(config.protocol_version, ProtocolVersion::V3);
        assert_eq!(config.page_size, None);
        assert_eq!(config.connection.time_limit_secs, 30);
        assert_eq!(config.connection.network_timeout_secs, 15);
        assert!(config.tls.verify_certificate);
        assert!(config.decode_binary_identifiers);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_minimal() {
        let config: DirectoryConfig =
            serde_json::from_str(r#"{"host": "dc1.example.com"}"#).unwrap();
        assert_eq!(config, DirectoryConfig::new("dc1.example.com"));
    }

    #[test]
    fn test_deserialize_full() {
        let config: DirectoryConfig = serde_json::from_str(
            r#"{
                "host": "ldaps://dc1.example.com",
                "port": 636,
                "use_ssl": true,
                "tls": {"verify_certificate": false},
                "connection": {"time_limit_secs": 10, "size_limit": 500},
                "protocol_version": 2,
                "page_size": 250,
                "domain": "corp.example.com"
            }"#,
        )
        .unwrap();
        assert_eq!(config.normalized_host(), "dc1.example.com");
        assert_eq!(config.protocol_version, ProtocolVersion::V2);
        assert_eq!(config.connection.size_limit, Some(500));
        assert_eq!(config.connection.network_timeout_secs, 15);
        assert_eq!(config.page_size, Some(250));
        assert!(!config.tls.verify_certificate);
    }

    #[test]
    fn test_normalized_host_strips_scheme() {
        assert_eq!(
            DirectoryConfig::new("ldap://dc1.example.com").normalized_host(),
            "dc1.example.com"
        );
        assert_eq!(
            DirectoryConfig::new("dc1.example.com").normalized_host(),
            "dc1.example.com"
        );
    }

    #[test]
    fn test_url() {
        let config = DirectoryConfig::new("ldap://dc1.example.com").with_ssl();
        assert_eq!(config.url(), "ldaps://dc1.example.com:636");
    }

    #[test]
    fn test_validate_rejects() {
        assert!(DirectoryConfig::new("").validate().is_err());
        assert!(DirectoryConfig::new("ldap://").validate().is_err());
        assert!(DirectoryConfig::new("dc1")
            .with_ssl()
            .with_starttls()
            .validate()
            .is_err());
        assert!(DirectoryConfig::new("dc1").with_paging(0).validate().is_err());
        assert!(DirectoryConfig::new("dc1")
            .with_starttls()
            .with_protocol_version(ProtocolVersion::V2)
            .validate()
            .is_err());
    }
}
