//! Directory lookup error types
//!
//! Error definitions with transient/permanent classification. Transient errors
//! abort a lookup batch; per-location search failures are reported through
//! the same type but handled by the session without aborting.

use thiserror::Error;

/// Error that can occur while connecting to, binding against or searching a
/// directory.
#[derive(Debug, Error)]
pub enum DirectoryError {
    // Connection errors (usually transient)
    /// The directory server could not be reached.
    #[error("directory host unreachable: {host}:{port}")]
    Unreachable {
        host: String,
        port: u16,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A call at the client boundary exceeded its timeout.
    #[error("directory operation timed out after {timeout_secs} seconds")]
    Timeout { timeout_secs: u64 },

    /// Network error during communication.
    #[error("network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Session state errors (permanent)
    /// Neither the preferred protocol version nor v3 nor v2 was accepted.
    #[error("no valid protocol version found for host \"{host}\"")]
    NoValidProtocol { host: String },

    /// The session is already bound to another user.
    #[error("session is already bound to a different user than \"{requested}\"")]
    AlreadyBound { requested: String },

    /// An operation that needs an open connection was called without one.
    #[error("no open directory connection")]
    NotConnected,

    // Input errors (permanent)
    /// Configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    /// A lookup element or attribute definition is invalid.
    #[error("invalid query: {message}")]
    InvalidQuery { message: String },

    // Search errors
    /// The server rejected or failed a search.
    #[error("search failed under \"{base}\": {message}")]
    SearchFailed {
        base: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl DirectoryError {
    /// Check if this error is transient and the batch should be retried later.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            DirectoryError::Unreachable { .. }
                | DirectoryError::Timeout { .. }
                | DirectoryError::Network { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Whether the error only concerns one base location of a batch.
    pub fn is_location_scoped(&self) -> bool {
        matches!(self, DirectoryError::SearchFailed { .. })
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            DirectoryError::Unreachable { .. } => "UNREACHABLE",
            DirectoryError::Timeout { .. } => "TIMEOUT",
            DirectoryError::Network { .. } => "NETWORK_ERROR",
            DirectoryError::NoValidProtocol { .. } => "NO_VALID_PROTOCOL",
            DirectoryError::AlreadyBound { .. } => "ALREADY_BOUND",
            DirectoryError::NotConnected => "NOT_CONNECTED",
            DirectoryError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            DirectoryError::InvalidQuery { .. } => "INVALID_QUERY",
            DirectoryError::SearchFailed { .. } => "SEARCH_FAILED",
        }
    }

    // Convenience constructors

    /// Create an unreachable error.
    pub fn unreachable(host: impl Into<String>, port: u16) -> Self {
        DirectoryError::Unreachable {
            host: host.into(),
            port,
            source: None,
        }
    }

    /// Create an unreachable error with source.
    pub fn unreachable_with_source(
        host: impl Into<String>,
        port: u16,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Unreachable {
            host: host.into(),
            port,
            source: Some(Box::new(source)),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        DirectoryError::Network {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::Network {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a search failed error.
    pub fn search_failed(base: impl Into<String>, message: impl Into<String>) -> Self {
        DirectoryError::SearchFailed {
            base: base.into(),
            message: message.into(),
            source: None,
        }
    }

    /// Create a search failed error with source.
    pub fn search_failed_with_source(
        base: impl Into<String>,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        DirectoryError::SearchFailed {
            base: base.into(),
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an invalid query error.
    pub fn invalid_query(message: impl Into<String>) -> Self {
        DirectoryError::InvalidQuery {
            message: message.into(),
        }
    }

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        DirectoryError::InvalidConfiguration {
            message: message.into(),
        }
    }
}

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient_errors = vec![
            DirectoryError::unreachable("ldap.example.com", 389),
            DirectoryError::Timeout { timeout_secs: 15 },
            DirectoryError::network("connection reset"),
        ];

        for err in transient_errors {
            assert!(
                err.is_transient(),
                "Expected {} to be transient",
                err.error_code()
            );
            assert!(!err.is_permanent());
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent_errors = vec![
            DirectoryError::NoValidProtocol {
                host: "ldap.example.com".to_string(),
            },
            DirectoryError::AlreadyBound {
                requested: "bob".to_string(),
            },
            DirectoryError::NotConnected,
            DirectoryError::invalid_query("empty field"),
            DirectoryError::search_failed("ou=people,dc=example,dc=com", "noSuchObject"),
        ];

        for err in permanent_errors {
            assert!(
                err.is_permanent(),
                "Expected {} to be permanent",
                err.error_code()
            );
        }
    }

    #[test]
    fn test_location_scoped() {
        assert!(DirectoryError::search_failed("dc=example", "boom").is_location_scoped());
        assert!(!DirectoryError::Timeout { timeout_secs: 1 }.is_location_scoped());
    }

    #[test]
    fn test_error_display() {
        let err = DirectoryError::unreachable("ldap.example.com", 636);
        assert_eq!(
            err.to_string(),
            "directory host unreachable: ldap.example.com:636"
        );

        let err = DirectoryError::NoValidProtocol {
            host: "dc1".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "no valid protocol version found for host \"dc1\""
        );
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = DirectoryError::unreachable_with_source("dc1", 389, source_err);

        assert!(err.is_transient());
        if let DirectoryError::Unreachable { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("Expected Unreachable variant");
        }
    }
}
