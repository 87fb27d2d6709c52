//! Credential checks against an LDAP server.

use serde::Serialize;
use tracing::{info, instrument, warn};

use dirlookup::auth::{BindFailure, BindOutcome, Credentials};
use dirlookup::config::DirectoryConfig;
use dirlookup::error::DirectoryResult;
use dirlookup::session::DirectorySession;

use crate::client::Ldap3Client;

/// Result of a credential check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum AuthenticationResult {
    Authenticated,
    Rejected { reason: BindFailure },
}

impl AuthenticationResult {
    pub fn is_authenticated(&self) -> bool {
        matches!(self, AuthenticationResult::Authenticated)
    }

    pub fn failure(&self) -> Option<&BindFailure> {
        match self {
            AuthenticationResult::Authenticated => None,
            AuthenticationResult::Rejected { reason } => Some(reason),
        }
    }
}

impl From<BindOutcome> for AuthenticationResult {
    fn from(outcome: BindOutcome) -> Self {
        match outcome {
            BindOutcome::Bound => AuthenticationResult::Authenticated,
            // Incomplete credentials never reach the server.
            BindOutcome::Unbound => AuthenticationResult::Rejected {
                reason: BindFailure::InvalidCredentials,
            },
            BindOutcome::Rejected(reason) => AuthenticationResult::Rejected { reason },
        }
    }
}

/// Checks user credentials with a short-lived bind per call.
#[derive(Debug, Clone)]
pub struct LdapAuthenticator {
    config: DirectoryConfig,
}

impl LdapAuthenticator {
    pub fn new(config: DirectoryConfig) -> DirectoryResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &DirectoryConfig {
        &self.config
    }

    /// Bind as `credentials` on a fresh connection and close it again.
    ///
    /// Unreachable servers come back as `Rejected(TargetUnreachable)`.
    /// Errors are reserved for failures after the server answered, such as
    /// timeouts mid-bind.
    #[instrument(skip(self, credentials), fields(host = %self.config.host, user = %credentials.username))]
    pub async fn authenticate(
        &self,
        credentials: &Credentials,
    ) -> DirectoryResult<AuthenticationResult> {
        let client = Ldap3Client::new(&self.config);
        let mut session = DirectorySession::new(self.config.clone(), client)?;

        let result = AuthenticationResult::from(session.authenticate(credentials).await?);
        match &result {
            AuthenticationResult::Authenticated => info!("Credentials accepted"),
            AuthenticationResult::Rejected { reason } => {
                warn!(reason = %reason, "Credentials rejected")
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dirlookup::config::ConnectionSettings;

    #[test]
    fn test_outcome_mapping() {
        assert_eq!(
            AuthenticationResult::from(BindOutcome::Bound),
            AuthenticationResult::Authenticated
        );
        assert_eq!(
            AuthenticationResult::from(BindOutcome::Unbound),
            AuthenticationResult::Rejected {
                reason: BindFailure::InvalidCredentials
            }
        );
        assert_eq!(
            AuthenticationResult::from(BindOutcome::Rejected(BindFailure::AccountLocked))
                .failure(),
            Some(&BindFailure::AccountLocked)
        );
    }

    #[test]
    fn test_result_serialization() {
        let json = serde_json::to_value(AuthenticationResult::Rejected {
            reason: BindFailure::PasswordExpired,
        })
        .unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["reason"]["reason"], "password_expired");

        let json = serde_json::to_value(AuthenticationResult::Authenticated).unwrap();
        assert_eq!(json["status"], "authenticated");
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert!(LdapAuthenticator::new(DirectoryConfig::new("")).is_err());
        assert!(LdapAuthenticator::new(DirectoryConfig::new("dc1.example.com")).is_ok());
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let config = DirectoryConfig::new("127.0.0.1")
            .with_port(1)
            .with_connection(ConnectionSettings::new().with_connection_timeout(2));
        let authenticator = LdapAuthenticator::new(config).unwrap();

        let result = authenticator
            .authenticate(&Credentials::new("jdoe", "secret"))
            .await
            .unwrap();

        assert_eq!(
            result,
            AuthenticationResult::Rejected {
                reason: BindFailure::TargetUnreachable
            }
        );
    }
}
