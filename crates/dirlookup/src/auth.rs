//! Bind credentials and classification of bind failures.
//!
//! Active Directory reports the reason a simple bind was rejected in the
//! diagnostic message of an `invalidCredentials` (49) result, e.g.
//! `80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data 52e, v4563`.
//! The hexadecimal value after `data` is the sub-code classified here.

use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::warn;
use validator::ValidateEmail;

/// LDAP result code of a rejected simple bind.
pub const RESULT_INVALID_CREDENTIALS: i32 = 49;

/// Pseudo result code reported when the server cannot be reached.
pub const RESULT_SERVER_DOWN: i32 = -1;

/// Why a bind was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum BindFailure {
    TargetUnreachable,
    InvalidCredentials,
    PasswordExpired,
    AccountDisabled,
    AccountLocked,
    AccountExpired,
    MustResetPassword,
    LogonTimeRestricted,
    LogonWorkstationRestricted,
    /// Not catalogued; carries the raw sub-code, or the result code when the
    /// message had none.
    Unknown { code: i32 },
}

impl BindFailure {
    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            BindFailure::TargetUnreachable => "target_unreachable",
            BindFailure::InvalidCredentials => "invalid_credentials",
            BindFailure::PasswordExpired => "password_expired",
            BindFailure::AccountDisabled => "account_disabled",
            BindFailure::AccountLocked => "account_locked",
            BindFailure::AccountExpired => "account_expired",
            BindFailure::MustResetPassword => "must_reset_password",
            BindFailure::LogonTimeRestricted => "logon_time_restricted",
            BindFailure::LogonWorkstationRestricted => "logon_workstation_restricted",
            BindFailure::Unknown { .. } => "unknown",
        }
    }

    /// Whether the credentials themselves were accepted and the account
    /// state prevented the logon.
    pub fn is_account_state(&self) -> bool {
        matches!(
            self,
            BindFailure::PasswordExpired
                | BindFailure::AccountDisabled
                | BindFailure::AccountLocked
                | BindFailure::AccountExpired
                | BindFailure::MustResetPassword
                | BindFailure::LogonTimeRestricted
                | BindFailure::LogonWorkstationRestricted
        )
    }

    /// Map an Active Directory sub-code.
    fn from_sub_code(sub_code: u32) -> Option<Self> {
        match sub_code {
            0x52e | 0x525 => Some(BindFailure::InvalidCredentials),
            0x530 => Some(BindFailure::LogonTimeRestricted),
            0x531 => Some(BindFailure::LogonWorkstationRestricted),
            0x532 => Some(BindFailure::PasswordExpired),
            0x533 => Some(BindFailure::AccountDisabled),
            0x701 => Some(BindFailure::AccountExpired),
            0x773 => Some(BindFailure::MustResetPassword),
            0x775 => Some(BindFailure::AccountLocked),
            _ => None,
        }
    }
}

impl fmt::Display for BindFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindFailure::Unknown { code } => write!(f, "unknown ({code})"),
            other => f.write_str(other.as_str()),
        }
    }
}

/// Result code and diagnostic message of the last failed bind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindDiagnostic {
    pub result_code: i32,
    pub message: String,
}

impl BindDiagnostic {
    pub fn new(result_code: i32, message: impl Into<String>) -> Self {
        Self {
            result_code,
            message: message.into(),
        }
    }

    /// Diagnostic for a server that could not be reached.
    pub fn unreachable(message: impl Into<String>) -> Self {
        Self::new(RESULT_SERVER_DOWN, message)
    }

    /// Hexadecimal sub-code following `data` in the message, if any.
    pub fn sub_code(&self) -> Option<u32> {
        let (_, rest) = self.message.split_once("data ")?;
        let digits: String = rest
            .chars()
            .take_while(|c| c.is_ascii_hexdigit())
            .collect();
        if digits.is_empty() {
            return None;
        }
        u32::from_str_radix(&digits, 16).ok()
    }

    /// Classify the failure. Codes without a mapping are logged and returned
    /// as [`BindFailure::Unknown`].
    pub fn classify(&self) -> BindFailure {
        if self.result_code == RESULT_SERVER_DOWN {
            return BindFailure::TargetUnreachable;
        }

        let sub_code = self.sub_code();
        if let Some(failure) = sub_code.and_then(BindFailure::from_sub_code) {
            return failure;
        }
        if self.result_code == RESULT_INVALID_CREDENTIALS && sub_code.is_none() {
            return BindFailure::InvalidCredentials;
        }

        let code = sub_code
            .and_then(|c| i32::try_from(c).ok())
            .unwrap_or(self.result_code);
        warn!(
            result_code = self.result_code,
            sub_code = ?sub_code.map(|c| format!("{c:x}")),
            message = %self.message,
            "Unmapped directory bind error"
        );
        BindFailure::Unknown { code }
    }
}

impl fmt::Display for BindDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "result code {}: {}", self.result_code, self.message)
    }
}

/// Credentials for a simple bind.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Credentials {
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
    /// Appended as `@domain` to user names that are not e-mail addresses.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .field("domain", &self.domain)
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            domain: None,
        }
    }

    /// Anonymous session: no bind is attempted.
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Set the logon domain using builder pattern.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    /// Whether both user name and password are present; otherwise no bind
    /// is attempted.
    pub fn is_complete(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Name sent in the bind request.
    pub fn bind_name(&self) -> String {
        match self.domain.as_deref() {
            Some(domain) if !domain.is_empty() && !self.username.validate_email() => {
                format!("{}@{}", self.username, domain)
            }
            _ => self.username.clone(),
        }
    }
}

/// State of a session after a connect or authenticate call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindOutcome {
    /// Bound as the requested user.
    Bound,
    /// Connected without binding (no credentials given).
    Unbound,
    /// The server rejected the bind.
    Rejected(BindFailure),
}

impl BindOutcome {
    pub fn is_bound(&self) -> bool {
        matches!(self, BindOutcome::Bound)
    }

    pub fn failure(&self) -> Option<BindFailure> {
        match self {
            BindOutcome::Rejected(failure) => Some(*failure),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AD_MESSAGE: &str =
        "80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data 52e, v4563";

    fn ad(sub_code: &str) -> BindDiagnostic {
        BindDiagnostic::new(
            RESULT_INVALID_CREDENTIALS,
            format!("80090308: LdapErr: DSID-0C09044E, comment: AcceptSecurityContext error, data {sub_code}, v4563"),
        )
    }

    #[test]
    fn test_sub_code_parsing() {
        assert_eq!(
            BindDiagnostic::new(49, AD_MESSAGE).sub_code(),
            Some(0x52e)
        );
        assert_eq!(BindDiagnostic::new(49, "Invalid credentials").sub_code(), None);
        assert_eq!(BindDiagnostic::new(49, "data , v1").sub_code(), None);
    }

    #[test]
    fn test_classify_ad_sub_codes() {
        let cases = [
            ("52e", BindFailure::InvalidCredentials),
            ("525", BindFailure::InvalidCredentials),
            ("530", BindFailure::LogonTimeRestricted),
            ("531", BindFailure::LogonWorkstationRestricted),
            ("532", BindFailure::PasswordExpired),
            ("533", BindFailure::AccountDisabled),
            ("701", BindFailure::AccountExpired),
            ("773", BindFailure::MustResetPassword),
            ("775", BindFailure::AccountLocked),
        ];
        for (code, expected) in cases {
            assert_eq!(ad(code).classify(), expected, "sub-code {code}");
        }
    }

    #[test]
    fn test_classify_plain_invalid_credentials() {
        let diag = BindDiagnostic::new(RESULT_INVALID_CREDENTIALS, "Invalid credentials");
        assert_eq!(diag.classify(), BindFailure::InvalidCredentials);
    }

    #[test]
    fn test_classify_unreachable() {
        let diag = BindDiagnostic::unreachable("connection refused");
        assert_eq!(diag.classify(), BindFailure::TargetUnreachable);
    }

    #[test]
    fn test_classify_unknown() {
        assert_eq!(
            ad("999").classify(),
            BindFailure::Unknown { code: 0x999 }
        );
        assert_eq!(
            BindDiagnostic::new(53, "unwilling to perform").classify(),
            BindFailure::Unknown { code: 53 }
        );
    }

    #[test]
    fn test_account_state() {
        assert!(BindFailure::AccountLocked.is_account_state());
        assert!(!BindFailure::InvalidCredentials.is_account_state());
        assert!(!BindFailure::Unknown { code: 1 }.is_account_state());
    }

    #[test]
    fn test_bind_failure_display() {
        assert_eq!(BindFailure::PasswordExpired.to_string(), "password_expired");
        assert_eq!(BindFailure::Unknown { code: 80 }.to_string(), "unknown (80)");
    }

    #[test]
    fn test_bind_name() {
        let creds = Credentials::new("jdoe", "secret").with_domain("corp.example.com");
        assert_eq!(creds.bind_name(), "jdoe@corp.example.com");

        let creds = Credentials::new("john@example.com", "secret").with_domain("corp.example.com");
        assert_eq!(creds.bind_name(), "john@example.com");

        let creds = Credentials::new("CN=svc,DC=example,DC=com", "secret");
        assert_eq!(creds.bind_name(), "CN=svc,DC=example,DC=com");
    }

    #[test]
    fn test_credentials_complete() {
        assert!(Credentials::new("jdoe", "secret").is_complete());
        assert!(!Credentials::new("jdoe", "").is_complete());
        assert!(!Credentials::anonymous().is_complete());
    }

    #[test]
    fn test_credentials_debug_redacts_password() {
        let debug = format!("{:?}", Credentials::new("jdoe", "hunter2"));
        assert!(debug.contains("jdoe"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn test_bind_name_keeps_email_style_names() {
        for username in ["a@x.com", "first.last@corp.example.com"] {
            let creds = Credentials::new(username, "secret").with_domain("example.com");
            assert_eq!(creds.bind_name(), username);
        }
        for username in ["jdoe", "@x.com", "a b@x.com", "EXAMPLE\\jdoe"] {
            let creds = Credentials::new(username, "secret").with_domain("example.com");
            assert_eq!(creds.bind_name(), format!("{username}@example.com"));
        }
    }

    #[test]
    fn test_bind_outcome() {
        assert!(BindOutcome::Bound.is_bound());
        assert_eq!(
            BindOutcome::Rejected(BindFailure::AccountDisabled).failure(),
            Some(BindFailure::AccountDisabled)
        );
        assert_eq!(BindOutcome::Unbound.failure(), None);
    }
}
