//! Directory lookup type definitions
//!
//! Enums shared by the filter builder, the session and the client boundary.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How the correlation key of a matched record is derived.
///
/// All modes except [`CaseMode::UnchangedQuery`] transform the value returned
/// by the directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CaseMode {
    /// The value exactly as given in the lookup element.
    UnchangedQuery,
    /// The value exactly as returned by the directory.
    #[default]
    UnchangedDirectory,
    /// Lower-cased directory value.
    Lower,
    /// Upper-cased directory value.
    Upper,
    /// Directory value with its first character lower-cased.
    Lcfirst,
    /// Directory value with its first character upper-cased.
    Ucfirst,
}

impl CaseMode {
    /// Get all case modes.
    #[must_use]
    pub fn all() -> &'static [CaseMode] {
        &[
            CaseMode::UnchangedQuery,
            CaseMode::UnchangedDirectory,
            CaseMode::Lower,
            CaseMode::Upper,
            CaseMode::Lcfirst,
            CaseMode::Ucfirst,
        ]
    }

    /// Get the string representation.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            CaseMode::UnchangedQuery => "UNCHANGED_QUERY",
            CaseMode::UnchangedDirectory => "UNCHANGED_DIRECTORY",
            CaseMode::Lower => "LOWER",
            CaseMode::Upper => "UPPER",
            CaseMode::Lcfirst => "LCFIRST",
            CaseMode::Ucfirst => "UCFIRST",
        }
    }

    /// Apply the case transform to `value`.
    ///
    /// Both `Unchanged*` modes return the input untouched; choosing *which*
    /// value to feed in is the caller's concern.
    #[must_use]
    pub fn apply(&self, value: &str) -> String {
        match self {
            CaseMode::UnchangedQuery | CaseMode::UnchangedDirectory => value.to_string(),
            CaseMode::Lower => value.to_lowercase(),
            CaseMode::Upper => value.to_uppercase(),
            CaseMode::Lcfirst => map_first_char(value, |c| c.to_lowercase().collect()),
            CaseMode::Ucfirst => map_first_char(value, |c| c.to_uppercase().collect()),
        }
    }
}

fn map_first_char(value: &str, f: impl Fn(char) -> String) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => {
            let mut out = f(first);
            out.push_str(chars.as_str());
            out
        }
        None => String::new(),
    }
}

impl fmt::Display for CaseMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for CaseMode {
    type Err = ParseCaseModeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "UNCHANGED_QUERY" => Ok(CaseMode::UnchangedQuery),
            "UNCHANGED_DIRECTORY" => Ok(CaseMode::UnchangedDirectory),
            "LOWER" => Ok(CaseMode::Lower),
            "UPPER" => Ok(CaseMode::Upper),
            "LCFIRST" => Ok(CaseMode::Lcfirst),
            "UCFIRST" => Ok(CaseMode::Ucfirst),
            _ => Err(ParseCaseModeError(s.to_string())),
        }
    }
}

/// Error parsing a case mode from string.
#[derive(Debug, Clone)]
pub struct ParseCaseModeError(String);

impl fmt::Display for ParseCaseModeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid case mode '{}', expected one of: UNCHANGED_QUERY, UNCHANGED_DIRECTORY, LOWER, UPPER, LCFIRST, UCFIRST",
            self.0
        )
    }
}

impl std::error::Error for ParseCaseModeError {}

/// LDAP protocol version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(try_from = "u8", into = "u8")]
pub enum ProtocolVersion {
    V2,
    #[default]
    V3,
}

impl ProtocolVersion {
    /// Numeric version as sent on the wire.
    #[must_use]
    pub fn as_u8(&self) -> u8 {
        match self {
            ProtocolVersion::V2 => 2,
            ProtocolVersion::V3 => 3,
        }
    }

    /// Whether the paged-results control can be used with this version.
    #[must_use]
    pub fn supports_paging(&self) -> bool {
        matches!(self, ProtocolVersion::V3)
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.as_u8())
    }
}

impl TryFrom<u8> for ProtocolVersion {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            other => Err(format!("unsupported LDAP protocol version {other}")),
        }
    }
}

impl From<ProtocolVersion> for u8 {
    fn from(version: ProtocolVersion) -> Self {
        version.as_u8()
    }
}
