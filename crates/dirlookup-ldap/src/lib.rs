//! # LDAP Directory Client
//!
//! `ldap3`-backed [`DirectoryClient`](dirlookup::client::DirectoryClient)
//! for dirlookup, plus a ready-made credential checker.
//!
//! ## Features
//!
//! - LDAP v3 over plain TCP, LDAPS and STARTTLS
//! - Paged search results (RFC 2696)
//! - Active Directory bind diagnostics
//!
//! ## Example
//!
//! ```ignore
//! use dirlookup::prelude::*;
//! use dirlookup_ldap::{open_session, LdapAuthenticator};
//!
//! let config = DirectoryConfig::new("ldaps://dc1.example.com")
//!     .with_ssl()
//!     .with_domain("example.com")
//!     .with_paging(500);
//!
//! let result = LdapAuthenticator::new(config.clone())?
//!     .authenticate(&Credentials::new("jdoe", "secret"))
//!     .await?;
//!
//! let mut session = open_session(config)?;
//! session.connect(&Credentials::new("svc-lookup", "secret")).await?;
//! ```

pub mod authenticator;
pub mod client;

use dirlookup::config::DirectoryConfig;
use dirlookup::error::DirectoryResult;
use dirlookup::session::DirectorySession;

// Re-exports
pub use authenticator::{AuthenticationResult, LdapAuthenticator};
pub use client::Ldap3Client;

/// Directory session over an `ldap3` connection.
pub type LdapSession = DirectorySession<Ldap3Client>;

/// Open a session whose `ldap3` client is configured from `config`.
pub fn open_session(config: DirectoryConfig) -> DirectoryResult<LdapSession> {
    let client = Ldap3Client::new(&config);
    DirectorySession::new(config, client)
}
