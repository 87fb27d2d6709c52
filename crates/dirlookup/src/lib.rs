//! # Directory Lookup
//!
//! Batched lookups against an LDAP / Active Directory server with
//! correlation of the returned entries back to the keys that were looked up.
//!
//! Many lookup keys are answered by a single search: the keys of one base
//! location are compiled into one OR-filter, the results are paged in and
//! every entry is matched back to the key(s) it satisfies. Keys nothing
//! matched come back as explicit negative results.
//!
//! ## Example
//!
//! ```ignore
//! use dirlookup::prelude::*;
//!
//! let mut session = DirectorySession::new(config, client)?;
//! session.connect(&Credentials::new("svc-lookup", secret)).await?;
//!
//! let mut builder = FilterBuilder::new("dc=example,dc=com");
//! builder
//!     .add_elements([
//!         QueryElement::new("sAMAccountName", "jdoe")?,
//!         QueryElement::new("sAMAccountName", "mmuster")?,
//!     ])
//!     .set_prefix("objectClass=user")
//!     .set_default_case_mode(CaseMode::Lower);
//!
//! let attributes = AttributeMap::new()
//!     .map("sAMAccountName", StandardField::Username)
//!     .map("mail", StandardField::Mail);
//!
//! let results = session.query(builder, Some(&attributes)).await?;
//! if let Some(LookupResult::Found(user)) = results.get("jdoe") {
//!     println!("{:?}", user.get_text("Mail"));
//! }
//! ```
//!
//! ## Crate Organization
//!
//! - [`element`] - Lookup keys
//! - [`attributes`] - Requested attributes and output field names
//! - [`filter`] - Filter compilation and result correlation
//! - [`index`] - Reverse index used by correlation
//! - [`parser`] - Record normalization
//! - [`runner`] - Paged search execution
//! - [`session`] - Connection lifecycle
//! - [`client`] - Directory client capability
//! - [`auth`] - Credentials and bind failure classification
//! - [`config`] - Connection configuration
//! - [`error`] - Error types with transient/permanent classification

pub mod attributes;
pub mod auth;
pub mod client;
pub mod config;
pub mod element;
pub mod error;
pub mod filter;
pub mod guid;
pub mod index;
pub mod parser;
pub mod record;
pub mod runner;
pub mod session;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```
/// use dirlookup::prelude::*;
/// ```
pub mod prelude {
    // Types and enums
    pub use crate::types::{CaseMode, ProtocolVersion};

    // Error handling
    pub use crate::error::{DirectoryError, DirectoryResult};

    // Lookup input
    pub use crate::attributes::{Attribute, AttributeMap, OutputField, StandardField};
    pub use crate::element::QueryElement;
    pub use crate::filter::{CompiledFilter, FilterBuilder};

    // Results
    pub use crate::record::{LookupResult, NormalizedRecord, RawRecord, RecordValue, ResultSet};

    // Client boundary
    pub use crate::client::{
        DirectoryClient, Endpoint, PagingCookie, SearchPage, SearchRequest,
    };

    // Session
    pub use crate::auth::{BindDiagnostic, BindFailure, BindOutcome, Credentials};
    pub use crate::config::{ConnectionSettings, DirectoryConfig, TlsConfig};
    pub use crate::runner::PagedSearchRunner;
    pub use crate::session::DirectorySession;
}

// Re-export async_trait for client implementors
pub use async_trait::async_trait;
