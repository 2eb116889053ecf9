//! # LDAP Connector
//!
//! VLV-indexed paged search for LDAP directories.
//!
//! Large result sets are read in fixed-size blocks through the server-side
//! sort and virtual list view controls, so no more than one page is ever
//! held in memory. The paging works around two common server defects:
//! a duplicated entry at page boundaries, and a reported list size that is
//! never reached.
//!
//! ## Example
//!
//! ```ignore
//! use dirpager_connector::prelude::*;
//! use dirpager_connector_ldap::{LdapDirectory, SearchRequest, VlvIndexSearch, VlvSearchConfig};
//!
//! let (conn, mut ldap) = ldap3::LdapConnAsync::new("ldap://ldap.example.com").await?;
//! ldap3::drive!(conn);
//! ldap.simple_bind("cn=admin,dc=example,dc=com", "secret").await?.success()?;
//!
//! let search = VlvIndexSearch::new(&VlvSearchConfig::new("uid", 100))?;
//! let directory = LdapDirectory::new(ldap);
//! let base_dns = vec!["ou=people,dc=example,dc=com".to_string()];
//!
//! let summary = search
//!     .do_search(
//!         &directory,
//!         &base_dns,
//!         &SearchRequest::new("(objectClass=inetOrgPerson)").with_attributes(["uid", "cn"]),
//!         &mut |base_dn: &str, entry: ldap3::SearchEntry| {
//!             println!("{base_dn}: {}", entry.dn);
//!             SearchFlow::Continue
//!         },
//!     )
//!     .await?;
//! ```

pub mod config;
pub mod context;
pub mod controls;
pub mod page;
pub mod request;
pub mod search;

// Re-exports
pub use config::VlvSearchConfig;
pub use context::{DirectoryContext, DirectorySession, LdapDirectory, LdapSession, SearchPage};
pub use page::PageState;
pub use request::{SearchRequest, SearchScope};
pub use search::{BaseDnOutcome, VlvIndexSearch};
