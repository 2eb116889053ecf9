//! Directory context abstraction
//!
//! A [`DirectoryContext`] hands out exclusively owned [`DirectorySession`]s;
//! a session runs one search at a time with the request controls of a page.
//! [`LdapDirectory`] implements both on top of an already-bound `ldap3`
//! connection.

use async_trait::async_trait;
use ldap3::controls::{Control, RawControl};
use ldap3::{Ldap, SearchEntry, SearchOptions};
use tracing::debug;

use dirpager_connector::error::{ConnectorError, ConnectorResult};

use crate::request::SearchRequest;

/// Everything one search returned.
#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    /// Entries in the order the server sent them.
    pub entries: Vec<SearchEntry>,

    /// Response controls attached to the search result.
    pub controls: Vec<RawControl>,

    /// LDAP result code of the search operation.
    pub result_code: u32,

    /// Diagnostic message sent with the result code.
    pub message: String,
}

impl SearchPage {
    /// A successful page.
    pub fn new(entries: Vec<SearchEntry>, controls: Vec<RawControl>) -> Self {
        Self {
            entries,
            controls,
            result_code: 0,
            message: String::new(),
        }
    }

    /// Set the LDAP result code and diagnostic message.
    pub fn with_result(mut self, result_code: u32, message: impl Into<String>) -> Self {
        self.result_code = result_code;
        self.message = message.into();
        self
    }

    /// Whether the search operation itself succeeded.
    pub fn is_success(&self) -> bool {
        self.result_code == 0
    }
}

/// A connection able to produce independent sessions.
#[async_trait]
pub trait DirectoryContext: Send + Sync {
    /// Session type produced by this context.
    type Session: DirectorySession;

    /// Create a session for the exclusive use of one multi-base search.
    async fn new_instance(&self) -> ConnectorResult<Self::Session>;
}

/// An exclusively owned session that runs searches with request controls.
#[async_trait]
pub trait DirectorySession: Send {
    /// Run one search under `base_dn` with the given request controls.
    ///
    /// Returns once the server has sent every entry and the final result.
    /// Transport failures are errors; a non-zero LDAP result code is not,
    /// it is reported in the returned page.
    async fn search(
        &mut self,
        base_dn: &str,
        request: &SearchRequest,
        controls: Vec<RawControl>,
    ) -> ConnectorResult<SearchPage>;

    /// Release the session.
    async fn close(&mut self) -> ConnectorResult<()>;
}

/// [`DirectoryContext`] over a bound `ldap3` connection.
#[derive(Clone)]
pub struct LdapDirectory {
    ldap: Ldap,
}

impl LdapDirectory {
    /// Wrap a connected and bound LDAP handle.
    pub fn new(ldap: Ldap) -> Self {
        Self { ldap }
    }
}

impl std::fmt::Debug for LdapDirectory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapDirectory").finish_non_exhaustive()
    }
}

#[async_trait]
impl DirectoryContext for LdapDirectory {
    type Session = LdapSession;

    async fn new_instance(&self) -> ConnectorResult<LdapSession> {
        Ok(LdapSession {
            ldap: Some(self.ldap.clone()),
        })
    }
}

/// Session handle sharing the underlying connection of an [`LdapDirectory`].
///
/// Closing the session drops the handle; the connection itself stays
/// open for its owner.
pub struct LdapSession {
    ldap: Option<Ldap>,
}

impl std::fmt::Debug for LdapSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LdapSession")
            .field("closed", &self.ldap.is_none())
            .finish()
    }
}

#[async_trait]
impl DirectorySession for LdapSession {
    async fn search(
        &mut self,
        base_dn: &str,
        request: &SearchRequest,
        controls: Vec<RawControl>,
    ) -> ConnectorResult<SearchPage> {
        let ldap = self
            .ldap
            .as_mut()
            .ok_or_else(|| ConnectorError::operation_failed("LDAP session has been closed"))?;

        let options = SearchOptions::new()
            .sizelimit(request.size_limit)
            .timelimit(request.time_limit_secs);

        let ldap3::SearchResult(entries, result) = ldap
            .with_search_options(options)
            .with_controls(controls)
            .search(
                base_dn,
                request.scope.into(),
                &request.filter,
                &request.attributes,
            )
            .await
            .map_err(|e| {
                ConnectorError::network_with_source(format!("LDAP search in {base_dn} failed"), e)
            })?;

        Ok(SearchPage {
            entries: entries.into_iter().map(SearchEntry::construct).collect(),
            controls: result.ctrls.into_iter().map(|Control(_, raw)| raw).collect(),
            result_code: result.rc,
            message: result.text,
        })
    }

    async fn close(&mut self) -> ConnectorResult<()> {
        if self.ldap.take().is_some() {
            debug!("LDAP session released");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_page_defaults_to_success() {
        let page = SearchPage::new(Vec::new(), Vec::new());
        assert!(page.is_success());
        assert!(page.message.is_empty());
    }

    #[test]
    fn test_search_page_with_result() {
        let page = SearchPage::default().with_result(51, "server busy");
        assert!(!page.is_success());
        assert_eq!(page.result_code, 51);
        assert_eq!(page.message, "server busy");
    }
}
