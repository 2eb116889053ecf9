//! Search request parameters
//!
//! The caller-supplied, per-search parameters that stay fixed while the
//! pages of every base DN are fetched.

use ldap3::Scope;
use serde::{Deserialize, Serialize};

/// Search scope relative to a base DN.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchScope {
    /// Only the base entry itself.
    Base,
    /// Immediate children of the base entry.
    OneLevel,
    /// The base entry and its whole subtree.
    #[default]
    Subtree,
}

impl From<SearchScope> for Scope {
    fn from(scope: SearchScope) -> Self {
        match scope {
            SearchScope::Base => Scope::Base,
            SearchScope::OneLevel => Scope::OneLevel,
            SearchScope::Subtree => Scope::Subtree,
        }
    }
}

impl std::fmt::Display for SearchScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchScope::Base => write!(f, "base"),
            SearchScope::OneLevel => write!(f, "onelevel"),
            SearchScope::Subtree => write!(f, "subtree"),
        }
    }
}

/// Filter and result-shape constraints of a search.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// LDAP filter string, e.g. `(objectClass=inetOrgPerson)`.
    pub filter: String,

    /// Search scope.
    #[serde(default)]
    pub scope: SearchScope,

    /// Attributes to return; empty means all user attributes.
    #[serde(default)]
    pub attributes: Vec<String>,

    /// Server-side size limit; zero means no limit.
    #[serde(default)]
    pub size_limit: i32,

    /// Server-side time limit in seconds; zero means no limit.
    #[serde(default)]
    pub time_limit_secs: i32,
}

impl SearchRequest {
    /// Subtree search with `filter`, returning all user attributes.
    pub fn new(filter: impl Into<String>) -> Self {
        Self {
            filter: filter.into(),
            scope: SearchScope::default(),
            attributes: Vec::new(),
            size_limit: 0,
            time_limit_secs: 0,
        }
    }

    /// Set the scope.
    #[must_use]
    pub fn with_scope(mut self, scope: SearchScope) -> Self {
        self.scope = scope;
        self
    }

    /// Set the attributes to return.
    pub fn with_attributes<I, S>(mut self, attributes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.attributes = attributes.into_iter().map(Into::into).collect();
        self
    }

    /// Set the server-side size limit.
    #[must_use]
    pub fn with_size_limit(mut self, limit: i32) -> Self {
        self.size_limit = limit;
        self
    }

    /// Set the server-side time limit.
    #[must_use]
    pub fn with_time_limit(mut self, secs: i32) -> Self {
        self.time_limit_secs = secs;
        self
    }
}

impl std::fmt::Display for SearchRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "filter={} scope={}", self.filter, self.scope)?;
        if self.attributes.is_empty() {
            write!(f, " attributes=*")?;
        } else {
            write!(f, " attributes={}", self.attributes.join(","))?;
        }
        if self.size_limit > 0 {
            write!(f, " size_limit={}", self.size_limit)?;
        }
        if self.time_limit_secs > 0 {
            write!(f, " time_limit={}s", self.time_limit_secs)?;
        }
        Ok(())
    }
}
