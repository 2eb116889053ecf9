//! Search result delivery
//!
//! Types shared by connectors that stream search results to a caller one
//! entry at a time.

use serde::{Deserialize, Serialize};

/// What the consumer wants after receiving an entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchFlow {
    /// Keep delivering entries.
    Continue,
    /// Stop the whole search; no further requests are issued.
    Stop,
}

impl SearchFlow {
    /// Whether the search should keep going.
    pub fn should_continue(self) -> bool {
        matches!(self, SearchFlow::Continue)
    }
}

impl From<bool> for SearchFlow {
    fn from(proceed: bool) -> Self {
        if proceed {
            SearchFlow::Continue
        } else {
            SearchFlow::Stop
        }
    }
}

/// Consumer of search results.
///
/// Receives every entry together with the base DN it was found under.
/// Returning [`SearchFlow::Stop`] cancels the remaining work.
pub trait SearchResultsHandler<E> {
    /// Handle one entry.
    fn handle(&mut self, base_dn: &str, entry: E) -> SearchFlow;
}

impl<E, F> SearchResultsHandler<E> for F
where
    F: FnMut(&str, E) -> SearchFlow,
{
    fn handle(&mut self, base_dn: &str, entry: E) -> SearchFlow {
        self(base_dn, entry)
    }
}

/// How a search ended.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchOutcome {
    /// Every base DN was searched to the end.
    #[default]
    Completed,
    /// The consumer asked to stop.
    Stopped,
}

impl std::fmt::Display for SearchOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchOutcome::Completed => write!(f, "completed"),
            SearchOutcome::Stopped => write!(f, "stopped by consumer"),
        }
    }
}

/// Statistics for one search across all of its base DNs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchSummary {
    /// How the search ended.
    pub outcome: SearchOutcome,

    /// Number of base DNs that were (at least partially) searched.
    pub base_dns_searched: u32,

    /// Number of page requests sent to the server.
    pub pages_requested: u64,

    /// Number of entries handed to the consumer.
    pub entries_delivered: u64,

    /// Number of duplicate boundary entries dropped.
    pub overlaps_removed: u64,
}

impl SearchSummary {
    /// Whether the consumer stopped the search early.
    pub fn was_stopped(&self) -> bool {
        self.outcome == SearchOutcome::Stopped
    }
}
