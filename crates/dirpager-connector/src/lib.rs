//! # Connector Framework
//!
//! Core abstractions shared by dirpager directory connectors.
//!
//! ## Crate Organization
//!
//! - [`error`] - Error types with transient/permanent classification
//! - [`config`] - Configuration trait
//! - [`search`] - Result delivery: handlers, flow control, summaries

pub mod config;
pub mod error;
pub mod search;

/// Prelude module for convenient imports.
///
/// ```
/// use dirpager_connector::prelude::*;
/// ```
pub mod prelude {
    // Error handling
    pub use crate::error::{ConnectorError, ConnectorResult};

    // Configuration
    pub use crate::config::ConnectorConfig;

    // Search
    pub use crate::search::{SearchFlow, SearchOutcome, SearchResultsHandler, SearchSummary};
}

// Re-export async_trait for connector implementors
pub use async_trait::async_trait;
