//! Connector Framework configuration types
//!
//! Base trait implemented by every connector-specific configuration.

use serde::{de::DeserializeOwned, Serialize};

use crate::error::ConnectorResult;

/// Trait for connector-specific configuration.
///
/// Each connector implements this trait to define its configuration
/// schema and validation rules. Configurations arrive deserialized from
/// external sources, so `validate` must be called before they are used.
pub trait ConnectorConfig: Serialize + DeserializeOwned + Clone + Send + Sync {
    /// Validate the configuration.
    ///
    /// Returns an error if the configuration is invalid.
    fn validate(&self) -> ConnectorResult<()>;
}
