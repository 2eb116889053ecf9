//! VLV search configuration
//!
//! Settings consumed by the VLV paging strategy.

use serde::{Deserialize, Serialize};

use dirpager_connector::config::ConnectorConfig;
use dirpager_connector::error::{ConnectorError, ConnectorResult};

/// Sort attribute used when none is configured.
pub const DEFAULT_SORT_ATTRIBUTE: &str = "uid";

/// Configuration for VLV-indexed paged searches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VlvSearchConfig {
    /// Attribute the server-side VLV index is sorted on.
    ///
    /// A blank value selects [`DEFAULT_SORT_ATTRIBUTE`].
    #[serde(default = "default_sort_attribute")]
    pub sort_attribute: String,

    /// Number of entries requested per page.
    #[serde(default = "default_block_size")]
    pub block_size: u32,
}

fn default_sort_attribute() -> String {
    DEFAULT_SORT_ATTRIBUTE.to_string()
}

fn default_block_size() -> u32 {
    100
}

impl Default for VlvSearchConfig {
    fn default() -> Self {
        Self {
            sort_attribute: default_sort_attribute(),
            block_size: default_block_size(),
        }
    }
}

impl VlvSearchConfig {
    /// Create a config with the given sort attribute and block size.
    pub fn new(sort_attribute: impl Into<String>, block_size: u32) -> Self {
        Self {
            sort_attribute: sort_attribute.into(),
            block_size,
        }
    }

    /// Set the sort attribute.
    pub fn with_sort_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.sort_attribute = attribute.into();
        self
    }

    /// Set the block size.
    #[must_use]
    pub fn with_block_size(mut self, block_size: u32) -> Self {
        self.block_size = block_size;
        self
    }

    /// The attribute actually sent in the sort request.
    #[must_use]
    pub fn effective_sort_attribute(&self) -> &str {
        let attribute = self.sort_attribute.trim();
        if attribute.is_empty() {
            DEFAULT_SORT_ATTRIBUTE
        } else {
            attribute
        }
    }

    /// Number of entries requested after the target entry of each page.
    #[must_use]
    pub fn after_count(&self) -> u32 {
        self.block_size.saturating_sub(1)
    }
}

impl ConnectorConfig for VlvSearchConfig {
    fn validate(&self) -> ConnectorResult<()> {
        if self.block_size == 0 {
            return Err(ConnectorError::InvalidConfiguration {
                message: "block_size must be at least 1".to_string(),
            });
        }

        // VLV counts are BER INTEGER (0..maxInt).
        if self.block_size > i32::MAX as u32 {
            return Err(ConnectorError::InvalidConfiguration {
                message: format!("block_size must not exceed {}", i32::MAX),
            });
        }

        if self
            .effective_sort_attribute()
            .contains(|c: char| c.is_whitespace())
        {
            return Err(ConnectorError::InvalidConfiguration {
                message: format!(
                    "sort_attribute '{}' is not a valid attribute description",
                    self.sort_attribute
                ),
            });
        }

        Ok(())
    }
}
