//! Connector Framework error types
//!
//! Error definitions with transient/permanent classification for retry logic.

use thiserror::Error;

/// Error that can occur during connector operations.
#[derive(Debug, Error)]
pub enum ConnectorError {
    // Transport errors (usually transient)
    /// Network error during communication.
    #[error("network error: {message}")]
    NetworkError {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Target system is temporarily unavailable.
    #[error("target system unavailable: {message}")]
    TargetUnavailable { message: String },

    // Configuration errors (permanent)
    /// Connector configuration is invalid.
    #[error("invalid configuration: {message}")]
    InvalidConfiguration { message: String },

    // Protocol errors (permanent)
    /// The server did not honour a request control, or answered with a
    /// response control that reports failure.
    #[error("protocol violation in {control} control: {message}")]
    ProtocolViolation { control: String, message: String },

    // Operation errors
    /// Operation failed.
    #[error("operation failed: {message}")]
    OperationFailed {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    // Internal errors
    /// Internal error.
    #[error("internal error: {message}")]
    Internal {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl ConnectorError {
    /// Check if this error is transient and the operation should be retried.
    ///
    /// Nothing inside the connector retries; the classification is for the
    /// caller deciding whether to run the whole search again.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            ConnectorError::NetworkError { .. } | ConnectorError::TargetUnavailable { .. }
        )
    }

    /// Check if this error is permanent and retry won't help.
    pub fn is_permanent(&self) -> bool {
        !self.is_transient()
    }

    /// Get an error code for classification.
    pub fn error_code(&self) -> &'static str {
        match self {
            ConnectorError::NetworkError { .. } => "NETWORK_ERROR",
            ConnectorError::TargetUnavailable { .. } => "TARGET_UNAVAILABLE",
            ConnectorError::InvalidConfiguration { .. } => "INVALID_CONFIG",
            ConnectorError::ProtocolViolation { .. } => "PROTOCOL_VIOLATION",
            ConnectorError::OperationFailed { .. } => "OPERATION_FAILED",
            ConnectorError::Internal { .. } => "INTERNAL_ERROR",
        }
    }

    // Convenience constructors

    /// Create an invalid configuration error.
    pub fn invalid_configuration(message: impl Into<String>) -> Self {
        ConnectorError::InvalidConfiguration {
            message: message.into(),
        }
    }

    /// Create a protocol violation error for the named control.
    pub fn protocol_violation(control: impl Into<String>, message: impl Into<String>) -> Self {
        ConnectorError::ProtocolViolation {
            control: control.into(),
            message: message.into(),
        }
    }

    /// Create an operation failed error.
    pub fn operation_failed(message: impl Into<String>) -> Self {
        ConnectorError::OperationFailed {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: None,
        }
    }

    /// Create an internal error with source.
    pub fn internal_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::Internal {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a network error.
    pub fn network(message: impl Into<String>) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: None,
        }
    }

    /// Create a network error with source.
    pub fn network_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        ConnectorError::NetworkError {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}

/// Result type for connector operations.
pub type ConnectorResult<T> = Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_errors() {
        let transient_errors = vec![
            ConnectorError::network("connection reset"),
            ConnectorError::TargetUnavailable {
                message: "busy".to_string(),
            },
        ];

        for err in transient_errors {
            assert!(
                err.is_transient(),
                "Expected {} to be transient",
                err.error_code()
            );
            assert!(!err.is_permanent());
        }
    }

    #[test]
    fn test_permanent_errors() {
        let permanent_errors = vec![
            ConnectorError::invalid_configuration("block_size must be positive"),
            ConnectorError::protocol_violation("sort", "result code 53"),
            ConnectorError::operation_failed("search failed"),
            ConnectorError::internal("encode failed"),
        ];

        for err in permanent_errors {
            assert!(
                err.is_permanent(),
                "Expected {} to be permanent",
                err.error_code()
            );
            assert!(!err.is_transient());
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            ConnectorError::protocol_violation("sort", "x").error_code(),
            "PROTOCOL_VIOLATION"
        );
        assert_eq!(
            ConnectorError::network("x").error_code(),
            "NETWORK_ERROR"
        );
        assert_eq!(
            ConnectorError::operation_failed("x").error_code(),
            "OPERATION_FAILED"
        );
    }

    #[test]
    fn test_error_display() {
        let err = ConnectorError::protocol_violation("virtual list view", "result code 76");
        assert_eq!(
            err.to_string(),
            "protocol violation in virtual list view control: result code 76"
        );

        let err = ConnectorError::invalid_configuration("no base DNs given");
        assert_eq!(err.to_string(), "invalid configuration: no base DNs given");
    }

    #[test]
    fn test_error_with_source() {
        let source_err = std::io::Error::new(std::io::ErrorKind::Other, "underlying error");
        let err = ConnectorError::network_with_source("page fetch failed", source_err);

        assert!(err.is_transient());
        if let ConnectorError::NetworkError { source, .. } = &err {
            assert!(source.is_some());
        } else {
            panic!("Expected NetworkError variant");
        }
    }
}
