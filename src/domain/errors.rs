use crate::domain::value_objects::Gateway;
use thiserror::Error;

/// Domain-level error type
#[derive(Error, Debug)]
pub enum DomainError {
    /// Request validation failed
    #[error("Validation error: {0}")]
    ValidationError(String),

    /// Order not found
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Order is not in the state the operation requires
    #[error("Invalid payment state: expected {expected}, got {actual}")]
    InvalidState { expected: String, actual: String },

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Webhook or client signature did not match
    #[error("Signature verification failed for {gateway}")]
    SignatureVerificationFailed { gateway: Gateway },

    /// Missing or incomplete gateway credentials
    #[error("Configuration error: {0}")]
    ConfigurationError(String),

    /// Gateway API answered with an error
    #[error("{gateway} API error: {message}")]
    ProviderError { gateway: Gateway, message: String },

    /// Gateway does not offer the requested operation
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// Webhook body could not be understood
    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    /// Database error
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// HTTP request error
    #[error("HTTP request error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Errors whose message is meant for the operator or caller and may be returned verbatim
    pub fn is_client_facing(&self) -> bool {
        matches!(
            self,
            DomainError::ValidationError(_)
                | DomainError::InvalidAmount(_)
                | DomainError::SignatureVerificationFailed { .. }
                | DomainError::ConfigurationError(_)
                | DomainError::UnsupportedOperation(_)
        )
    }

    pub fn provider(gateway: Gateway, message: impl Into<String>) -> Self {
        DomainError::ProviderError {
            gateway,
            message: message.into(),
        }
    }
}

/// Domain result type
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_error_names_gateway_only() {
        let err = DomainError::SignatureVerificationFailed {
            gateway: Gateway::Razorpay,
        };
        assert_eq!(err.to_string(), "Signature verification failed for razorpay");
        assert!(err.is_client_facing());
    }

    #[test]
    fn test_store_errors_are_not_client_facing() {
        assert!(!DomainError::MalformedPayload("bad json".to_string()).is_client_facing());
        assert!(!DomainError::InternalError("lock poisoned".to_string()).is_client_facing());
    }
}
