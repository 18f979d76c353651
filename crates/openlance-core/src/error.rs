//! Validation errors for core domain types.

use thiserror::Error;

/// Errors produced while validating core domain values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// A monetary amount string is empty or not a valid decimal.
    #[error("invalid monetary amount: {0:?}")]
    InvalidAmount(String),

    /// A currency code is empty or malformed.
    #[error("invalid currency code: {0:?}")]
    InvalidCurrency(String),

    /// A transaction hash is not a 0x-prefixed 32-byte hex string.
    #[error("invalid transaction hash: {0:?}")]
    InvalidTxHash(String),

    /// A required field was empty.
    #[error("field {field} must not be empty")]
    EmptyField {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A field failed a length constraint.
    #[error("field {field} must be at least {min} characters, got {actual}")]
    TooShort {
        /// Name of the offending field.
        field: &'static str,
        /// Minimum accepted length.
        min: usize,
        /// Length actually supplied.
        actual: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = ValidationError::TooShort {
            field: "reason",
            min: 10,
            actual: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains("reason"));
        assert!(msg.contains("10"));
        assert!(msg.contains('3'));
    }

    #[test]
    fn invalid_amount_display() {
        let err = ValidationError::InvalidAmount("12.3.4".to_string());
        assert!(err.to_string().contains("12.3.4"));
    }
}
