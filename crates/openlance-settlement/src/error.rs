//! Errors for settlement-ledger interaction.

use thiserror::Error;

/// Errors produced while building instructions or verifying transactions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SettlementError {
    /// A configured contract address is not a well-formed EVM address.
    #[error("invalid contract address: {0}")]
    InvalidAddress(String),

    /// The ledger RPC endpoint is unreachable or returned garbage.
    #[error("settlement ledger unavailable: {reason}")]
    LedgerUnavailable {
        /// Transport-level failure description.
        reason: String,
    },

    /// The ledger accepted the call but reported an execution error.
    #[error("ledger rejected request: {reason}")]
    Rejected {
        /// RPC error message from the ledger.
        reason: String,
    },

    /// The HTTP client could not be constructed.
    #[error("failed to build settlement HTTP client: {0}")]
    ClientBuild(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_carry_context() {
        let err = SettlementError::LedgerUnavailable {
            reason: "connection refused".to_string(),
        };
        assert!(err.to_string().contains("connection refused"));

        let err = SettlementError::InvalidAddress("0x123".to_string());
        assert!(err.to_string().contains("0x123"));
    }
}
