//! The settlement gateway seam.
//!
//! The API layer depends on `dyn SettlementGateway` so route handlers and
//! the reconciler are testable without a live ledger. Production uses
//! [`crate::rpc::JsonRpcGateway`]; tests use
//! [`crate::mock::MockSettlementGateway`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openlance_core::TxHash;

use crate::error::SettlementError;
use crate::instruction::{SettlementAction, UnsignedInstruction};

/// Observed finality of a broadcast transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxFinality {
    /// Not yet mined, or mined without enough confirmations.
    Pending,
    /// Mined with enough confirmations to be unlikely to reorg.
    Confirmed,
    /// Past the finalization threshold; safe to act on.
    Finalized,
    /// Mined but reverted. Will never finalize.
    Failed,
}

impl TxFinality {
    /// The canonical string name of this finality level.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Finalized => "FINALIZED",
            Self::Failed => "FAILED",
        }
    }
}

impl std::fmt::Display for TxFinality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Access to the settlement ledger.
///
/// Implementations must not hold private keys: `build_instruction` produces
/// an unsigned transaction for the caller's wallet, and `verify_finalized`
/// only reads chain state.
#[async_trait]
pub trait SettlementGateway: Send + Sync {
    /// Build the unsigned transaction for a marketplace mutation.
    fn build_instruction(
        &self,
        action: &SettlementAction,
    ) -> Result<UnsignedInstruction, SettlementError>;

    /// Verify a broadcast transaction, polling until it finalizes, fails, or
    /// the attempt budget runs out. Returns the last observed finality.
    async fn verify_finalized(&self, tx_hash: &TxHash) -> Result<TxFinality, SettlementError>;
}
