//! Scriptable in-memory settlement gateway.
//!
//! Used by tests and by development deployments that run without a ledger
//! RPC endpoint. Unscripted transactions report `Finalized` so happy-path
//! flows work out of the box; tests script specific hashes to exercise
//! failure and timeout handling.

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;

use openlance_core::TxHash;

use crate::error::SettlementError;
use crate::gateway::{SettlementGateway, TxFinality};
use crate::instruction::{SettlementAction, UnsignedInstruction};

/// Contract address reported by the mock gateway.
pub const MOCK_CONTRACT_ADDRESS: &str = "0x00000000000000000000000000000000000000e5";

/// In-memory [`SettlementGateway`] with per-hash scripted finality.
pub struct MockSettlementGateway {
    chain_id: u64,
    scripted: Mutex<HashMap<String, TxFinality>>,
    verify_calls: Mutex<Vec<String>>,
}

impl MockSettlementGateway {
    /// Create a mock gateway on a fictional chain.
    pub fn new() -> Self {
        Self {
            chain_id: 31337,
            scripted: Mutex::new(HashMap::new()),
            verify_calls: Mutex::new(Vec::new()),
        }
    }

    /// Script the finality reported for a specific transaction hash.
    pub fn script(&self, tx_hash: &TxHash, finality: TxFinality) {
        self.scripted
            .lock()
            .insert(tx_hash.as_str().to_string(), finality);
    }

    /// Hashes that have been verified, in call order.
    pub fn verified_hashes(&self) -> Vec<String> {
        self.verify_calls.lock().clone()
    }
}

impl Default for MockSettlementGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SettlementGateway for MockSettlementGateway {
    fn build_instruction(
        &self,
        action: &SettlementAction,
    ) -> Result<UnsignedInstruction, SettlementError> {
        UnsignedInstruction::build(action, MOCK_CONTRACT_ADDRESS, self.chain_id)
    }

    async fn verify_finalized(&self, tx_hash: &TxHash) -> Result<TxFinality, SettlementError> {
        self.verify_calls.lock().push(tx_hash.as_str().to_string());
        let finality = self
            .scripted
            .lock()
            .get(tx_hash.as_str())
            .copied()
            .unwrap_or(TxFinality::Finalized);
        Ok(finality)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(byte: &str) -> TxHash {
        TxHash::parse(format!("0x{}", byte.repeat(32))).unwrap()
    }

    #[tokio::test]
    async fn unscripted_hashes_finalize() {
        let gw = MockSettlementGateway::new();
        let finality = gw.verify_finalized(&hash("ab")).await.unwrap();
        assert_eq!(finality, TxFinality::Finalized);
    }

    #[tokio::test]
    async fn scripted_finality_is_reported() {
        let gw = MockSettlementGateway::new();
        let failed = hash("01");
        let pending = hash("02");
        gw.script(&failed, TxFinality::Failed);
        gw.script(&pending, TxFinality::Pending);

        assert_eq!(
            gw.verify_finalized(&failed).await.unwrap(),
            TxFinality::Failed
        );
        assert_eq!(
            gw.verify_finalized(&pending).await.unwrap(),
            TxFinality::Pending
        );
        assert_eq!(gw.verified_hashes().len(), 2);
    }

    #[test]
    fn instructions_target_mock_contract() {
        let gw = MockSettlementGateway::new();
        let instr = gw
            .build_instruction(&SettlementAction::FundEscrow {
                job_id: openlance_core::JobId::new(),
            })
            .unwrap();
        assert_eq!(instr.to, MOCK_CONTRACT_ADDRESS);
        assert_eq!(instr.chain_id, 31337);
    }
}
