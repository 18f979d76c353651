//! # JSON-RPC Settlement Gateway
//!
//! Production gateway that reads transaction state from an EVM-compatible
//! ledger via JSON-RPC.
//!
//! ## Finality Verification
//!
//! `verify_finalized` polls `eth_getTransactionReceipt` and compares the
//! receipt's block against `eth_blockNumber`. Polling uses a fixed attempt
//! budget with a fixed inter-attempt delay — no exponential backoff — so the
//! worst-case latency of a confirm-tx request is bounded and predictable
//! (`poll_attempts × poll_delay_ms` plus RPC round trips). A reverted
//! transaction short-circuits immediately; exhausting the budget returns the
//! last observed finality for the caller to judge.
//!
//! ## Security
//!
//! The gateway holds no private keys and never calls `eth_sendTransaction`;
//! broadcasting is the wallet's job. All RPC calls should use HTTPS.

use std::time::Duration;

use async_trait::async_trait;

use openlance_core::TxHash;

use crate::error::SettlementError;
use crate::gateway::{SettlementGateway, TxFinality};
use crate::instruction::{is_valid_eth_address, SettlementAction, UnsignedInstruction};

/// Configuration for the JSON-RPC settlement gateway.
#[derive(Debug, Clone)]
pub struct SettlementConfig {
    /// JSON-RPC endpoint URL (must be HTTPS in production).
    pub rpc_url: String,
    /// Escrow contract address (0x-prefixed, 40 hex chars).
    pub contract_address: String,
    /// EVM chain ID (e.g., 8453 for Base).
    pub chain_id: u64,
    /// Block confirmations required before reporting `Confirmed`.
    pub confirmations_for_confirmed: u64,
    /// Block confirmations required before reporting `Finalized`.
    pub confirmations_for_finalized: u64,
    /// Request timeout in seconds (default: 30).
    pub timeout_secs: u64,
    /// Maximum receipt polls per verification (default: 10).
    pub poll_attempts: u32,
    /// Fixed delay between polls in milliseconds (default: 3000).
    pub poll_delay_ms: u64,
}

impl SettlementConfig {
    /// Create a configuration with default finality and polling settings.
    ///
    /// Defaults: 1 confirmation for Confirmed, 12 for Finalized, 30s
    /// timeout, 10 polls at 3s intervals.
    pub fn new(
        rpc_url: impl Into<String>,
        contract_address: impl Into<String>,
        chain_id: u64,
    ) -> Self {
        Self {
            rpc_url: rpc_url.into(),
            contract_address: contract_address.into(),
            chain_id,
            confirmations_for_confirmed: 1,
            confirmations_for_finalized: 12,
            timeout_secs: 30,
            poll_attempts: 10,
            poll_delay_ms: 3000,
        }
    }

    /// Set the finality thresholds.
    pub fn with_finality(mut self, confirmed: u64, finalized: u64) -> Self {
        self.confirmations_for_confirmed = confirmed;
        self.confirmations_for_finalized = finalized;
        self
    }

    /// Set the polling budget.
    pub fn with_polling(mut self, attempts: u32, delay_ms: u64) -> Self {
        self.poll_attempts = attempts;
        self.poll_delay_ms = delay_ms;
        self
    }
}

/// JSON-RPC gateway to the production settlement ledger.
#[derive(Debug)]
pub struct JsonRpcGateway {
    client: reqwest::Client,
    config: SettlementConfig,
}

impl JsonRpcGateway {
    /// Create a gateway from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SettlementError::InvalidAddress`] for a malformed contract
    /// address and [`SettlementError::ClientBuild`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: SettlementConfig) -> Result<Self, SettlementError> {
        if !is_valid_eth_address(&config.contract_address) {
            return Err(SettlementError::InvalidAddress(
                config.contract_address.clone(),
            ));
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SettlementError::ClientBuild(e.to_string()))?;
        Ok(Self { client, config })
    }

    /// Send a JSON-RPC request and return the result field.
    async fn rpc_call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, SettlementError> {
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params,
            "id": 1
        });

        let resp = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SettlementError::LedgerUnavailable {
                        reason: "request timed out".to_string(),
                    }
                } else {
                    SettlementError::LedgerUnavailable {
                        reason: e.to_string(),
                    }
                }
            })?;

        if !resp.status().is_success() {
            return Err(SettlementError::LedgerUnavailable {
                reason: format!("HTTP {}", resp.status()),
            });
        }

        let json: serde_json::Value =
            resp.json()
                .await
                .map_err(|e| SettlementError::LedgerUnavailable {
                    reason: format!("invalid JSON response: {e}"),
                })?;

        // Check for JSON-RPC error.
        if let Some(error) = json.get("error") {
            let msg = error
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unknown RPC error");
            return Err(SettlementError::Rejected {
                reason: msg.to_string(),
            });
        }

        json.get("result")
            .cloned()
            .ok_or_else(|| SettlementError::LedgerUnavailable {
                reason: "JSON-RPC response missing 'result' field".to_string(),
            })
    }

    /// One receipt poll: current finality of the transaction.
    async fn poll_finality(&self, tx_hash: &TxHash) -> Result<TxFinality, SettlementError> {
        let receipt = self
            .rpc_call(
                "eth_getTransactionReceipt",
                serde_json::json!([tx_hash.as_str()]),
            )
            .await?;

        // Null receipt means the transaction is still pending.
        if receipt.is_null() {
            return Ok(TxFinality::Pending);
        }

        // Status 0x0 means the transaction reverted.
        let status_hex = receipt
            .get("status")
            .and_then(|s| s.as_str())
            .unwrap_or("0x0");
        if status_hex == "0x0" {
            return Ok(TxFinality::Failed);
        }

        let tx_block = receipt
            .get("blockNumber")
            .and_then(|b| b.as_str())
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);

        let current_block_val = self.rpc_call("eth_blockNumber", serde_json::json!([])).await?;
        let current_block = current_block_val
            .as_str()
            .and_then(|s| u64::from_str_radix(s.trim_start_matches("0x"), 16).ok())
            .unwrap_or(0);

        let confirmations = current_block.saturating_sub(tx_block);

        if confirmations >= self.config.confirmations_for_finalized {
            Ok(TxFinality::Finalized)
        } else if confirmations >= self.config.confirmations_for_confirmed {
            Ok(TxFinality::Confirmed)
        } else {
            Ok(TxFinality::Pending)
        }
    }
}

#[async_trait]
impl SettlementGateway for JsonRpcGateway {
    fn build_instruction(
        &self,
        action: &SettlementAction,
    ) -> Result<UnsignedInstruction, SettlementError> {
        UnsignedInstruction::build(action, &self.config.contract_address, self.config.chain_id)
    }

    async fn verify_finalized(&self, tx_hash: &TxHash) -> Result<TxFinality, SettlementError> {
        let mut last = TxFinality::Pending;
        for attempt in 1..=self.config.poll_attempts {
            last = self.poll_finality(tx_hash).await?;
            match last {
                TxFinality::Finalized | TxFinality::Failed => return Ok(last),
                TxFinality::Pending | TxFinality::Confirmed => {
                    tracing::debug!(
                        tx_hash = %tx_hash,
                        attempt,
                        max_attempts = self.config.poll_attempts,
                        finality = %last,
                        "transaction not yet finalized"
                    );
                    if attempt < self.config.poll_attempts {
                        tokio::time::sleep(Duration::from_millis(self.config.poll_delay_ms)).await;
                    }
                }
            }
        }
        tracing::warn!(
            tx_hash = %tx_hash,
            finality = %last,
            "finality poll budget exhausted"
        );
        Ok(last)
    }
}
