// SPDX-License-Identifier: BUSL-1.1
//! # On-Chain Update Webhook
//!
//! Unauthenticated ingestion path for dispute status updates pushed by the
//! ledger-side oracle. The payload shape and field casing are fixed by the
//! oracle, not by this API.
//!
//! When an oracle verifying key is configured, each delivery must carry an
//! ed25519 signature over `"{onChainDisputeId}:{status}:{winningParty}"`;
//! an absent or invalid signature is rejected with 401. Without a
//! configured key the endpoint accepts unsigned deliveries and logs a
//! warning at startup — acceptable in development, never in production.

use axum::extract::State;
use axum::Json;
use ed25519_dalek::{Signature, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openlance_dispute::{Dispute, DisputeOutcome};

use crate::error::AppError;
use crate::service::DisputeLifecycleService;
use crate::state::{hex_decode, AppState};

/// Webhook delivery body, as the oracle sends it.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct OnChainUpdate {
    /// Ledger-assigned dispute reference.
    #[serde(rename = "onChainDisputeId")]
    pub on_chain_dispute_id: u64,
    /// Reported dispute status (e.g., "RESOLVED", "VOTING").
    pub status: String,
    /// "CLIENT" or "WORKER" when the update carries a resolution.
    #[serde(rename = "winningParty")]
    pub winning_party: Option<String>,
    /// Hex-encoded ed25519 signature over the canonical message.
    pub signature: Option<String>,
}

impl OnChainUpdate {
    /// The canonical byte string the oracle signs.
    fn signed_message(&self) -> String {
        format!(
            "{}:{}:{}",
            self.on_chain_dispute_id,
            self.status,
            self.winning_party.as_deref().unwrap_or("")
        )
    }
}

/// Webhook acknowledgment with the dispute's post-update state.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WebhookAck {
    /// The dispute after the update was applied (or retained).
    pub dispute: Dispute,
}

/// Receive a dispute status update from the ledger oracle.
#[utoipa::path(
    post,
    path = "/v1/disputes/webhook/on-chain-update",
    request_body = OnChainUpdate,
    responses(
        (status = 200, description = "Update applied (or retained)", body = WebhookAck),
        (status = 401, description = "Signature missing or invalid"),
        (status = 404, description = "No dispute with that ledger reference"),
    ),
    tag = "webhook",
)]
pub async fn on_chain_update(
    State(state): State<AppState>,
    Json(update): Json<OnChainUpdate>,
) -> Result<Json<WebhookAck>, AppError> {
    if let Some(key) = &state.config.webhook_oracle_key {
        verify_signature(key, &update)?;
    } else {
        tracing::warn!(
            on_chain_dispute_id = update.on_chain_dispute_id,
            "accepting unsigned webhook delivery; no oracle key configured"
        );
    }

    let winning_party = match update.winning_party.as_deref() {
        Some("CLIENT") => Some(DisputeOutcome::FavorClient),
        Some("WORKER") => Some(DisputeOutcome::FavorWorker),
        Some(other) => {
            tracing::warn!(
                on_chain_dispute_id = update.on_chain_dispute_id,
                winning_party = other,
                "unrecognized winning party; deciding from the local tally"
            );
            None
        }
        None => None,
    };

    let service = DisputeLifecycleService::new(state.store.clone(), state.config.min_votes);
    let dispute =
        service.apply_ledger_update(update.on_chain_dispute_id, &update.status, winning_party)?;
    Ok(Json(WebhookAck { dispute }))
}

fn verify_signature(key: &VerifyingKey, update: &OnChainUpdate) -> Result<(), AppError> {
    let sig_hex = update
        .signature
        .as_deref()
        .ok_or_else(|| AppError::Unauthorized("webhook delivery is unsigned".to_string()))?;
    let sig_bytes = hex_decode(sig_hex.trim_start_matches("0x"))
        .filter(|b| b.len() == 64)
        .ok_or_else(|| AppError::Unauthorized("malformed webhook signature".to_string()))?;
    let mut raw = [0u8; 64];
    raw.copy_from_slice(&sig_bytes);
    let signature = Signature::from_bytes(&raw);
    key.verify(update.signed_message().as_bytes(), &signature)
        .map_err(|_| AppError::Unauthorized("webhook signature verification failed".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use ed25519_dalek::{Signer, SigningKey};

    fn keypair() -> (SigningKey, VerifyingKey) {
        let signing = SigningKey::from_bytes(&[7u8; 32]);
        let verifying = signing.verifying_key();
        (signing, verifying)
    }

    fn signed_update(signing: &SigningKey, mut update: OnChainUpdate) -> OnChainUpdate {
        let sig = signing.sign(update.signed_message().as_bytes());
        update.signature = Some(hex_encode(&sig.to_bytes()));
        update
    }

    fn hex_encode(bytes: &[u8]) -> String {
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    fn sample_update() -> OnChainUpdate {
        OnChainUpdate {
            on_chain_dispute_id: 42,
            status: "RESOLVED".to_string(),
            winning_party: Some("WORKER".to_string()),
            signature: None,
        }
    }

    #[test]
    fn canonical_message_shape() {
        let update = sample_update();
        assert_eq!(update.signed_message(), "42:RESOLVED:WORKER");

        let update = OnChainUpdate {
            winning_party: None,
            ..sample_update()
        };
        assert_eq!(update.signed_message(), "42:RESOLVED:");
    }

    #[test]
    fn valid_signature_verifies() {
        let (signing, verifying) = keypair();
        let update = signed_update(&signing, sample_update());
        assert!(verify_signature(&verifying, &update).is_ok());
    }

    #[test]
    fn missing_signature_is_unauthorized() {
        let (_, verifying) = keypair();
        let err = verify_signature(&verifying, &sample_update()).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn tampered_payload_is_unauthorized() {
        let (signing, verifying) = keypair();
        let mut update = signed_update(&signing, sample_update());
        update.winning_party = Some("CLIENT".to_string());
        let err = verify_signature(&verifying, &update).unwrap_err();
        assert!(matches!(err, AppError::Unauthorized(_)));
    }

    #[test]
    fn malformed_signature_is_unauthorized() {
        let (_, verifying) = keypair();
        let mut update = sample_update();
        update.signature = Some("zz".to_string());
        assert!(matches!(
            verify_signature(&verifying, &update).unwrap_err(),
            AppError::Unauthorized(_)
        ));
        update.signature = Some("abcd".to_string());
        assert!(matches!(
            verify_signature(&verifying, &update).unwrap_err(),
            AppError::Unauthorized(_)
        ));
    }

    #[test]
    fn signature_accepts_0x_prefix() {
        let (signing, verifying) = keypair();
        let mut update = signed_update(&signing, sample_update());
        update.signature = Some(format!("0x{}", update.signature.unwrap()));
        assert!(verify_signature(&verifying, &update).is_ok());
    }

    #[test]
    fn webhook_body_uses_oracle_field_names() {
        let json = serde_json::json!({
            "onChainDisputeId": 7,
            "status": "VOTING",
            "winningParty": null,
            "signature": null,
        });
        let update: OnChainUpdate = serde_json::from_value(json).unwrap();
        assert_eq!(update.on_chain_dispute_id, 7);
        assert_eq!(update.status, "VOTING");
    }
}
