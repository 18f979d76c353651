//! # openlance-api — Binary Entry Point
//!
//! Starts the Axum HTTP server for the Openlance marketplace core.
//! Binds to a configurable port (default 8080).

use std::sync::Arc;

use ed25519_dalek::VerifyingKey;

use openlance_api::notify::TracingNotifier;
use openlance_api::state::{hex_decode, AppConfig, AppState, DisputeStore, DEFAULT_MIN_VOTES};
use openlance_settlement::{
    JsonRpcGateway, MockSettlementGateway, SettlementConfig, SettlementGateway,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured tracing.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    let auth_token = std::env::var("AUTH_TOKEN").ok();
    if auth_token.is_none() {
        tracing::warn!("AUTH_TOKEN not set; mutations are unauthenticated (development mode)");
    }

    let min_votes = std::env::var("MIN_VOTES")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(DEFAULT_MIN_VOTES);

    let webhook_oracle_key = match std::env::var("WEBHOOK_ORACLE_KEY_HEX") {
        Ok(hex) => Some(parse_oracle_key(&hex)?),
        Err(_) => {
            tracing::warn!(
                "WEBHOOK_ORACLE_KEY_HEX not set; webhook deliveries are accepted unsigned"
            );
            None
        }
    };

    let gateway = build_gateway()?;

    let state = AppState::new(
        DisputeStore::new(),
        gateway,
        Arc::new(TracingNotifier),
        AppConfig {
            auth_token,
            min_votes,
            webhook_oracle_key,
        },
    );

    let app = openlance_api::app(state);

    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Openlance API listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Build the settlement gateway from the environment.
///
/// `SETTLEMENT_RPC_URL` plus `ESCROW_CONTRACT_ADDRESS` select the JSON-RPC
/// gateway; without them the process falls back to the in-memory mock,
/// which reports every transaction as finalized.
fn build_gateway() -> Result<Arc<dyn SettlementGateway>, Box<dyn std::error::Error>> {
    let rpc_url = std::env::var("SETTLEMENT_RPC_URL").ok();
    let contract = std::env::var("ESCROW_CONTRACT_ADDRESS").ok();

    let (Some(rpc_url), Some(contract)) = (rpc_url, contract) else {
        tracing::warn!(
            "SETTLEMENT_RPC_URL / ESCROW_CONTRACT_ADDRESS not set; using the mock gateway — \
             all transactions verify as finalized"
        );
        return Ok(Arc::new(MockSettlementGateway::new()));
    };

    let chain_id = std::env::var("SETTLEMENT_CHAIN_ID")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);
    let mut config = SettlementConfig::new(rpc_url, contract, chain_id);
    if let Some(confirmations) = env_u64("FINALITY_CONFIRMATIONS") {
        config = config.with_finality(1, confirmations);
    }
    let attempts: Option<u32> = std::env::var("FINALITY_POLL_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse().ok());
    let delay_ms = env_u64("FINALITY_POLL_DELAY_MS");
    if attempts.is_some() || delay_ms.is_some() {
        let poll_attempts = attempts.unwrap_or(config.poll_attempts);
        let poll_delay_ms = delay_ms.unwrap_or(config.poll_delay_ms);
        config = config.with_polling(poll_attempts, poll_delay_ms);
    }

    tracing::info!(chain_id, "JSON-RPC settlement gateway configured");
    Ok(Arc::new(JsonRpcGateway::new(config)?))
}

fn env_u64(name: &str) -> Option<u64> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}

fn parse_oracle_key(hex: &str) -> Result<VerifyingKey, Box<dyn std::error::Error>> {
    let bytes = hex_decode(hex.trim().trim_start_matches("0x"))
        .filter(|b| b.len() == 32)
        .ok_or("WEBHOOK_ORACLE_KEY_HEX must be 32 bytes of hex")?;
    let mut raw = [0u8; 32];
    raw.copy_from_slice(&bytes);
    Ok(VerifyingKey::from_bytes(&raw)?)
}
