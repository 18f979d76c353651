// SPDX-License-Identifier: BUSL-1.1
//! # Escrow Routes
//!
//! The ledger-funded side of a job: create the escrow account, fund it, and
//! release milestones one by one. Every mutation here is two-phase — the
//! server only builds unsigned instructions and later verifies the
//! broadcast transaction before mirroring the change locally.

use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openlance_core::{JobId, MilestoneId, TxHash, UserId};
use openlance_settlement::{SettlementAction, UnsignedInstruction};

use crate::auth::CallerIdentity;
use crate::error::AppError;
use crate::notify::NotifyEvent;
use crate::reconcile::{ConfirmAction, ConfirmOutcome, TransactionReconciler};
use crate::routes::disputes::ConfirmTxResponse;
use crate::routes::{resolve_actor, service};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

/// Request to build an escrow-create or escrow-fund instruction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EscrowJobRequest {
    /// The job the escrow belongs to.
    pub job_id: JobId,
    /// The acting client, for unbound admin tokens.
    pub client_id: Option<UserId>,
}

/// Request to build a milestone-release instruction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitApproveRequest {
    /// The job whose escrow is drawn down.
    pub job_id: JobId,
    /// The milestone to approve and release.
    pub milestone_id: MilestoneId,
    /// The acting client, for unbound admin tokens.
    pub client_id: Option<UserId>,
}

/// Reconciliation request for escrow transactions.
#[derive(Debug, Deserialize, ToSchema)]
pub struct EscrowConfirmTxRequest {
    /// The broadcast transaction hash (0x + 64 hex).
    pub hash: String,
    /// The encoded action and its original intent parameters.
    #[serde(flatten)]
    pub action: ConfirmAction,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

/// Authenticated escrow endpoints. No public reads; escrow state is served
/// as part of the job record.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/escrow/init-create", post(init_create))
        .route("/v1/escrow/init-fund", post(init_fund))
        .route("/v1/escrow/init-approve", post(init_approve))
        .route("/v1/escrow/confirm-tx", post(confirm_tx))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Build an unsigned create-escrow instruction.
#[utoipa::path(
    post,
    path = "/v1/escrow/init-create",
    request_body = EscrowJobRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 403, description = "Caller is not the client"),
        (status = 404, description = "No such job"),
        (status = 409, description = "No worker assigned, or escrow already exists"),
    ),
    security(("bearer" = [])),
    tag = "escrow",
)]
pub async fn init_create(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<EscrowJobRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let caller = caller_for_escrow(&identity, req.client_id)?;
    let (client, worker) = service(&state).precheck_escrow_create(&req.job_id, caller)?;
    let action = SettlementAction::CreateEscrow {
        job_id: req.job_id,
        client,
        worker,
    };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Build an unsigned fund-escrow instruction.
#[utoipa::path(
    post,
    path = "/v1/escrow/init-fund",
    request_body = EscrowJobRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 403, description = "Caller is not the client"),
        (status = 404, description = "No such job"),
        (status = 409, description = "Escrow is not in CREATED state"),
    ),
    security(("bearer" = [])),
    tag = "escrow",
)]
pub async fn init_fund(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<EscrowJobRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let caller = caller_for_escrow(&identity, req.client_id)?;
    service(&state).precheck_escrow_fund(&req.job_id, caller)?;
    let action = SettlementAction::FundEscrow { job_id: req.job_id };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Build an unsigned release-milestone instruction.
#[utoipa::path(
    post,
    path = "/v1/escrow/init-approve",
    request_body = InitApproveRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 403, description = "Caller is not the client"),
        (status = 404, description = "No such job or milestone"),
        (status = 409, description = "Funds not releasable, or milestone already approved"),
    ),
    security(("bearer" = [])),
    tag = "escrow",
)]
pub async fn init_approve(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<InitApproveRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let caller = caller_for_escrow(&identity, req.client_id)?;
    let milestone_index =
        service(&state).precheck_milestone_release(&req.job_id, &req.milestone_id, caller)?;
    let action = SettlementAction::ReleaseMilestone {
        job_id: req.job_id,
        milestone_index,
    };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Confirm a broadcast escrow transaction and mirror the change locally.
#[utoipa::path(
    post,
    path = "/v1/escrow/confirm-tx",
    request_body = EscrowConfirmTxRequest,
    responses(
        (status = 200, description = "Mutation committed", body = ConfirmTxResponse),
        (status = 422, description = "Malformed hash or dispute action on escrow endpoint"),
        (status = 502, description = "Transaction not finalized"),
    ),
    security(("bearer" = [])),
    tag = "escrow",
)]
pub async fn confirm_tx(
    State(state): State<AppState>,
    Json(req): Json<EscrowConfirmTxRequest>,
) -> Result<Json<ConfirmTxResponse>, AppError> {
    let action_name = match &req.action {
        ConfirmAction::CreateEscrow { .. } => "CREATE_ESCROW",
        ConfirmAction::FundEscrow { .. } => "FUND_ESCROW",
        ConfirmAction::ReleaseMilestone { .. } => "RELEASE_MILESTONE",
        _ => {
            return Err(AppError::Validation(
                "dispute actions are confirmed via /v1/disputes/confirm-tx".to_string(),
            ))
        }
    };
    let hash =
        TxHash::parse(&req.hash).map_err(|e| AppError::Validation(e.to_string()))?;
    let reconciler = TransactionReconciler::new(state.gateway.clone(), service(&state));
    let outcome = reconciler.confirm(&hash, req.action).await?;

    if let ConfirmOutcome::MilestoneReleased {
        job,
        job_completed: true,
    } = &outcome
    {
        state
            .notifier
            .notify(NotifyEvent::JobCompleted { job_id: job.id })
            .await;
    }
    Ok(Json(ConfirmTxResponse::from_outcome(action_name, outcome)))
}

/// Escrow mutations act as the job's client; bound tokens are checked
/// against it, unbound admin tokens may act without naming a user.
fn caller_for_escrow(
    identity: &CallerIdentity,
    requested: Option<UserId>,
) -> Result<Option<UserId>, AppError> {
    if identity.user_id.is_none() && requested.is_none() {
        // Unbound admin token: skip the client check.
        return Ok(None);
    }
    resolve_actor(identity, requested).map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::notify::TracingNotifier;
    use crate::state::{AppConfig, AppState, DisputeStore};
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use openlance_core::{EscrowStatus, Job, JobStatus, Milestone, Money};
    use openlance_settlement::MockSettlementGateway;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_state() -> AppState {
        AppState::new(
            DisputeStore::new(),
            Arc::new(MockSettlementGateway::new()),
            Arc::new(TracingNotifier),
            AppConfig::default(),
        )
    }

    fn seed_job(state: &AppState) -> (JobId, UserId) {
        let client = UserId::new();
        let mut job = Job::post(
            client,
            "Site build",
            "Marketing site with CMS",
            Money::new("2000", "USD").unwrap(),
            vec![
                Milestone::new("Design", Money::new("800", "USD").unwrap()),
                Milestone::new("Build", Money::new("1200", "USD").unwrap()),
            ],
        );
        job.assign_worker(UserId::new()).unwrap();
        let id = job.id;
        state.store.insert_job(job);
        (id, client)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn confirm_body(hash_seed: u8, action: serde_json::Value) -> serde_json::Value {
        let mut body = action;
        body["hash"] = format!("0x{:064x}", hash_seed).into();
        body
    }

    #[tokio::test]
    async fn full_escrow_lifecycle_over_http() {
        let state = test_state();
        let (job_id, client) = seed_job(&state);

        // init-create → confirm.
        let body = serde_json::json!({ "job_id": job_id, "client_id": client });
        let response = app(state.clone())
            .oneshot(post_json("/v1/escrow/init-create", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["action"], "create_escrow");

        let body = confirm_body(1, serde_json::json!({ "type": "CREATE_ESCROW", "jobId": job_id }));
        let response = app(state.clone())
            .oneshot(post_json("/v1/escrow/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["job"]["escrow_status"], "CREATED");

        // init-fund → confirm.
        let body = serde_json::json!({ "job_id": job_id, "client_id": client });
        let response = app(state.clone())
            .oneshot(post_json("/v1/escrow/init-fund", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = confirm_body(2, serde_json::json!({ "type": "FUND_ESCROW", "jobId": job_id }));
        let response = app(state.clone())
            .oneshot(post_json("/v1/escrow/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(body_json(response).await["job"]["escrow_status"], "FUNDED");

        // Release both milestones; the second completes the job.
        let milestones: Vec<MilestoneId> = state
            .store
            .get_job(&job_id)
            .unwrap()
            .milestones
            .iter()
            .map(|m| m.id)
            .collect();
        for (seed, milestone_id) in milestones.iter().enumerate() {
            let body = serde_json::json!({
                "job_id": job_id,
                "milestone_id": milestone_id,
                "client_id": client,
            });
            let response = app(state.clone())
                .oneshot(post_json("/v1/escrow/init-approve", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);

            let body = confirm_body(
                10 + seed as u8,
                serde_json::json!({
                    "type": "RELEASE_MILESTONE",
                    "jobId": job_id,
                    "milestoneId": milestone_id,
                }),
            );
            let response = app(state.clone())
                .oneshot(post_json("/v1/escrow/confirm-tx", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let job = state.store.get_job(&job_id).unwrap();
        assert_eq!(job.escrow_status, EscrowStatus::Released);
        assert_eq!(job.status, JobStatus::Completed);
    }

    #[tokio::test]
    async fn non_client_cannot_init_escrow() {
        let state = test_state();
        let (job_id, _) = seed_job(&state);
        // Names a different user as the actor; unbound admin may do that,
        // but the named user is not the client.
        let body = serde_json::json!({ "job_id": job_id, "client_id": UserId::new() });
        let response = app(state)
            .oneshot(post_json("/v1/escrow/init-create", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn fund_before_create_conflicts() {
        let state = test_state();
        let (job_id, client) = seed_job(&state);
        let body = serde_json::json!({ "job_id": job_id, "client_id": client });
        let response = app(state)
            .oneshot(post_json("/v1/escrow/init-fund", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[tokio::test]
    async fn escrow_confirm_rejects_dispute_actions() {
        let state = test_state();
        let body = confirm_body(
            3,
            serde_json::json!({ "type": "RESOLVE_DISPUTE", "onChainDisputeId": 1 }),
        );
        let response = app(state)
            .oneshot(post_json("/v1/escrow/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn confirm_replay_leaves_state_unchanged() {
        let state = test_state();
        let (job_id, _) = seed_job(&state);
        let body = confirm_body(4, serde_json::json!({ "type": "CREATE_ESCROW", "jobId": job_id }));
        for _ in 0..2 {
            let response = app(state.clone())
                .oneshot(post_json("/v1/escrow/confirm-tx", body.clone()))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }
        assert_eq!(
            state.store.get_job(&job_id).unwrap().escrow_status,
            EscrowStatus::Created
        );
    }
}
