// SPDX-License-Identifier: BUSL-1.1
//! # Dispute Routes
//!
//! The full arbitration surface: raising disputes, community voting, and
//! resolution — each available two ways. The direct path mutates local
//! state immediately; the ledger path (`init-*` plus `confirm-tx`) builds an
//! unsigned settlement instruction, lets the caller sign and broadcast it,
//! and commits locally only after the reported transaction finalizes.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post, put};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use openlance_core::{Job, JobId, TxHash, UserId};
use openlance_dispute::{
    Dispute, DisputeId, DisputeOutcome, Vote, VoteChoice, VoteTally, MIN_REASON_LEN,
};
use openlance_settlement::{SettlementAction, UnsignedInstruction};

use crate::auth::{CallerIdentity, Role};
use crate::error::AppError;
use crate::notify::NotifyEvent;
use crate::reconcile::{ConfirmAction, ConfirmOutcome, TransactionReconciler};
use crate::routes::{resolve_actor, service};
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// Request to raise a dispute (direct or init-raise).
#[derive(Debug, Deserialize, ToSchema)]
pub struct RaiseDisputeRequest {
    /// The disputed job.
    pub job_id: JobId,
    /// Why the dispute is being raised (minimum 10 characters).
    pub reason: String,
    /// The raising party. Required for unbound admin tokens; bound tokens
    /// raise as themselves.
    pub raised_by: Option<UserId>,
}

/// Request to cast a vote on a dispute.
#[derive(Debug, Deserialize, ToSchema)]
pub struct CastVoteRequest {
    /// The vote direction.
    pub choice: VoteChoice,
    /// Why the voter chose this direction (minimum 10 characters).
    pub reason: String,
    /// The voting member, for unbound admin tokens.
    pub voter_id: Option<UserId>,
}

/// Request to build a cast-vote settlement instruction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitVoteRequest {
    /// The dispute to vote on.
    pub dispute_id: DisputeId,
    /// The vote direction.
    pub choice: VoteChoice,
    /// The voting member, for unbound admin tokens.
    pub voter_id: Option<UserId>,
}

/// Request to build a resolve-dispute settlement instruction.
#[derive(Debug, Deserialize, ToSchema)]
pub struct InitResolveRequest {
    /// The dispute to resolve.
    pub dispute_id: DisputeId,
}

/// Reconciliation request: a broadcast transaction hash plus the action it
/// encoded.
#[derive(Debug, Deserialize, ToSchema)]
pub struct ConfirmTxRequest {
    /// The broadcast transaction hash (0x + 64 hex).
    pub hash: String,
    /// The encoded action and its original intent parameters.
    #[serde(flatten)]
    pub action: ConfirmAction,
}

/// What a confirmed transaction changed locally.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ConfirmTxResponse {
    /// The confirmed action type, e.g. "RAISE_DISPUTE".
    pub action: String,
    /// The affected dispute, when the action touched one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dispute: Option<Dispute>,
    /// The affected job, for escrow actions.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job: Option<Job>,
    /// Tally after a confirmed vote.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tally: Option<VoteTally>,
    /// Outcome of a confirmed resolution.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<DisputeOutcome>,
}

impl ConfirmTxResponse {
    pub(crate) fn from_outcome(action: &'static str, outcome: ConfirmOutcome) -> Self {
        let mut response = Self {
            action: action.to_string(),
            dispute: None,
            job: None,
            tally: None,
            outcome: None,
        };
        match outcome {
            ConfirmOutcome::DisputeRaised(dispute) => response.dispute = Some(dispute),
            ConfirmOutcome::VoteRecorded { tally, .. } => response.tally = Some(tally),
            ConfirmOutcome::DisputeResolved { dispute, outcome } => {
                response.dispute = Some(dispute);
                response.outcome = Some(outcome);
            }
            ConfirmOutcome::EscrowCreated(job)
            | ConfirmOutcome::EscrowFunded(job)
            | ConfirmOutcome::MilestoneReleased { job, .. } => response.job = Some(job),
        }
        response
    }
}

/// Vote acknowledgment with the updated tally.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VoteResponse {
    /// The recorded vote.
    pub vote: Vote,
    /// The tally including it.
    pub tally: VoteTally,
}

/// Resolution acknowledgment.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ResolveResponse {
    /// The resolved dispute.
    pub dispute: Dispute,
    /// The decided outcome.
    pub outcome: DisputeOutcome,
}

/// Full dispute detail with votes and tally.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputeDetail {
    /// The dispute.
    pub dispute: Dispute,
    /// Votes in cast order.
    pub votes: Vec<Vote>,
    /// Current tally.
    pub tally: VoteTally,
}

/// Disputes list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DisputesResponse {
    /// All disputes, unordered.
    pub disputes: Vec<Dispute>,
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Public read-only dispute endpoints.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes", get(list_disputes))
        .route("/v1/disputes/:id", get(get_dispute))
}

/// Authenticated dispute mutation endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/disputes", post(raise_dispute))
        .route("/v1/disputes/init-raise", post(init_raise))
        .route("/v1/disputes/:id/votes", post(cast_vote))
        .route("/v1/disputes/init-vote", post(init_vote))
        .route("/v1/disputes/:id/resolve", put(resolve_dispute))
        .route("/v1/disputes/init-resolve", post(init_resolve))
        .route("/v1/disputes/confirm-tx", post(confirm_tx))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_tx_hash(hash: &str) -> Result<TxHash, AppError> {
    TxHash::parse(hash).map_err(|e| AppError::Validation(e.to_string()))
}

fn check_reason(reason: &str) -> Result<(), AppError> {
    if reason.chars().count() < MIN_REASON_LEN {
        return Err(AppError::Validation(format!(
            "reason must be at least {MIN_REASON_LEN} characters"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// List all disputes.
#[utoipa::path(
    get,
    path = "/v1/disputes",
    responses((status = 200, description = "All disputes", body = DisputesResponse)),
    tag = "disputes",
)]
pub async fn list_disputes(State(state): State<AppState>) -> Json<DisputesResponse> {
    Json(DisputesResponse {
        disputes: state.store.list_disputes(),
    })
}

/// Fetch one dispute with its votes and tally.
#[utoipa::path(
    get,
    path = "/v1/disputes/{id}",
    params(("id" = Uuid, Path, description = "Dispute id")),
    responses(
        (status = 200, description = "Dispute detail", body = DisputeDetail),
        (status = 404, description = "No such dispute"),
    ),
    tag = "disputes",
)]
pub async fn get_dispute(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<DisputeDetail>, AppError> {
    let id = DisputeId::from_uuid(id);
    let min_votes = state.config.min_votes;
    state.store.with_tables(|tables| {
        let dispute = tables
            .dispute(&id)
            .ok_or_else(|| AppError::NotFound(format!("dispute {id}")))?;
        let votes = tables.votes(&id).to_vec();
        let tally = VoteTally::count(&votes, min_votes);
        Ok(Json(DisputeDetail {
            dispute: dispute.clone(),
            votes,
            tally,
        }))
    })
}

/// Raise a dispute directly, without ledger settlement.
#[utoipa::path(
    post,
    path = "/v1/disputes",
    request_body = RaiseDisputeRequest,
    responses(
        (status = 201, description = "Dispute raised", body = Dispute),
        (status = 403, description = "Caller is not a party to the job"),
        (status = 404, description = "No such job"),
        (status = 409, description = "Job unassigned or already disputed"),
        (status = 422, description = "Reason too short"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn raise_dispute(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<RaiseDisputeRequest>,
) -> Result<(StatusCode, Json<Dispute>), AppError> {
    let raised_by = resolve_actor(&identity, req.raised_by)?;
    let dispute = service(&state).raise(req.job_id, raised_by, &req.reason)?;
    state
        .notifier
        .notify(NotifyEvent::DisputeRaised {
            dispute_id: dispute.id,
            job_id: dispute.job_id,
            raised_by,
        })
        .await;
    Ok((StatusCode::CREATED, Json(dispute)))
}

/// Build an unsigned raise-dispute settlement instruction.
///
/// Validates optimistically; the same checks run again at confirm-tx time
/// because state can change while the caller signs.
#[utoipa::path(
    post,
    path = "/v1/disputes/init-raise",
    request_body = RaiseDisputeRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 403, description = "Caller is not a party to the job"),
        (status = 404, description = "No such job"),
        (status = 409, description = "Job unassigned or already disputed"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn init_raise(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<RaiseDisputeRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let raised_by = resolve_actor(&identity, req.raised_by)?;
    check_reason(&req.reason)?;
    service(&state).precheck_raise(&req.job_id, raised_by)?;
    let action = SettlementAction::RaiseDispute {
        job_id: req.job_id,
        raised_by,
    };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Cast a vote directly, without ledger settlement.
#[utoipa::path(
    post,
    path = "/v1/disputes/{id}/votes",
    params(("id" = Uuid, Path, description = "Dispute id")),
    request_body = CastVoteRequest,
    responses(
        (status = 201, description = "Vote recorded", body = VoteResponse),
        (status = 403, description = "Job parties cannot vote"),
        (status = 404, description = "No such dispute"),
        (status = 409, description = "Already voted, or dispute resolved"),
        (status = 422, description = "Reason too short"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn cast_vote(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<CastVoteRequest>,
) -> Result<(StatusCode, Json<VoteResponse>), AppError> {
    let voter = resolve_actor(&identity, req.voter_id)?;
    let (vote, tally) =
        service(&state).cast_vote(DisputeId::from_uuid(id), voter, req.choice, &req.reason)?;
    Ok((StatusCode::CREATED, Json(VoteResponse { vote, tally })))
}

/// Build an unsigned cast-vote settlement instruction.
#[utoipa::path(
    post,
    path = "/v1/disputes/init-vote",
    request_body = InitVoteRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 403, description = "Job parties cannot vote"),
        (status = 404, description = "No such dispute"),
        (status = 409, description = "Already voted, or dispute not ledger-backed"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn init_vote(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<InitVoteRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let voter = resolve_actor(&identity, req.voter_id)?;
    let on_chain_dispute_id = service(&state).precheck_vote(&req.dispute_id, voter)?;
    let action = SettlementAction::CastVote {
        on_chain_dispute_id,
        voter,
        favor_worker: req.choice == VoteChoice::FavorWorker,
    };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Resolve a dispute directly. The tally decides; no quorum is required on
/// this path.
#[utoipa::path(
    put,
    path = "/v1/disputes/{id}/resolve",
    params(("id" = Uuid, Path, description = "Dispute id")),
    responses(
        (status = 200, description = "Dispute resolved", body = ResolveResponse),
        (status = 403, description = "Caller is not a party"),
        (status = 404, description = "No such dispute"),
        (status = 409, description = "Already resolved"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn resolve_dispute(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<Uuid>,
) -> Result<Json<ResolveResponse>, AppError> {
    let resolver = if identity.has_role(Role::Admin) {
        None
    } else {
        Some(identity.acting_user()?)
    };
    let (dispute, outcome) = service(&state).resolve_direct(DisputeId::from_uuid(id), resolver)?;
    state
        .notifier
        .notify(NotifyEvent::DisputeResolved {
            dispute_id: dispute.id,
            job_id: dispute.job_id,
            outcome,
        })
        .await;
    Ok(Json(ResolveResponse { dispute, outcome }))
}

/// Build an unsigned resolve-dispute settlement instruction.
///
/// Unlike the direct path, this requires the vote quorum to be met.
#[utoipa::path(
    post,
    path = "/v1/disputes/init-resolve",
    request_body = InitResolveRequest,
    responses(
        (status = 200, description = "Unsigned instruction", body = UnsignedInstruction),
        (status = 404, description = "No such dispute"),
        (status = 409, description = "Quorum not met, or dispute not ledger-backed"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn init_resolve(
    State(state): State<AppState>,
    Json(req): Json<InitResolveRequest>,
) -> Result<Json<UnsignedInstruction>, AppError> {
    let on_chain_dispute_id = service(&state).precheck_init_resolve(&req.dispute_id)?;
    let action = SettlementAction::ResolveDispute {
        on_chain_dispute_id,
    };
    Ok(Json(state.gateway.build_instruction(&action)?))
}

/// Confirm a broadcast dispute transaction and commit the local mutation.
#[utoipa::path(
    post,
    path = "/v1/disputes/confirm-tx",
    request_body = ConfirmTxRequest,
    responses(
        (status = 200, description = "Mutation committed", body = ConfirmTxResponse),
        (status = 422, description = "Malformed hash or escrow action on dispute endpoint"),
        (status = 502, description = "Transaction not finalized"),
    ),
    security(("bearer" = [])),
    tag = "disputes",
)]
pub async fn confirm_tx(
    State(state): State<AppState>,
    Json(req): Json<ConfirmTxRequest>,
) -> Result<Json<ConfirmTxResponse>, AppError> {
    let action_name = match &req.action {
        ConfirmAction::RaiseDispute { .. } => "RAISE_DISPUTE",
        ConfirmAction::CastVote { .. } => "CAST_VOTE",
        ConfirmAction::ResolveDispute { .. } => "RESOLVE_DISPUTE",
        _ => {
            return Err(AppError::Validation(
                "escrow actions are confirmed via /v1/escrow/confirm-tx".to_string(),
            ))
        }
    };
    let hash = parse_tx_hash(&req.hash)?;
    let reconciler = TransactionReconciler::new(state.gateway.clone(), service(&state));
    let outcome = reconciler.confirm(&hash, req.action).await?;

    match &outcome {
        ConfirmOutcome::DisputeRaised(dispute) => {
            state
                .notifier
                .notify(NotifyEvent::DisputeRaised {
                    dispute_id: dispute.id,
                    job_id: dispute.job_id,
                    raised_by: dispute.raised_by,
                })
                .await;
        }
        ConfirmOutcome::DisputeResolved { dispute, outcome } => {
            state
                .notifier
                .notify(NotifyEvent::DisputeResolved {
                    dispute_id: dispute.id,
                    job_id: dispute.job_id,
                    outcome: *outcome,
                })
                .await;
        }
        _ => {}
    }
    Ok(Json(ConfirmTxResponse::from_outcome(action_name, outcome)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app;
    use crate::notify::TracingNotifier;
    use crate::state::{AppConfig, AppState, DisputeStore};
    use axum::body::Body;
    use axum::http::Request;
    use http_body_util::BodyExt;
    use openlance_core::{JobStatus, Milestone, Money};
    use openlance_settlement::MockSettlementGateway;
    use std::sync::Arc;
    use tower::ServiceExt;

    const REASON: &str = "Deliverable does not match the agreed scope";

    fn test_state() -> AppState {
        AppState::new(
            DisputeStore::new(),
            Arc::new(MockSettlementGateway::new()),
            Arc::new(TracingNotifier),
            AppConfig::default(),
        )
    }

    fn seed_job(state: &AppState) -> (JobId, UserId, UserId) {
        let client = UserId::new();
        let worker = UserId::new();
        let mut job = Job::post(
            client,
            "API integration",
            "Wire up the payments API",
            Money::new("900", "USD").unwrap(),
            vec![Milestone::new(
                "Production cutover",
                Money::new("900", "USD").unwrap(),
            )],
        );
        job.assign_worker(worker).unwrap();
        let id = job.id;
        state.store.insert_job(job);
        (id, client, worker)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn request(method: &str, uri: &str, body: serde_json::Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn raise_vote_resolve_via_http() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);

        let body = serde_json::json!({ "job_id": job_id, "reason": REASON, "raised_by": client });
        let response = app(state.clone())
            .oneshot(request("POST", "/v1/disputes", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let dispute = body_json(response).await;
        let dispute_id = dispute["id"].as_str().unwrap().to_string();
        assert_eq!(dispute["status"], "OPEN");

        // Two community votes for the worker.
        for _ in 0..2 {
            let body = serde_json::json!({
                "choice": "FAVOR_WORKER",
                "reason": REASON,
                "voter_id": UserId::new(),
            });
            let response = app(state.clone())
                .oneshot(request(
                    "POST",
                    &format!("/v1/disputes/{dispute_id}/votes"),
                    body,
                ))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::CREATED);
        }

        let response = app(state.clone())
            .oneshot(request(
                "PUT",
                &format!("/v1/disputes/{dispute_id}/resolve"),
                serde_json::json!({}),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let resolved = body_json(response).await;
        assert_eq!(resolved["outcome"], "FAVOR_WORKER");
        assert_eq!(
            state.store.get_job(&job_id).unwrap().status,
            JobStatus::Completed
        );
    }

    #[tokio::test]
    async fn short_reason_is_unprocessable() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let body =
            serde_json::json!({ "job_id": job_id, "reason": "too short", "raised_by": client });
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn party_vote_is_forbidden() {
        let state = test_state();
        let (job_id, client, worker) = seed_job(&state);
        let body = serde_json::json!({ "job_id": job_id, "reason": REASON, "raised_by": client });
        let response = app(state.clone())
            .oneshot(request("POST", "/v1/disputes", body))
            .await
            .unwrap();
        let dispute_id = body_json(response).await["id"].as_str().unwrap().to_string();

        let body =
            serde_json::json!({ "choice": "FAVOR_CLIENT", "reason": REASON, "voter_id": worker });
        let response = app(state)
            .oneshot(request(
                "POST",
                &format!("/v1/disputes/{dispute_id}/votes"),
                body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn init_raise_returns_unsigned_instruction() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let body = serde_json::json!({ "job_id": job_id, "reason": REASON, "raised_by": client });
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes/init-raise", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let instruction = body_json(response).await;
        assert_eq!(instruction["action"], "raise_dispute");
        assert_eq!(instruction["value"], "0");
        assert!(instruction["data"].as_str().unwrap().starts_with("0x"));
    }

    #[tokio::test]
    async fn init_resolve_requires_quorum_over_http() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let dispute = service(&state).record_raised(job_id, client, REASON, 3).unwrap();

        let body = serde_json::json!({ "dispute_id": dispute.id });
        let response = app(state.clone())
            .oneshot(request("POST", "/v1/disputes/init-resolve", body.clone()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        for _ in 0..3 {
            service(&state)
                .record_confirmed_vote(3, UserId::new(), VoteChoice::FavorWorker, REASON)
                .unwrap();
        }
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes/init-resolve", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn confirm_tx_commits_raise() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let body = serde_json::json!({
            "hash": format!("0x{:064x}", 17),
            "type": "RAISE_DISPUTE",
            "jobId": job_id,
            "raisedBy": client,
            "reason": REASON,
            "onChainDisputeId": 6,
        });
        let response = app(state.clone())
            .oneshot(request("POST", "/v1/disputes/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let confirmed = body_json(response).await;
        assert_eq!(confirmed["action"], "RAISE_DISPUTE");
        assert_eq!(confirmed["dispute"]["on_chain_dispute_id"], 6);
        assert_eq!(
            state.store.get_job(&job_id).unwrap().status,
            JobStatus::Disputed
        );
    }

    #[tokio::test]
    async fn confirm_tx_rejects_escrow_actions() {
        let state = test_state();
        let (job_id, _, _) = seed_job(&state);
        let body = serde_json::json!({
            "hash": format!("0x{:064x}", 18),
            "type": "FUND_ESCROW",
            "jobId": job_id,
        });
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn confirm_tx_rejects_malformed_hash() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let body = serde_json::json!({
            "hash": "0x123",
            "type": "RAISE_DISPUTE",
            "jobId": job_id,
            "raisedBy": client,
            "reason": REASON,
            "onChainDisputeId": 6,
        });
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn unfinalized_confirm_is_bad_gateway() {
        let state = test_state();
        let gateway = Arc::new(MockSettlementGateway::new());
        let hash = format!("0x{:064x}", 19);
        gateway.script(
            &TxHash::parse(&hash).unwrap(),
            openlance_settlement::TxFinality::Pending,
        );
        let state = AppState::new(
            state.store.clone(),
            gateway,
            Arc::new(TracingNotifier),
            AppConfig::default(),
        );
        let (job_id, client, _) = seed_job(&state);
        let body = serde_json::json!({
            "hash": hash,
            "type": "RAISE_DISPUTE",
            "jobId": job_id,
            "raisedBy": client,
            "reason": REASON,
            "onChainDisputeId": 6,
        });
        let response = app(state)
            .oneshot(request("POST", "/v1/disputes/confirm-tx", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    }

    #[tokio::test]
    async fn get_dispute_includes_votes_and_tally() {
        let state = test_state();
        let (job_id, client, _) = seed_job(&state);
        let dispute = service(&state).raise(job_id, client, REASON).unwrap();
        service(&state)
            .cast_vote(dispute.id, UserId::new(), VoteChoice::FavorClient, REASON)
            .unwrap();

        let uri = format!("/v1/disputes/{}", dispute.id.as_uuid());
        let response = app(state)
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let detail = body_json(response).await;
        assert_eq!(detail["votes"].as_array().unwrap().len(), 1);
        assert_eq!(detail["tally"]["votes_for_client"], 1);
        assert_eq!(detail["dispute"]["status"], "VOTING");
    }
}
