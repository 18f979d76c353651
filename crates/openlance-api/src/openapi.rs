//! # OpenAPI Specification Assembly
//!
//! Assembles all utoipa-documented routes into a single OpenAPI spec,
//! served at `/openapi.json`.

use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::state::AppState;

/// Assembled OpenAPI spec for the entire API surface.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Openlance Core API",
        version = "0.3.12",
        description = "Freelance marketplace dispute arbitration with on-ledger escrow settlement: jobs, community-voted disputes, and two-phase build/confirm settlement reconciliation.",
        license(name = "BUSL-1.1")
    ),
    paths(
        // Jobs
        crate::routes::jobs::list_jobs,
        crate::routes::jobs::get_job,
        crate::routes::jobs::post_job,
        crate::routes::jobs::assign_worker,
        // Disputes
        crate::routes::disputes::list_disputes,
        crate::routes::disputes::get_dispute,
        crate::routes::disputes::raise_dispute,
        crate::routes::disputes::init_raise,
        crate::routes::disputes::cast_vote,
        crate::routes::disputes::init_vote,
        crate::routes::disputes::resolve_dispute,
        crate::routes::disputes::init_resolve,
        crate::routes::disputes::confirm_tx,
        // Escrow
        crate::routes::escrow::init_create,
        crate::routes::escrow::init_fund,
        crate::routes::escrow::init_approve,
        crate::routes::escrow::confirm_tx,
        // Webhook
        crate::webhook::on_chain_update,
    ),
    components(schemas(
        // Domain types
        openlance_core::Job,
        openlance_core::job::JobStatus,
        openlance_core::job::EscrowStatus,
        openlance_core::Milestone,
        openlance_core::MilestoneStatus,
        openlance_core::Money,
        openlance_dispute::Dispute,
        openlance_dispute::DisputeStatus,
        openlance_dispute::DisputeOutcome,
        openlance_dispute::TransitionRecord,
        openlance_dispute::Vote,
        openlance_dispute::VoteChoice,
        openlance_dispute::VoteTally,
        openlance_settlement::UnsignedInstruction,
        openlance_settlement::TxFinality,
        // Error types
        crate::error::ErrorBody,
        crate::error::ErrorDetail,
        // Job DTOs
        crate::routes::jobs::PostJobRequest,
        crate::routes::jobs::MilestoneBody,
        crate::routes::jobs::MoneyBody,
        crate::routes::jobs::AssignWorkerRequest,
        crate::routes::jobs::JobsResponse,
        // Dispute DTOs
        crate::routes::disputes::RaiseDisputeRequest,
        crate::routes::disputes::CastVoteRequest,
        crate::routes::disputes::InitVoteRequest,
        crate::routes::disputes::InitResolveRequest,
        crate::routes::disputes::ConfirmTxRequest,
        crate::routes::disputes::ConfirmTxResponse,
        crate::routes::disputes::VoteResponse,
        crate::routes::disputes::ResolveResponse,
        crate::routes::disputes::DisputeDetail,
        crate::routes::disputes::DisputesResponse,
        // Escrow DTOs
        crate::routes::escrow::EscrowJobRequest,
        crate::routes::escrow::InitApproveRequest,
        crate::routes::escrow::EscrowConfirmTxRequest,
        // Reconciliation
        crate::reconcile::ConfirmAction,
        // Webhook DTOs
        crate::webhook::OnChainUpdate,
        crate::webhook::WebhookAck,
    )),
    tags(
        (name = "jobs", description = "Job posting and assignment"),
        (name = "disputes", description = "Dispute arbitration lifecycle"),
        (name = "escrow", description = "On-ledger escrow settlement"),
        (name = "webhook", description = "Ledger oracle ingestion"),
    )
)]
pub struct ApiDoc;

/// Serve the assembled spec.
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}

/// Router exposing `/openapi.json`.
pub fn router() -> Router<AppState> {
    Router::new().route("/openapi.json", get(openapi_json))
}
