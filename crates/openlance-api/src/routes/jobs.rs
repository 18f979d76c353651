// SPDX-License-Identifier: BUSL-1.1
//! # Job Routes
//!
//! Posting, worker assignment, and read access for jobs. The dispute and
//! escrow lifecycles hang off these records; everything here is plain CRUD
//! with ownership checks.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use openlance_core::{Job, JobId, Milestone, Money, UserId};

use crate::auth::{CallerIdentity, Role};
use crate::error::AppError;
use crate::routes::resolve_actor;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / Response types
// ---------------------------------------------------------------------------

/// A monetary amount in a request body.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MoneyBody {
    /// Decimal string, e.g. "1500.00".
    pub amount: String,
    /// ISO 4217 currency code.
    pub currency: String,
}

impl MoneyBody {
    fn parse(&self) -> Result<Money, AppError> {
        Ok(Money::new(&self.amount, &self.currency)?)
    }
}

/// A milestone within a job-posting request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct MilestoneBody {
    /// What the worker delivers.
    pub description: String,
    /// Amount released on approval.
    pub amount: MoneyBody,
}

/// Request to post a new job.
#[derive(Debug, Deserialize, ToSchema)]
pub struct PostJobRequest {
    /// Short title of the engagement.
    pub title: String,
    /// Longer description of the work.
    pub description: String,
    /// Total value across all milestones.
    pub total_amount: MoneyBody,
    /// Payable milestones, in order.
    pub milestones: Vec<MilestoneBody>,
    /// The posting client. Required for unbound admin tokens; bound tokens
    /// post as themselves.
    pub client_id: Option<UserId>,
}

/// Request to assign a worker to an open job.
#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignWorkerRequest {
    /// The worker taking the job.
    pub worker_id: UserId,
}

/// Jobs list response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct JobsResponse {
    /// All jobs, unordered.
    pub jobs: Vec<Job>,
}

// ---------------------------------------------------------------------------
// Routers
// ---------------------------------------------------------------------------

/// Public read-only job endpoints.
pub fn public_router() -> Router<AppState> {
    Router::new()
        .route("/v1/jobs", get(list_jobs))
        .route("/v1/jobs/:id", get(get_job))
}

/// Authenticated job mutation endpoints.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/jobs", post(post_job))
        .route("/v1/jobs/:id/assign", post(assign_worker))
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// List all jobs.
#[utoipa::path(
    get,
    path = "/v1/jobs",
    responses((status = 200, description = "All jobs", body = JobsResponse)),
    tag = "jobs",
)]
pub async fn list_jobs(State(state): State<AppState>) -> Json<JobsResponse> {
    Json(JobsResponse {
        jobs: state.store.list_jobs(),
    })
}

/// Fetch one job.
#[utoipa::path(
    get,
    path = "/v1/jobs/{id}",
    params(("id" = Uuid, Path, description = "Job id")),
    responses(
        (status = 200, description = "The job", body = Job),
        (status = 404, description = "No such job"),
    ),
    tag = "jobs",
)]
pub async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Job>, AppError> {
    let id = JobId::from_uuid(id);
    state
        .store
        .get_job(&id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("job {id}")))
}

/// Post a new job.
#[utoipa::path(
    post,
    path = "/v1/jobs",
    request_body = PostJobRequest,
    responses(
        (status = 201, description = "Job posted", body = Job),
        (status = 422, description = "Invalid field"),
    ),
    security(("bearer" = [])),
    tag = "jobs",
)]
pub async fn post_job(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Json(req): Json<PostJobRequest>,
) -> Result<(StatusCode, Json<Job>), AppError> {
    let client = resolve_actor(&identity, req.client_id)?;
    if req.title.trim().is_empty() {
        return Err(AppError::Validation("title must not be empty".into()));
    }
    let total_amount = req.total_amount.parse()?;
    let milestones = req
        .milestones
        .iter()
        .map(|m| Ok(Milestone::new(&m.description, m.amount.parse()?)))
        .collect::<Result<Vec<_>, AppError>>()?;

    let job = Job::post(client, req.title, req.description, total_amount, milestones);
    tracing::info!(job_id = %job.id, %client, "job posted");
    state.store.insert_job(job.clone());
    Ok((StatusCode::CREATED, Json(job)))
}

/// Assign a worker to an open job. Client (or admin) only.
#[utoipa::path(
    post,
    path = "/v1/jobs/{id}/assign",
    params(("id" = Uuid, Path, description = "Job id")),
    request_body = AssignWorkerRequest,
    responses(
        (status = 200, description = "Worker assigned", body = Job),
        (status = 403, description = "Caller is not the client"),
        (status = 404, description = "No such job"),
        (status = 409, description = "Job is not open or already assigned"),
    ),
    security(("bearer" = [])),
    tag = "jobs",
)]
pub async fn assign_worker(
    State(state): State<AppState>,
    identity: CallerIdentity,
    Path(id): Path<Uuid>,
    Json(req): Json<AssignWorkerRequest>,
) -> Result<Json<Job>, AppError> {
    let id = JobId::from_uuid(id);
    let job = state.store.with_tables_mut(|tables| {
        let job = tables
            .job_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("job {id}")))?;
        if !identity.has_role(Role::Admin) && identity.user_id != Some(job.client) {
            return Err(AppError::Forbidden(format!(
                "only the client may assign a worker on job {id}"
            )));
        }
        job.assign_worker(req.worker_id)?;
        Ok::<_, AppError>(job.clone())
    })?;
    tracing::info!(job_id = %id, worker = %req.worker_id, "worker assigned");
    Ok(Json(job))
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

    fn job_body(client: UserId) -> serde_json::Value {
        serde_json::json!({
            "title": "Logo design",
            "description": "Vector logo with brand guide",
            "total_amount": { "amount": "300", "currency": "USD" },
            "milestones": [
                { "description": "Final logo", "amount": { "amount": "300", "currency": "USD" } }
            ],
            "client_id": client,
        })
    }

    #[tokio::test]
    async fn post_then_get_job() {
        let state = test_state();
        let response = app(state.clone())
            .oneshot(post_json("/v1/jobs", job_body(UserId::new())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let job = body_json(response).await;
        assert_eq!(job["status"], "OPEN");
        assert_eq!(job["escrow_status"], "NOT_CREATED");

        let uri = format!("/v1/jobs/{}", job["id"].as_str().unwrap());
        let response = app(state)
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn post_job_rejects_bad_amount() {
        let mut body = job_body(UserId::new());
        body["total_amount"]["amount"] = "3..00".into();
        let response = app(test_state())
            .oneshot(post_json("/v1/jobs", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn post_job_rejects_empty_title() {
        let mut body = job_body(UserId::new());
        body["title"] = "  ".into();
        let response = app(test_state())
            .oneshot(post_json("/v1/jobs", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn post_job_without_actor_is_forbidden() {
        let mut body = job_body(UserId::new());
        body["client_id"] = serde_json::Value::Null;
        let response = app(test_state())
            .oneshot(post_json("/v1/jobs", body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn get_unknown_job_is_404() {
        let uri = format!("/v1/jobs/{}", Uuid::new_v4());
        let response = app(test_state())
            .oneshot(Request::builder().uri(&uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn assign_worker_moves_job_in_progress() {
        let state = test_state();
        let job = Job::post(
            UserId::new(),
            "Copy editing",
            "Edit a 20-page report",
            Money::new("200", "USD").unwrap(),
            vec![],
        );
        let job_id = job.id;
        state.store.insert_job(job);

        let body = serde_json::json!({ "worker_id": UserId::new() });
        let response = app(state)
            .oneshot(post_json(
                &format!("/v1/jobs/{}/assign", job_id.as_uuid()),
                body,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let job = body_json(response).await;
        assert_eq!(job["status"], "IN_PROGRESS");
    }

    #[tokio::test]
    async fn double_assignment_conflicts() {
        let state = test_state();
        let job = Job::post(
            UserId::new(),
            "Copy editing",
            "Edit a 20-page report",
            Money::new("200", "USD").unwrap(),
            vec![],
        );
        let job_id = job.id;
        state.store.insert_job(job);

        let uri = format!("/v1/jobs/{}/assign", job_id.as_uuid());
        for expected in [StatusCode::OK, StatusCode::CONFLICT] {
            let body = serde_json::json!({ "worker_id": UserId::new() });
            let response = app(state.clone())
                .oneshot(post_json(&uri, body))
                .await
                .unwrap();
            assert_eq!(response.status(), expected);
        }
    }
}
