//! # API Error Types
//!
//! Structured error type implementing `axum::response::IntoResponse`.
//! Maps domain errors from openlance-core, openlance-dispute, and
//! openlance-settlement to HTTP status codes. Returns JSON error response
//! bodies with error code, message, and details. Never exposes internal
//! error details in production responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use openlance_core::job::JobError;
use openlance_dispute::DisputeError;
use openlance_settlement::SettlementError;

/// Structured JSON error response body.
///
/// All error responses use this format for consistency across the API
/// surface. The `details` field carries additional context for 422
/// validation errors but is omitted for 500-class errors to prevent
/// information leakage.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorBody {
    pub error: ErrorDetail,
}

/// Inner error detail.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorDetail {
    /// Machine-readable error code (e.g., "NOT_FOUND", "VALIDATION_ERROR").
    pub code: String,
    /// Human-readable error message.
    pub message: String,
    /// Additional details, present only for client errors.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

/// Application-level error type that implements [`IntoResponse`] for Axum.
///
/// Maps domain errors to appropriate HTTP status codes and structured JSON
/// error bodies. Internal and settlement-transport details are never exposed
/// to clients.
#[derive(Error, Debug)]
pub enum AppError {
    /// Resource not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Request validation failed (422).
    #[error("validation error: {0}")]
    Validation(String),

    /// Authentication failure — missing or invalid token (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Authorization failure — caller is not entitled to act (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Conflict with current resource state (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// A settlement-ledger interaction failed (502). The transport detail is
    /// logged but not returned to the client.
    #[error("settlement failed: {0}")]
    SettlementFailed(String),

    /// Internal server error (500). Message is logged but not returned to client.
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Return the HTTP status code and machine-readable error code for this error.
    fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            Self::NotFound(_) => (StatusCode::NOT_FOUND, "NOT_FOUND"),
            Self::Validation(_) => (StatusCode::UNPROCESSABLE_ENTITY, "VALIDATION_ERROR"),
            Self::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            Self::Forbidden(_) => (StatusCode::FORBIDDEN, "FORBIDDEN"),
            Self::Conflict(_) => (StatusCode::CONFLICT, "CONFLICT"),
            Self::SettlementFailed(_) => (StatusCode::BAD_GATEWAY, "SETTLEMENT_FAILED"),
            Self::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();

        // Never expose internal or ledger-transport error messages to clients.
        let message = match &self {
            Self::Internal(_) => "An internal error occurred".to_string(),
            Self::SettlementFailed(_) => "Settlement verification failed".to_string(),
            other => other.to_string(),
        };

        // Log server-side errors for operator visibility.
        match &self {
            Self::Internal(_) => tracing::error!(error = %self, "internal server error"),
            Self::SettlementFailed(_) => tracing::error!(error = %self, "settlement failure"),
            _ => {}
        }

        let body = ErrorBody {
            error: ErrorDetail {
                code: code.to_string(),
                message,
                details: None,
            },
        };

        (status, Json(body)).into_response()
    }
}

/// Convert core validation errors to API errors.
impl From<openlance_core::ValidationError> for AppError {
    fn from(err: openlance_core::ValidationError) -> Self {
        Self::Validation(err.to_string())
    }
}

/// Convert job lifecycle errors to API errors.
impl From<JobError> for AppError {
    fn from(err: JobError) -> Self {
        match &err {
            JobError::MilestoneNotFound(_) => Self::NotFound(err.to_string()),
            _ => Self::Conflict(err.to_string()),
        }
    }
}

/// Convert dispute domain errors to API errors.
impl From<DisputeError> for AppError {
    fn from(err: DisputeError) -> Self {
        match &err {
            DisputeError::ReasonTooShort { .. } => Self::Validation(err.to_string()),
            DisputeError::PartyCannotVote(_) | DisputeError::NotAParty { .. } => {
                Self::Forbidden(err.to_string())
            }
            DisputeError::InvalidTransition { .. }
            | DisputeError::AlreadyResolved(_)
            | DisputeError::DuplicateVote { .. }
            | DisputeError::QuorumNotMet { .. } => Self::Conflict(err.to_string()),
        }
    }
}

/// Convert settlement gateway errors to API errors.
impl From<SettlementError> for AppError {
    fn from(err: SettlementError) -> Self {
        match &err {
            SettlementError::InvalidAddress(_) => Self::Internal(err.to_string()),
            _ => Self::SettlementFailed(err.to_string()),
        }
    }
}
