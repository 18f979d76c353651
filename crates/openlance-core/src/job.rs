//! # Job Lifecycle
//!
//! The job is the unit of engagement between a client and a worker. Its
//! status moves through `Open → InProgress → {Completed | Cancelled}`, with
//! `Disputed` as a detour that resolves back to one of the two terminal
//! states. Escrow status is tracked independently because ledger settlement
//! and off-ledger job state advance at different times.
//!
//! ## Design Choice: Validated Enum over Typestate
//!
//! Jobs are stored in shared tables and shipped over the API, so their status
//! is not known at compile time. A validated enum with runtime-checked
//! transitions serializes directly via serde and keeps one `Job` type across
//! the whole surface; each transition method checks
//! [`JobStatus::valid_transitions`] and returns
//! [`JobError::InvalidTransition`] on a bad move.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use utoipa::ToSchema;

use crate::ids::{JobId, MilestoneId, UserId};
use crate::money::Money;

// ── Errors ─────────────────────────────────────────────────────────────

/// Errors produced by job and escrow state transitions.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum JobError {
    /// Attempted a job status transition the lifecycle does not allow.
    #[error("invalid job transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Status the job was in.
        from: JobStatus,
        /// Status the transition targeted.
        to: JobStatus,
        /// Why the transition was rejected.
        reason: String,
    },

    /// Attempted an escrow status transition the lifecycle does not allow.
    #[error("invalid escrow transition from {from} to {to}")]
    InvalidEscrowTransition {
        /// Escrow status the job was in.
        from: EscrowStatus,
        /// Escrow status the transition targeted.
        to: EscrowStatus,
    },

    /// The job has no worker assigned yet.
    #[error("job {0} has no worker assigned")]
    NoWorkerAssigned(JobId),

    /// A worker is already assigned to the job.
    #[error("job {job_id} already has worker {worker} assigned")]
    WorkerAlreadyAssigned {
        /// The job in question.
        job_id: JobId,
        /// The worker already on the job.
        worker: UserId,
    },

    /// The referenced milestone does not exist on the job.
    #[error("milestone {0} not found on job")]
    MilestoneNotFound(MilestoneId),

    /// The milestone has already been approved.
    #[error("milestone {0} is already approved")]
    MilestoneAlreadyApproved(MilestoneId),
}

// ── Job Status ─────────────────────────────────────────────────────────

/// The lifecycle status of a job.
///
/// ## Transition Graph
///
/// ```text
/// Open ──assign_worker()──▶ InProgress ──────────▶ Completed
///                              │                       ▲
///                          mark_disputed()             │ (favor-worker)
///                              │                       │
///                              ▼                       │
///                           Disputed ──────────────────┤
///                              │                       │
///                              │ (favor-client)        │
///                              ▼                       │
///                           Cancelled ◀────────────────┘
/// ```
///
/// `Completed` and `Cancelled` are terminal. A job can also be cancelled
/// directly from `Open` (posting withdrawn before any assignment).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    /// Posted and accepting worker assignment.
    Open,
    /// Worker assigned, work underway, escrow may be funded.
    InProgress,
    /// A dispute has been raised; job is frozen pending resolution.
    Disputed,
    /// Work accepted and settled in the worker's favor. Terminal state.
    Completed,
    /// Job withdrawn or settled in the client's favor. Terminal state.
    Cancelled,
}

impl JobStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::InProgress => "IN_PROGRESS",
            Self::Disputed => "DISPUTED",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
        }
    }

    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [JobStatus] {
        match self {
            Self::Open => &[Self::InProgress, Self::Cancelled],
            Self::InProgress => &[Self::Disputed, Self::Completed, Self::Cancelled],
            Self::Disputed => &[Self::Completed, Self::Cancelled],
            Self::Completed | Self::Cancelled => &[],
        }
    }

    fn can_transition_to(&self, to: JobStatus) -> bool {
        self.valid_transitions().contains(&to)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Escrow Status ──────────────────────────────────────────────────────

/// On-ledger escrow status mirrored into the job record.
///
/// Advanced only by confirmed settlement transactions, never by direct API
/// mutation, so it lags the ledger but never runs ahead of it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EscrowStatus {
    /// No escrow exists on the ledger yet.
    NotCreated,
    /// Escrow account created, not yet funded.
    Created,
    /// Client has deposited the full job amount.
    Funded,
    /// Some, but not all, milestones have been released to the worker.
    PartiallyReleased,
    /// All funds released. Terminal state.
    Released,
}

impl EscrowStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotCreated => "NOT_CREATED",
            Self::Created => "CREATED",
            Self::Funded => "FUNDED",
            Self::PartiallyReleased => "PARTIALLY_RELEASED",
            Self::Released => "RELEASED",
        }
    }

    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Released)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [EscrowStatus] {
        match self {
            Self::NotCreated => &[Self::Created],
            Self::Created => &[Self::Funded],
            Self::Funded => &[Self::PartiallyReleased, Self::Released],
            Self::PartiallyReleased => &[Self::PartiallyReleased, Self::Released],
            Self::Released => &[],
        }
    }
}

impl std::fmt::Display for EscrowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Milestone ──────────────────────────────────────────────────────────

/// Approval status of a single milestone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MilestoneStatus {
    /// Deliverable not yet accepted by the client.
    Pending,
    /// Client approved the deliverable; funds released on-ledger.
    Approved,
}

/// A payable unit of work within a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Milestone {
    /// Unique milestone identifier.
    pub id: MilestoneId,
    /// What the worker delivers for this milestone.
    pub description: String,
    /// Amount released to the worker on approval.
    pub amount: Money,
    /// Index of this milestone in the on-ledger escrow, assigned when the
    /// escrow is created. `None` until then.
    pub on_chain_index: Option<u64>,
    /// Approval status.
    pub status: MilestoneStatus,
}

impl Milestone {
    /// Create a new pending milestone.
    pub fn new(description: impl Into<String>, amount: Money) -> Self {
        Self {
            id: MilestoneId::new(),
            description: description.into(),
            amount,
            on_chain_index: None,
            status: MilestoneStatus::Pending,
        }
    }
}

// ── Job ────────────────────────────────────────────────────────────────

/// A client's engagement with (at most) one worker, paid through escrow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Job {
    /// Unique job identifier.
    pub id: JobId,
    /// The client who posted the job and funds the escrow.
    pub client: UserId,
    /// The worker assigned to the job, once accepted.
    pub worker: Option<UserId>,
    /// Short title of the engagement.
    pub title: String,
    /// Longer description of the work.
    pub description: String,
    /// Total value of the job across all milestones.
    pub total_amount: Money,
    /// Lifecycle status.
    pub status: JobStatus,
    /// On-ledger escrow status mirrored into the job record.
    pub escrow_status: EscrowStatus,
    /// Payable milestones.
    pub milestones: Vec<Milestone>,
    /// When the job was posted.
    pub created_at: DateTime<Utc>,
    /// When the job record last changed.
    pub updated_at: DateTime<Utc>,
}

impl Job {
    /// Post a new job in [`JobStatus::Open`] with no escrow.
    pub fn post(
        client: UserId,
        title: impl Into<String>,
        description: impl Into<String>,
        total_amount: Money,
        milestones: Vec<Milestone>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: JobId::new(),
            client,
            worker: None,
            title: title.into(),
            description: description.into(),
            total_amount,
            status: JobStatus::Open,
            escrow_status: EscrowStatus::NotCreated,
            milestones,
            created_at: now,
            updated_at: now,
        }
    }

    /// Assign a worker, moving the job to [`JobStatus::InProgress`].
    ///
    /// # Errors
    ///
    /// Returns [`JobError::WorkerAlreadyAssigned`] if a worker is already on
    /// the job, or [`JobError::InvalidTransition`] if the job is not open.
    pub fn assign_worker(&mut self, worker: UserId) -> Result<(), JobError> {
        if let Some(existing) = self.worker {
            return Err(JobError::WorkerAlreadyAssigned {
                job_id: self.id,
                worker: existing,
            });
        }
        self.transition_status(JobStatus::InProgress, "worker assigned")?;
        self.worker = Some(worker);
        Ok(())
    }

    /// Freeze the job while a dispute is open.
    pub fn mark_disputed(&mut self) -> Result<(), JobError> {
        self.transition_status(JobStatus::Disputed, "dispute raised")
    }

    /// Settle the job in the worker's favor.
    pub fn complete(&mut self) -> Result<(), JobError> {
        self.transition_status(JobStatus::Completed, "work accepted")
    }

    /// Settle the job in the client's favor, or withdraw an open posting.
    pub fn cancel(&mut self) -> Result<(), JobError> {
        self.transition_status(JobStatus::Cancelled, "job cancelled")
    }

    /// Advance the escrow status after a confirmed ledger transaction.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::InvalidEscrowTransition`] when the move is not in
    /// the escrow lifecycle graph.
    pub fn advance_escrow(&mut self, to: EscrowStatus) -> Result<(), JobError> {
        if !self.escrow_status.valid_transitions().contains(&to) {
            return Err(JobError::InvalidEscrowTransition {
                from: self.escrow_status,
                to,
            });
        }
        self.escrow_status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    /// Mark a milestone approved and return whether all milestones are now
    /// approved.
    ///
    /// # Errors
    ///
    /// Returns [`JobError::MilestoneNotFound`] for an unknown milestone and
    /// [`JobError::MilestoneAlreadyApproved`] on re-approval.
    pub fn approve_milestone(&mut self, milestone_id: MilestoneId) -> Result<bool, JobError> {
        let milestone = self
            .milestones
            .iter_mut()
            .find(|m| m.id == milestone_id)
            .ok_or(JobError::MilestoneNotFound(milestone_id))?;
        if milestone.status == MilestoneStatus::Approved {
            return Err(JobError::MilestoneAlreadyApproved(milestone_id));
        }
        milestone.status = MilestoneStatus::Approved;
        self.updated_at = Utc::now();
        Ok(self.all_milestones_approved())
    }

    /// Whether every milestone on the job has been approved.
    pub fn all_milestones_approved(&self) -> bool {
        !self.milestones.is_empty()
            && self
                .milestones
                .iter()
                .all(|m| m.status == MilestoneStatus::Approved)
    }

    /// Find a milestone by its on-ledger index.
    pub fn milestone_by_index(&self, index: u64) -> Option<&Milestone> {
        self.milestones
            .iter()
            .find(|m| m.on_chain_index == Some(index))
    }

    fn transition_status(&mut self, to: JobStatus, reason: &str) -> Result<(), JobError> {
        if !self.status.can_transition_to(to) {
            return Err(JobError::InvalidTransition {
                from: self.status,
                to,
                reason: reason.to_string(),
            });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }
}
