// SPDX-License-Identifier: BUSL-1.1
//! # Dispute Lifecycle
//!
//! Manages dispute initiation, community voting, and resolution through the
//! state machine: `Open → Voting → Resolved`, with `Appealed` reachable from
//! any pre-resolution status.
//!
//! ## Design Choice: Validated Enum over Typestate
//!
//! Disputes are stored in shared tables and transmitted via the API where the
//! status is not known at compile time, so this module uses a validated enum
//! (runtime-checked) rather than typestate. Each transition is a dedicated
//! method that checks [`DisputeStatus::valid_transitions`] and returns
//! [`DisputeError::InvalidTransition`] on a bad move; every accepted
//! transition is appended to the dispute's audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use openlance_core::{JobId, UserId};

use crate::error::DisputeError;

// ── Identifiers ────────────────────────────────────────────────────────

/// A unique identifier for a dispute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct DisputeId(Uuid);

impl DisputeId {
    /// Create a new random dispute identifier.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Create a dispute identifier from an existing UUID.
    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    /// Access the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for DisputeId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DisputeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "dispute:{}", self.0)
    }
}

// ── Dispute Status ─────────────────────────────────────────────────────

/// The lifecycle status of a dispute.
///
/// ## Transition Graph
///
/// ```text
/// Open ──first vote──▶ Voting ──resolve()──▶ Resolved
///   │                    │                       ▲
///   ├─resolve()──────────┼───────────────────────┤
///   │                    │                       │
///   └─appeal()──▶ Appealed ◀──appeal()      resolve()
///                    │                           │
///                    └───────────────────────────┘
/// ```
///
/// `Resolved` is the only terminal status. `Appealed` marks that a bound
/// party contested the proceeding; it carries no further modeled behavior
/// and an appealed dispute still resolves through the normal path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeStatus {
    /// Raised; no votes cast yet.
    Open,
    /// At least one community vote has been cast.
    Voting,
    /// Outcome decided and job cascade applied. Terminal state.
    Resolved,
    /// A bound party contested the proceeding before resolution.
    Appealed,
}

impl DisputeStatus {
    /// The canonical string name of this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "OPEN",
            Self::Voting => "VOTING",
            Self::Resolved => "RESOLVED",
            Self::Appealed => "APPEALED",
        }
    }

    /// Whether this status is terminal (no further transitions allowed).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Valid target statuses from this status.
    pub fn valid_transitions(&self) -> &'static [DisputeStatus] {
        match self {
            Self::Open => &[Self::Voting, Self::Appealed, Self::Resolved],
            Self::Voting => &[Self::Appealed, Self::Resolved],
            Self::Appealed => &[Self::Resolved],
            Self::Resolved => &[],
        }
    }
}

impl std::fmt::Display for DisputeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Outcome ────────────────────────────────────────────────────────────

/// The resolution outcome of a dispute.
///
/// Drives the job cascade: favor-worker completes the job, favor-client
/// cancels it, unconditionally on milestone state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DisputeOutcome {
    /// The client prevails; escrow returns to the client, job is cancelled.
    FavorClient,
    /// The worker prevails; escrow releases to the worker, job completes.
    FavorWorker,
}

impl DisputeOutcome {
    /// The canonical string name of this outcome.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FavorClient => "FAVOR_CLIENT",
            Self::FavorWorker => "FAVOR_WORKER",
        }
    }
}

impl std::fmt::Display for DisputeOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ── Audit Trail ────────────────────────────────────────────────────────

/// A record of one accepted status transition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct TransitionRecord {
    /// Status before the transition.
    pub from: DisputeStatus,
    /// Status after the transition.
    pub to: DisputeStatus,
    /// When the transition was accepted.
    pub at: DateTime<Utc>,
    /// Short operator-facing note (e.g., "first vote cast").
    pub note: String,
}

// ── Dispute ────────────────────────────────────────────────────────────

/// A disagreement between the client and worker on a job, resolved by
/// community vote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Dispute {
    /// Unique dispute identifier.
    pub id: DisputeId,
    /// The job the dispute is bound to.
    pub job_id: JobId,
    /// The party who raised the dispute (always the client or worker).
    pub raised_by: UserId,
    /// The client bound to the dispute.
    pub client: UserId,
    /// The worker bound to the dispute.
    pub worker: UserId,
    /// Why the dispute was raised.
    pub reason: String,
    /// Lifecycle status.
    pub status: DisputeStatus,
    /// Resolution outcome, set exactly once at resolution.
    pub outcome: Option<DisputeOutcome>,
    /// Ledger-assigned dispute reference, set when a raise transaction is
    /// confirmed. Webhook updates are keyed on this value.
    pub on_chain_dispute_id: Option<u64>,
    /// When the dispute was raised.
    pub created_at: DateTime<Utc>,
    /// When the dispute was resolved, if it has been.
    pub resolved_at: Option<DateTime<Utc>>,
    /// Audit trail of accepted transitions.
    pub history: Vec<TransitionRecord>,
}

impl Dispute {
    /// Raise a new dispute in [`DisputeStatus::Open`].
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::NotAParty`] if `raised_by` is neither the
    /// client nor the worker, and [`DisputeError::ReasonTooShort`] for a
    /// reason under the minimum length.
    pub fn raise(
        job_id: JobId,
        raised_by: UserId,
        client: UserId,
        worker: UserId,
        reason: impl Into<String>,
    ) -> Result<Self, DisputeError> {
        let reason = reason.into();
        if reason.chars().count() < crate::vote::MIN_REASON_LEN {
            return Err(DisputeError::ReasonTooShort {
                min: crate::vote::MIN_REASON_LEN,
                actual: reason.chars().count(),
            });
        }
        let id = DisputeId::new();
        if raised_by != client && raised_by != worker {
            return Err(DisputeError::NotAParty {
                dispute_id: id,
                user: raised_by,
            });
        }
        Ok(Self {
            id,
            job_id,
            raised_by,
            client,
            worker,
            reason,
            status: DisputeStatus::Open,
            outcome: None,
            on_chain_dispute_id: None,
            created_at: Utc::now(),
            resolved_at: None,
            history: Vec::new(),
        })
    }

    /// Whether the user is one of the two bound parties.
    pub fn is_party(&self, user: UserId) -> bool {
        user == self.client || user == self.worker
    }

    /// Move to [`DisputeStatus::Voting`] when the first vote lands.
    ///
    /// A no-op when already voting; the tally, not the status, carries the
    /// vote count.
    pub fn begin_voting(&mut self) -> Result<(), DisputeError> {
        if self.status == DisputeStatus::Voting {
            return Ok(());
        }
        self.transition(DisputeStatus::Voting, "first vote cast")
    }

    /// Record that a bound party contested the proceeding.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::NotAParty`] for a non-party appellant and
    /// [`DisputeError::InvalidTransition`] once resolved.
    pub fn appeal(&mut self, appellant: UserId) -> Result<(), DisputeError> {
        if !self.is_party(appellant) {
            return Err(DisputeError::NotAParty {
                dispute_id: self.id,
                user: appellant,
            });
        }
        self.transition(DisputeStatus::Appealed, "party appealed")
    }

    /// Record an appeal reported by the settlement ledger, which carries no
    /// appellant identity.
    pub fn mark_appealed(&mut self) -> Result<(), DisputeError> {
        self.transition(DisputeStatus::Appealed, "ledger reported appeal")
    }

    /// Resolve the dispute with the given outcome. One-shot.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::AlreadyResolved`] on a second resolution
    /// attempt.
    pub fn resolve(&mut self, outcome: DisputeOutcome) -> Result<(), DisputeError> {
        if self.status == DisputeStatus::Resolved {
            return Err(DisputeError::AlreadyResolved(self.id));
        }
        self.transition(DisputeStatus::Resolved, "outcome decided")?;
        self.outcome = Some(outcome);
        self.resolved_at = Some(Utc::now());
        Ok(())
    }

    fn transition(&mut self, to: DisputeStatus, note: &str) -> Result<(), DisputeError> {
        if !self.status.valid_transitions().contains(&to) {
            return Err(DisputeError::InvalidTransition {
                from: self.status,
                to,
                reason: note.to_string(),
            });
        }
        self.history.push(TransitionRecord {
            from: self.status,
            to,
            at: Utc::now(),
            note: note.to_string(),
        });
        self.status = to;
        Ok(())
    }
}
