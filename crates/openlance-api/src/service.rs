// SPDX-License-Identifier: BUSL-1.1
//! # Dispute Lifecycle Service
//!
//! The single mutation surface over the marketplace tables. Direct API
//! paths and confirmed-ledger paths both land here, so eligibility, quorum,
//! one-shot resolution, and the job cascade are enforced in exactly one
//! place.
//!
//! Every mutation runs inside one [`DisputeStore::with_tables_mut`] closure:
//! the check and the write happen under the same lock, so concurrent
//! requests cannot interleave between them.
//!
//! ## Direct vs. confirmed paths
//!
//! Direct paths (`raise`, `cast_vote`, `resolve_direct`) reject repeats with
//! 409 Conflict. Confirmed paths (`record_*`, called by the reconciler after
//! ledger finality) are idempotent instead: a replayed confirmation finds
//! its resulting row already present and succeeds with current state,
//! because the ledger transaction it certifies really did happen exactly
//! once.
//!
//! ## Quorum policy
//!
//! Direct resolution carries no quorum guard; a bound party may resolve an
//! undervoted dispute and the tally (tie favors the client) decides the
//! outcome. The ledger path is stricter: `precheck_init_resolve` refuses to
//! build a resolution instruction until quorum is met.

use openlance_core::{EscrowStatus, Job, JobId, MilestoneId, UserId};
use openlance_dispute::{
    Dispute, DisputeId, DisputeOutcome, Vote, VoteChoice, VoteTally,
};

use crate::error::AppError;
use crate::state::{DisputeStore, Tables};

/// Orchestrates dispute, vote, and escrow mutations over the shared store.
#[derive(Clone)]
pub struct DisputeLifecycleService {
    store: DisputeStore,
    min_votes: usize,
}

impl DisputeLifecycleService {
    /// Create a service over the given store.
    pub fn new(store: DisputeStore, min_votes: usize) -> Self {
        Self { store, min_votes }
    }

    /// The store this service mutates.
    pub fn store(&self) -> &DisputeStore {
        &self.store
    }

    // ── Raise ───────────────────────────────────────────────────────────

    /// Validate that a dispute could be raised on a job, without mutating.
    ///
    /// Used by the init-raise endpoint before building an unsigned
    /// instruction. Returns the job's bound (client, worker) pair.
    pub fn precheck_raise(
        &self,
        job_id: &JobId,
        raised_by: UserId,
    ) -> Result<(UserId, UserId), AppError> {
        self.store.with_tables(|tables| {
            let job = tables
                .job(job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            let worker = job
                .worker
                .ok_or_else(|| AppError::Conflict(format!("job {job_id} has no worker assigned")))?;
            if raised_by != job.client && raised_by != worker {
                return Err(AppError::Forbidden(format!(
                    "user {raised_by} is not a party to job {job_id}"
                )));
            }
            if let Some(existing) = tables.active_dispute_for_job(job_id) {
                return Err(AppError::Conflict(format!(
                    "job {job_id} already has open dispute {}",
                    existing.id
                )));
            }
            Ok((job.client, worker))
        })
    }

    /// Raise a dispute directly (no ledger involvement).
    ///
    /// Freezes the job and inserts the dispute atomically.
    pub fn raise(
        &self,
        job_id: JobId,
        raised_by: UserId,
        reason: &str,
    ) -> Result<Dispute, AppError> {
        self.store
            .with_tables_mut(|tables| Self::raise_in(tables, job_id, raised_by, reason, None))
    }

    /// Record a dispute whose raise transaction was confirmed on-ledger.
    ///
    /// Idempotent: if a dispute already carries this ledger reference, it is
    /// returned unchanged.
    pub fn record_raised(
        &self,
        job_id: JobId,
        raised_by: UserId,
        reason: &str,
        on_chain_dispute_id: u64,
    ) -> Result<Dispute, AppError> {
        self.store.with_tables_mut(|tables| {
            if let Some(existing) = tables.dispute_by_chain_id(on_chain_dispute_id) {
                tracing::debug!(
                    dispute_id = %existing.id,
                    on_chain_dispute_id,
                    "raise confirmation replayed; returning existing dispute"
                );
                return Ok(existing.clone());
            }
            Self::raise_in(tables, job_id, raised_by, reason, Some(on_chain_dispute_id))
        })
    }

    fn raise_in(
        tables: &mut Tables,
        job_id: JobId,
        raised_by: UserId,
        reason: &str,
        on_chain_dispute_id: Option<u64>,
    ) -> Result<Dispute, AppError> {
        let job = tables
            .job(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
        let worker = job
            .worker
            .ok_or_else(|| AppError::Conflict(format!("job {job_id} has no worker assigned")))?;
        let client = job.client;
        if raised_by != client && raised_by != worker {
            return Err(AppError::Forbidden(format!(
                "user {raised_by} is not a party to job {job_id}"
            )));
        }
        if let Some(existing) = tables.active_dispute_for_job(&job_id) {
            return Err(AppError::Conflict(format!(
                "job {job_id} already has open dispute {}",
                existing.id
            )));
        }

        let mut dispute = Dispute::raise(job_id, raised_by, client, worker, reason)?;
        dispute.on_chain_dispute_id = on_chain_dispute_id;

        // Freeze the job under the same lock; a failure here leaves the
        // tables untouched because the dispute is not yet inserted.
        tables
            .job_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?
            .mark_disputed()?;

        tables.disputes.insert(dispute.id, dispute.clone());
        Ok(dispute)
    }

    // ── Vote ────────────────────────────────────────────────────────────

    /// Validate that a voter could vote on a dispute, without mutating.
    ///
    /// Used by the init-vote endpoint. Returns the dispute's ledger
    /// reference, required for building the instruction.
    pub fn precheck_vote(&self, dispute_id: &DisputeId, voter: UserId) -> Result<u64, AppError> {
        self.store.with_tables(|tables| {
            let dispute = tables
                .dispute(dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
            VoteTally::check_voter(dispute, tables.votes(dispute_id), voter)?;
            dispute.on_chain_dispute_id.ok_or_else(|| {
                AppError::Conflict(format!("dispute {dispute_id} is not ledger-backed"))
            })
        })
    }

    /// Cast a vote directly (no ledger involvement).
    pub fn cast_vote(
        &self,
        dispute_id: DisputeId,
        voter: UserId,
        choice: VoteChoice,
        reason: &str,
    ) -> Result<(Vote, VoteTally), AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables_mut(|tables| {
            let dispute = tables
                .dispute(&dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
            VoteTally::check_voter(dispute, tables.votes(&dispute_id), voter)?;
            let vote = Vote::cast(dispute_id, voter, choice, reason)?;

            tables
                .dispute_mut(&dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?
                .begin_voting()?;
            let votes = tables.votes_mut(dispute_id);
            votes.push(vote.clone());
            let tally = VoteTally::count(votes, min_votes);
            Ok((vote, tally))
        })
    }

    /// Record a vote whose transaction was confirmed on-ledger.
    ///
    /// Idempotent: a replayed confirmation for a voter who already voted is
    /// a no-op returning the current tally.
    pub fn record_confirmed_vote(
        &self,
        on_chain_dispute_id: u64,
        voter: UserId,
        choice: VoteChoice,
        reason: &str,
    ) -> Result<(DisputeId, VoteTally), AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables_mut(|tables| {
            let dispute = tables
                .dispute_by_chain_id(on_chain_dispute_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "no dispute with ledger reference {on_chain_dispute_id}"
                    ))
                })?;
            let dispute_id = dispute.id;

            if tables.votes(&dispute_id).iter().any(|v| v.voter == voter) {
                tracing::debug!(
                    %dispute_id,
                    %voter,
                    "vote confirmation replayed; keeping existing vote"
                );
                let tally = VoteTally::count(tables.votes(&dispute_id), min_votes);
                return Ok((dispute_id, tally));
            }

            let dispute = tables.dispute(&dispute_id).ok_or_else(|| {
                AppError::NotFound(format!("dispute {dispute_id}"))
            })?;
            VoteTally::check_voter(dispute, tables.votes(&dispute_id), voter)?;
            let vote = Vote::cast(dispute_id, voter, choice, reason)?;

            tables
                .dispute_mut(&dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?
                .begin_voting()?;
            let votes = tables.votes_mut(dispute_id);
            votes.push(vote);
            let tally = VoteTally::count(votes, min_votes);
            Ok((dispute_id, tally))
        })
    }

    // ── Resolve ─────────────────────────────────────────────────────────

    /// Resolve a dispute directly. No quorum guard; the tally decides.
    ///
    /// `resolver` of `None` means an unbound admin token; bound callers must
    /// be a party to the dispute.
    pub fn resolve_direct(
        &self,
        dispute_id: DisputeId,
        resolver: Option<UserId>,
    ) -> Result<(Dispute, DisputeOutcome), AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables_mut(|tables| {
            let dispute = tables
                .dispute(&dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
            if let Some(user) = resolver {
                if !dispute.is_party(user) {
                    return Err(AppError::Forbidden(format!(
                        "user {user} is not a party to dispute {dispute_id}"
                    )));
                }
            }
            let outcome = VoteTally::count(tables.votes(&dispute_id), min_votes).outcome();
            Self::resolve_in(tables, dispute_id, outcome)
        })
    }

    /// Validate that a ledger resolution instruction may be built.
    ///
    /// Quorum-gated, unlike the direct path. Returns the ledger reference.
    pub fn precheck_init_resolve(&self, dispute_id: &DisputeId) -> Result<u64, AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables(|tables| {
            let dispute = tables
                .dispute(dispute_id)
                .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
            let tally = VoteTally::count(tables.votes(dispute_id), min_votes);
            tally.check_resolvable(dispute)?;
            dispute.on_chain_dispute_id.ok_or_else(|| {
                AppError::Conflict(format!("dispute {dispute_id} is not ledger-backed"))
            })
        })
    }

    /// Record a resolution whose transaction was confirmed on-ledger.
    ///
    /// Idempotent: a replayed confirmation of an already-resolved dispute
    /// returns it unchanged. The outcome is decided from the tally at
    /// confirmation time.
    pub fn resolve_confirmed(
        &self,
        on_chain_dispute_id: u64,
    ) -> Result<(Dispute, DisputeOutcome), AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables_mut(|tables| {
            let dispute = tables
                .dispute_by_chain_id(on_chain_dispute_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "no dispute with ledger reference {on_chain_dispute_id}"
                    ))
                })?;
            let dispute_id = dispute.id;
            if let Some(outcome) = dispute.outcome {
                tracing::debug!(
                    %dispute_id,
                    on_chain_dispute_id,
                    "resolve confirmation replayed; dispute already resolved"
                );
                return Ok((dispute.clone(), outcome));
            }
            let outcome = VoteTally::count(tables.votes(&dispute_id), min_votes).outcome();
            Self::resolve_in(tables, dispute_id, outcome)
        })
    }

    /// Apply a status update reported by the ledger authority (webhook path).
    ///
    /// Keyed on the ledger-assigned dispute reference. Redelivery of a
    /// terminal status is a no-op. An unrecognized status string leaves the
    /// dispute's current status in place instead of rejecting the delivery;
    /// this fail-open mapping is a documented weakness of the protocol, kept
    /// deliberately pending a product decision.
    ///
    /// A recognized status that is invalid for the dispute's current state
    /// is rejected as a conflict, not swallowed: a stale `VOTING` delivered
    /// after a local appeal surfaces the state divergence to the oracle
    /// instead of silently regressing the dispute.
    pub fn apply_ledger_update(
        &self,
        on_chain_dispute_id: u64,
        status: &str,
        winning_party: Option<DisputeOutcome>,
    ) -> Result<Dispute, AppError> {
        let min_votes = self.min_votes;
        self.store.with_tables_mut(|tables| {
            let dispute = tables
                .dispute_by_chain_id(on_chain_dispute_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "no dispute with ledger reference {on_chain_dispute_id}"
                    ))
                })?;
            let dispute_id = dispute.id;
            if dispute.status.is_terminal() {
                tracing::debug!(
                    %dispute_id,
                    on_chain_dispute_id,
                    status,
                    "webhook redelivery on resolved dispute; no-op"
                );
                return Ok(dispute.clone());
            }
            match status {
                "RESOLVED" => {
                    let outcome = winning_party.unwrap_or_else(|| {
                        VoteTally::count(tables.votes(&dispute_id), min_votes).outcome()
                    });
                    let (dispute, _) = Self::resolve_in(tables, dispute_id, outcome)?;
                    Ok(dispute)
                }
                "VOTING" => {
                    let dispute = tables
                        .dispute_mut(&dispute_id)
                        .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
                    dispute.begin_voting()?;
                    Ok(dispute.clone())
                }
                "APPEALED" => {
                    let dispute = tables
                        .dispute_mut(&dispute_id)
                        .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
                    dispute.mark_appealed()?;
                    Ok(dispute.clone())
                }
                other => {
                    tracing::warn!(
                        %dispute_id,
                        on_chain_dispute_id,
                        status = other,
                        "unrecognized ledger status; keeping current dispute status"
                    );
                    Ok(dispute.clone())
                }
            }
        })
    }

    /// Shared resolution body: one-shot resolve plus the job cascade.
    fn resolve_in(
        tables: &mut Tables,
        dispute_id: DisputeId,
        outcome: DisputeOutcome,
    ) -> Result<(Dispute, DisputeOutcome), AppError> {
        let dispute = tables
            .dispute_mut(&dispute_id)
            .ok_or_else(|| AppError::NotFound(format!("dispute {dispute_id}")))?;
        dispute.resolve(outcome)?;
        let job_id = dispute.job_id;
        let dispute = dispute.clone();

        // Cascade: the outcome settles the job unconditionally, regardless
        // of milestone approval state.
        let job = tables
            .job_mut(&job_id)
            .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
        match outcome {
            DisputeOutcome::FavorWorker => job.complete()?,
            DisputeOutcome::FavorClient => job.cancel()?,
        }
        // Mirror the escrow payout when funds were actually locked.
        if matches!(
            job.escrow_status,
            EscrowStatus::Funded | EscrowStatus::PartiallyReleased
        ) {
            job.advance_escrow(EscrowStatus::Released)?;
        }
        Ok((dispute, outcome))
    }

    // ── Escrow ──────────────────────────────────────────────────────────

    /// Validate an escrow-create instruction request. Returns (client, worker).
    pub fn precheck_escrow_create(
        &self,
        job_id: &JobId,
        caller: Option<UserId>,
    ) -> Result<(UserId, UserId), AppError> {
        self.store.with_tables(|tables| {
            let job = tables
                .job(job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            Self::require_client(job, caller)?;
            let worker = job
                .worker
                .ok_or_else(|| AppError::Conflict(format!("job {job_id} has no worker assigned")))?;
            if job.escrow_status != EscrowStatus::NotCreated {
                return Err(AppError::Conflict(format!(
                    "job {job_id} escrow already {}",
                    job.escrow_status
                )));
            }
            Ok((job.client, worker))
        })
    }

    /// Record a confirmed escrow creation. Idempotent.
    ///
    /// Assigns each milestone its on-ledger index in declaration order.
    pub fn record_escrow_created(&self, job_id: JobId) -> Result<Job, AppError> {
        self.store.with_tables_mut(|tables| {
            let job = tables
                .job_mut(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            if job.escrow_status != EscrowStatus::NotCreated {
                tracing::debug!(%job_id, "escrow-create confirmation replayed");
                return Ok(job.clone());
            }
            job.advance_escrow(EscrowStatus::Created)?;
            for (index, milestone) in job.milestones.iter_mut().enumerate() {
                milestone.on_chain_index = Some(index as u64);
            }
            Ok(job.clone())
        })
    }

    /// Validate an escrow-fund instruction request.
    pub fn precheck_escrow_fund(
        &self,
        job_id: &JobId,
        caller: Option<UserId>,
    ) -> Result<(), AppError> {
        self.store.with_tables(|tables| {
            let job = tables
                .job(job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            Self::require_client(job, caller)?;
            if job.escrow_status != EscrowStatus::Created {
                return Err(AppError::Conflict(format!(
                    "job {job_id} escrow is {}, expected CREATED",
                    job.escrow_status
                )));
            }
            Ok(())
        })
    }

    /// Record a confirmed escrow funding. Idempotent.
    pub fn record_escrow_funded(&self, job_id: JobId) -> Result<Job, AppError> {
        self.store.with_tables_mut(|tables| {
            let job = tables
                .job_mut(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            if job.escrow_status != EscrowStatus::NotCreated
                && job.escrow_status != EscrowStatus::Created
            {
                tracing::debug!(%job_id, "escrow-fund confirmation replayed");
                return Ok(job.clone());
            }
            job.advance_escrow(EscrowStatus::Funded)?;
            Ok(job.clone())
        })
    }

    /// Validate a milestone-release instruction request. Returns the
    /// milestone's on-ledger index.
    pub fn precheck_milestone_release(
        &self,
        job_id: &JobId,
        milestone_id: &MilestoneId,
        caller: Option<UserId>,
    ) -> Result<u64, AppError> {
        self.store.with_tables(|tables| {
            let job = tables
                .job(job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            Self::require_client(job, caller)?;
            if !matches!(
                job.escrow_status,
                EscrowStatus::Funded | EscrowStatus::PartiallyReleased
            ) {
                return Err(AppError::Conflict(format!(
                    "job {job_id} escrow is {}, funds are not releasable",
                    job.escrow_status
                )));
            }
            let milestone = job
                .milestones
                .iter()
                .find(|m| m.id == *milestone_id)
                .ok_or_else(|| AppError::NotFound(format!("milestone {milestone_id}")))?;
            if milestone.status == openlance_core::MilestoneStatus::Approved {
                return Err(AppError::Conflict(format!(
                    "milestone {milestone_id} is already approved"
                )));
            }
            milestone.on_chain_index.ok_or_else(|| {
                AppError::Conflict(format!("milestone {milestone_id} has no ledger index"))
            })
        })
    }

    /// Record a confirmed milestone release. Idempotent.
    ///
    /// Approving the final milestone cascades: escrow → RELEASED and the
    /// job completes.
    pub fn record_milestone_released(
        &self,
        job_id: JobId,
        milestone_id: MilestoneId,
    ) -> Result<(Job, bool), AppError> {
        self.store.with_tables_mut(|tables| {
            let job = tables
                .job_mut(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {job_id}")))?;
            let already_approved = job
                .milestones
                .iter()
                .find(|m| m.id == milestone_id)
                .map(|m| m.status == openlance_core::MilestoneStatus::Approved)
                .ok_or_else(|| AppError::NotFound(format!("milestone {milestone_id}")))?;
            if already_approved {
                tracing::debug!(%job_id, %milestone_id, "milestone-release confirmation replayed");
                return Ok((job.clone(), job.all_milestones_approved()));
            }

            let all_approved = job.approve_milestone(milestone_id)?;
            if all_approved {
                job.advance_escrow(EscrowStatus::Released)?;
                job.complete()?;
            } else {
                // First release moves Funded → PartiallyReleased; later ones
                // are PartiallyReleased → PartiallyReleased.
                job.advance_escrow(EscrowStatus::PartiallyReleased)?;
            }
            Ok((job.clone(), all_approved))
        })
    }

    fn require_client(job: &Job, caller: Option<UserId>) -> Result<(), AppError> {
        if let Some(user) = caller {
            if user != job.client {
                return Err(AppError::Forbidden(format!(
                    "user {user} is not the client on job {}",
                    job.id
                )));
            }
        }
        Ok(())
    }
}
