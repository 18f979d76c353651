//! # Transaction Reconciliation
//!
//! Closes the loop on the two-phase settlement protocol. The caller signed
//! and broadcast an instruction with their own wallet; they now report the
//! transaction hash together with the action it encoded, and the reconciler
//! verifies finality with the gateway before committing the local mutation.
//!
//! Anything short of [`TxFinality::Finalized`] rejects the confirmation; the
//! caller re-calls confirm-tx once the transaction has had time to finalize.
//! The local mutations themselves are idempotent (resulting-row presence is
//! the guard, not hash dedup), so replaying a confirmation is safe.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openlance_core::{Job, JobId, MilestoneId, TxHash, UserId};
use openlance_dispute::{Dispute, DisputeId, DisputeOutcome, VoteChoice, VoteTally};
use openlance_settlement::{SettlementGateway, TxFinality};

use crate::error::AppError;
use crate::service::DisputeLifecycleService;

/// The action a confirmed settlement transaction encoded, with the original
/// intent parameters.
///
/// Tagged dispatch: each variant carries only the fields its mutation needs,
/// so a confirm-tx body missing a required field fails deserialization
/// instead of reaching the mutation half-formed.
///
/// Fields are camelCase on the wire, matching the other ledger-facing
/// payload (the on-chain-update webhook).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConfirmAction {
    /// A raise-dispute transaction. Creates the local dispute row.
    #[serde(rename_all = "camelCase")]
    RaiseDispute {
        /// The disputed job.
        job_id: JobId,
        /// The party who raised the dispute.
        raised_by: UserId,
        /// Why the dispute was raised.
        reason: String,
        /// Dispute reference the ledger assigned, read from the receipt.
        on_chain_dispute_id: u64,
    },
    /// A cast-vote transaction. Creates the local vote row.
    #[serde(rename_all = "camelCase")]
    CastVote {
        /// Ledger-assigned dispute reference.
        on_chain_dispute_id: u64,
        /// The voting community member.
        voter: UserId,
        /// The vote direction.
        choice: VoteChoice,
        /// Why the voter chose this direction.
        reason: String,
    },
    /// A resolve-dispute transaction. Resolves from the tally at
    /// confirmation time.
    #[serde(rename_all = "camelCase")]
    ResolveDispute {
        /// Ledger-assigned dispute reference.
        on_chain_dispute_id: u64,
    },
    /// An escrow-creation transaction.
    #[serde(rename_all = "camelCase")]
    CreateEscrow {
        /// The job the escrow was created for.
        job_id: JobId,
    },
    /// An escrow-funding transaction.
    #[serde(rename_all = "camelCase")]
    FundEscrow {
        /// The job whose escrow was funded.
        job_id: JobId,
    },
    /// A milestone-release transaction.
    #[serde(rename_all = "camelCase")]
    ReleaseMilestone {
        /// The job whose escrow was drawn down.
        job_id: JobId,
        /// The released milestone.
        milestone_id: MilestoneId,
    },
}

/// What a successful confirmation did locally.
#[derive(Debug, Clone)]
pub enum ConfirmOutcome {
    /// A dispute row now exists.
    DisputeRaised(Dispute),
    /// A vote row now exists; the tally reflects it.
    VoteRecorded {
        /// The dispute voted on.
        dispute_id: DisputeId,
        /// Tally including the confirmed vote.
        tally: VoteTally,
    },
    /// The dispute is resolved and the job cascade applied.
    DisputeResolved {
        /// The resolved dispute.
        dispute: Dispute,
        /// The outcome decided from the tally at confirmation time.
        outcome: DisputeOutcome,
    },
    /// Escrow exists on the ledger; milestones carry their indices.
    EscrowCreated(Job),
    /// Escrow holds the full job amount.
    EscrowFunded(Job),
    /// One milestone released; `job_completed` when it was the last.
    MilestoneReleased {
        /// The job after the release.
        job: Job,
        /// Whether this release completed the job.
        job_completed: bool,
    },
}

/// Verifies reported transaction hashes and applies the matching local
/// mutation.
#[derive(Clone)]
pub struct TransactionReconciler {
    gateway: Arc<dyn SettlementGateway>,
    service: DisputeLifecycleService,
}

impl TransactionReconciler {
    /// Create a reconciler over the given gateway and lifecycle service.
    pub fn new(gateway: Arc<dyn SettlementGateway>, service: DisputeLifecycleService) -> Self {
        Self { gateway, service }
    }

    /// Verify the transaction reached finality, then commit the mutation.
    ///
    /// The gateway polls with a fixed attempt budget; a transaction that is
    /// still pending when the budget runs out is rejected and the caller
    /// must re-call confirm-tx later. No lock is held during the poll; the
    /// mutation itself re-validates under the store lock.
    pub async fn confirm(
        &self,
        tx_hash: &TxHash,
        action: ConfirmAction,
    ) -> Result<ConfirmOutcome, AppError> {
        let finality = self.gateway.verify_finalized(tx_hash).await?;
        if finality != TxFinality::Finalized {
            tracing::warn!(
                tx_hash = %tx_hash,
                %finality,
                "confirmation rejected; transaction not finalized"
            );
            return Err(AppError::SettlementFailed(format!(
                "transaction {tx_hash} observed as {finality}, not FINALIZED"
            )));
        }
        tracing::info!(tx_hash = %tx_hash, action = ?action_label(&action), "transaction finalized");

        match action {
            ConfirmAction::RaiseDispute {
                job_id,
                raised_by,
                reason,
                on_chain_dispute_id,
            } => {
                let dispute =
                    self.service
                        .record_raised(job_id, raised_by, &reason, on_chain_dispute_id)?;
                Ok(ConfirmOutcome::DisputeRaised(dispute))
            }
            ConfirmAction::CastVote {
                on_chain_dispute_id,
                voter,
                choice,
                reason,
            } => {
                let (dispute_id, tally) =
                    self.service
                        .record_confirmed_vote(on_chain_dispute_id, voter, choice, &reason)?;
                Ok(ConfirmOutcome::VoteRecorded { dispute_id, tally })
            }
            ConfirmAction::ResolveDispute {
                on_chain_dispute_id,
            } => {
                let (dispute, outcome) = self.service.resolve_confirmed(on_chain_dispute_id)?;
                Ok(ConfirmOutcome::DisputeResolved { dispute, outcome })
            }
            ConfirmAction::CreateEscrow { job_id } => {
                let job = self.service.record_escrow_created(job_id)?;
                Ok(ConfirmOutcome::EscrowCreated(job))
            }
            ConfirmAction::FundEscrow { job_id } => {
                let job = self.service.record_escrow_funded(job_id)?;
                Ok(ConfirmOutcome::EscrowFunded(job))
            }
            ConfirmAction::ReleaseMilestone {
                job_id,
                milestone_id,
            } => {
                let (job, job_completed) =
                    self.service.record_milestone_released(job_id, milestone_id)?;
                Ok(ConfirmOutcome::MilestoneReleased { job, job_completed })
            }
        }
    }
}

fn action_label(action: &ConfirmAction) -> &'static str {
    match action {
        ConfirmAction::RaiseDispute { .. } => "RAISE_DISPUTE",
        ConfirmAction::CastVote { .. } => "CAST_VOTE",
        ConfirmAction::ResolveDispute { .. } => "RESOLVE_DISPUTE",
        ConfirmAction::CreateEscrow { .. } => "CREATE_ESCROW",
        ConfirmAction::FundEscrow { .. } => "FUND_ESCROW",
        ConfirmAction::ReleaseMilestone { .. } => "RELEASE_MILESTONE",
    }
}
