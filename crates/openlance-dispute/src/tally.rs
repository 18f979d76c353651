//! # Vote Tally
//!
//! The single decision point for vote eligibility, quorum, and outcome.
//! Every path that mutates votes or resolves a dispute — direct API calls
//! and confirmed ledger transactions alike — must go through these
//! functions so the two paths cannot drift apart.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use openlance_core::UserId;

use crate::dispute::{Dispute, DisputeOutcome, DisputeStatus};
use crate::error::DisputeError;
use crate::vote::{Vote, VoteChoice};

/// Counted votes for a dispute, with the quorum threshold they are judged
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct VoteTally {
    /// Votes supporting the client.
    pub votes_for_client: usize,
    /// Votes supporting the worker.
    pub votes_for_worker: usize,
    /// Votes required before the dispute may resolve through the ledger path.
    pub min_votes: usize,
}

impl VoteTally {
    /// Count the votes cast on a dispute.
    pub fn count(votes: &[Vote], min_votes: usize) -> Self {
        let votes_for_client = votes
            .iter()
            .filter(|v| v.choice == VoteChoice::FavorClient)
            .count();
        let votes_for_worker = votes.len() - votes_for_client;
        Self {
            votes_for_client,
            votes_for_worker,
            min_votes,
        }
    }

    /// Total votes cast.
    pub fn total(&self) -> usize {
        self.votes_for_client + self.votes_for_worker
    }

    /// Whether enough votes have been cast to meet quorum.
    pub fn has_quorum(&self) -> bool {
        self.total() >= self.min_votes
    }

    /// Decide the outcome from the current counts.
    ///
    /// Ties resolve in the client's favor. The asymmetry is deliberate
    /// marketplace policy (the client funded the escrow) and is surfaced
    /// here rather than buried in a comparison operator.
    pub fn outcome(&self) -> DisputeOutcome {
        if self.votes_for_worker > self.votes_for_client {
            DisputeOutcome::FavorWorker
        } else {
            DisputeOutcome::FavorClient
        }
    }

    /// Check that a voter may cast a vote on the dispute.
    ///
    /// # Errors
    ///
    /// - [`DisputeError::InvalidTransition`] when the dispute is resolved
    /// - [`DisputeError::PartyCannotVote`] for the client or worker
    /// - [`DisputeError::DuplicateVote`] when the voter already voted
    pub fn check_voter(
        dispute: &Dispute,
        existing_votes: &[Vote],
        voter: UserId,
    ) -> Result<(), DisputeError> {
        if dispute.status.is_terminal() {
            return Err(DisputeError::InvalidTransition {
                from: dispute.status,
                to: DisputeStatus::Voting,
                reason: "dispute already resolved".to_string(),
            });
        }
        if dispute.is_party(voter) {
            return Err(DisputeError::PartyCannotVote(voter));
        }
        if existing_votes.iter().any(|v| v.voter == voter) {
            return Err(DisputeError::DuplicateVote {
                dispute_id: dispute.id,
                voter,
            });
        }
        Ok(())
    }

    /// Check that the dispute may resolve through the quorum-gated path.
    ///
    /// # Errors
    ///
    /// - [`DisputeError::AlreadyResolved`] once resolved
    /// - [`DisputeError::QuorumNotMet`] below the vote threshold
    pub fn check_resolvable(&self, dispute: &Dispute) -> Result<(), DisputeError> {
        if dispute.status == DisputeStatus::Resolved {
            return Err(DisputeError::AlreadyResolved(dispute.id));
        }
        if !self.has_quorum() {
            return Err(DisputeError::QuorumNotMet {
                dispute_id: dispute.id,
                votes: self.total(),
                min_votes: self.min_votes,
            });
        }
        Ok(())
    }
}
