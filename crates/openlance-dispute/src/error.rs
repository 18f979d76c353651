//! Errors for the dispute arbitration domain.

use thiserror::Error;

use openlance_core::UserId;

use crate::dispute::{DisputeId, DisputeStatus};

/// Errors produced by dispute lifecycle and voting operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DisputeError {
    /// Attempted a status transition the lifecycle does not allow.
    #[error("invalid dispute transition from {from} to {to}: {reason}")]
    InvalidTransition {
        /// Status the dispute was in.
        from: DisputeStatus,
        /// Status the transition targeted.
        to: DisputeStatus,
        /// Why the transition was rejected.
        reason: String,
    },

    /// The dispute has already been resolved; resolution is one-shot.
    #[error("dispute {0} is already resolved")]
    AlreadyResolved(DisputeId),

    /// A bound party (client or worker) attempted to vote on its own dispute.
    #[error("user {0} is a party to the dispute and cannot vote")]
    PartyCannotVote(UserId),

    /// The voter has already cast a vote on this dispute.
    #[error("user {voter} has already voted on dispute {dispute_id}")]
    DuplicateVote {
        /// The dispute voted on.
        dispute_id: DisputeId,
        /// The repeat voter.
        voter: UserId,
    },

    /// A vote reason fell below the minimum length.
    #[error("vote reason must be at least {min} characters, got {actual}")]
    ReasonTooShort {
        /// Minimum accepted length.
        min: usize,
        /// Length actually supplied.
        actual: usize,
    },

    /// Fewer votes than the quorum requires.
    #[error("dispute {dispute_id} has {votes} votes, quorum requires {min_votes}")]
    QuorumNotMet {
        /// The dispute in question.
        dispute_id: DisputeId,
        /// Votes cast so far.
        votes: usize,
        /// Votes required to resolve.
        min_votes: usize,
    },

    /// The actor is neither the client nor the worker on the dispute.
    #[error("user {user} is not a party to dispute {dispute_id}")]
    NotAParty {
        /// The dispute in question.
        dispute_id: DisputeId,
        /// The non-party actor.
        user: UserId,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_carries_dispute_context() {
        let id = DisputeId::new();
        let err = DisputeError::QuorumNotMet {
            dispute_id: id,
            votes: 1,
            min_votes: 3,
        };
        let msg = err.to_string();
        assert!(msg.contains(&id.to_string()));
        assert!(msg.contains("quorum requires 3"));
    }

    #[test]
    fn reason_too_short_display() {
        let err = DisputeError::ReasonTooShort { min: 10, actual: 4 };
        assert!(err.to_string().contains("at least 10"));
    }

    #[test]
    fn invalid_transition_display() {
        let err = DisputeError::InvalidTransition {
            from: DisputeStatus::Resolved,
            to: DisputeStatus::Voting,
            reason: "terminal".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("RESOLVED"));
        assert!(msg.contains("VOTING"));
    }
}
