//! Community votes on open disputes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use openlance_core::UserId;

use crate::dispute::DisputeId;
use crate::error::DisputeError;

/// Minimum length of a vote (or dispute) reason, in characters.
pub const MIN_REASON_LEN: usize = 10;

/// Which side of the dispute a vote supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoteChoice {
    /// Support the client's position.
    FavorClient,
    /// Support the worker's position.
    FavorWorker,
}

impl VoteChoice {
    /// The canonical string name of this choice.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FavorClient => "FAVOR_CLIENT",
            Self::FavorWorker => "FAVOR_WORKER",
        }
    }
}

impl std::fmt::Display for VoteChoice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single community member's vote on a dispute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Vote {
    /// Unique vote identifier.
    pub id: Uuid,
    /// The dispute voted on.
    pub dispute_id: DisputeId,
    /// The voting community member.
    pub voter: UserId,
    /// Which side the vote supports.
    pub choice: VoteChoice,
    /// Mandatory justification for the vote.
    pub reason: String,
    /// When the vote was cast.
    pub created_at: DateTime<Utc>,
}

impl Vote {
    /// Create a vote, validating the reason length.
    ///
    /// Eligibility and duplicate checks live in [`crate::tally::VoteTally`];
    /// this constructor only enforces the reason constraint so a malformed
    /// vote can never exist as a value.
    ///
    /// # Errors
    ///
    /// Returns [`DisputeError::ReasonTooShort`] when the reason is under
    /// [`MIN_REASON_LEN`] characters.
    pub fn cast(
        dispute_id: DisputeId,
        voter: UserId,
        choice: VoteChoice,
        reason: impl Into<String>,
    ) -> Result<Self, DisputeError> {
        let reason = reason.into();
        let len = reason.chars().count();
        if len < MIN_REASON_LEN {
            return Err(DisputeError::ReasonTooShort {
                min: MIN_REASON_LEN,
                actual: len,
            });
        }
        Ok(Self {
            id: Uuid::new_v4(),
            dispute_id,
            voter,
            choice,
            reason,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vote_with_adequate_reason() {
        let v = Vote::cast(
            DisputeId::new(),
            UserId::new(),
            VoteChoice::FavorWorker,
            "The delivered work matches the milestone description",
        )
        .unwrap();
        assert_eq!(v.choice, VoteChoice::FavorWorker);
    }

    #[test]
    fn reason_at_exactly_minimum_length() {
        assert!(Vote::cast(
            DisputeId::new(),
            UserId::new(),
            VoteChoice::FavorClient,
            "ten chars!",
        )
        .is_ok());
    }

    #[test]
    fn reason_below_minimum_rejected() {
        let err = Vote::cast(
            DisputeId::new(),
            UserId::new(),
            VoteChoice::FavorClient,
            "too short",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            DisputeError::ReasonTooShort { min: 10, actual: 9 }
        ));
    }

    #[test]
    fn reason_length_counts_characters_not_bytes() {
        // Ten multibyte characters must pass.
        assert!(Vote::cast(
            DisputeId::new(),
            UserId::new(),
            VoteChoice::FavorWorker,
            "très déçu…",
        )
        .is_ok());
    }

    #[test]
    fn choice_serializes_screaming_snake_case() {
        assert_eq!(
            serde_json::to_string(&VoteChoice::FavorWorker).unwrap(),
            "\"FAVOR_WORKER\""
        );
    }
}
