//! # openlance-dispute — Dispute Arbitration Domain
//!
//! Pure domain logic for marketplace dispute resolution:
//!
//! - [`Dispute`] — the lifecycle state machine
//!   (`Open → Voting → Resolved`, with `Appealed` reachable pre-resolution)
//! - [`Vote`] / [`VoteChoice`] — community votes with mandatory reasons
//! - [`VoteTally`] — eligibility, duplicate rejection, quorum, and the
//!   outcome decision
//!
//! No I/O, no locking, no async. The API layer owns storage and atomicity;
//! everything here operates on values it is handed.

pub mod dispute;
pub mod error;
pub mod tally;
pub mod vote;

pub use dispute::{Dispute, DisputeId, DisputeOutcome, DisputeStatus, TransitionRecord};
pub use error::DisputeError;
pub use tally::VoteTally;
pub use vote::{Vote, VoteChoice, MIN_REASON_LEN};
