//! # openlance-core — Shared Domain Primitives
//!
//! Foundation types used across the Openlance marketplace core:
//!
//! - Identifiers: [`UserId`], [`JobId`], [`MilestoneId`], [`TxHash`]
//! - Monetary amounts: [`Money`] (decimal strings, never floats)
//! - The job lifecycle: [`Job`], [`JobStatus`], [`Milestone`],
//!   [`MilestoneStatus`], [`EscrowStatus`]
//!
//! This crate has no I/O and no async; it is pure domain vocabulary shared
//! by the dispute, settlement, and API layers.

pub mod error;
pub mod ids;
pub mod job;
pub mod money;

pub use error::ValidationError;
pub use ids::{JobId, MilestoneId, TxHash, UserId};
pub use job::{EscrowStatus, Job, JobStatus, Milestone, MilestoneStatus};
pub use money::Money;
