//! Outbound notifications for dispute and settlement events.
//!
//! Notification dispatch is fire-and-forget: a delivery failure is logged
//! and swallowed, never surfaced to the request that triggered it. The
//! marketplace must keep working when the notification channel is down.

use async_trait::async_trait;

use openlance_core::{JobId, UserId};
use openlance_dispute::{DisputeId, DisputeOutcome};

/// Events worth telling the bound parties about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyEvent {
    /// A dispute was raised on a job.
    DisputeRaised {
        dispute_id: DisputeId,
        job_id: JobId,
        raised_by: UserId,
    },
    /// A dispute was resolved.
    DisputeResolved {
        dispute_id: DisputeId,
        job_id: JobId,
        outcome: DisputeOutcome,
    },
    /// All milestones approved; escrow fully released.
    JobCompleted { job_id: JobId },
}

/// Outbound notification channel.
///
/// Implementations must be infallible from the caller's point of view:
/// swallow and log delivery errors internally.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver an event. Must not fail the calling request.
    async fn notify(&self, event: NotifyEvent);
}

/// Default notifier that writes events to the tracing log.
///
/// Production deployments swap in an email/push implementation; the handler
/// code does not change.
#[derive(Debug, Default)]
pub struct TracingNotifier;

#[async_trait]
impl Notifier for TracingNotifier {
    async fn notify(&self, event: NotifyEvent) {
        match &event {
            NotifyEvent::DisputeRaised {
                dispute_id,
                job_id,
                raised_by,
            } => tracing::info!(%dispute_id, %job_id, %raised_by, "dispute raised"),
            NotifyEvent::DisputeResolved {
                dispute_id,
                job_id,
                outcome,
            } => tracing::info!(%dispute_id, %job_id, %outcome, "dispute resolved"),
            NotifyEvent::JobCompleted { job_id } => {
                tracing::info!(%job_id, "job completed")
            }
        }
    }
}
