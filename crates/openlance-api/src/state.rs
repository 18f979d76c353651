//! # Application State
//!
//! In-memory storage and shared application state for the API layer.
//!
//! All marketplace tables (jobs, disputes, votes) live behind a single
//! [`parking_lot::RwLock`] so that every check-then-write — duplicate-vote
//! detection, one-shot resolution, the job cascade — runs atomically inside
//! one write-lock closure. Handlers never hold the lock across an `.await`.

use std::collections::HashMap;
use std::sync::Arc;

use ed25519_dalek::VerifyingKey;
use parking_lot::RwLock;

use openlance_core::{Job, JobId};
use openlance_dispute::{Dispute, DisputeId, Vote};
use openlance_settlement::SettlementGateway;

use crate::notify::Notifier;

/// Default quorum for ledger-path dispute resolution.
pub const DEFAULT_MIN_VOTES: usize = 3;

// ── Tables ──────────────────────────────────────────────────────────────────

/// The marketplace tables. Only ever touched under the store's lock.
#[derive(Debug, Default)]
pub struct Tables {
    /// Jobs by id.
    pub jobs: HashMap<JobId, Job>,
    /// Disputes by id.
    pub disputes: HashMap<DisputeId, Dispute>,
    /// Votes per dispute, in cast order.
    pub votes: HashMap<DisputeId, Vec<Vote>>,
}

impl Tables {
    /// Look up a job.
    pub fn job(&self, id: &JobId) -> Option<&Job> {
        self.jobs.get(id)
    }

    /// Look up a job for mutation.
    pub fn job_mut(&mut self, id: &JobId) -> Option<&mut Job> {
        self.jobs.get_mut(id)
    }

    /// Look up a dispute.
    pub fn dispute(&self, id: &DisputeId) -> Option<&Dispute> {
        self.disputes.get(id)
    }

    /// Look up a dispute for mutation.
    pub fn dispute_mut(&mut self, id: &DisputeId) -> Option<&mut Dispute> {
        self.disputes.get_mut(id)
    }

    /// Votes cast on a dispute, in cast order.
    pub fn votes(&self, id: &DisputeId) -> &[Vote] {
        self.votes.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Mutable vote list for a dispute, created on first use.
    pub fn votes_mut(&mut self, id: DisputeId) -> &mut Vec<Vote> {
        self.votes.entry(id).or_default()
    }

    /// Find the dispute carrying a ledger-assigned reference.
    pub fn dispute_by_chain_id(&self, on_chain_dispute_id: u64) -> Option<&Dispute> {
        self.disputes
            .values()
            .find(|d| d.on_chain_dispute_id == Some(on_chain_dispute_id))
    }

    /// Find the dispute carrying a ledger-assigned reference, for mutation.
    pub fn dispute_by_chain_id_mut(&mut self, on_chain_dispute_id: u64) -> Option<&mut Dispute> {
        self.disputes
            .values_mut()
            .find(|d| d.on_chain_dispute_id == Some(on_chain_dispute_id))
    }

    /// Find the non-terminal dispute bound to a job, if any.
    ///
    /// Resolved disputes are skipped: a job holds at most one active dispute
    /// but may accumulate resolved ones, and `HashMap` iteration order would
    /// otherwise make the lookup nondeterministic.
    pub fn active_dispute_for_job(&self, job_id: &JobId) -> Option<&Dispute> {
        self.disputes
            .values()
            .find(|d| d.job_id == *job_id && !d.status.is_terminal())
    }
}

// ── DisputeStore ────────────────────────────────────────────────────────────

/// Thread-safe, shared marketplace storage.
///
/// Cloning is cheap (`Arc` internally). All multi-step invariants must run
/// inside a single [`DisputeStore::with_tables_mut`] closure; reading two
/// tables in separate lock acquisitions invites check-then-write races.
#[derive(Clone, Default)]
pub struct DisputeStore {
    inner: Arc<RwLock<Tables>>,
}

impl DisputeStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Run a closure with read access to all tables.
    pub fn with_tables<R>(&self, f: impl FnOnce(&Tables) -> R) -> R {
        f(&self.inner.read())
    }

    /// Run a closure with exclusive access to all tables.
    ///
    /// The closure must not block on I/O; it holds the write lock.
    pub fn with_tables_mut<R>(&self, f: impl FnOnce(&mut Tables) -> R) -> R {
        f(&mut self.inner.write())
    }

    /// Non-blocking check that the table lock is acquirable. Used by the
    /// readiness probe.
    pub fn is_responsive(&self) -> bool {
        self.inner.try_read().is_some()
    }

    /// Snapshot of all jobs.
    pub fn list_jobs(&self) -> Vec<Job> {
        self.inner.read().jobs.values().cloned().collect()
    }

    /// Snapshot of all disputes.
    pub fn list_disputes(&self) -> Vec<Dispute> {
        self.inner.read().disputes.values().cloned().collect()
    }

    /// Look up one job by id.
    pub fn get_job(&self, id: &JobId) -> Option<Job> {
        self.inner.read().jobs.get(id).cloned()
    }

    /// Look up one dispute by id.
    pub fn get_dispute(&self, id: &DisputeId) -> Option<Dispute> {
        self.inner.read().disputes.get(id).cloned()
    }

    /// Snapshot of the votes on a dispute.
    pub fn get_votes(&self, id: &DisputeId) -> Vec<Vote> {
        self.inner.read().votes(id).to_vec()
    }

    /// Insert a job (test setup and job-posting handler).
    pub fn insert_job(&self, job: Job) {
        self.inner.write().jobs.insert(job.id, job);
    }
}

// ── AppConfig / AppState ────────────────────────────────────────────────────

/// Application configuration, read from the environment in `main`.
#[derive(Clone)]
pub struct AppConfig {
    /// Bearer token secret. `None` disables auth (development mode).
    pub auth_token: Option<String>,
    /// Votes required before the ledger resolution path opens.
    pub min_votes: usize,
    /// Oracle verifying key for webhook signatures. `None` accepts
    /// unsigned webhooks (documented weakness, logged at startup).
    pub webhook_oracle_key: Option<VerifyingKey>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            auth_token: None,
            min_votes: DEFAULT_MIN_VOTES,
            webhook_oracle_key: None,
        }
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("auth_token", &self.auth_token.as_ref().map(|_| "[REDACTED]"))
            .field("min_votes", &self.min_votes)
            .field(
                "webhook_oracle_key",
                &self.webhook_oracle_key.as_ref().map(|_| "[configured]"),
            )
            .finish()
    }
}

/// Shared application state injected into every handler.
#[derive(Clone)]
pub struct AppState {
    /// The marketplace tables.
    pub store: DisputeStore,
    /// Settlement ledger access.
    pub gateway: Arc<dyn SettlementGateway>,
    /// Fire-and-forget outbound notifications.
    pub notifier: Arc<dyn Notifier>,
    /// Static configuration.
    pub config: AppConfig,
}

impl AppState {
    /// Assemble application state from its parts.
    pub fn new(
        store: DisputeStore,
        gateway: Arc<dyn SettlementGateway>,
        notifier: Arc<dyn Notifier>,
        config: AppConfig,
    ) -> Self {
        Self {
            store,
            gateway,
            notifier,
            config,
        }
    }
}

/// Decode a hex string into bytes. Used for the webhook oracle key.
pub fn hex_decode(s: &str) -> Option<Vec<u8>> {
    if s.len() % 2 != 0 {
        return None;
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).ok())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use openlance_core::{Milestone, Money, UserId};

    fn sample_job() -> Job {
        Job::post(
            UserId::new(),
            "Logo design",
            "Vector logo with brand guide",
            Money::new("300", "USD").unwrap(),
            vec![Milestone::new(
                "Final logo",
                Money::new("300", "USD").unwrap(),
            )],
        )
    }

    #[test]
    fn insert_and_get_job() {
        let store = DisputeStore::new();
        let job = sample_job();
        let id = job.id;
        store.insert_job(job);
        assert!(store.get_job(&id).is_some());
        assert_eq!(store.list_jobs().len(), 1);
    }

    #[test]
    fn votes_default_empty() {
        let store = DisputeStore::new();
        assert!(store.get_votes(&openlance_dispute::DisputeId::new()).is_empty());
    }

    #[test]
    fn with_tables_mut_sees_consistent_state() {
        let store = DisputeStore::new();
        let job = sample_job();
        let id = job.id;
        store.insert_job(job);

        // A cross-table mutation under one lock.
        let worker = UserId::new();
        store.with_tables_mut(|tables| {
            let job = tables.job_mut(&id).unwrap();
            job.assign_worker(worker).unwrap();
        });
        assert_eq!(store.get_job(&id).unwrap().worker, Some(worker));
    }

    #[test]
    fn dispute_lookup_by_chain_id() {
        let store = DisputeStore::new();
        let client = UserId::new();
        let worker = UserId::new();
        let mut dispute = Dispute::raise(
            JobId::new(),
            client,
            client,
            worker,
            "Deliverable rejected without explanation",
        )
        .unwrap();
        dispute.on_chain_dispute_id = Some(42);
        let id = dispute.id;
        store.with_tables_mut(|t| {
            t.disputes.insert(id, dispute);
        });

        store.with_tables(|t| {
            assert_eq!(t.dispute_by_chain_id(42).unwrap().id, id);
            assert!(t.dispute_by_chain_id(99).is_none());
        });
    }

    #[test]
    fn active_dispute_lookup_skips_resolved_disputes() {
        use openlance_dispute::DisputeOutcome;

        let store = DisputeStore::new();
        let job_id = JobId::new();
        let client = UserId::new();
        let worker = UserId::new();

        let mut resolved = Dispute::raise(
            job_id,
            client,
            client,
            worker,
            "Deliverable rejected without explanation",
        )
        .unwrap();
        resolved.resolve(DisputeOutcome::FavorClient).unwrap();
        let open = Dispute::raise(
            job_id,
            worker,
            client,
            worker,
            "Client withholding the final payment",
        )
        .unwrap();
        let open_id = open.id;
        store.with_tables_mut(|t| {
            t.disputes.insert(resolved.id, resolved);
            t.disputes.insert(open_id, open);
        });

        // Regardless of map iteration order, only the open dispute counts.
        store.with_tables(|t| {
            assert_eq!(t.active_dispute_for_job(&job_id).unwrap().id, open_id);
        });

        store.with_tables_mut(|t| {
            t.dispute_mut(&open_id)
                .unwrap()
                .resolve(DisputeOutcome::FavorWorker)
                .unwrap();
        });
        store.with_tables(|t| {
            assert!(t.active_dispute_for_job(&job_id).is_none());
        });
    }

    #[test]
    fn config_debug_redacts_token() {
        let config = AppConfig {
            auth_token: Some("super-secret".to_string()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn hex_decode_roundtrip() {
        assert_eq!(hex_decode("00ff10"), Some(vec![0x00, 0xff, 0x10]));
        assert!(hex_decode("0").is_none());
        assert!(hex_decode("zz").is_none());
    }
}
