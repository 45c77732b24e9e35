//! Job status polling
//!
//! [`StatusPoller`] repeatedly queries the status of one job id at a fixed
//! cadence until the job reaches a terminal state, the session gate turns
//! inactive, or the poller is cancelled.
//!
//! # Non-overlap invariant
//!
//! A new status request is never issued while a previous one from the same
//! poller is still outstanding. Each tick awaits its request to completion
//! before the next tick is considered, and ticks missed during a slow request
//! are skipped, not bunched ([`MissedTickBehavior::Skip`]). Outstanding
//! requests per job id are therefore bounded at one, which matters under slow
//! networks.
//!
//! # Example
//!
//! ```no_run
//! use artifact_dl::client::HttpJobsApi;
//! use artifact_dl::config::ApiConfig;
//! use artifact_dl::poller::StatusPoller;
//! use artifact_dl::types::JobId;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> artifact_dl::Result<()> {
//! let api = Arc::new(HttpJobsApi::new(&ApiConfig::default())?);
//! let poller = StatusPoller::new(api, JobId::new("task-uuid"), Duration::from_secs(2));
//!
//! let mut latest = poller.subscribe();
//! tokio::spawn(async move {
//!     while latest.changed().await.is_ok() {
//!         if let Some(snapshot) = latest.borrow().clone() {
//!             println!("status: {:?}", snapshot.status);
//!         }
//!     }
//! });
//!
//! let terminal = poller.run().await;
//! println!("job finished: {:?}", terminal);
//! # Ok(())
//! # }
//! ```

use crate::client::JobsApi;
use crate::error::Error;
use crate::types::{JobId, JobStatusSnapshot};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Condition gating whether polling may issue requests right now
///
/// Re-evaluated before every tick. The dispatcher supplies a predicate over
/// the session credential and the download capability, so no authenticated
/// request is issued after logout.
pub trait SessionGate: Send + Sync {
    /// Whether requests may be issued at this moment
    fn is_active(&self) -> bool;
}

impl<F> SessionGate for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn is_active(&self) -> bool {
        self()
    }
}

/// Gate that is always active (no session checks)
pub struct AlwaysActive;

impl SessionGate for AlwaysActive {
    fn is_active(&self) -> bool {
        true
    }
}

/// Result of one polling tick
#[derive(Debug)]
pub enum PollOutcome {
    /// The session gate is inactive; no request was issued
    Disabled,
    /// The server does not know the job yet (404) — retry next tick
    NotYetAvailable,
    /// The status query failed for a transport-level reason — retry next tick
    TransportError(Error),
    /// The status query succeeded
    Snapshot(JobStatusSnapshot),
}

/// Polls the status of one job at a fixed cadence
///
/// See the module docs for the non-overlap invariant. The most recent
/// snapshot is exposed through [`subscribe`](StatusPoller::subscribe) for
/// observers such as progress displays.
pub struct StatusPoller {
    api: Arc<dyn JobsApi>,
    job_id: JobId,
    interval: Duration,
    gate: Arc<dyn SessionGate>,
    cancel: CancellationToken,
    latest_tx: watch::Sender<Option<JobStatusSnapshot>>,
}

impl StatusPoller {
    /// Create a poller for the given job id
    ///
    /// Defaults to an always-active gate and a private cancellation token;
    /// use [`with_gate`](Self::with_gate) and
    /// [`with_cancellation`](Self::with_cancellation) to share the caller's.
    pub fn new(api: Arc<dyn JobsApi>, job_id: JobId, interval: Duration) -> Self {
        let (latest_tx, _rx) = watch::channel(None);
        Self {
            api,
            job_id,
            interval,
            gate: Arc::new(AlwaysActive),
            cancel: CancellationToken::new(),
            latest_tx,
        }
    }

    /// Replace the session gate
    pub fn with_gate(mut self, gate: Arc<dyn SessionGate>) -> Self {
        self.gate = gate;
        self
    }

    /// Replace the cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// The job id this poller watches
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Watch the most recent status snapshot
    pub fn subscribe(&self) -> watch::Receiver<Option<JobStatusSnapshot>> {
        self.latest_tx.subscribe()
    }

    /// Issue one guarded status query
    ///
    /// Checks the gate first; a request failure is folded into the outcome
    /// rather than raised, so a single bad tick never tears the poller down.
    pub async fn tick(&mut self) -> PollOutcome {
        if !self.gate.is_active() {
            return PollOutcome::Disabled;
        }

        match self.api.job_status(&self.job_id).await {
            Ok(snapshot) => {
                self.latest_tx.send_replace(Some(snapshot.clone()));
                PollOutcome::Snapshot(snapshot)
            }
            Err(e) if e.is_not_found() => PollOutcome::NotYetAvailable,
            Err(e) => PollOutcome::TransportError(e),
        }
    }

    /// Poll at the fixed cadence until the job reaches a terminal state
    ///
    /// Returns the terminal snapshot, or `None` when the poller stopped for
    /// another reason (cancelled, or the gate turned inactive). Soft failures
    /// — "not found" and transport errors — are logged and polling continues
    /// on the next interval.
    pub async fn run(mut self) -> Option<JobStatusSnapshot> {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(task_id = %self.job_id, "poller cancelled");
                    return None;
                }
                _ = ticker.tick() => {}
            }

            match self.tick().await {
                PollOutcome::Disabled => {
                    debug!(task_id = %self.job_id, "session gate inactive, poller stopping");
                    return None;
                }
                PollOutcome::NotYetAvailable => {
                    debug!(task_id = %self.job_id, "job not registered server-side yet");
                }
                PollOutcome::TransportError(e) => {
                    warn!(task_id = %self.job_id, error = %e, "status query failed, retrying next tick");
                }
                PollOutcome::Snapshot(snapshot) => {
                    if snapshot.status.is_terminal() {
                        debug!(task_id = %self.job_id, status = ?snapshot.status, "job reached terminal status");
                        return Some(snapshot);
                    }
                    debug!(task_id = %self.job_id, status = ?snapshot.status, "job still running");
                }
            }
        }
    }
}
