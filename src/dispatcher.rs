//! Sequential download dispatcher
//!
//! The dispatcher turns the task registry into delivered files or reported
//! failures, strictly one task at a time in FIFO enqueue order. It drives a
//! [`StatusPoller`] for the head task; on SUCCESS it fetches the artifact and
//! writes it into the download directory, on FAILURE it reports the server's
//! error message; in both cases the task is then removed and the next head
//! takes its place. A later task's status is never queried before the earlier
//! task has been fully resolved.
//!
//! Per-task state machine:
//!
//! ```text
//! ENQUEUED -> POLLING -> DOWNLOADING -> DELIVERED (removed)
//!                    \-> FAILED (removed)
//! ```
//!
//! POLLING may persist indefinitely while the status endpoint reports "not
//! found" (the job has not materialized server-side yet) or non-terminal
//! progress, unless a cap is configured in [`PollingConfig`].
//!
//! The loop runs as a single spawned task; one cycle at a time by
//! construction, so status queries and deliveries never overlap. It only
//! issues requests while the injected [`SessionGate`] reports the session
//! active, and stops entirely when cancelled.
//!
//! [`PollingConfig`]: crate::config::PollingConfig
//!
//! # Example
//!
//! ```no_run
//! use artifact_dl::{Config, DownloadDispatcher, DownloadTask};
//!
//! # async fn example() -> artifact_dl::Result<()> {
//! let dispatcher = DownloadDispatcher::from_config(Config::default())?;
//! let registry = dispatcher.registry().clone();
//! let handle = dispatcher.start();
//!
//! // The bulk-operation layer enqueues a task when the server accepts a job
//! registry.enqueue(DownloadTask::new("task-uuid", "batch-17", "January batch"))?;
//!
//! // ... later, on session end:
//! dispatcher.shutdown();
//! handle.await.ok();
//! # Ok(())
//! # }
//! ```

use crate::client::{HttpJobsApi, JobsApi};
use crate::config::Config;
use crate::delivery;
use crate::error::Result;
use crate::notify::{Notification, NotificationSink, TracingSink};
use crate::poller::{AlwaysActive, PollOutcome, SessionGate, StatusPoller};
use crate::registry::TaskRegistry;
use crate::types::{DownloadTask, JobStatus};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Sequential, exactly-once artifact delivery over a task registry
///
/// Cloneable — all fields are shared handles; clones drive the same registry
/// and honor the same cancellation token.
#[derive(Clone)]
pub struct DownloadDispatcher {
    config: Arc<Config>,
    registry: TaskRegistry,
    api: Arc<dyn JobsApi>,
    sink: Arc<dyn NotificationSink>,
    gate: Arc<dyn SessionGate>,
    cancel: CancellationToken,
}

/// Transient per-head-task state; discarded whenever the head changes
struct HeadState {
    task: DownloadTask,
    poller: StatusPoller,
    not_found_ticks: u64,
    fetch_attempts: u32,
}

impl DownloadDispatcher {
    /// Create a dispatcher with explicit collaborators
    ///
    /// The session gate is re-evaluated before every tick, so the caller's
    /// credential/permission state takes effect without restarting the
    /// dispatcher.
    pub fn new(
        config: Config,
        registry: TaskRegistry,
        api: Arc<dyn JobsApi>,
        sink: Arc<dyn NotificationSink>,
        gate: Arc<dyn SessionGate>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            registry,
            api,
            sink,
            gate,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a dispatcher with default collaborators
    ///
    /// Opens the registry at the configured snapshot path, talks to the
    /// configured API over HTTP, logs notifications via tracing, and applies
    /// no session gating.
    pub fn from_config(config: Config) -> Result<Self> {
        let registry = TaskRegistry::open(&config.persistence.registry_path)?;
        let api = Arc::new(HttpJobsApi::new(&config.api)?);
        Ok(Self::new(
            config,
            registry,
            api,
            Arc::new(TracingSink),
            Arc::new(AlwaysActive),
        ))
    }

    /// Handle to the task registry this dispatcher drains
    pub fn registry(&self) -> &TaskRegistry {
        &self.registry
    }

    /// Token cancelled by [`shutdown`](Self::shutdown)
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn the dispatch loop as a background task
    pub fn start(&self) -> tokio::task::JoinHandle<()> {
        let dispatcher = self.clone();
        tokio::spawn(dispatcher.run_loop())
    }

    /// Stop the dispatch loop
    ///
    /// The cancellation is honored before the next tick; an in-flight status
    /// query or artifact fetch is not aborted, its result is simply ignored
    /// once the loop has stopped.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    async fn run_loop(self) {
        info!("download dispatcher started");

        let mut ticker = tokio::time::interval(self.config.polling.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        // State for the task currently at the head of the registry; rebuilt
        // whenever the head changes, so counters never leak across tasks
        let mut current: Option<HeadState> = None;

        loop {
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = ticker.tick() => {}
            }

            if !self.gate.is_active() {
                debug!("session inactive, no requests this tick");
                continue;
            }

            let Some(head) = self.registry.head() else {
                current = None;
                continue;
            };

            if !matches!(&current, Some(s) if s.task.task_id == head.task_id) {
                debug!(task_id = %head.task_id, source_id = %head.source_id, "watching head task");
                let poller = StatusPoller::new(
                    self.api.clone(),
                    head.task_id.clone(),
                    self.config.polling.interval,
                )
                .with_gate(self.gate.clone())
                .with_cancellation(self.cancel.clone());

                current = Some(HeadState {
                    task: head,
                    poller,
                    not_found_ticks: 0,
                    fetch_attempts: 0,
                });
            }
            let Some(state) = current.as_mut() else {
                continue;
            };

            match state.poller.tick().await {
                PollOutcome::Disabled => {
                    debug!(task_id = %state.task.task_id, "gate turned inactive mid-tick");
                }
                PollOutcome::NotYetAvailable => {
                    state.not_found_ticks += 1;
                    if let Some(cap) = self.config.polling.max_not_found_ticks
                        && state.not_found_ticks >= cap
                    {
                        let task = state.task.clone();
                        warn!(
                            task_id = %task.task_id,
                            ticks = state.not_found_ticks,
                            "job never materialized server-side, giving up"
                        );
                        self.sink.notify(Notification::error(
                            "Download failed",
                            format!(
                                "The download for {} never became available",
                                task_display(&task)
                            ),
                        ));
                        self.discard(&task);
                        current = None;
                    } else {
                        debug!(
                            task_id = %state.task.task_id,
                            ticks = state.not_found_ticks,
                            "job not registered server-side yet"
                        );
                    }
                }
                PollOutcome::TransportError(e) => {
                    // Task stays queued; the next tick retries
                    warn!(task_id = %state.task.task_id, error = %e, "status query failed");
                    self.sink.notify(Notification::error(
                        "Download error",
                        "Could not check the status of the pending download",
                    ));
                }
                PollOutcome::Snapshot(snapshot) => match snapshot.status {
                    JobStatus::Pending | JobStatus::Progress => {
                        debug!(
                            task_id = %state.task.task_id,
                            status = ?snapshot.status,
                            progress = ?snapshot.progress,
                            "job still running"
                        );
                    }
                    JobStatus::Failure => {
                        let task = state.task.clone();
                        let message = snapshot
                            .error
                            .unwrap_or_else(|| "artifact generation failed".to_string());
                        error!(task_id = %task.task_id, error = %message, "job failed");
                        self.sink.notify(Notification::error("Download failed", message));
                        self.discard(&task);
                        current = None;
                    }
                    JobStatus::Success => {
                        let task = state.task.clone();
                        match self.deliver(&task).await {
                            Ok(path) => {
                                info!(
                                    task_id = %task.task_id,
                                    path = %path.display(),
                                    "artifact delivered"
                                );
                                let filename = path
                                    .file_name()
                                    .map(|n| n.to_string_lossy().into_owned())
                                    .unwrap_or_default();
                                self.sink.notify(Notification::success(
                                    "Download ready",
                                    format!(
                                        "Artifact for {} saved as {}",
                                        task_display(&task),
                                        filename
                                    ),
                                ));
                                self.discard(&task);
                                current = None;
                            }
                            Err(e) => {
                                state.fetch_attempts += 1;
                                warn!(
                                    task_id = %task.task_id,
                                    error = %e,
                                    attempt = state.fetch_attempts,
                                    max_attempts = self.config.polling.max_fetch_attempts,
                                    "artifact fetch failed"
                                );
                                if state.fetch_attempts >= self.config.polling.max_fetch_attempts {
                                    self.sink.notify(Notification::error(
                                        "Download failed",
                                        format!(
                                            "Could not retrieve the artifact for {}",
                                            task_display(&task)
                                        ),
                                    ));
                                    self.discard(&task);
                                    current = None;
                                }
                            }
                        }
                    }
                },
            }
        }

        info!("download dispatcher stopped");
    }

    /// Fetch the artifact for a successful job and write it to disk
    async fn deliver(&self, task: &DownloadTask) -> Result<PathBuf> {
        let artifact = self.api.fetch_artifact(&task.task_id).await?;
        let filename = delivery::derive_filename(
            artifact.filename.as_deref(),
            &task.label,
            &self.config.delivery,
        );
        delivery::write_artifact(
            &self.config.delivery.download_dir,
            &filename,
            &artifact.data,
            self.config.delivery.file_collision,
        )
        .await
    }

    /// Remove a resolved task, logging rather than failing on persist errors
    fn discard(&self, task: &DownloadTask) {
        if let Err(e) = self.registry.remove(&task.task_id) {
            warn!(task_id = %task.task_id, error = %e, "failed to persist task removal");
        }
    }
}

/// Name a task for user-facing messages: the label, or the source id when the
/// label is empty
fn task_display(task: &DownloadTask) -> &str {
    if task.label.trim().is_empty() {
        &task.source_id
    } else {
        &task.label
    }
}
