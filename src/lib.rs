//! # artifact-dl
//!
//! Client-side tracking of asynchronous server-side jobs (bulk invoicing
//! runs, bulk email sends, ZIP archive generation) and sequential,
//! exactly-once delivery of the resulting binary artifacts.
//!
//! ## Design Philosophy
//!
//! artifact-dl is designed to be:
//! - **Durable** - Pending tasks survive process restarts via an atomic JSON snapshot
//! - **Sequential** - Tasks are resolved strictly in FIFO order, one at a time
//! - **Exactly-once** - Each finished job yields one delivery and one notification
//! - **Library-first** - No CLI or UI, purely a Rust crate for embedding
//!
//! ## Quick Start
//!
//! ```no_run
//! use artifact_dl::{Config, DownloadDispatcher, DownloadTask};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let dispatcher = DownloadDispatcher::from_config(Config::default())?;
//!     let registry = dispatcher.registry().clone();
//!     let handle = dispatcher.start();
//!
//!     // When the server accepts a bulk operation, track the returned job id
//!     registry.enqueue(DownloadTask::new(
//!         "d9a1c2e4-7b3f-4f7e-9d2a-5c8b1e6f0a31",
//!         "batch-17",
//!         "January batch",
//!     ))?;
//!
//!     // Run until SIGTERM/SIGINT, then stop polling
//!     artifact_dl::run_with_shutdown(&dispatcher).await;
//!     handle.await?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// HTTP client for the status/artifact endpoints
pub mod client;
/// Configuration types
pub mod config;
/// Artifact delivery (file naming, collision handling, atomic writes)
pub mod delivery;
/// Sequential download dispatcher
pub mod dispatcher;
/// Error types
pub mod error;
/// User-facing notifications
pub mod notify;
/// Job status polling
pub mod poller;
/// Durable task registry
pub mod registry;
/// Core types
pub mod types;

// Re-export commonly used types
pub use client::{HttpJobsApi, JobsApi};
pub use config::{
    ApiConfig, Config, DeliveryConfig, FileCollisionAction, PersistenceConfig, PollingConfig,
};
pub use dispatcher::DownloadDispatcher;
pub use error::{DeliveryError, Error, Result};
pub use notify::{BroadcastSink, Notification, NotificationKind, NotificationSink, TracingSink};
pub use poller::{AlwaysActive, PollOutcome, SessionGate, StatusPoller};
pub use registry::TaskRegistry;
pub use types::{Artifact, DownloadTask, JobId, JobProgress, JobStatus, JobStatusSnapshot};

/// Helper function to run the dispatcher with graceful signal handling.
///
/// Waits for a termination signal and then calls the dispatcher's
/// [`shutdown`](DownloadDispatcher::shutdown) method.
///
/// - **Unix:** listens for SIGTERM and SIGINT, with fallbacks if signal registration fails.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
pub async fn run_with_shutdown(dispatcher: &DownloadDispatcher) {
    wait_for_signal().await;
    dispatcher.shutdown();
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Set up signal handlers - these may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) => {
            tracing::warn!(error = %e, "Could not register SIGTERM handler, waiting for SIGINT only");
            if let Ok(mut sigint) = signal(SignalKind::interrupt()) {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
        (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register SIGINT handler, waiting for SIGTERM only");
            if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            } else {
                tracing::error!("Could not register any signal handlers, using ctrl_c fallback");
                tokio::signal::ctrl_c().await.ok();
            }
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
