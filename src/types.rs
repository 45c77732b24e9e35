//! Core types for artifact-dl

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Unique identifier for a server-side background job
///
/// Job ids are opaque strings handed out by the server when it accepts a bulk
/// operation (the backend issues Celery task UUIDs). The id is the unique key
/// of a task in the [`TaskRegistry`](crate::registry::TaskRegistry).
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create a new JobId
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a server-side job as reported by the status endpoint
///
/// The wire encoding is UPPERCASE to match the status strings the job backend
/// emits (`PENDING`, `PROGRESS`, `SUCCESS`, `FAILURE`).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    /// Accepted but not started yet
    Pending,
    /// Running, may carry progress information
    Progress,
    /// Finished successfully; the artifact is ready to fetch
    Success,
    /// Finished with an error; no artifact will be produced
    Failure,
}

impl JobStatus {
    /// Whether this status ends polling (SUCCESS or FAILURE)
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failure)
    }
}

/// Progress information reported while a job is running
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JobProgress {
    /// Units of work completed so far
    pub current: u64,

    /// Total units of work (0 when the server does not know yet)
    pub total: u64,

    /// Completion percentage (0.0 to 100.0)
    pub percent: f64,
}

/// One poll's view of a job — ephemeral, superseded by the next poll
///
/// Snapshots are never stored alongside the task they describe; the poller
/// only keeps the most recent one for the job it is currently watching.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct JobStatusSnapshot {
    /// Current job status
    pub status: JobStatus,

    /// Progress information (present while PENDING/PROGRESS, sometimes on SUCCESS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub progress: Option<JobProgress>,

    /// Server-provided result payload (present on SUCCESS)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,

    /// Server-provided error message (present on FAILURE)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One pending deliverable tracked by the registry
///
/// Created when a bulk operation's acceptance response carries a job id;
/// destroyed when the job reaches a terminal state and has been resolved
/// (delivered or reported as failed), or when the registry is cleared on
/// session end. Tasks are immutable once created — only ever removed, never
/// edited.
///
/// Serialized with camelCase keys and an ISO-8601 timestamp so the persisted
/// snapshot reads `{ "taskId": ..., "sourceId": ..., "label": ...,
/// "createdAt": ... }`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadTask {
    /// Opaque job identifier, unique key within the registry
    pub task_id: JobId,

    /// Identifier of the originating batch/record
    pub source_id: String,

    /// Human-readable name, used for fallback file naming
    pub label: String,

    /// When the task was created
    pub created_at: DateTime<Utc>,
}

impl DownloadTask {
    /// Create a new task stamped with the current time
    pub fn new(
        task_id: impl Into<JobId>,
        source_id: impl Into<String>,
        label: impl Into<String>,
    ) -> Self {
        Self {
            task_id: task_id.into(),
            source_id: source_id.into(),
            label: label.into(),
            created_at: Utc::now(),
        }
    }
}

/// Binary payload fetched for a completed job
#[derive(Clone, Debug)]
pub struct Artifact {
    /// Raw artifact bytes
    pub data: Vec<u8>,

    /// Filename suggested by the server's Content-Disposition header, if any
    pub filename: Option<String>,
}
