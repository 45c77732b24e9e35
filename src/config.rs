//! Configuration types for artifact-dl

use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// HTTP API configuration (endpoints, auth, timeouts)
///
/// Groups settings for reaching the status/artifact endpoints.
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL of the REST API (default: "http://127.0.0.1:5000/api")
    ///
    /// Job status is queried at `{base_url}/jobs/{id}/status` and artifacts
    /// are fetched from `{base_url}/downloads/{id}`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Value for the Authorization header, if the API requires one
    /// (e.g., "Bearer <token>")
    #[serde(default)]
    pub auth_header: Option<String>,

    /// Per-request timeout (default: 30 seconds)
    #[serde(default = "default_request_timeout")]
    pub request_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            auth_header: None,
            request_timeout: default_request_timeout(),
        }
    }
}

/// Polling behavior configuration
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Interval between status queries for the head task (default: 2 seconds)
    #[serde(default = "default_poll_interval")]
    pub interval: Duration,

    /// Give up on a task after this many consecutive "not found" ticks
    /// (default: None = keep retrying forever)
    ///
    /// When the cap is reached the task is removed and one error notification
    /// is emitted.
    #[serde(default)]
    pub max_not_found_ticks: Option<u64>,

    /// Maximum artifact-fetch attempts after a job reports SUCCESS (default: 3)
    ///
    /// Each failed attempt leaves the task queued for the next tick; when the
    /// cap is exhausted the task is removed and one error notification is
    /// emitted.
    #[serde(default = "default_max_fetch_attempts")]
    pub max_fetch_attempts: u32,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval: default_poll_interval(),
            max_not_found_ticks: None,
            max_fetch_attempts: default_max_fetch_attempts(),
        }
    }
}

/// Artifact delivery configuration (target directory, file naming)
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeliveryConfig {
    /// Directory delivered artifacts are written to (default: "./downloads")
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,

    /// Base name used when neither the server nor the task label yields a
    /// usable filename (default: "artifact")
    #[serde(default = "default_fallback_basename")]
    pub fallback_basename: String,

    /// Extension appended to label-derived and fallback filenames
    /// (default: "zip")
    #[serde(default = "default_extension")]
    pub default_extension: String,

    /// File collision handling
    #[serde(default)]
    pub file_collision: FileCollisionAction,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            fallback_basename: default_fallback_basename(),
            default_extension: default_extension(),
            file_collision: FileCollisionAction::default(),
        }
    }
}

/// How to handle an existing file at the delivery target path
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileCollisionAction {
    /// Add a " (1)", " (2)", ... suffix until the name is unique
    #[default]
    Rename,
    /// Overwrite the existing file
    Overwrite,
    /// Fail the delivery attempt
    Skip,
}

/// Persistence configuration for the task registry
///
/// Used as a nested sub-config within [`Config`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Path of the registry snapshot file (default: "./pending-tasks.json")
    ///
    /// The full task list is rewritten here on every mutation and reloaded at
    /// startup, so tasks enqueued before a restart are still tracked.
    #[serde(default = "default_registry_path")]
    pub registry_path: PathBuf,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            registry_path: default_registry_path(),
        }
    }
}

/// Main configuration for the download dispatcher
///
/// Fields are organized into logical sub-configs:
/// - [`api`](ApiConfig) — endpoints, auth header, request timeout
/// - [`polling`](PollingConfig) — poll interval and retry caps
/// - [`delivery`](DeliveryConfig) — download directory and file naming
/// - [`persistence`](PersistenceConfig) — registry snapshot location
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// HTTP API settings
    #[serde(default)]
    pub api: ApiConfig,

    /// Polling behavior settings
    #[serde(default)]
    pub polling: PollingConfig,

    /// Artifact delivery settings
    #[serde(default)]
    pub delivery: DeliveryConfig,

    /// Registry persistence settings
    #[serde(default)]
    pub persistence: PersistenceConfig,
}

fn default_base_url() -> String {
    "http://127.0.0.1:5000/api".to_string()
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(2)
}

fn default_max_fetch_attempts() -> u32 {
    3
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("./downloads")
}

fn default_fallback_basename() -> String {
    "artifact".to_string()
}

fn default_extension() -> String {
    "zip".to_string()
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("./pending-tasks.json")
}
