//! Durable task registry
//!
//! The registry is the single owner of the ordered list of pending download
//! tasks. Every mutation rewrites the full snapshot file atomically (write to
//! a temp sibling, then rename), so a crash never leaves a half-written list
//! and a task enqueued before a restart is still tracked afterward.
//!
//! # Example
//!
//! ```no_run
//! use artifact_dl::registry::TaskRegistry;
//! use artifact_dl::types::DownloadTask;
//!
//! # fn example() -> artifact_dl::Result<()> {
//! let registry = TaskRegistry::open("./pending-tasks.json")?;
//! registry.enqueue(DownloadTask::new("task-uuid", "batch-17", "January batch"))?;
//! assert_eq!(registry.len(), 1);
//! # Ok(())
//! # }
//! ```

use crate::error::Result;
use crate::types::{DownloadTask, JobId};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};

/// Durable, insertion-ordered collection of pending download tasks
///
/// Cloning the registry is cheap and yields a handle to the same underlying
/// list; all mutations happen under one lock, including the snapshot flush,
/// so concurrent callers never observe a partially applied update.
#[derive(Clone)]
pub struct TaskRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

struct RegistryInner {
    tasks: Vec<DownloadTask>,
    path: PathBuf,
}

impl TaskRegistry {
    /// Open a registry backed by the given snapshot file
    ///
    /// Hydrates the in-memory list from the snapshot. A missing file yields an
    /// empty registry. An unreadable or corrupt snapshot is logged at warn
    /// level and treated as empty rather than failing startup — the worst
    /// outcome is re-enqueueing lost tasks manually, which beats refusing to
    /// track new ones.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        let tasks = match std::fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<DownloadTask>>(&bytes) {
                Ok(tasks) => {
                    debug!(path = %path.display(), count = tasks.len(), "registry snapshot loaded");
                    tasks
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "registry snapshot unreadable, starting empty");
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "could not read registry snapshot, starting empty");
                Vec::new()
            }
        };

        Ok(Self {
            inner: Arc::new(Mutex::new(RegistryInner { tasks, path })),
        })
    }

    /// Insert a task at the tail
    ///
    /// A task whose `task_id` is already present is silently ignored — no
    /// duplicate, no reordering, no error. The snapshot is flushed only when
    /// the list actually changed.
    pub fn enqueue(&self, task: DownloadTask) -> Result<()> {
        let mut inner = self.lock();
        if inner.tasks.iter().any(|t| t.task_id == task.task_id) {
            debug!(task_id = %task.task_id, "task already tracked, ignoring re-enqueue");
            return Ok(());
        }
        debug!(task_id = %task.task_id, source_id = %task.source_id, "task enqueued");
        inner.tasks.push(task);
        inner.persist()
    }

    /// Delete the task with the given id, if present
    pub fn remove(&self, task_id: &JobId) -> Result<()> {
        let mut inner = self.lock();
        let before = inner.tasks.len();
        inner.tasks.retain(|t| &t.task_id != task_id);
        if inner.tasks.len() == before {
            return Ok(());
        }
        debug!(task_id = %task_id, "task removed");
        inner.persist()
    }

    /// Empty the registry (used on session end)
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.tasks.is_empty() {
            return Ok(());
        }
        inner.tasks.clear();
        inner.persist()
    }

    /// Ordered clone of the current tasks
    pub fn list(&self) -> Vec<DownloadTask> {
        self.lock().tasks.clone()
    }

    /// The oldest task, if any
    pub fn head(&self) -> Option<DownloadTask> {
        self.lock().tasks.first().cloned()
    }

    /// Whether a task with the given id is tracked
    pub fn contains(&self, task_id: &JobId) -> bool {
        self.lock().tasks.iter().any(|t| &t.task_id == task_id)
    }

    /// Number of tracked tasks
    pub fn len(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.lock().tasks.is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RegistryInner> {
        // A poisoned lock only means another thread panicked mid-mutation;
        // the list itself is still consistent (mutations are single writes).
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl RegistryInner {
    /// Flush the full list to the snapshot file, atomically
    ///
    /// Writes to a temp sibling and renames it over the target so readers
    /// never observe a partial snapshot.
    fn persist(&self) -> Result<()> {
        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent)?;
        }

        let bytes = serde_json::to_vec_pretty(&self.tasks)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, &bytes)?;
        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            std::fs::remove_file(&tmp).ok();
            return Err(e.into());
        }
        Ok(())
    }
}
