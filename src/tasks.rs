//! Bounded registry of detached background agent runs.
//!
//! Agent tasks and the session reducer touch this map from different tasks,
//! so every operation takes the single mutex for its whole body and nothing
//! else. Readers get [`TaskSnapshot`] copies and never hold the lock while
//! looking at a transcript.

use crate::cancel::{CancelHandle, CancelToken};
use crate::error::{RegistryError, RunError};
use crate::types::Message;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;

/// Hard cap on concurrently registered background tasks.
pub const MAX_BACKGROUND_TASKS: usize = 5;

/// Lifecycle of one background task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    Running,
    Done,
    Failed,
}

impl TaskStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Done => "done",
            Self::Failed => "failed",
        }
    }
}

/// Registry-owned task record.
#[derive(Debug)]
struct BackgroundTask {
    seq: u64,
    prompt: String,
    started_at: Instant,
    status: TaskStatus,
    messages: Vec<Message>,
    err: Option<String>,
    cancel: CancelHandle,
}

impl BackgroundTask {
    fn snapshot(&self, id: &str) -> TaskSnapshot {
        TaskSnapshot {
            id: id.to_string(),
            prompt: self.prompt.clone(),
            started_at: self.started_at,
            status: self.status,
            messages: self.messages.clone(),
            err: self.err.clone(),
        }
    }
}

/// Independent copy of a task's state at the time of the read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSnapshot {
    pub id: String,
    pub prompt: String,
    pub started_at: Instant,
    pub status: TaskStatus,
    /// Final transcript, filled in once the task is `Done`.
    pub messages: Vec<Message>,
    pub err: Option<String>,
}

impl TaskSnapshot {
    /// Last assistant text in the final transcript, if any.
    pub fn final_text(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == crate::types::Role::Assistant && !m.text().is_empty())
            .map(Message::text)
    }
}

#[derive(Debug, Default)]
struct Inner {
    tasks: HashMap<String, BackgroundTask>,
    next_seq: u64,
}

/// Mutex-guarded set of background tasks with a fixed capacity.
#[derive(Debug)]
pub struct BackgroundRegistry {
    inner: Mutex<Inner>,
    limit: usize,
}

impl Default for BackgroundRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BackgroundRegistry {
    pub fn new() -> Self {
        Self::with_limit(MAX_BACKGROUND_TASKS)
    }

    fn with_limit(limit: usize) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            limit,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        // A panic elsewhere never leaves the map half-written: every mutation
        // is a single insert/remove/field assignment.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    /// Register a running task and return the token its run must observe.
    pub fn add(&self, id: &str, prompt: &str) -> Result<CancelToken, RegistryError> {
        let mut inner = self.lock();
        if inner.tasks.len() >= self.limit {
            return Err(RegistryError::CapacityExceeded { limit: self.limit });
        }
        if inner.tasks.contains_key(id) {
            return Err(RegistryError::DuplicateId(id.to_string()));
        }
        let (cancel, token) = CancelHandle::new();
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.tasks.insert(
            id.to_string(),
            BackgroundTask {
                seq,
                prompt: prompt.to_string(),
                started_at: Instant::now(),
                status: TaskStatus::Running,
                messages: Vec::new(),
                err: None,
                cancel,
            },
        );
        tracing::debug!(task = id, active = inner.tasks.len(), "background task added");
        Ok(token)
    }

    /// Record the terminal result of a task. Succeeds at most once per task.
    pub fn mark_done(
        &self,
        id: &str,
        result: Result<Vec<Message>, RunError>,
    ) -> Result<TaskStatus, RegistryError> {
        let mut inner = self.lock();
        let task = inner
            .tasks
            .get_mut(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if task.status != TaskStatus::Running {
            return Err(RegistryError::AlreadyTerminal(id.to_string()));
        }
        match result {
            Ok(messages) => {
                task.messages = messages;
                task.status = TaskStatus::Done;
            }
            Err(err) => {
                task.err = Some(err.to_string());
                task.status = TaskStatus::Failed;
            }
        }
        tracing::debug!(task = id, status = task.status.label(), "background task finished");
        Ok(task.status)
    }

    /// Request cancellation of a running task without removing it.
    pub fn cancel(&self, id: &str) -> Result<(), RegistryError> {
        let inner = self.lock();
        let task = inner
            .tasks
            .get(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if task.status != TaskStatus::Running {
            return Err(RegistryError::AlreadyTerminal(id.to_string()));
        }
        task.cancel.cancel();
        Ok(())
    }

    /// Delete a task at any status. A running task is asked to cancel first.
    pub fn remove(&self, id: &str) -> Result<TaskSnapshot, RegistryError> {
        let mut inner = self.lock();
        let task = inner
            .tasks
            .remove(id)
            .ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        if task.status == TaskStatus::Running {
            task.cancel.cancel();
        }
        Ok(task.snapshot(id))
    }

    pub fn get(&self, id: &str) -> Option<TaskSnapshot> {
        self.lock().tasks.get(id).map(|task| task.snapshot(id))
    }

    /// All tasks, oldest first.
    pub fn list(&self) -> Vec<TaskSnapshot> {
        let inner = self.lock();
        let mut tasks = inner
            .tasks
            .iter()
            .map(|(id, task)| (task.seq, task.snapshot(id)))
            .collect::<Vec<_>>();
        drop(inner);
        tasks.sort_by_key(|(seq, _)| *seq);
        tasks.into_iter().map(|(_, snapshot)| snapshot).collect()
    }

    pub fn running_count(&self) -> usize {
        self.lock()
            .tasks
            .values()
            .filter(|task| task.status == TaskStatus::Running)
            .count()
    }

    pub fn count(&self) -> usize {
        self.lock().tasks.len()
    }

    /// Cancel every running task. Used on shutdown.
    pub fn cancel_all(&self) -> usize {
        let inner = self.lock();
        let mut cancelled = 0;
        for task in inner.tasks.values() {
            if task.status == TaskStatus::Running {
                task.cancel.cancel();
                cancelled += 1;
            }
        }
        cancelled
    }
}
