//! Task records.
//!
//! A task is the tracked record of one submitted operation. Asynchronous
//! tasks carry a URI and are persisted; synchronous ones are ephemeral and
//! only live for the duration of the nested call.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::agent::AgentId;
use super::event::Event;
use super::status::{Lifecycle, TaskStatus};
use super::Parameters;
use crate::error::Result;

/// Process-local key of a task.
///
/// Unlike the URI this exists for ephemeral tasks too, and keys the
/// scheduler's in-flight map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(pub Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// First 8 characters of the UUID, for log lines.
    pub fn short(&self) -> String {
        self.0.to_string()[..8].to_string()
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One submitted unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    /// Persisted identifier; `None` for ephemeral synchronous tasks.
    pub uri: Option<String>,
    pub operation: String,
    pub parameters: Parameters,
    /// Who requested the task.
    pub agent: AgentId,
    #[serde(flatten)]
    lifecycle: Lifecycle,
    /// Provenance event materialized while the task ran, if any.
    pub running_event: Option<Event>,
    /// Rendered error of a failed operation body.
    pub failure: Option<String>,
}

impl Task {
    /// Create a task in `New`, issued now.
    pub fn new(uri: Option<String>, operation: &str, parameters: Parameters, agent: AgentId) -> Self {
        Self {
            id: TaskId::new(),
            uri,
            operation: operation.to_string(),
            parameters,
            agent,
            lifecycle: Lifecycle::new(),
            running_event: None,
            failure: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.lifecycle.status()
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.lifecycle.issued_at()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.started_at()
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.lifecycle.ended_at()
    }

    /// Apply a status transition; see [`Lifecycle::set_status`].
    pub fn set_status(&mut self, status: TaskStatus) -> Result<bool> {
        self.lifecycle.set_status(status)
    }

    pub fn is_ephemeral(&self) -> bool {
        self.uri.is_none()
    }

    pub fn is_finished(&self) -> bool {
        self.status().is_terminal()
    }
}

/// Shared view of a task, mutated by the worker that runs it.
#[derive(Debug, Clone)]
pub struct TaskHandle {
    id: TaskId,
    inner: Arc<RwLock<Task>>,
}

impl TaskHandle {
    pub fn new(task: Task) -> Self {
        Self {
            id: task.id,
            inner: Arc::new(RwLock::new(task)),
        }
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn uri(&self) -> Option<String> {
        self.read(|t| t.uri.clone())
    }

    pub fn status(&self) -> TaskStatus {
        self.read(Task::status)
    }

    pub fn running_event(&self) -> Option<Event> {
        self.read(|t| t.running_event.clone())
    }

    pub fn failure(&self) -> Option<String> {
        self.read(|t| t.failure.clone())
    }

    /// Copy of the current record.
    pub fn snapshot(&self) -> Task {
        self.read(Task::clone)
    }

    pub fn set_status(&self, status: TaskStatus) -> Result<bool> {
        self.write(|t| t.set_status(status))
    }

    pub(crate) fn set_running_event(&self, event: Event) {
        self.write(|t| t.running_event = Some(event));
    }

    pub(crate) fn record_failure(&self, message: &str) {
        self.write(|t| t.failure = Some(message.to_string()));
    }

    fn read<T>(&self, f: impl FnOnce(&Task) -> T) -> T {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&*guard)
    }

    fn write<T>(&self, f: impl FnOnce(&mut Task) -> T) -> T {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut *guard)
    }
}
