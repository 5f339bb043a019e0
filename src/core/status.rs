//! Task status state machine.
//!
//! ```text
//! New -> Running -> Done | Failed
//!  \---> Aborted
//! ```
//!
//! `Done`, `Failed` and `Aborted` are absorbing. A running task can finish or
//! fail but cannot be aborted, a task that never ran can only be aborted, and
//! nothing ever returns to `New`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Status of a task in its lifecycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Created, not yet picked up.
    #[default]
    New,
    /// Operation body is executing.
    Running,
    /// Finished successfully.
    Done,
    /// The operation body returned an error or panicked.
    Failed,
    /// Never ran to completion and never will.
    Aborted,
}

impl TaskStatus {
    /// Whether the status is absorbing.
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskStatus::Done | TaskStatus::Failed | TaskStatus::Aborted)
    }

    /// Check if moving from `self` to `target` is allowed.
    ///
    /// Re-entering the current status is always allowed and is a no-op.
    pub fn can_transition(self, target: TaskStatus) -> bool {
        if self == target {
            return true;
        }
        matches!(
            (self, target),
            (TaskStatus::New, TaskStatus::Running | TaskStatus::Aborted)
                | (TaskStatus::Running, TaskStatus::Done | TaskStatus::Failed)
        )
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TaskStatus::New => write!(f, "new"),
            TaskStatus::Running => write!(f, "running"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// Status plus the timestamps the state machine stamps.
///
/// Both persisted and ephemeral tasks embed one of these, so the transition
/// rules exist in exactly one place.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lifecycle {
    status: TaskStatus,
    issued_at: DateTime<Utc>,
    started_at: Option<DateTime<Utc>>,
    ended_at: Option<DateTime<Utc>>,
}

impl Lifecycle {
    /// A fresh lifecycle in `New`, issued now.
    pub fn new() -> Self {
        Self {
            status: TaskStatus::New,
            issued_at: Utc::now(),
            started_at: None,
            ended_at: None,
        }
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    pub fn issued_at(&self) -> DateTime<Utc> {
        self.issued_at
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn ended_at(&self) -> Option<DateTime<Utc>> {
        self.ended_at
    }

    /// Move to `target`.
    ///
    /// Returns `Ok(true)` when the status changed, `Ok(false)` for a same-value
    /// no-op. On an illegal transition nothing is modified.
    pub fn set_status(&mut self, target: TaskStatus) -> Result<bool> {
        if !self.status.can_transition(target) {
            return Err(Error::IllegalTransition {
                from: self.status,
                to: target,
            });
        }
        if self.status == target {
            return Ok(false);
        }

        let now = Utc::now();
        if target == TaskStatus::Running {
            self.started_at.get_or_insert(now);
        }
        if target.is_terminal() {
            self.ended_at.get_or_insert(now);
        }
        self.status = target;
        Ok(true)
    }
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}
