//! Persistence contracts for tasks and events.
//!
//! The scheduler only needs a narrow save/delete/find surface; backing
//! stores decide everything else.

mod file;
mod memory;

pub use file::JsonFileStore;
pub use memory::{MemoryEventStore, MemoryTaskStore};

use crate::core::{Event, Task};
use crate::error::Result;

/// Sink for provenance events.
pub trait EventStore: Send + Sync {
    /// Register or update an event.
    ///
    /// The returned value is canonical; a store may normalize the identifier.
    fn save(&self, event: Event) -> Result<Event>;

    fn find(&self, id: &str) -> Result<Option<Event>>;
}

/// Backing store for asynchronously dispatched tasks.
pub trait TaskStore: Send + Sync {
    /// Store a newly created task.
    fn persist(&self, task: &Task) -> Result<()>;

    /// Update a stored task, returning the canonical copy.
    fn save(&self, task: &Task) -> Result<Task>;

    fn delete(&self, task: &Task) -> Result<()>;

    fn find(&self, uri: &str) -> Result<Option<Task>>;
}

pub(crate) fn require_uri(task: &Task) -> Result<&str> {
    task.uri.as_deref().ok_or_else(|| {
        crate::error::Error::Store(format!("task {} has no identifier", task.id.short()))
    })
}
