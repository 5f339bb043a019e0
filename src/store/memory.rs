//! In-memory stores, used by default and throughout the tests.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use super::{require_uri, EventStore, TaskStore};
use crate::core::{Event, Task};
use crate::error::Result;

#[derive(Debug, Default)]
pub struct MemoryEventStore {
    events: Mutex<Vec<Event>>,
}

impl MemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events in first-save order.
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl EventStore for MemoryEventStore {
    fn save(&self, event: Event) -> Result<Event> {
        let mut events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }
        Ok(event)
    }

    fn find(&self, id: &str) -> Result<Option<Event>> {
        let events = self.events.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(events.iter().find(|e| e.id == id).cloned())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<String, Task>>,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TaskStore for MemoryTaskStore {
    fn persist(&self, task: &Task) -> Result<()> {
        let uri = require_uri(task)?;
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(uri.to_string(), task.clone());
        Ok(())
    }

    fn save(&self, task: &Task) -> Result<Task> {
        self.persist(task)?;
        Ok(task.clone())
    }

    fn delete(&self, task: &Task) -> Result<()> {
        let uri = require_uri(task)?;
        self.tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(uri);
        Ok(())
    }

    fn find(&self, uri: &str) -> Result<Option<Task>> {
        Ok(self
            .tasks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(uri)
            .cloned())
    }
}
