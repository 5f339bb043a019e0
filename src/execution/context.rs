//! Per-execution stack of nested operation frames.
//!
//! Every unit of execution owns exactly one [`ExecutionContext`]. The
//! scheduler hands it to operation bodies by `&mut`, so a context is never
//! observed by two threads at once and carries no locks. Work that moves to
//! another thread gets a fresh context, optionally seeded with the informer
//! anchor of the event that triggered it.

use super::provenance::draft_event;
use crate::core::{AgentId, Event, EventType, Parameters, TaskHandle};
use crate::error::{Error, Result};
use crate::services::Services;
use crate::llog_trace;

/// One active operation on a context's stack.
#[derive(Debug, Clone)]
pub struct ExecutionFrame {
    target: Option<String>,
    operation: Option<String>,
    parameters: Parameters,
    event: Option<Event>,
}

impl ExecutionFrame {
    pub fn new(target: Option<String>, operation: Option<String>, parameters: Parameters) -> Self {
        Self {
            target,
            operation,
            parameters,
            event: None,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    pub fn parameters(&self) -> &Parameters {
        &self.parameters
    }

    /// The lazily materialized event, if any.
    pub fn event(&self) -> Option<&Event> {
        self.event.as_ref()
    }
}

/// What a context runs on behalf of.
#[derive(Debug, Clone)]
pub enum ContextBinding {
    /// No backing task; agent comes from the principal resolver.
    Detached,
    /// Worker context of an asynchronously dispatched task.
    Task { handle: TaskHandle, agent: AgentId },
}

#[derive(Debug)]
pub struct ExecutionContext {
    services: Services,
    binding: ContextBinding,
    frames: Vec<ExecutionFrame>,
    anchor: Option<String>,
}

impl ExecutionContext {
    /// A context with no backing task, as used by top-level callers.
    pub fn detached(services: Services) -> Self {
        Self {
            services,
            binding: ContextBinding::Detached,
            frames: Vec::new(),
            anchor: None,
        }
    }

    /// A fresh context for the worker running `handle`.
    pub fn for_task(services: Services, handle: TaskHandle, anchor: Option<String>) -> Self {
        let agent = match handle.uri() {
            Some(uri) => AgentId::for_task(&uri),
            None => services.default_agent(),
        };
        Self {
            services,
            binding: ContextBinding::Task { handle, agent },
            frames: Vec::new(),
            anchor,
        }
    }

    pub fn services(&self) -> &Services {
        &self.services
    }

    pub fn binding(&self) -> &ContextBinding {
        &self.binding
    }

    /// Event id used as informer when no frame has an event yet.
    pub fn informer_anchor(&self) -> Option<&str> {
        self.anchor.as_deref()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn has_active_operation(&self) -> bool {
        !self.frames.is_empty()
    }

    /// Active frames, outermost first.
    pub fn frames(&self) -> &[ExecutionFrame] {
        &self.frames
    }

    pub fn start_operation(
        &mut self,
        target: Option<String>,
        operation: Option<String>,
        parameters: Parameters,
    ) {
        llog_trace!(
            "start_operation depth={} operation={:?} target={:?}",
            self.frames.len() + 1,
            operation,
            target
        );
        self.frames
            .push(ExecutionFrame::new(target, operation, parameters));
    }

    /// Pop the innermost frame.
    ///
    /// The frame's event, if any, is closed. It is saved and returned in
    /// canonical form when `successful`; otherwise it is returned unsaved.
    pub fn end_operation(&mut self, successful: bool) -> Result<Option<Event>> {
        let frame = self.frames.pop().ok_or(Error::NoActiveOperation {
            action: "end_operation",
        })?;
        llog_trace!(
            "end_operation depth={} successful={}",
            self.frames.len() + 1,
            successful
        );

        let Some(mut event) = frame.event else {
            return Ok(None);
        };
        event.close();
        let event = if successful {
            self.services.events.save(event)?
        } else {
            event
        };

        if self.frames.is_empty() {
            if let ContextBinding::Task { handle, .. } = &self.binding {
                handle.set_running_event(event.clone());
            }
        }
        Ok(Some(event))
    }

    /// Who is acting right now. Never fails.
    pub fn current_agent(&self) -> AgentId {
        match &self.binding {
            ContextBinding::Task { agent, .. } if self.has_active_operation() => agent.clone(),
            _ => self.services.default_agent(),
        }
    }

    /// Innermost materialized event on the stack.
    pub fn current_event(&self) -> Option<&Event> {
        self.frames.iter().rev().find_map(|f| f.event.as_ref())
    }

    /// Materialize the top frame's event if needed and return it.
    ///
    /// Idempotent per frame. Returns `Ok(None)` when no frame is active.
    pub fn begin_as_event(
        &mut self,
        event_type: Option<EventType>,
        subject: Option<&str>,
    ) -> Result<Option<Event>> {
        let Some(top) = self.frames.last() else {
            return Ok(None);
        };
        if let Some(event) = &top.event {
            return Ok(Some(event.clone()));
        }

        let informer = self
            .current_event()
            .map(|e| e.id.clone())
            .or_else(|| self.anchor.clone());
        let draft = draft_event(
            &self.services,
            top,
            event_type.unwrap_or_default(),
            subject,
            self.current_agent(),
            informer,
        );
        let event = self.services.events.save(draft)?;
        llog_trace!("begin_as_event {} informer={:?}", event.id, event.informer);

        if self.frames.len() == 1 {
            if let ContextBinding::Task { handle, .. } = &self.binding {
                handle.set_running_event(event.clone());
            }
        }
        if let Some(top) = self.frames.last_mut() {
            top.event = Some(event.clone());
        }
        Ok(Some(event))
    }

    /// Record that the current operation used `entity`.
    pub fn add_used(&mut self, entity: impl Into<String>) -> Result<()> {
        self.top_event_mut("add_used")?.used.insert(entity.into());
        Ok(())
    }

    /// Record the entity the current operation influenced.
    pub fn add_influenced(&mut self, entity: impl Into<String>) -> Result<()> {
        self.top_event_mut("add_influenced")?.influenced = Some(entity.into());
        Ok(())
    }

    fn top_event_mut(&mut self, action: &'static str) -> Result<&mut Event> {
        let top = self
            .frames
            .last_mut()
            .ok_or(Error::NoActiveOperation { action })?;
        top.event.as_mut().ok_or(Error::NoCurrentEvent { action })
    }
}
