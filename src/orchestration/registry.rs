//! Operations and the registry the scheduler resolves them from.

use std::collections::HashMap;
use std::sync::Arc;

use super::scheduler::TaskScheduler;
use crate::core::{Parameters, TaskHandle};
use crate::error::{Error, Result};
use crate::execution::ExecutionContext;

/// Error an operation body may return.
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

/// A named unit of business logic.
pub trait Operation: Send + Sync {
    fn id(&self) -> &str;

    fn execute(&self, invocation: &mut Invocation<'_>) -> std::result::Result<(), OperationError>;
}

/// Everything an operation body sees while it runs.
///
/// The context's top frame is the one pushed for this operation.
pub struct Invocation<'a> {
    scheduler: &'a TaskScheduler,
    context: &'a mut ExecutionContext,
    target: Option<&'a str>,
    parameters: &'a Parameters,
}

impl<'a> Invocation<'a> {
    pub(crate) fn new(
        scheduler: &'a TaskScheduler,
        context: &'a mut ExecutionContext,
        target: Option<&'a str>,
        parameters: &'a Parameters,
    ) -> Self {
        Self {
            scheduler,
            context,
            target,
            parameters,
        }
    }

    pub fn target(&self) -> Option<&str> {
        self.target
    }

    pub fn parameters(&self) -> &Parameters {
        self.parameters
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.parameters.get(key).map(String::as_str)
    }

    pub fn context(&mut self) -> &mut ExecutionContext {
        self.context
    }

    pub fn scheduler(&self) -> &TaskScheduler {
        self.scheduler
    }

    /// Submit a nested operation; it runs inline on this context.
    pub fn submit(
        &mut self,
        target: Option<&str>,
        operation: &str,
        parameters: Parameters,
    ) -> Result<TaskHandle> {
        self.scheduler
            .submit(self.context, target, operation, parameters)
    }

    /// Dispatch an operation to the worker pool instead of nesting it.
    ///
    /// The new task's context is anchored on this operation's current event,
    /// so events it creates are informed by it.
    pub fn spawn(
        &mut self,
        target: Option<&str>,
        operation: &str,
        parameters: Parameters,
    ) -> Result<TaskHandle> {
        let anchor = self.context.current_event().map(|e| e.id.clone());
        let agent = self.context.current_agent();
        self.scheduler
            .dispatch_anchored(target, operation, parameters, agent, anchor)
    }
}

/// Operation backed by a closure.
pub struct FnOperation<F> {
    id: String,
    body: F,
}

impl<F> FnOperation<F>
where
    F: Fn(&mut Invocation<'_>) -> std::result::Result<(), OperationError> + Send + Sync,
{
    pub fn new(id: &str, body: F) -> Self {
        Self {
            id: id.to_string(),
            body,
        }
    }
}

impl<F> Operation for FnOperation<F>
where
    F: Fn(&mut Invocation<'_>) -> std::result::Result<(), OperationError> + Send + Sync,
{
    fn id(&self) -> &str {
        &self.id
    }

    fn execute(&self, invocation: &mut Invocation<'_>) -> std::result::Result<(), OperationError> {
        (self.body)(invocation)
    }
}

/// Operations by id. Filled before the scheduler starts, read-only after.
#[derive(Default, Clone)]
pub struct OperationRegistry {
    operations: HashMap<String, Arc<dyn Operation>>,
}

impl OperationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, operation: Arc<dyn Operation>) -> Result<()> {
        let id = operation.id().to_string();
        if self.operations.contains_key(&id) {
            return Err(Error::DuplicateOperation(id));
        }
        self.operations.insert(id, operation);
        Ok(())
    }

    /// Builder-style [`register`](Self::register).
    pub fn with(mut self, operation: impl Operation + 'static) -> Result<Self> {
        self.register(Arc::new(operation))?;
        Ok(self)
    }

    pub fn lookup(&self, id: &str) -> Result<Arc<dyn Operation>> {
        self.operations
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnregisteredOperation(id.to_string()))
    }

    pub fn contains(&self, id: &str) -> bool {
        self.operations.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.operations.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}
