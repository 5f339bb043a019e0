//! Task scheduler.
//!
//! `submit` picks the dispatch mode from the caller's context: a caller with
//! no active frame is top level and its task goes to the worker pool; a
//! caller already inside an operation runs the nested operation inline on
//! its own context. Asynchronous tasks are persisted and tracked in an
//! in-flight map until someone waits for them or a later submit sweeps them.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, PoisonError, Weak};

use super::pool::{Completion, WorkerPool};
use super::registry::{Invocation, Operation, OperationRegistry};
use crate::config::Config;
use crate::core::ids::validate_uri;
use crate::core::{AgentId, Parameters, Task, TaskHandle, TaskId, TaskStatus};
use crate::error::{Error, Result};
use crate::execution::ExecutionContext;
use crate::services::Services;
use crate::store::TaskStore;
use crate::{llog, llog_debug, llog_error, llog_warn};

struct Inner {
    registry: OperationRegistry,
    services: Services,
    pool: WorkerPool,
    in_flight: Mutex<HashMap<TaskId, Completion>>,
}

/// Runs operations and tracks the tasks they belong to.
///
/// Cloning shares the same pool and in-flight map.
#[derive(Clone)]
pub struct TaskScheduler {
    inner: Arc<Inner>,
}

impl TaskScheduler {
    /// Create a scheduler with a pool of `worker_threads` workers.
    pub fn new(registry: OperationRegistry, services: Services, worker_threads: usize) -> Result<Self> {
        let pool = WorkerPool::new(worker_threads)?;
        llog!(
            "TaskScheduler started: {} operations, {} workers",
            registry.len(),
            pool.size()
        );
        Ok(Self {
            inner: Arc::new(Inner {
                registry,
                services,
                pool,
                in_flight: Mutex::new(HashMap::new()),
            }),
        })
    }

    /// Create a scheduler sized and wired from configuration.
    pub fn from_config(registry: OperationRegistry, config: &Config) -> Result<Self> {
        let services = Services::from_config(config)?;
        Self::new(registry, services, config.effective_worker_threads())
    }

    pub fn services(&self) -> &Services {
        &self.inner.services
    }

    /// Registered operation ids, sorted.
    pub fn operations(&self) -> Vec<String> {
        self.inner.registry.ids()
    }

    pub fn worker_threads(&self) -> usize {
        self.inner.pool.size()
    }

    /// A detached context for top-level callers of [`submit`](Self::submit).
    pub fn context(&self) -> ExecutionContext {
        ExecutionContext::detached(self.inner.services.clone())
    }

    /// Number of dispatched tasks not yet swept or waited for.
    pub fn in_flight(&self) -> usize {
        self.lock_in_flight().len()
    }

    /// Submit `operation` on behalf of `caller`.
    ///
    /// With no active frame on `caller` the task is dispatched to the pool
    /// and returned immediately in `New`. Otherwise the operation runs
    /// inline, nested in the caller's current frame, and the returned
    /// ephemeral task is already terminal; a failing body surfaces as
    /// [`Error::OperationFailed`].
    pub fn submit(
        &self,
        caller: &mut ExecutionContext,
        target: Option<&str>,
        operation: &str,
        parameters: Parameters,
    ) -> Result<TaskHandle> {
        self.sweep();
        let resolved = self.resolve(target, operation)?;

        if caller.has_active_operation() {
            self.run_inline(caller, target, resolved, parameters)
        } else {
            let agent = caller.current_agent();
            self.dispatch_resolved(target, resolved, parameters, agent, None)
        }
    }

    /// Dispatch a top-level task to the pool on behalf of the default agent.
    pub fn dispatch(
        &self,
        target: Option<&str>,
        operation: &str,
        parameters: Parameters,
    ) -> Result<TaskHandle> {
        let agent = self.inner.services.default_agent();
        self.dispatch_anchored(target, operation, parameters, agent, None)
    }

    pub(crate) fn dispatch_anchored(
        &self,
        target: Option<&str>,
        operation: &str,
        parameters: Parameters,
        agent: AgentId,
        anchor: Option<String>,
    ) -> Result<TaskHandle> {
        self.sweep();
        let resolved = self.resolve(target, operation)?;
        self.dispatch_resolved(target, resolved, parameters, agent, anchor)
    }

    /// Block until `task` has ended and return its status.
    ///
    /// Tasks that were never dispatched, or were already swept, return their
    /// current status at once. Failures are reported through the status
    /// only.
    pub fn wait_for_ending(&self, task: &TaskHandle) -> TaskStatus {
        let completion = self.lock_in_flight().get(&task.id()).cloned();
        if let Some(completion) = completion {
            completion.wait();
            self.lock_in_flight().remove(&task.id());
        }
        task.status()
    }

    /// Wait for every task currently in flight.
    pub fn wait_for_all(&self) {
        let pending: Vec<Completion> = self.lock_in_flight().values().cloned().collect();
        for completion in pending {
            completion.wait();
        }
        self.sweep();
    }

    fn resolve(&self, target: Option<&str>, operation: &str) -> Result<Arc<dyn Operation>> {
        let resolved = self.inner.registry.lookup(operation)?;
        if let Some(target) = target {
            validate_uri(target)?;
        }
        Ok(resolved)
    }

    fn sweep(&self) {
        let mut in_flight = self.lock_in_flight();
        let before = in_flight.len();
        in_flight.retain(|_, completion| !completion.is_finished());
        let swept = before - in_flight.len();
        if swept > 0 {
            llog_debug!("swept {} finished tasks", swept);
        }
    }

    fn lock_in_flight(&self) -> std::sync::MutexGuard<'_, HashMap<TaskId, Completion>> {
        self.inner
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn dispatch_resolved(
        &self,
        target: Option<&str>,
        operation: Arc<dyn Operation>,
        parameters: Parameters,
        agent: AgentId,
        anchor: Option<String>,
    ) -> Result<TaskHandle> {
        let services = &self.inner.services;
        let uri = services.ids.task_id(services.namespace_for(target));
        let task = Task::new(Some(uri.clone()), operation.id(), parameters.clone(), agent);
        services.tasks.persist(&task)?;

        let handle = TaskHandle::new(task);
        let guard = AbortUnlessStarted::new(handle.clone(), Arc::clone(&services.tasks));
        let scheduler = Arc::downgrade(&self.inner);
        let target = target.map(str::to_string);

        let completion = self.inner.pool.execute(move || {
            let (handle, tasks) = guard.disarm();
            match Weak::upgrade(&scheduler) {
                Some(inner) => {
                    TaskScheduler { inner }.run_task(&handle, target, operation, parameters, anchor)
                }
                None => abort(&handle, tasks.as_ref()),
            }
        });
        self.lock_in_flight().insert(handle.id(), completion);
        llog_debug!("dispatched {} as {}", handle.id().short(), uri);
        Ok(handle)
    }

    /// Body of an asynchronous job, on a worker thread.
    fn run_task(
        &self,
        handle: &TaskHandle,
        target: Option<String>,
        operation: Arc<dyn Operation>,
        parameters: Parameters,
        anchor: Option<String>,
    ) {
        let services = &self.inner.services;
        let operation_id = operation.id().to_string();
        let mut context = ExecutionContext::for_task(services.clone(), handle.clone(), anchor);
        context.start_operation(target.clone(), Some(operation_id.clone()), parameters.clone());
        self.transition(handle, TaskStatus::Running);

        let outcome = {
            let mut invocation =
                Invocation::new(self, &mut context, target.as_deref(), &parameters);
            execute_guarded(operation.as_ref(), &mut invocation)
        };

        let successful = match outcome {
            Ok(()) => {
                if self.transition(handle, TaskStatus::Done) {
                    if let Err(e) = services.tasks.delete(&handle.snapshot()) {
                        llog_warn!("could not delete finished task {}: {}", handle.id().short(), e);
                    }
                }
                true
            }
            Err(message) => {
                llog_error!("task {} ({}) failed: {}", handle.id().short(), operation_id, message);
                handle.record_failure(&message);
                self.transition(handle, TaskStatus::Failed);
                false
            }
        };

        if let Err(e) = context.end_operation(successful) {
            llog_error!("closing task {} frame: {}", handle.id().short(), e);
        }
    }

    /// Apply and persist a transition of an asynchronous task.
    ///
    /// Errors are logged; returns whether the transition was applied.
    fn transition(&self, handle: &TaskHandle, status: TaskStatus) -> bool {
        if let Err(e) = handle.set_status(status) {
            llog_error!("task {}: {}", handle.id().short(), e);
            return false;
        }
        if status != TaskStatus::Done {
            if let Err(e) = self.inner.services.tasks.save(&handle.snapshot()) {
                llog_warn!("could not save task {}: {}", handle.id().short(), e);
            }
        }
        true
    }

    fn run_inline(
        &self,
        caller: &mut ExecutionContext,
        target: Option<&str>,
        operation: Arc<dyn Operation>,
        parameters: Parameters,
    ) -> Result<TaskHandle> {
        let operation_id = operation.id().to_string();
        caller.start_operation(
            target.map(str::to_string),
            Some(operation_id.clone()),
            parameters.clone(),
        );
        let handle = TaskHandle::new(Task::new(
            None,
            &operation_id,
            parameters.clone(),
            caller.current_agent(),
        ));
        llog_debug!(
            "running {} inline as {} at depth {}",
            operation_id,
            handle.id().short(),
            caller.depth()
        );

        if let Err(e) = handle.set_status(TaskStatus::Running) {
            caller.end_operation(false)?;
            return Err(e);
        }

        let outcome = {
            let mut invocation = Invocation::new(self, caller, target, &parameters);
            execute_guarded(operation.as_ref(), &mut invocation)
        };

        match outcome {
            Ok(()) => {
                let status = handle.set_status(TaskStatus::Done);
                let event = caller.end_operation(true)?;
                status?;
                if let Some(event) = event {
                    handle.set_running_event(event);
                }
                Ok(handle)
            }
            Err(message) => {
                handle.record_failure(&message);
                let status = handle.set_status(TaskStatus::Failed);
                caller.end_operation(false)?;
                status?;
                Err(Error::OperationFailed {
                    operation: operation_id,
                    message,
                })
            }
        }
    }
}

impl std::fmt::Debug for TaskScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskScheduler")
            .field("operations", &self.inner.registry.ids())
            .field("worker_threads", &self.inner.pool.size())
            .field("in_flight", &self.in_flight())
            .finish()
    }
}

/// Run an operation body, turning errors and panics into a message.
fn execute_guarded(
    operation: &dyn Operation,
    invocation: &mut Invocation<'_>,
) -> std::result::Result<(), String> {
    match panic::catch_unwind(AssertUnwindSafe(|| operation.execute(invocation))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(e)) => Err(e.to_string()),
        Err(payload) => Err(panic_message(payload.as_ref())),
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

fn abort(handle: &TaskHandle, tasks: &dyn TaskStore) {
    match handle.set_status(TaskStatus::Aborted) {
        Ok(_) => {
            llog_warn!("task {} aborted before it started", handle.id().short());
            if let Err(e) = tasks.save(&handle.snapshot()) {
                llog_warn!("could not save aborted task {}: {}", handle.id().short(), e);
            }
        }
        Err(e) => llog_error!("task {}: {}", handle.id().short(), e),
    }
}

/// Aborts a queued task if its job is dropped without running.
struct AbortUnlessStarted {
    handle: TaskHandle,
    tasks: Arc<dyn TaskStore>,
    armed: bool,
}

impl AbortUnlessStarted {
    fn new(handle: TaskHandle, tasks: Arc<dyn TaskStore>) -> Self {
        Self {
            handle,
            tasks,
            armed: true,
        }
    }

    /// The job is starting; hand back what it needs.
    fn disarm(mut self) -> (TaskHandle, Arc<dyn TaskStore>) {
        self.armed = false;
        (self.handle.clone(), Arc::clone(&self.tasks))
    }
}

impl Drop for AbortUnlessStarted {
    fn drop(&mut self) {
        if self.armed {
            abort(&self.handle, self.tasks.as_ref());
        }
    }
}
