//! Operation dispatch: the registry, the worker pool and the scheduler that
//! decides between nested inline execution and asynchronous dispatch.

mod pool;
mod registry;
mod scheduler;

pub use pool::{Completion, WorkerPool};
pub use registry::{FnOperation, Invocation, Operation, OperationError, OperationRegistry};
pub use scheduler::TaskScheduler;
