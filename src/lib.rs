//! Task execution with provenance chaining.
//!
//! Operations are submitted to a [`TaskScheduler`]. A submission from outside
//! any operation becomes an asynchronous task on the worker pool; a
//! submission from inside a running operation executes inline, nested on the
//! caller's [`ExecutionContext`]. Operations that care about provenance ask
//! their context for an [`Event`], which is created lazily, linked to the
//! enclosing event as its informer, and saved when the frame ends.

pub mod builtin;
pub mod config;
pub mod core;
pub mod error;
pub mod execution;
pub mod log;
pub mod orchestration;
pub mod services;
pub mod store;

pub use crate::core::{AgentId, Event, EventType, Parameters, Task, TaskHandle, TaskId, TaskStatus};
pub use error::{Error, Result};
pub use execution::ExecutionContext;
pub use orchestration::{FnOperation, Invocation, Operation, OperationError, OperationRegistry, TaskScheduler};
pub use services::Services;
