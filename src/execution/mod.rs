//! Execution contexts and provenance chaining.

mod context;
pub mod provenance;

pub use context::{ContextBinding, ExecutionContext, ExecutionFrame};
pub use provenance::{informer_chain, UNSPECIFIED_OPERATION};
