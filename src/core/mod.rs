//! Core domain models: task status, tasks, provenance events, agents and
//! identifier synthesis.

use std::collections::BTreeMap;

pub mod agent;
pub mod event;
pub mod ids;
pub mod status;
pub mod task;

pub use agent::{AgentId, AgentResolver, EnvPrincipal, NoPrincipal, StaticPrincipal};
pub use event::{Event, EventType};
pub use ids::{IdGenerator, TimestampIds};
pub use status::{Lifecycle, TaskStatus};
pub use task::{Task, TaskHandle, TaskId};

/// Serialized operation parameters.
pub type Parameters = BTreeMap<String, String>;
