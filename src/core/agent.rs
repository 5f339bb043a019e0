//! Agent identity and principal resolution.

use serde::{Deserialize, Serialize};

use super::ids::encode_segment;

/// Identifier of the party responsible for an execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AgentId(pub String);

impl AgentId {
    /// Sentinel used when no principal can be resolved.
    pub const UNKNOWN: &'static str = "urn:lineage:agent:unknown";

    pub fn unknown() -> Self {
        Self(Self::UNKNOWN.to_string())
    }

    /// Agent for an authenticated principal under a namespace root.
    ///
    /// The principal is encoded as a single segment.
    pub fn for_principal(root: &str, principal: &str) -> Self {
        Self(format!(
            "{}/agent/{}",
            root.trim_end_matches('/'),
            encode_segment(principal.trim())
        ))
    }

    /// Software agent acting on behalf of a dispatched task.
    pub fn for_task(task_uri: &str) -> Self {
        Self(format!("{}/agent", task_uri))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for AgentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Error type resolvers may return; it never leaves the crate.
pub type ResolveError = Box<dyn std::error::Error + Send + Sync>;

/// Answers "who is acting" when no task is bound.
///
/// Implementations may fail; callers degrade to [`AgentId::unknown`].
pub trait AgentResolver: Send + Sync {
    fn current_principal(&self) -> std::result::Result<Option<String>, ResolveError>;
}

/// Resolver that never knows anyone.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPrincipal;

impl AgentResolver for NoPrincipal {
    fn current_principal(&self) -> std::result::Result<Option<String>, ResolveError> {
        Ok(None)
    }
}

/// Resolver with a fixed principal, typically from configuration.
#[derive(Debug, Clone)]
pub struct StaticPrincipal(pub String);

impl AgentResolver for StaticPrincipal {
    fn current_principal(&self) -> std::result::Result<Option<String>, ResolveError> {
        Ok(Some(self.0.clone()))
    }
}

/// Resolver reading the principal from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvPrincipal {
    pub var: String,
}

impl EnvPrincipal {
    pub fn new(var: &str) -> Self {
        Self {
            var: var.to_string(),
        }
    }
}

impl AgentResolver for EnvPrincipal {
    fn current_principal(&self) -> std::result::Result<Option<String>, ResolveError> {
        match std::env::var(&self.var) {
            Ok(value) => Ok(Some(value)),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(Box::new(e)),
        }
    }
}
