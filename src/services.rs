//! Collaborator bundle shared by the scheduler and every execution context.

use std::sync::Arc;

use crate::config::{Config, DEFAULT_NAMESPACE_ROOT};
use crate::core::{
    AgentId, AgentResolver, EnvPrincipal, IdGenerator, NoPrincipal, StaticPrincipal, TimestampIds,
};
use crate::store::{EventStore, JsonFileStore, MemoryEventStore, MemoryTaskStore, TaskStore};
use crate::{llog_debug, Result};

/// Stores, agent resolution and identifier strategy.
///
/// Cloning is cheap; all members are shared. Everything here is read-only
/// after construction, so concurrent use needs no locking beyond what the
/// stores do internally.
#[derive(Clone)]
pub struct Services {
    pub events: Arc<dyn EventStore>,
    pub tasks: Arc<dyn TaskStore>,
    pub agents: Arc<dyn AgentResolver>,
    pub ids: Arc<dyn IdGenerator>,
    namespace_root: String,
    unknown_agent: AgentId,
}

impl Services {
    pub fn new(events: Arc<dyn EventStore>, tasks: Arc<dyn TaskStore>) -> Self {
        Self {
            events,
            tasks,
            agents: Arc::new(NoPrincipal),
            ids: Arc::new(TimestampIds),
            namespace_root: DEFAULT_NAMESPACE_ROOT.to_string(),
            unknown_agent: AgentId::unknown(),
        }
    }

    /// Fresh in-memory stores.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(MemoryEventStore::new()),
            Arc::new(MemoryTaskStore::new()),
        )
    }

    /// Build collaborators from configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        config.validate()?;
        let mut services = match config.effective_store_dir() {
            Some(dir) => {
                let store = Arc::new(JsonFileStore::open(&dir)?);
                Self::new(store.clone(), store)
            }
            None => Self::in_memory(),
        };
        if let Some(principal) = &config.principal {
            services = services.with_agents(Arc::new(StaticPrincipal(principal.clone())));
        } else if let Some(var) = &config.principal_env {
            services = services.with_agents(Arc::new(EnvPrincipal::new(var)));
        }
        Ok(services
            .with_namespace_root(config.effective_namespace_root())
            .with_unknown_agent(config.effective_unknown_agent()))
    }

    pub fn with_agents(mut self, agents: Arc<dyn AgentResolver>) -> Self {
        self.agents = agents;
        self
    }

    pub fn with_ids(mut self, ids: Arc<dyn IdGenerator>) -> Self {
        self.ids = ids;
        self
    }

    pub fn with_namespace_root(mut self, root: &str) -> Self {
        self.namespace_root = root.trim_end_matches('/').to_string();
        self
    }

    pub fn with_unknown_agent(mut self, agent: AgentId) -> Self {
        self.unknown_agent = agent;
        self
    }

    pub fn namespace_root(&self) -> &str {
        &self.namespace_root
    }

    /// Namespace for identifiers: the target if present, else the root.
    pub fn namespace_for<'a>(&'a self, target: Option<&'a str>) -> &'a str {
        target.unwrap_or(&self.namespace_root)
    }

    /// The agent acting when no task is bound.
    ///
    /// Resolution failures degrade to the unknown-agent sentinel.
    pub fn default_agent(&self) -> AgentId {
        match self.agents.current_principal() {
            Ok(Some(principal)) if !principal.trim().is_empty() => {
                AgentId::for_principal(&self.namespace_root, &principal)
            }
            Ok(_) => self.unknown_agent.clone(),
            Err(e) => {
                llog_debug!("agent resolution failed: {}", e);
                self.unknown_agent.clone()
            }
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services")
            .field("namespace_root", &self.namespace_root)
            .field("unknown_agent", &self.unknown_agent)
            .finish_non_exhaustive()
    }
}
