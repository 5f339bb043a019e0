use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::ids::validate_uri;
use crate::core::AgentId;
use crate::{llog_debug, Error, Result};

/// Root namespace used when an operation has no target.
pub const DEFAULT_NAMESPACE_ROOT: &str = "https://lineage.local";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct Config {
    /// Namespace for identifiers minted without a target.
    pub namespace_root: Option<String>,
    /// Worker pool size; defaults to the available parallelism.
    pub worker_threads: Option<usize>,
    /// Agent reported when no principal can be resolved.
    pub unknown_agent: Option<String>,
    /// Fixed principal for the default agent.
    pub principal: Option<String>,
    /// Environment variable holding the principal; exclusive with `principal`.
    pub principal_env: Option<String>,
    /// Directory for the JSON store; in-memory stores when unset.
    pub store_dir: Option<String>,
    #[serde(default)]
    pub debug: bool,
}

impl Config {
    pub fn lineage_dir() -> Result<PathBuf> {
        Ok(dirs::home_dir().ok_or(Error::NoHomeDir)?.join(".lineage"))
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(Self::lineage_dir()?.join("lineage.toml"))
    }

    pub fn effective_namespace_root(&self) -> &str {
        self.namespace_root
            .as_deref()
            .unwrap_or(DEFAULT_NAMESPACE_ROOT)
            .trim_end_matches('/')
    }

    pub fn effective_worker_threads(&self) -> usize {
        match self.worker_threads {
            Some(n) if n > 0 => n,
            _ => std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(1),
        }
    }

    pub fn effective_unknown_agent(&self) -> AgentId {
        self.unknown_agent
            .clone()
            .map(AgentId)
            .unwrap_or_else(AgentId::unknown)
    }

    pub fn effective_store_dir(&self) -> Option<PathBuf> {
        self.store_dir.as_deref().map(expand_tilde)
    }

    /// Check identifier-shaped settings and principal selection.
    pub fn validate(&self) -> Result<()> {
        validate_uri(self.effective_namespace_root())?;
        validate_uri(self.effective_unknown_agent().as_str())?;
        if self.principal.is_some() && self.principal_env.is_some() {
            return Err(Error::Validation(
                "principal and principal_env are mutually exclusive".to_string(),
            ));
        }
        if matches!(&self.principal, Some(p) if p.trim().is_empty()) {
            return Err(Error::Validation("principal must not be blank".to_string()));
        }
        if matches!(&self.principal_env, Some(var) if var.trim().is_empty()) {
            return Err(Error::Validation("principal_env must name a variable".to_string()));
        }
        if self.worker_threads == Some(0) {
            llog_debug!("worker_threads = 0, using available parallelism");
        }
        Ok(())
    }

    /// Load `~/.lineage/lineage.toml`, or defaults when it does not exist.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        llog_debug!("Config::load path={}", path.display());
        if !path.exists() {
            llog_debug!("Config file not found, using defaults");
            return Ok(Self::default());
        }
        let config: Self = toml::from_str(&fs::read_to_string(path)?)?;
        config.validate()?;
        llog_debug!(
            "Config loaded: namespace_root={}, worker_threads={:?}, store_dir={:?}",
            config.effective_namespace_root(),
            config.worker_threads,
            config.store_dir
        );
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, toml::to_string_pretty(self)?)?;
        llog_debug!("Config saved to {}", path.display());
        Ok(())
    }
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}
