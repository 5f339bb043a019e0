//! Provenance events.
//!
//! An event records what ran, when, on whose behalf, and which entities it
//! used or influenced. Its `informer` points at the causally preceding event,
//! so events form a DAG in which every node has at most one informer.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::agent::AgentId;
use super::Parameters;

/// Classifier of a provenance event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// Generic record with no more specific meaning.
    #[default]
    Information,
    Creation,
    Modification,
    Deletion,
    Derivation,
    Validation,
}

impl EventType {
    /// Short code embedded in event identifiers.
    pub fn code(self) -> &'static str {
        match self {
            EventType::Information => "info",
            EventType::Creation => "new",
            EventType::Modification => "mod",
            EventType::Deletion => "del",
            EventType::Derivation => "der",
            EventType::Validation => "val",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "info" => Some(EventType::Information),
            "new" => Some(EventType::Creation),
            "mod" => Some(EventType::Modification),
            "del" => Some(EventType::Deletion),
            "der" => Some(EventType::Derivation),
            "val" => Some(EventType::Validation),
            _ => None,
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// A provenance record.
///
/// The causal fields (`id`, `informer`, `agent`, `operation`, `started_at`)
/// are fixed at creation. `used` and `influenced` stay mutable while the
/// owning frame is active.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: String,
    pub target: Option<String>,
    pub operation: String,
    pub parameters: Parameters,
    pub event_type: EventType,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub agent: AgentId,
    #[serde(default)]
    pub used: BTreeSet<String>,
    pub influenced: Option<String>,
    pub informer: Option<String>,
}

impl Event {
    pub fn is_closed(&self) -> bool {
        self.ended_at.is_some()
    }

    /// Stamp the end time if it is not set yet.
    pub fn close(&mut self) {
        self.ended_at.get_or_insert_with(Utc::now);
    }
}
