//! Lazy construction of provenance events and walking of informer chains.

use std::collections::{BTreeSet, HashSet};

use chrono::Utc;

use super::context::ExecutionFrame;
use crate::core::{AgentId, Event, EventType};
use crate::error::Result;
use crate::services::Services;
use crate::store::EventStore;

/// Operation id recorded for frames pushed without one.
pub const UNSPECIFIED_OPERATION: &str = "urn:lineage:operation:unspecified";

/// Build the event for `frame`.
///
/// `informer` must be captured before the event exists so a frame can never
/// inform itself. The result is not yet registered with the store.
pub(crate) fn draft_event(
    services: &Services,
    frame: &ExecutionFrame,
    event_type: EventType,
    subject: Option<&str>,
    agent: AgentId,
    informer: Option<String>,
) -> Event {
    let namespace = services.namespace_for(frame.target());
    Event {
        id: services.ids.event_id(namespace, event_type.code(), subject),
        target: frame.target().map(str::to_string),
        operation: frame
            .operation()
            .unwrap_or(UNSPECIFIED_OPERATION)
            .to_string(),
        parameters: frame.parameters().clone(),
        event_type,
        started_at: Utc::now(),
        ended_at: None,
        agent,
        used: BTreeSet::new(),
        influenced: None,
        informer,
    }
}

/// Follow `informer` links starting at `id`, newest first.
///
/// Stops at the first event without an informer, at an identifier the store
/// does not know, or when a link would revisit an event.
pub fn informer_chain(store: &dyn EventStore, id: &str) -> Result<Vec<Event>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(id.to_string());

    while let Some(current) = next.take() {
        if !seen.insert(current.clone()) {
            break;
        }
        let Some(event) = store.find(&current)? else {
            break;
        };
        next = event.informer.clone();
        chain.push(event);
    }

    Ok(chain)
}
