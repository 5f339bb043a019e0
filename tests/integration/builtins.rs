//! The operations shipped with the binary, driven through the scheduler.

use std::sync::Arc;

use lineage::builtin;
use lineage::core::ids::is_uri;
use lineage::execution::informer_chain;
use lineage::store::{EventStore, MemoryEventStore, MemoryTaskStore};
use lineage::{EventType, Services, TaskScheduler, TaskStatus};

use crate::fixtures::{params, ROOT};

struct Builtins {
    scheduler: TaskScheduler,
    events: Arc<MemoryEventStore>,
}

fn builtins() -> Builtins {
    let events = Arc::new(MemoryEventStore::new());
    let services = Services::new(events.clone(), Arc::new(MemoryTaskStore::new()))
        .with_namespace_root(ROOT);
    let scheduler = TaskScheduler::new(builtin::registry().unwrap(), services, 2).unwrap();
    Builtins { scheduler, events }
}

#[test]
fn test_record_writes_event() {
    let b = builtins();
    let task = b
        .scheduler
        .dispatch(
            Some("urn:doc:1"),
            "record",
            params(&[("type", "new"), ("subject", "draft"), ("used", "urn:a, urn:b")]),
        )
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let event = b.events.find(&task.running_event().unwrap().id).unwrap().unwrap();
    assert_eq!(event.event_type, EventType::Creation);
    assert!(event.id.starts_with("urn:doc:1/event/new.draft-"), "{}", event.id);
    assert_eq!(event.used.len(), 2);
    assert_eq!(event.influenced.as_deref(), Some("urn:doc:1"));
    assert!(event.is_closed());
}

#[test]
fn test_record_subject_with_spaces_keeps_uri_syntax() {
    let b = builtins();
    let task = b
        .scheduler
        .dispatch(Some("urn:doc:1"), "record", params(&[("subject", "two words")]))
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let id = task.running_event().unwrap().id;
    assert!(id.starts_with("urn:doc:1/event/info.two+words-"), "{}", id);
    assert!(is_uri(&id), "{}", id);
    assert!(b.events.find(&id).unwrap().is_some());
}

#[test]
fn test_record_rejects_unknown_type() {
    let b = builtins();
    let task = b
        .scheduler
        .dispatch(None, "record", params(&[("type", "bogus")]))
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    assert!(task.failure().unwrap().contains("bogus"));
    assert!(b.events.is_empty());
}

#[test]
fn test_noop_and_fail() {
    let b = builtins();
    let quiet = b.scheduler.dispatch(None, "noop", params(&[])).unwrap();
    let failing = b
        .scheduler
        .dispatch(None, "fail", params(&[("message", "as asked")]))
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&quiet), TaskStatus::Done);
    assert_eq!(b.scheduler.wait_for_ending(&failing), TaskStatus::Failed);
    assert_eq!(failing.failure().as_deref(), Some("as asked"));
    assert!(b.events.is_empty());
}

#[test]
fn test_sequence_chains_nested_records() {
    let b = builtins();
    let task = b
        .scheduler
        .dispatch(
            Some("urn:doc:2"),
            "sequence",
            params(&[("steps", "record,noop,record"), ("used", "urn:src")]),
        )
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let root = task.running_event().unwrap();
    assert_eq!(root.event_type, EventType::Derivation);
    assert_eq!(root.operation, "sequence");

    let events = b.events.events();
    assert_eq!(events.len(), 3);
    let records: Vec<_> = events.iter().filter(|e| e.operation == "record").collect();
    assert_eq!(records.len(), 2);
    for record in records {
        assert_eq!(record.informer.as_deref(), Some(root.id.as_str()));
        assert!(record.used.contains("urn:src"));
        assert!(!record.parameters.contains_key("steps"));

        let chain = informer_chain(b.events.as_ref(), &record.id).unwrap();
        assert_eq!(chain.len(), 2);
        assert_eq!(chain[1].id, root.id);
    }
}

#[test]
fn test_sequence_stops_at_failing_step() {
    let b = builtins();
    let task = b
        .scheduler
        .dispatch(None, "sequence", params(&[("steps", "record,fail,record")]))
        .unwrap();
    assert_eq!(b.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    assert!(task.failure().unwrap().contains("fail"));

    // Only the sequence event and the first record were written.
    assert_eq!(b.events.len(), 2);
}
