//! Failing bodies, unknown operations and misuse of the context.

use lineage::store::{EventStore, TaskStore};
use lineage::{AgentId, Error, EventType, Task, TaskHandle, TaskStatus};

use crate::fixtures::{noop, op, params, recorder, Harness};

#[test]
fn test_async_failure_reported_through_status() {
    let h = Harness::new(vec![op("boom", |_| Err("disk full".into()))], 1);
    let task = h.scheduler.dispatch(Some("urn:doc:1"), "boom", params(&[])).unwrap();

    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    let snapshot = task.snapshot();
    assert!(snapshot.ended_at().is_some());
    assert_eq!(snapshot.failure.as_deref(), Some("disk full"));

    // Failed tasks stay in the store for inspection.
    let stored = h.tasks.find(&task.uri().unwrap()).unwrap().unwrap();
    assert_eq!(stored.status(), TaskStatus::Failed);
    assert_eq!(stored.failure.as_deref(), Some("disk full"));
}

#[test]
fn test_async_panic_becomes_failure() {
    let h = Harness::new(vec![op("explode", |_| panic!("invariant broken"))], 1);
    let task = h.scheduler.dispatch(None, "explode", params(&[])).unwrap();

    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    assert!(task.failure().unwrap().contains("invariant broken"));
}

#[test]
fn test_worker_survives_failing_tasks() {
    let h = Harness::new(vec![op("explode", |_| panic!("once")), noop("work")], 1);
    let failed = h.scheduler.dispatch(None, "explode", params(&[])).unwrap();
    let ok = h.scheduler.dispatch(None, "work", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&failed), TaskStatus::Failed);
    assert_eq!(h.scheduler.wait_for_ending(&ok), TaskStatus::Done);
}

#[test]
fn test_unregistered_operation_creates_no_task() {
    let h = Harness::new(vec![noop("work")], 1);
    let mut ctx = h.scheduler.context();

    let err = h
        .scheduler
        .submit(&mut ctx, Some("urn:doc:1"), "nowhere", params(&[]))
        .unwrap_err();
    assert!(matches!(err, Error::UnregisteredOperation(ref id) if id == "nowhere"));
    assert!(h.tasks.is_empty());
    assert!(h.events.is_empty());
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[test]
fn test_unregistered_nested_operation_fails_caller() {
    let caller = op("caller", |inv| {
        inv.submit(None, "nowhere", params(&[]))?;
        Ok(())
    });
    let h = Harness::new(vec![caller], 1);
    let task = h.scheduler.dispatch(None, "caller", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    assert!(task.failure().unwrap().contains("nowhere"));
}

#[test]
fn test_sync_failure_surfaces_to_caller() {
    let outcomes = recorder::<String>();
    let caller = {
        let outcomes = outcomes.clone();
        op("caller", move |inv| {
            match inv.submit(None, "boom", params(&[])) {
                Err(Error::OperationFailed { operation, message }) => {
                    outcomes.lock().unwrap().push(format!("{}: {}", operation, message));
                }
                other => outcomes.lock().unwrap().push(format!("unexpected: {:?}", other.map(|t| t.status()))),
            }
            // The caller's frame is still active after the nested failure.
            assert_eq!(inv.context().depth(), 1);
            Ok(())
        })
    };
    let h = Harness::new(vec![caller, op("boom", |_| Err("bad input".into()))], 1);

    let task = h.scheduler.dispatch(None, "caller", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);
    assert_eq!(outcomes.lock().unwrap().as_slice(), ["boom: bad input"]);
}

#[test]
fn test_propagated_sync_failure_fails_async_task() {
    let caller = op("caller", |inv| {
        inv.submit(None, "boom", params(&[]))?;
        Ok(())
    });
    let h = Harness::new(vec![caller, op("boom", |_| Err("bad input".into()))], 1);

    let task = h.scheduler.dispatch(None, "caller", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Failed);
    let failure = task.failure().unwrap();
    assert!(failure.contains("boom") && failure.contains("bad input"), "{}", failure);
}

#[test]
fn test_add_used_before_event_is_rejected() {
    let errors = recorder::<bool>();
    let eager = {
        let errors = errors.clone();
        op("eager", move |inv| {
            let ctx = inv.context();
            let used = ctx.add_used("urn:source:a");
            let influenced = ctx.add_influenced("urn:doc:1");
            errors.lock().unwrap().push(matches!(used, Err(Error::NoCurrentEvent { .. })));
            errors
                .lock()
                .unwrap()
                .push(matches!(influenced, Err(Error::NoCurrentEvent { .. })));
            Ok(())
        })
    };
    let h = Harness::new(vec![eager], 1);
    let task = h.scheduler.dispatch(None, "eager", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);
    assert_eq!(errors.lock().unwrap().as_slice(), [true, true]);
    assert!(h.events.is_empty());
}

#[test]
fn test_context_misuse_outside_operations() {
    let h = Harness::new(vec![], 1);
    let mut ctx = h.scheduler.context();

    assert!(matches!(
        ctx.add_used("urn:source:a"),
        Err(Error::NoActiveOperation { .. })
    ));
    assert!(matches!(
        ctx.end_operation(true),
        Err(Error::NoActiveOperation { .. })
    ));
    assert!(ctx.begin_as_event(None, None).unwrap().is_none());
    assert!(ctx.current_event().is_none());
    assert_eq!(ctx.current_agent(), AgentId::unknown());
}

#[test]
fn test_failed_frame_event_not_updated() {
    let inner = op("inner", |inv| {
        let ctx = inv.context();
        ctx.begin_as_event(Some(EventType::Validation), None)?;
        ctx.add_used("urn:source:a")?;
        Err("rejected".into())
    });
    let ids = recorder::<String>();
    let outer = {
        let ids = ids.clone();
        op("outer", move |inv| {
            let outcome = inv.submit(None, "inner", params(&[]));
            assert!(outcome.is_err());
            let event = inv.context().begin_as_event(None, None)?.ok_or("no frame")?;
            ids.lock().unwrap().push(event.id);
            Ok(())
        })
    };
    let h = Harness::new(vec![outer, inner], 1);
    let task = h.scheduler.dispatch(None, "outer", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let events = h.events.events();
    assert_eq!(events.len(), 2);
    let failed = events
        .iter()
        .find(|e| e.event_type == EventType::Validation)
        .unwrap();
    // Saved when created, never rewritten after the failure.
    assert!(failed.used.is_empty());
    assert!(!failed.is_closed());

    // The failed inner event is gone from the stack, so the outer event,
    // created afterwards, has no informer.
    let outer_event = h.events.find(&ids.lock().unwrap()[0]).unwrap().unwrap();
    assert!(outer_event.informer.is_none());
}

#[test]
fn test_failed_async_task_keeps_unsaved_event() {
    let h = Harness::new(
        vec![op("partial", |inv| {
            let ctx = inv.context();
            ctx.begin_as_event(None, None)?;
            ctx.add_used("urn:source:a")?;
            Err("half done".into())
        })],
        1,
    );
    let task = h.scheduler.dispatch(None, "partial", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Failed);

    let running = task.running_event().expect("event attached on failure");
    assert!(running.is_closed());
    assert!(running.used.contains("urn:source:a"));
    let stored = h.events.find(&running.id).unwrap().unwrap();
    assert!(stored.used.is_empty());
}

#[test]
fn test_terminal_tasks_reject_transitions() {
    let task = TaskHandle::new(Task::new(None, "op", params(&[]), AgentId::unknown()));
    task.set_status(TaskStatus::Running).unwrap();
    assert!(matches!(
        task.set_status(TaskStatus::Aborted),
        Err(Error::IllegalTransition { from: TaskStatus::Running, to: TaskStatus::Aborted })
    ));
    task.set_status(TaskStatus::Done).unwrap();
    assert!(matches!(
        task.set_status(TaskStatus::Running),
        Err(Error::IllegalTransition { .. })
    ));
    assert_eq!(task.status(), TaskStatus::Done);
}
