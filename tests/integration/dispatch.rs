//! Synchronous vs asynchronous dispatch, waiting and task bookkeeping.

use std::thread;

use lineage::store::TaskStore;
use lineage::{AgentId, Error, TaskHandle, TaskStatus};

use crate::fixtures::{noop, op, params, recorder, Gate, Harness, ROOT};

#[test]
fn test_top_level_submit_returns_new_task_then_done() {
    let gate = Gate::new();
    let h = Harness::new(vec![gate.operation("hold"), noop("work")], 1);
    let mut ctx = h.scheduler.context();

    let hold = h.scheduler.submit(&mut ctx, None, "hold", params(&[])).unwrap();
    let task = h
        .scheduler
        .submit(&mut ctx, Some("urn:doc:1"), "work", params(&[("k", "v")]))
        .unwrap();

    // The only worker is held, so the second task cannot have started.
    assert_eq!(task.status(), TaskStatus::New);
    assert!(task.snapshot().started_at().is_none());
    assert_eq!(h.scheduler.in_flight(), 2);

    gate.release();
    assert_eq!(h.scheduler.wait_for_ending(&hold), TaskStatus::Done);
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let finished = task.snapshot();
    assert!(finished.started_at().is_some());
    assert!(finished.ended_at() >= finished.started_at());
    assert_eq!(finished.parameters.get("k").map(String::as_str), Some("v"));
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[test]
fn test_async_task_uri_in_target_namespace() {
    let gate = Gate::new();
    let h = Harness::new(vec![gate.operation("hold")], 1);
    let mut ctx = h.scheduler.context();

    let task = h
        .scheduler
        .submit(&mut ctx, Some("urn:doc:7"), "hold", params(&[]))
        .unwrap();
    let uri = task.uri().expect("asynchronous tasks are persisted");
    assert!(uri.starts_with("urn:doc:7/task/"), "{}", uri);

    // Persisted in New before the worker picks it up.
    let stored = h.tasks.find(&uri).unwrap().expect("task persisted");
    assert_eq!(stored.id, task.id());

    gate.release();
    h.scheduler.wait_for_ending(&task);
}

#[test]
fn test_untargeted_task_uri_in_root_namespace() {
    let h = Harness::new(vec![noop("work")], 1);
    let task = h.scheduler.dispatch(None, "work", params(&[])).unwrap();
    assert!(task.uri().unwrap().starts_with(&format!("{}/task/", ROOT)));
    h.scheduler.wait_for_ending(&task);
}

#[test]
fn test_done_task_removed_from_store() {
    let h = Harness::new(vec![noop("work")], 2);
    let task = h.scheduler.dispatch(Some("urn:doc:1"), "work", params(&[])).unwrap();

    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);
    assert!(h.tasks.find(&task.uri().unwrap()).unwrap().is_none());
    assert!(h.tasks.is_empty());
}

#[test]
fn test_nested_submit_runs_inline_on_caller_thread() {
    let threads = recorder();
    let nested = recorder::<TaskHandle>();

    let outer = {
        let threads = threads.clone();
        let nested = nested.clone();
        op("outer", move |inv| {
            threads.lock().unwrap().push(thread::current().id());
            let target = inv.target().map(str::to_string);
            let handle = inv.submit(target.as_deref(), "inner", params(&[]))?;
            nested.lock().unwrap().push(handle);
            Ok(())
        })
    };
    let inner = {
        let threads = threads.clone();
        op("inner", move |inv| {
            threads.lock().unwrap().push(thread::current().id());
            assert_eq!(inv.context().depth(), 2);
            Ok(())
        })
    };

    let h = Harness::new(vec![outer, inner], 2);
    let task = h.scheduler.dispatch(Some("urn:doc:1"), "outer", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);

    let threads = threads.lock().unwrap();
    assert_eq!(threads.len(), 2);
    assert_eq!(threads[0], threads[1]);
    assert_ne!(threads[0], thread::current().id());

    // The nested task was ephemeral and already terminal when submit returned.
    let nested = nested.lock().unwrap();
    let inner_task = &nested[0];
    assert!(inner_task.uri().is_none());
    assert_eq!(inner_task.status(), TaskStatus::Done);
    assert_eq!(h.scheduler.wait_for_ending(inner_task), TaskStatus::Done);
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[test]
fn test_submit_with_active_frame_runs_inline() {
    let h = Harness::new(vec![noop("work")], 1);
    let mut ctx = h.scheduler.context();
    ctx.start_operation(None, Some("caller".to_string()), params(&[]));

    let task = h.scheduler.submit(&mut ctx, None, "work", params(&[])).unwrap();

    assert_eq!(task.status(), TaskStatus::Done);
    assert!(task.snapshot().is_ephemeral());
    assert_eq!(ctx.depth(), 1);
    assert_eq!(h.scheduler.in_flight(), 0);
    assert!(h.tasks.is_empty());
}

#[test]
fn test_several_threads_wait_for_same_task() {
    let gate = Gate::new();
    let h = Harness::new(vec![gate.operation("hold")], 1);
    let task = h.scheduler.dispatch(None, "hold", params(&[])).unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let scheduler = h.scheduler.clone();
            let task = task.clone();
            thread::spawn(move || scheduler.wait_for_ending(&task))
        })
        .collect();

    gate.release();
    for waiter in waiters {
        assert_eq!(waiter.join().unwrap(), TaskStatus::Done);
    }
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);
}

#[test]
fn test_finished_tasks_swept_on_submit() {
    let h = Harness::new(vec![noop("work")], 2);
    let first = h.scheduler.dispatch(None, "work", params(&[])).unwrap();
    let second = h.scheduler.dispatch(None, "work", params(&[])).unwrap();
    h.scheduler.wait_for_all();
    assert_eq!(first.status(), TaskStatus::Done);
    assert_eq!(second.status(), TaskStatus::Done);
    assert_eq!(h.scheduler.in_flight(), 0);

    let gate = Gate::new();
    let h = Harness::new(vec![gate.operation("hold"), noop("work")], 1);
    let done = h.scheduler.dispatch(None, "work", params(&[])).unwrap();
    h.scheduler.wait_for_ending(&done);
    assert_eq!(h.scheduler.in_flight(), 0);

    let held = h.scheduler.dispatch(None, "hold", params(&[])).unwrap();
    assert_eq!(h.scheduler.in_flight(), 1);
    gate.release();
    h.scheduler.wait_for_ending(&held);
    assert_eq!(h.scheduler.in_flight(), 0);
}

#[test]
fn test_requesting_agent_and_worker_agent() {
    let seen = recorder::<AgentId>();
    let probe = {
        let seen = seen.clone();
        op("probe", move |inv| {
            seen.lock().unwrap().push(inv.context().current_agent());
            Ok(())
        })
    };
    let h = Harness::new(vec![probe], 1);
    let task = h.scheduler.dispatch(None, "probe", params(&[])).unwrap();
    h.scheduler.wait_for_ending(&task);

    // Requested by the resolved principal, executed by the task's own agent.
    assert_eq!(task.snapshot().agent, AgentId::unknown());
    let uri = task.uri().unwrap();
    assert_eq!(seen.lock().unwrap()[0], AgentId::for_task(&uri));
}

#[test]
fn test_scheduler_usable_after_failed_resolution() {
    let h = Harness::new(vec![noop("work")], 1);
    let mut ctx = h.scheduler.context();
    assert!(matches!(
        h.scheduler.submit(&mut ctx, None, "missing", params(&[])),
        Err(Error::UnregisteredOperation(_))
    ));
    let task = h.scheduler.submit(&mut ctx, None, "work", params(&[])).unwrap();
    assert_eq!(h.scheduler.wait_for_ending(&task), TaskStatus::Done);
}
