//! Built-in operations shipped with the `lineage` binary.
//!
//! - `noop`: does nothing and leaves no provenance.
//! - `record`: materializes an event (`type`, `subject` parameters), records
//!   each comma-separated `used` entity and influences the target.
//! - `fail`: fails with the `message` parameter.
//! - `sequence`: runs each comma-separated `steps` operation nested, on the
//!   same target, after recording its own event.

use crate::core::{EventType, Parameters};
use crate::error::Result;
use crate::orchestration::{Invocation, Operation, OperationError, OperationRegistry};

type OpResult = std::result::Result<(), OperationError>;

pub struct Noop;

impl Operation for Noop {
    fn id(&self) -> &str {
        "noop"
    }

    fn execute(&self, _invocation: &mut Invocation<'_>) -> OpResult {
        Ok(())
    }
}

pub struct Record;

impl Operation for Record {
    fn id(&self) -> &str {
        "record"
    }

    fn execute(&self, invocation: &mut Invocation<'_>) -> OpResult {
        let event_type = match invocation.param("type") {
            Some(code) => Some(
                EventType::from_code(code).ok_or_else(|| format!("unknown event type: {}", code))?,
            ),
            None => None,
        };
        let subject = invocation.param("subject").map(str::to_string);
        let used = split_list(invocation.param("used"));
        let target = invocation.target().map(str::to_string);

        let context = invocation.context();
        context.begin_as_event(event_type, subject.as_deref())?;
        for entity in used {
            context.add_used(entity)?;
        }
        if let Some(target) = target {
            context.add_influenced(target)?;
        }
        Ok(())
    }
}

pub struct Fail;

impl Operation for Fail {
    fn id(&self) -> &str {
        "fail"
    }

    fn execute(&self, invocation: &mut Invocation<'_>) -> OpResult {
        let message = invocation.param("message").unwrap_or("failed on request");
        Err(message.into())
    }
}

pub struct Sequence;

impl Operation for Sequence {
    fn id(&self) -> &str {
        "sequence"
    }

    fn execute(&self, invocation: &mut Invocation<'_>) -> OpResult {
        let steps = split_list(invocation.param("steps"));
        let target = invocation.target().map(str::to_string);
        let mut forwarded: Parameters = invocation.parameters().clone();
        forwarded.remove("steps");

        invocation
            .context()
            .begin_as_event(Some(EventType::Derivation), None)?;
        for step in steps {
            invocation.submit(target.as_deref(), &step, forwarded.clone())?;
        }
        Ok(())
    }
}

fn split_list(value: Option<&str>) -> Vec<String> {
    value
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Registry holding every built-in operation.
pub fn registry() -> Result<OperationRegistry> {
    OperationRegistry::new()
        .with(Noop)?
        .with(Record)?
        .with(Fail)?
        .with(Sequence)
}
