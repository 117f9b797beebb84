//! `wait_event`, `listen_event`, `broadcast_event` — the event-queue steps.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step, Value};
use std::time::Duration;

pub(crate) async fn wait_event(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let topic = step.string_attr("event")?;
    tokio::select! {
        _ = ctx.control.stopped() => Err(ScriptError::Stopped),
        _ = ctx.events.wait_for(&topic) => Ok(Flow::Next),
    }
}

pub(crate) async fn listen_event(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let names = step
        .attr("event_names")?
        .as_array()
        .ok_or_else(|| ScriptError::InvalidStep {
            message: "listen_event 'event_names' must be an array".to_string(),
        })?
        .iter()
        .map(|v| {
            v.as_str()
                .map(str::to_string)
                .ok_or_else(|| ScriptError::InvalidStep {
                    message: "listen_event names must be strings".to_string(),
                })
        })
        .collect::<Result<Vec<String>, ScriptError>>()?;

    let channel = step.opt_string_attr("channel")?;
    let timeout = step
        .opt_u64_attr("timeout")?
        .map(Duration::from_millis);
    let filter = step.bool_attr_or("filter", false)?;
    let expected_data = match step.opt_attr("event_data") {
        Some(v) => Some(ctx.evaluate(v).await?),
        None => None,
    };

    let topics: Vec<String> = names
        .iter()
        .map(|n| crate::events::EventBus::qualified(n, channel.as_deref()))
        .collect();

    let (topic, payload) = loop {
        let received = tokio::select! {
            _ = ctx.control.stopped() => return Err(ScriptError::Stopped),
            r = ctx.events.listen(&topics, timeout) => r?,
        };
        // With filtering on, a payload mismatch leaves the waiter listening.
        if filter {
            if let Some(expected) = &expected_data {
                if &received.1 != expected {
                    continue;
                }
            }
        }
        break received;
    };

    let name = topic.split('@').next().unwrap_or(&topic).to_string();
    tracing::debug!(target: "caelum::script", event = %name, "Handling event");
    // The branch steps can read the payload through this convention.
    ctx.variables.insert_raw("__event_data__", payload);

    // Prefer the per-event step table, then its default, then plain steps.
    if let Some(table) = step.opt_attr("event_steps") {
        let table = table.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: "listen_event 'event_steps' must be an object".to_string(),
        })?;
        if let Some(branch) = table.get(&name).or_else(|| table.get("default")) {
            let steps = Step::parse_sequence(branch)?;
            return run_steps(ctx, &steps).await;
        }
    }
    if let Some(steps) = step.opt_steps_attr("steps")? {
        return run_steps(ctx, &steps).await;
    }
    Ok(Flow::Next)
}

pub(crate) async fn broadcast_event(
    ctx: &ExecutionContext,
    step: &Step,
) -> Result<Flow, ScriptError> {
    let name = step.string_attr("event_name")?;
    let channel = step.opt_string_attr("channel")?;
    let payload = match step.opt_attr("event_data") {
        Some(v) => ctx.evaluate(v).await?,
        None => Value::Null,
    };
    let topic = crate::events::EventBus::qualified(&name, channel.as_deref());
    ctx.events.broadcast(&topic, payload);
    Ok(Flow::Next)
}
