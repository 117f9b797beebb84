//! `print` / `message` — log evaluated text.

use super::interpolate;
use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step, Value};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let text = match step.attr("message")? {
        Value::String(s) => interpolate(s, &ctx.variables),
        other => ctx.evaluate(other).await?.to_string(),
    };
    tracing::info!(
        target: "caelum::script",
        execution_id = %ctx.execution_id,
        "{text}"
    );
    Ok(Flow::Next)
}
