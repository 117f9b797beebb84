//! `async` — enqueue steps on the worker pool without waiting.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let steps = step.steps_attr("steps")?;
    let child_ctx = ctx.clone();
    let guard = ctx.gate.enter();
    tokio::spawn(async move {
        let _guard = guard;
        if let Err(e) = run_steps(&child_ctx, &steps).await {
            if !matches!(e, ScriptError::Stopped) {
                tracing::warn!(
                    target: "caelum::script",
                    execution_id = %child_ctx.execution_id,
                    error = %e,
                    "Async steps failed"
                );
            }
        }
    });
    Ok(Flow::Next)
}
