//! `schedule` — run steps after a delay, inline or on the worker pool.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step};
use std::time::Duration;

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let delay = Duration::from_millis(step.opt_u64_attr("delay")?.unwrap_or(0));
    let steps = step.steps_attr("steps")?;
    let detached = step.bool_attr_or("parallel", false)?;

    if detached {
        let child_ctx = ctx.clone();
        let guard = ctx.gate.enter();
        tokio::spawn(async move {
            let _guard = guard;
            tokio::time::sleep(delay).await;
            if let Err(e) = run_steps(&child_ctx, &steps).await {
                if !matches!(e, ScriptError::Stopped) {
                    tracing::warn!(
                        target: "caelum::script",
                        execution_id = %child_ctx.execution_id,
                        error = %e,
                        "Scheduled steps failed"
                    );
                }
            }
        });
        return Ok(Flow::Next);
    }

    tokio::time::sleep(delay).await;
    run_steps(ctx, &steps).await
}
