//! `loop` and `while` — counted and conditional repetition.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute_loop(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let iterations = ctx
        .evaluate(step.attr("loop_iterations")?)
        .await?
        .as_i64()
        .ok_or_else(|| ScriptError::InvalidStep {
            message: "loop_iterations must evaluate to an integer".to_string(),
        })?;
    let steps = step.steps_attr("steps")?;

    for _ in 0..iterations.max(0) {
        ctx.control.checkpoint().await?;
        match run_steps(ctx, &steps).await? {
            Flow::Next | Flow::Continue => {}
            Flow::Break => break,
            other => return Ok(other),
        }
    }
    Ok(Flow::Next)
}

pub(crate) async fn execute_while(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let condition = step.attr("condition")?;
    let steps = step.steps_attr("steps")?;

    loop {
        ctx.control.checkpoint().await?;
        let flag = ctx
            .evaluate(condition)
            .await?
            .as_bool()
            .ok_or_else(|| ScriptError::InvalidStep {
                message: "while condition must evaluate to a boolean".to_string(),
            })?;
        if !flag {
            break;
        }
        match run_steps(ctx, &steps).await? {
            Flow::Next | Flow::Continue => {}
            Flow::Break => break,
            other => return Ok(other),
        }
    }
    Ok(Flow::Next)
}
