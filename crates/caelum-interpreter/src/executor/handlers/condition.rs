//! `condition` — boolean branch over single sub-steps.

use crate::context::ExecutionContext;
use crate::executor::{dispatcher, Flow};
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let condition = ctx.evaluate(step.attr("condition")?).await?;
    let flag = condition.as_bool().ok_or_else(|| ScriptError::InvalidStep {
        message: "condition result must be boolean".to_string(),
    })?;
    if flag {
        let branch = step.step_attr("true")?;
        Box::pin(dispatcher::dispatch(ctx, &branch)).await
    } else if step.opt_attr("false").is_some() {
        let branch = step.step_attr("false")?;
        Box::pin(dispatcher::dispatch(ctx, &branch)).await
    } else {
        Ok(Flow::Next)
    }
}
