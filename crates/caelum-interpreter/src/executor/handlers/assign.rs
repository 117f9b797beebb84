//! `assign` — evaluate `value` and write it to `variable`.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let variable = step.string_attr("variable")?;
    let value = ctx.evaluate(step.attr("value")?).await?;
    ctx.variables.set(&variable, value)?;
    Ok(Flow::Next)
}
