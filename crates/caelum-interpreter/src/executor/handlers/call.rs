//! `call` — invoke a named function with evaluated parameters.
//!
//! The legacy `function` step tag routes here as well; there is exactly one
//! call path.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step, Value};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let name = step.string_attr("function")?;
    let params = match step.opt_attr("params") {
        Some(p) => ctx.evaluate(p).await?,
        None => Value::Null,
    };
    let result = ctx.call_function(&name, params).await?;
    if let Some(target) = step.opt_string_attr("result")? {
        ctx.variables.set(&target, result)?;
    }
    Ok(Flow::Next)
}
