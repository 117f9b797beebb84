//! `return` — store the result and end the script body.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step, Value};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let value = match step.opt_attr("value") {
        Some(v) => ctx.evaluate(v).await?,
        None => Value::Null,
    };
    // Raw insert: consecutive runs may legitimately return different kinds.
    ctx.variables.insert_raw("__return_value__", value);
    Ok(Flow::Return)
}
