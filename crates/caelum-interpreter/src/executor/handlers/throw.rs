//! `throw` — raise a named error.

use super::interpolate;
use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let exception_type = step
        .opt_string_attr("exception_type")?
        .unwrap_or_else(|| "runtime_error".to_string());
    let message = step
        .opt_string_attr("message")?
        .map(|m| interpolate(&m, &ctx.variables))
        .unwrap_or_default();

    // Host-registered names take their registered message.
    if ctx.custom_errors.contains_key(&exception_type) {
        return Err(ctx.custom_error(&exception_type));
    }
    Err(ScriptError::thrown(&exception_type, message))
}
