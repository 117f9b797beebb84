//! `nested_script` — run a previously loaded script synchronously.

use crate::context::ExecutionContext;
use crate::executor::{worker, Flow};
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let name = step.string_attr("script")?;
    let script = ctx
        .scripts
        .get(&name)
        .map(|s| s.value().clone())
        .ok_or_else(|| ScriptError::ScriptNotFound { name: name.clone() })?;
    let child_ctx = ctx.for_script(&name);
    Box::pin(worker::run_body(&child_ctx, &script)).await?;
    Ok(Flow::Next)
}
