//! The per-script execution worker.
//!
//! Iterates the top-level steps in index order, resolving `goto` jumps
//! against the script's label map with a per-label jump budget.

use super::{dispatcher, Flow};
use crate::context::ExecutionContext;
use crate::scripts::LoadedScript;
use caelum_core::{script_log, ScriptError};
use std::collections::HashMap;

/// Runs a script body to completion.
pub(crate) async fn run_body(
    ctx: &ExecutionContext,
    script: &LoadedScript,
) -> Result<(), ScriptError> {
    let steps = &script.script.steps;
    let mut jump_counts: HashMap<String, u32> = HashMap::new();
    let mut index = 0usize;

    script_log!(
        debug,
        execution_id = %ctx.execution_id,
        script = %script.name,
        steps = steps.len(),
        "Starting script body"
    );

    while index < steps.len() {
        ctx.control.checkpoint().await?;
        match dispatcher::dispatch(ctx, &steps[index]).await? {
            Flow::Next => index += 1,
            Flow::Goto(label) => {
                let (key, target) =
                    script
                        .resolve_label(&label)
                        .ok_or_else(|| ScriptError::LabelNotFound {
                            label: label.clone(),
                        })?;
                let count = jump_counts.entry(key).or_insert(0);
                *count += 1;
                if *count > ctx.options.goto_limit {
                    return Err(ScriptError::GotoLimitExceeded {
                        label,
                        jumps: *count,
                    });
                }
                index = target;
            }
            // A stray break ends the body; continue just moves on.
            Flow::Break | Flow::Return => break,
            Flow::Continue => index += 1,
        }
    }

    script_log!(
        debug,
        execution_id = %ctx.execution_id,
        script = %script.name,
        "Script body finished"
    );
    Ok(())
}
