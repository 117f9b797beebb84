//! `goto` — jump to a labeled step.
//!
//! The jump itself resolves in the script body, which owns the label map and
//! the per-label jump budget.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(_ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    Ok(Flow::Goto(step.string_attr("label")?))
}
