//! `delay` — sleep for a number of milliseconds.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use caelum_core::{ScriptError, Step};
use std::time::Duration;

pub(crate) async fn execute(_ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let milliseconds = step.i64_attr("milliseconds")?;
    if milliseconds < 0 {
        return Err(ScriptError::InvalidStep {
            message: "delay milliseconds must be non-negative".to_string(),
        });
    }
    tokio::time::sleep(Duration::from_millis(milliseconds as u64)).await;
    Ok(Flow::Next)
}
