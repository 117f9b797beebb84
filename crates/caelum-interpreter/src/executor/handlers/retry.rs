//! `retry` — re-run steps on failure with optional exponential backoff.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step};
use std::time::Duration;

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let steps = step.steps_attr("steps")?;
    let retries = step.opt_u64_attr("retries")?.unwrap_or(0);
    let mut delay = Duration::from_millis(step.opt_u64_attr("delay")?.unwrap_or(0));
    let backoff = step.bool_attr_or("exponential_backoff", false)?;
    let error_type = step.opt_string_attr("error_type")?;
    let on_retry = step.opt_steps_attr("on_retry")?;

    let attempts = retries + 1;
    for attempt in 1..=attempts {
        match run_steps(ctx, &steps).await {
            Ok(flow) => return Ok(flow),
            Err(e) if matches!(e, ScriptError::Stopped) => return Err(e),
            Err(e) => {
                // error_type narrows which kinds retry; others re-throw now.
                if let Some(kind) = &error_type {
                    if kind != "all" && e.kind() != kind {
                        return Err(e);
                    }
                }
                if attempt == attempts {
                    tracing::debug!(
                        target: "caelum::script",
                        attempts,
                        error = %e,
                        "Retry exhausted"
                    );
                    return Err(e);
                }
                tracing::debug!(
                    target: "caelum::script",
                    attempt,
                    error = %e,
                    "Retrying after failure"
                );
                if let Some(between) = &on_retry {
                    run_steps(ctx, between).await?;
                }
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                if backoff {
                    delay *= 2;
                }
            }
        }
    }
    Ok(Flow::Next)
}
