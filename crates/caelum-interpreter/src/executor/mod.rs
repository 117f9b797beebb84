//! Step execution: dispatcher, worker loop, and per-step handlers.

pub mod dispatcher;
pub mod handlers;
pub mod worker;

use crate::context::ExecutionContext;
use caelum_core::{ScriptError, Step};
use std::future::Future;
use std::pin::Pin;

/// Control-flow outcome of one step.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Flow {
    /// Fall through to the next step.
    Next,
    /// Jump to a label; resolved by the enclosing script body.
    Goto(String),
    /// Leave the enclosing loop.
    Break,
    /// Skip to the next iteration of the enclosing loop.
    Continue,
    /// End the script body; `__return_value__` carries the result.
    Return,
}

pub(crate) type StepFuture<'a> = Pin<Box<dyn Future<Output = Result<Flow, ScriptError>> + Send + 'a>>;

/// Runs a step sequence, honoring stop/pause at each boundary and
/// propagating any non-`Next` flow to the caller.
pub(crate) fn run_steps<'a>(ctx: &'a ExecutionContext, steps: &'a [Step]) -> StepFuture<'a> {
    Box::pin(async move {
        for step in steps {
            ctx.control.checkpoint().await?;
            match dispatcher::dispatch(ctx, step).await? {
                Flow::Next => {}
                other => return Ok(other),
            }
        }
        Ok(Flow::Next)
    })
}
