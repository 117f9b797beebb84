//! Routes each step to its handler.

use super::{handlers, Flow, StepFuture};
use crate::context::ExecutionContext;
use caelum_core::{ScriptError, Step, StepType};

/// Dispatches one step to its handler.
pub(crate) fn dispatch<'a>(ctx: &'a ExecutionContext, step: &'a Step) -> StepFuture<'a> {
    Box::pin(dispatch_inner(ctx, step))
}

async fn dispatch_inner(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    tracing::trace!(
        target: "caelum::script",
        execution_id = %ctx.execution_id,
        step = %step.op,
        "Dispatching step"
    );

    let result = match step.op {
        StepType::Call => handlers::call::execute(ctx, step).await,
        StepType::Condition => handlers::condition::execute(ctx, step).await,
        StepType::Loop => handlers::loops::execute_loop(ctx, step).await,
        StepType::While => handlers::loops::execute_while(ctx, step).await,
        StepType::Goto => handlers::goto_step::execute(ctx, step).await,
        StepType::Switch => handlers::switch::execute(ctx, step).await,
        StepType::Delay => handlers::delay::execute(ctx, step).await,
        StepType::Parallel => handlers::parallel::execute(ctx, step).await,
        StepType::NestedScript => handlers::nested_script::execute(ctx, step).await,
        StepType::Assign => handlers::assign::execute(ctx, step).await,
        StepType::Import => handlers::import::execute(ctx, step).await,
        StepType::WaitEvent => handlers::events::wait_event(ctx, step).await,
        StepType::ListenEvent => handlers::events::listen_event(ctx, step).await,
        StepType::BroadcastEvent => handlers::events::broadcast_event(ctx, step).await,
        StepType::Print | StepType::Message => handlers::print::execute(ctx, step).await,
        StepType::Async => handlers::async_step::execute(ctx, step).await,
        StepType::Try => handlers::try_step::execute(ctx, step).await,
        StepType::Throw => handlers::throw::execute(ctx, step).await,
        StepType::FunctionDef => handlers::function_def::execute(ctx, step).await,
        StepType::Return => handlers::return_step::execute(ctx, step).await,
        StepType::Break => Ok(Flow::Break),
        StepType::Continue => Ok(Flow::Continue),
        StepType::Retry => handlers::retry::execute(ctx, step).await,
        StepType::Schedule => handlers::schedule::execute(ctx, step).await,
        StepType::Scope => handlers::scope::execute(ctx, step).await,
    };

    if let Err(e) = &result {
        if !matches!(e, ScriptError::Stopped) {
            tracing::debug!(
                target: "caelum::script",
                execution_id = %ctx.execution_id,
                step = %step.op,
                error = %e,
                "Step failed"
            );
        }
    }
    result
}
