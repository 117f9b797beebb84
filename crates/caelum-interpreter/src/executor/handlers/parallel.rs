//! `parallel` — run every child step concurrently and join them all.

use crate::context::ExecutionContext;
use crate::executor::{dispatcher, Flow};
use caelum_core::{ScriptError, Step};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let steps = step.steps_attr("steps")?;

    let mut handles = Vec::with_capacity(steps.len());
    for child in steps {
        let child_ctx = ctx.clone();
        let guard = ctx.gate.enter();
        handles.push(tokio::spawn(async move {
            let _guard = guard;
            dispatcher::dispatch(&child_ctx, &child).await.map(|_| ())
        }));
    }

    // Join every child; the first failure propagates with the child error
    // attached once all children have settled.
    let mut first_error: Option<ScriptError> = None;
    for handle in handles {
        match handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
            Err(join_error) => {
                if first_error.is_none() {
                    first_error = Some(ScriptError::Runtime(format!(
                        "parallel child panicked: {join_error}"
                    )));
                }
            }
        }
    }

    match first_error {
        Some(e) => Err(ScriptError::Nested {
            source: Box::new(e),
        }),
        None => Ok(Flow::Next),
    }
}
