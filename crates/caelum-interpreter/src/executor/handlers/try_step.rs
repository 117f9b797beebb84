//! `try` — structured error handling with catch/else/finally.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step, Value};

/// One catch arm: a kind name (or `all`) plus its steps.
struct CatchArm {
    kind: String,
    steps: Vec<Step>,
}

fn parse_catch_arms(value: &Value) -> Result<Vec<CatchArm>, ScriptError> {
    // Accept a single arm object or an array of arms.
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        Value::Object(_) => vec![value],
        _ => {
            return Err(ScriptError::InvalidStep {
                message: "try 'catch' must be an object or array".to_string(),
            })
        }
    };
    entries
        .into_iter()
        .map(|entry| {
            let obj = entry.as_object().ok_or_else(|| ScriptError::InvalidStep {
                message: "catch arm must be an object".to_string(),
            })?;
            let kind = obj
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("all")
                .to_string();
            let steps = match obj.get("steps") {
                Some(s) => Step::parse_sequence(s)?,
                None => Vec::new(),
            };
            Ok(CatchArm { kind, steps })
        })
        .collect()
}

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let try_steps = step.steps_attr("try")?;

    let outcome = run_steps(ctx, &try_steps).await;

    let mut flow = Flow::Next;
    let mut unhandled: Option<ScriptError> = None;

    match outcome {
        Ok(f) => {
            flow = f;
            // No error: run the optional else block.
            if let Some(else_steps) = step.opt_steps_attr("else")? {
                match run_steps(ctx, &else_steps).await {
                    Ok(f) => {
                        if f != Flow::Next {
                            flow = f;
                        }
                    }
                    Err(e) => unhandled = Some(e),
                }
            }
        }
        Err(error) if matches!(error, ScriptError::Stopped) => return Err(error),
        Err(error) => {
            let mut handled = false;
            if let Some(catch_value) = step.opt_attr("catch") {
                for arm in parse_catch_arms(catch_value)? {
                    if arm.kind == "all" || arm.kind == error.kind() {
                        tracing::debug!(
                            target: "caelum::script",
                            kind = %error.kind(),
                            "Caught script error"
                        );
                        match run_steps(ctx, &arm.steps).await {
                            Ok(f) => {
                                if f != Flow::Next {
                                    flow = f;
                                }
                            }
                            Err(e) => unhandled = Some(e),
                        }
                        handled = true;
                        break;
                    }
                }
            }
            if !handled && unhandled.is_none() {
                unhandled = Some(error);
            }
        }
    }

    // Finally always runs, even when the error is about to propagate.
    if let Some(finally_steps) = step.opt_steps_attr("finally")? {
        match run_steps(ctx, &finally_steps).await {
            Ok(f) => {
                if f != Flow::Next {
                    flow = f;
                }
            }
            Err(e) => {
                if unhandled.is_none() {
                    unhandled = Some(e);
                }
            }
        }
    }

    match unhandled {
        Some(e) => Err(e),
        None => Ok(flow),
    }
}
