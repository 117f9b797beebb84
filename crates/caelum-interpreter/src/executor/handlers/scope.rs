//! `scope` — a frame that overrides variables and functions, then restores.
//!
//! Saves the named bindings, applies the overrides, runs the body, runs
//! `on_error` on failure and `cleanup` always, restores the saved bindings,
//! and removes variables the frame introduced.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use crate::functions::{FunctionParam, ScriptFunction};
use caelum_core::{ScriptError, Step, Value};
use std::collections::{HashMap, HashSet};

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let steps = step.steps_attr("steps")?;
    let before: HashSet<String> = ctx.variables.snapshot().into_keys().collect();

    // Save and override variables.
    let mut saved_vars: HashMap<String, Option<Value>> = HashMap::new();
    if let Some(vars) = step.opt_attr("variables") {
        let vars = vars.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: "scope 'variables' must be an object".to_string(),
        })?;
        for (name, expr) in vars {
            let value = ctx.evaluate(expr).await?;
            saved_vars.insert(name.clone(), ctx.variables.get(name));
            ctx.variables.insert_raw(name, value);
        }
    }

    // Define and override functions.
    let mut saved_fns: Vec<String> = Vec::new();
    if let Some(fns) = step.opt_attr("functions") {
        let fns = fns.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: "scope 'functions' must be an object".to_string(),
        })?;
        for (name, body) in fns {
            let obj = body.as_object().ok_or_else(|| ScriptError::InvalidStep {
                message: "scope function definition must be an object".to_string(),
            })?;
            let params = match obj.get("params") {
                Some(Value::Array(items)) => items
                    .iter()
                    .map(|p| {
                        p.as_str()
                            .map(|n| FunctionParam {
                                name: n.to_string(),
                                default: None,
                            })
                            .ok_or_else(|| ScriptError::InvalidStep {
                                message: "scope function params must be names".to_string(),
                            })
                    })
                    .collect::<Result<Vec<_>, _>>()?,
                _ => Vec::new(),
            };
            let body_steps = match obj.get("steps") {
                Some(s) => Step::parse_sequence(s)?,
                None => Vec::new(),
            };
            ctx.functions.define_closure(
                ScriptFunction {
                    name: name.clone(),
                    params,
                    steps: body_steps,
                    closure: ctx.variables.snapshot(),
                },
                ctx.script.clone(),
            );
            saved_fns.push(name.clone());
        }
    }

    let outcome = run_steps(ctx, &steps).await;

    let mut flow = Flow::Next;
    let mut unhandled = match outcome {
        Ok(f) => {
            flow = f;
            None
        }
        Err(e) if matches!(e, ScriptError::Stopped) => {
            restore(ctx, &before, &saved_vars, &saved_fns);
            return Err(e);
        }
        Err(e) => {
            if let Some(on_error) = step.opt_steps_attr("on_error")? {
                if let Err(secondary) = run_steps(ctx, &on_error).await {
                    tracing::warn!(
                        target: "caelum::script",
                        error = %secondary,
                        "Scope on_error steps failed"
                    );
                }
            }
            Some(e)
        }
    };

    // Cleanup always runs inside the frame.
    if let Some(cleanup) = step.opt_steps_attr("cleanup")? {
        if let Err(e) = run_steps(ctx, &cleanup).await {
            if unhandled.is_none() {
                unhandled = Some(e);
            }
        }
    }

    // A `return` leaving the frame keeps its value past the restore.
    let returned = match flow {
        Flow::Return => ctx.variables.get("__return_value__"),
        _ => None,
    };
    restore(ctx, &before, &saved_vars, &saved_fns);
    if let Some(value) = returned {
        ctx.variables.insert_raw("__return_value__", value);
    }

    match unhandled {
        Some(e) => Err(e),
        None => Ok(flow),
    }
}

fn restore(
    ctx: &ExecutionContext,
    before: &HashSet<String>,
    saved_vars: &HashMap<String, Option<Value>>,
    saved_fns: &[String],
) {
    // Variables introduced inside the frame do not outlive it.
    for name in ctx.variables.snapshot().into_keys() {
        if !before.contains(&name) {
            ctx.variables.remove(&name);
        }
    }
    for (name, prior) in saved_vars {
        match prior {
            Some(value) => ctx.variables.insert_raw(name, value.clone()),
            None => {
                ctx.variables.remove(name);
            }
        }
    }
    for name in saved_fns {
        ctx.functions.remove(name);
    }
}
