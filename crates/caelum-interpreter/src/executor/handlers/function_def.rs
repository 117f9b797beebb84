//! `function_def` — register a script closure.
//!
//! Captures the current variable store; on invocation the captured snapshot
//! and the merged parameters overlay the store, the body runs, and
//! `__return_value__` is returned.

use crate::context::ExecutionContext;
use crate::executor::Flow;
use crate::functions::{FunctionParam, ScriptFunction};
use caelum_core::{ScriptError, Step, Value};

fn parse_params(value: Option<&Value>) -> Result<Vec<FunctionParam>, ScriptError> {
    let Some(value) = value else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| ScriptError::InvalidStep {
        message: "function_def 'params' must be an array".to_string(),
    })?;
    items
        .iter()
        .map(|item| match item {
            Value::String(name) => Ok(FunctionParam {
                name: name.clone(),
                default: None,
            }),
            Value::Object(obj) => {
                let name = obj
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| ScriptError::InvalidStep {
                        message: "function_def parameter object needs a 'name'".to_string(),
                    })?
                    .to_string();
                Ok(FunctionParam {
                    name,
                    default: obj.get("default").cloned(),
                })
            }
            _ => Err(ScriptError::InvalidStep {
                message: "function_def parameters must be names or objects".to_string(),
            }),
        })
        .collect()
}

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let name = step.string_attr("name")?;
    let params = parse_params(step.opt_attr("params"))?;
    let steps = step.steps_attr("steps")?;
    let closure = ctx.variables.snapshot();

    tracing::debug!(
        target: "caelum::script",
        function = %name,
        params = params.len(),
        "Defined script function"
    );
    ctx.functions.define_closure(
        ScriptFunction {
            name,
            params,
            steps,
            closure,
        },
        ctx.script.clone(),
    );
    Ok(Flow::Next)
}
