//! `switch` — dispatch on a variable's evaluated value.

use crate::context::ExecutionContext;
use crate::executor::{run_steps, Flow};
use caelum_core::{ScriptError, Step, Value};

/// Numeric-aware equality for case matching.
fn values_equal(lhs: &Value, rhs: &Value) -> bool {
    match (lhs.as_number(), rhs.as_number()) {
        (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
        _ => lhs == rhs,
    }
}

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let variable = step.string_attr("variable")?;
    let stored = ctx
        .variables
        .get(&variable)
        .ok_or_else(|| ScriptError::VariableNotFound {
            name: variable.clone(),
        })?;
    // The stored value may itself be an expression tree; evaluate it.
    let value = ctx.evaluate(&stored).await?;

    let cases = step
        .attr("cases")?
        .as_array()
        .ok_or_else(|| ScriptError::InvalidStep {
            message: "switch 'cases' must be an array".to_string(),
        })?
        .clone();

    for case in &cases {
        let entry = case.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: "switch case must be an object".to_string(),
        })?;
        let case_value = entry.get("case").ok_or_else(|| ScriptError::InvalidStep {
            message: "switch case is missing 'case'".to_string(),
        })?;
        let candidate = ctx.evaluate(case_value).await?;
        if values_equal(&candidate, &value) {
            let steps = caelum_core::Step::parse_sequence(entry.get("steps").ok_or_else(
                || ScriptError::InvalidStep {
                    message: "switch case is missing 'steps'".to_string(),
                },
            )?)?;
            return run_steps(ctx, &steps).await;
        }
    }

    if let Some(default) = step.opt_attr("default") {
        let entry = default.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: "switch 'default' must be an object".to_string(),
        })?;
        if let Some(steps_value) = entry.get("steps") {
            let steps = caelum_core::Step::parse_sequence(steps_value)?;
            return run_steps(ctx, &steps).await;
        }
    }

    Ok(Flow::Next)
}
