//! Expression evaluator for Caelum task scripts.
//!
//! Expressions come in two forms:
//!
//! 1. A **tagged tree**: an object with exactly one `$`-prefixed operator key
//!    (`{"$sub": ["$x", 2]}`), evaluated recursively against the variable
//!    store.
//! 2. An **infix string** (`"counter + 1"`), parsed by [`infix`].
//!
//! The evaluator is a pure leaf: variables and host functions reach it only
//! through the [`VariableResolver`] and [`FunctionDispatcher`] seams.

pub mod infix;

use async_trait::async_trait;
use caelum_core::{EvalError, Value};
use std::future::Future;
use std::pin::Pin;

/// Read access to the variable store.
pub trait VariableResolver: Send + Sync {
    /// Returns the current value of `name`, if set.
    fn resolve(&self, name: &str) -> Option<Value>;
}

/// Dispatch seam for the `$call` operator.
#[async_trait]
pub trait FunctionDispatcher: Send + Sync {
    /// Invokes a named host function with structured parameters.
    async fn dispatch(&self, name: &str, params: Value) -> Result<Value, EvalError>;
}

type EvalFuture<'a> = Pin<Box<dyn Future<Output = Result<Value, EvalError>> + Send + 'a>>;

/// Evaluates expressions against a variable store and optional dispatcher.
pub struct Evaluator<'a> {
    variables: &'a dyn VariableResolver,
    functions: Option<&'a dyn FunctionDispatcher>,
}

impl<'a> Evaluator<'a> {
    /// Creates an evaluator without `$call` support.
    pub fn new(variables: &'a dyn VariableResolver) -> Self {
        Self {
            variables,
            functions: None,
        }
    }

    /// Creates an evaluator that can dispatch `$call` expressions.
    pub fn with_functions(
        variables: &'a dyn VariableResolver,
        functions: &'a dyn FunctionDispatcher,
    ) -> Self {
        Self {
            variables,
            functions: Some(functions),
        }
    }

    /// Evaluates an expression tree to a value.
    pub fn evaluate<'b>(&'b self, expr: &'b Value) -> EvalFuture<'b> {
        Box::pin(async move {
            match expr {
                Value::Null | Value::Bool(_) | Value::Number(_) => Ok(expr.clone()),
                Value::String(s) => self.eval_string(s),
                Value::Array(items) => {
                    let mut out = Vec::with_capacity(items.len());
                    for item in items {
                        out.push(self.evaluate(item).await?);
                    }
                    Ok(Value::Array(out))
                }
                Value::Object(obj) => {
                    if obj.len() == 1 {
                        let (key, operand) = obj.iter().next().unwrap();
                        if key.starts_with('$') {
                            return self.eval_operator(key, operand).await;
                        }
                    }
                    let mut out = std::collections::HashMap::with_capacity(obj.len());
                    for (k, v) in obj {
                        out.insert(k.clone(), self.evaluate(v).await?);
                    }
                    Ok(Value::Object(out))
                }
            }
        })
    }

    /// String dispatch: `$name` resolves or parses as infix; bare strings
    /// resolve as variables, parse as infix when they carry operator
    /// characters, and fall through unchanged otherwise.
    fn eval_string(&self, s: &str) -> Result<Value, EvalError> {
        if let Some(rest) = s.strip_prefix('$') {
            if let Some(value) = self.variables.resolve(rest) {
                return Ok(value);
            }
            return infix::evaluate(rest, self.variables);
        }
        if let Some(value) = self.variables.resolve(s) {
            return Ok(value);
        }
        if s.chars().any(infix::is_operator_char) {
            return infix::evaluate(s, self.variables);
        }
        Ok(Value::String(s.to_string()))
    }

    async fn eval_operator(&self, op: &str, operand: &Value) -> Result<Value, EvalError> {
        match op {
            "$" => {
                let text = operand.as_str().ok_or_else(|| EvalError::OperandType {
                    op: op.to_string(),
                    expected: "string",
                })?;
                infix::evaluate(text, self.variables)
            }
            "$eq" | "$ne" => {
                let (lhs, rhs) = self.binary_operands(op, operand).await?;
                if lhs.kind() != rhs.kind() {
                    return Err(EvalError::KindMismatch { op: op.to_string() });
                }
                let equal = match (lhs.as_number(), rhs.as_number()) {
                    (Some(a), Some(b)) => a.as_f64() == b.as_f64(),
                    _ => lhs == rhs,
                };
                Ok(Value::Bool(if op == "$eq" { equal } else { !equal }))
            }
            "$gt" | "$lt" | "$gte" | "$lte" => {
                let (lhs, rhs) = self.binary_operands(op, operand).await?;
                let (a, b) = match (lhs.as_number(), rhs.as_number()) {
                    (Some(a), Some(b)) => (a.as_f64(), b.as_f64()),
                    _ => {
                        return Err(EvalError::OperandType {
                            op: op.to_string(),
                            expected: "numeric",
                        })
                    }
                };
                let result = match op {
                    "$gt" => a > b,
                    "$lt" => a < b,
                    "$gte" => a >= b,
                    _ => a <= b,
                };
                Ok(Value::Bool(result))
            }
            "$add" | "$sub" | "$mul" | "$div" => {
                let (lhs, rhs) = self.binary_operands(op, operand).await?;
                let (a, b) = match (lhs.as_i64(), rhs.as_i64()) {
                    (Some(a), Some(b)) => (a, b),
                    _ => {
                        return Err(EvalError::OperandType {
                            op: op.to_string(),
                            expected: "integer",
                        })
                    }
                };
                let result = match op {
                    "$add" => a.wrapping_add(b),
                    "$sub" => a.wrapping_sub(b),
                    "$mul" => a.wrapping_mul(b),
                    _ => {
                        if b == 0 {
                            return Err(EvalError::DivisionByZero);
                        }
                        a / b
                    }
                };
                Ok(Value::from(result))
            }
            "$and" | "$or" => {
                let items = operand.as_array().ok_or_else(|| EvalError::OperandType {
                    op: op.to_string(),
                    expected: "array",
                })?;
                if items.is_empty() {
                    return Err(EvalError::ArityMismatch {
                        op: op.to_string(),
                        expected: 1,
                        found: 0,
                    });
                }
                // Short-circuit: operands evaluate left to right, lazily.
                let shortcut = op == "$or";
                for item in items {
                    let value = self.evaluate(item).await?;
                    let flag = value.as_bool().ok_or_else(|| EvalError::OperandType {
                        op: op.to_string(),
                        expected: "boolean",
                    })?;
                    if flag == shortcut {
                        return Ok(Value::Bool(shortcut));
                    }
                }
                Ok(Value::Bool(!shortcut))
            }
            "$if" => {
                let fields = operand.as_object().ok_or_else(|| EvalError::OperandType {
                    op: op.to_string(),
                    expected: "object",
                })?;
                let condition = fields.get("condition").ok_or_else(|| {
                    EvalError::MissingField {
                        op: op.to_string(),
                        field: "condition".to_string(),
                    }
                })?;
                let flag = self
                    .evaluate(condition)
                    .await?
                    .as_bool()
                    .ok_or(EvalError::NonBooleanCondition)?;
                let branch = if flag {
                    fields.get("then").ok_or_else(|| EvalError::MissingField {
                        op: op.to_string(),
                        field: "then".to_string(),
                    })?
                } else {
                    match fields.get("else") {
                        Some(b) => b,
                        None => return Ok(Value::Null),
                    }
                };
                self.evaluate(branch).await
            }
            "$call" => {
                let fields = operand.as_object().ok_or_else(|| EvalError::OperandType {
                    op: op.to_string(),
                    expected: "object",
                })?;
                let name = fields
                    .get("function")
                    .and_then(Value::as_str)
                    .ok_or_else(|| EvalError::MissingField {
                        op: op.to_string(),
                        field: "function".to_string(),
                    })?;
                let params = match fields.get("params") {
                    Some(p) => self.evaluate(p).await?,
                    None => Value::Null,
                };
                let dispatcher = self.functions.ok_or(EvalError::NoDispatcher)?;
                dispatcher.dispatch(name, params).await
            }
            other => Err(EvalError::UnknownOperator {
                op: other.to_string(),
            }),
        }
    }

    async fn binary_operands(&self, op: &str, operand: &Value) -> Result<(Value, Value), EvalError> {
        let items = operand.as_array().ok_or_else(|| EvalError::OperandType {
            op: op.to_string(),
            expected: "array",
        })?;
        if items.len() != 2 {
            return Err(EvalError::ArityMismatch {
                op: op.to_string(),
                expected: 2,
                found: items.len(),
            });
        }
        let lhs = self.evaluate(&items[0]).await?;
        let rhs = self.evaluate(&items[1]).await?;
        Ok((lhs, rhs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct Vars(HashMap<String, Value>);

    impl VariableResolver for Vars {
        fn resolve(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    struct Doubler;

    #[async_trait]
    impl FunctionDispatcher for Doubler {
        async fn dispatch(&self, name: &str, params: Value) -> Result<Value, EvalError> {
            match name {
                "double" => {
                    let n = params
                        .as_object()
                        .and_then(|o| o.get("n"))
                        .and_then(Value::as_i64)
                        .ok_or_else(|| EvalError::Function {
                            name: name.to_string(),
                            message: "missing n".to_string(),
                        })?;
                    Ok(Value::from(n * 2))
                }
                _ => Err(EvalError::Function {
                    name: name.to_string(),
                    message: "unknown".to_string(),
                }),
            }
        }
    }

    fn vars(pairs: &[(&str, Value)]) -> Vars {
        Vars(pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect())
    }

    fn json(v: serde_json::Value) -> Value {
        Value::from(v)
    }

    #[tokio::test]
    async fn test_literals_pass_through() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        assert_eq!(eval.evaluate(&json(serde_json::json!(5))).await.unwrap(), Value::from(5i64));
        assert_eq!(
            eval.evaluate(&json(serde_json::json!(true))).await.unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval.evaluate(&json(serde_json::json!("plain text"))).await.unwrap(),
            Value::from("plain text")
        );
    }

    #[tokio::test]
    async fn test_dollar_variable_reference() {
        let v = vars(&[("x", Value::from(7i64))]);
        let eval = Evaluator::new(&v);
        assert_eq!(
            eval.evaluate(&json(serde_json::json!("$x"))).await.unwrap(),
            Value::from(7i64)
        );
        // Bare names resolve too.
        assert_eq!(
            eval.evaluate(&json(serde_json::json!("x"))).await.unwrap(),
            Value::from(7i64)
        );
    }

    #[tokio::test]
    async fn test_dollar_escape_parses_infix() {
        let v = vars(&[("counter", Value::from(4i64))]);
        let eval = Evaluator::new(&v);
        assert_eq!(
            eval.evaluate(&json(serde_json::json!({"$": "counter + 1"})))
                .await
                .unwrap(),
            Value::from(5i64)
        );
        // Unresolved "$..." falls back to infix parsing as well.
        assert_eq!(
            eval.evaluate(&json(serde_json::json!("$counter + 1")))
                .await
                .unwrap(),
            Value::from(5i64)
        );
    }

    #[tokio::test]
    async fn test_arithmetic_operators() {
        let v = vars(&[("x", Value::from(5i64))]);
        let eval = Evaluator::new(&v);
        assert_eq!(
            eval.evaluate(&json(serde_json::json!({"$sub": ["$x", 2]})))
                .await
                .unwrap(),
            Value::from(3i64)
        );
        assert_eq!(
            eval.evaluate(&json(serde_json::json!({"$mul": [{"$add": [1, 2]}, 4]})))
                .await
                .unwrap(),
            Value::from(12i64)
        );
    }

    #[tokio::test]
    async fn test_division_by_zero() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        assert!(matches!(
            eval.evaluate(&json(serde_json::json!({"$div": [1, 0]}))).await,
            Err(EvalError::DivisionByZero)
        ));
    }

    #[tokio::test]
    async fn test_comparisons() {
        let v = vars(&[("x", Value::from(3i64))]);
        let eval = Evaluator::new(&v);
        assert_eq!(
            eval.evaluate(&json(serde_json::json!({"$gt": ["$x", 0]})))
                .await
                .unwrap(),
            Value::Bool(true)
        );
        assert_eq!(
            eval.evaluate(&json(serde_json::json!({"$eq": ["$x", 3]})))
                .await
                .unwrap(),
            Value::Bool(true)
        );
    }

    #[tokio::test]
    async fn test_eq_requires_same_kind() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        assert!(matches!(
            eval.evaluate(&json(serde_json::json!({"$eq": [1, true]}))).await,
            Err(EvalError::KindMismatch { .. })
        ));
    }

    #[tokio::test]
    async fn test_logical_short_circuit() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        // The divide-by-zero operand is never reached.
        let expr = json(serde_json::json!({
            "$or": [true, {"$eq": [{"$div": [1, 0]}, 0]}]
        }));
        assert_eq!(eval.evaluate(&expr).await.unwrap(), Value::Bool(true));
        let expr = json(serde_json::json!({"$and": [true, false]}));
        assert_eq!(eval.evaluate(&expr).await.unwrap(), Value::Bool(false));
    }

    #[tokio::test]
    async fn test_conditional() {
        let v = vars(&[("x", Value::from(1i64))]);
        let eval = Evaluator::new(&v);
        let expr = json(serde_json::json!({
            "$if": {"condition": {"$gt": ["$x", 0]}, "then": "pos", "else": "neg"}
        }));
        assert_eq!(eval.evaluate(&expr).await.unwrap(), Value::from("pos"));
        let expr = json(serde_json::json!({
            "$if": {"condition": {"$lt": ["$x", 0]}, "then": "neg"}
        }));
        assert_eq!(eval.evaluate(&expr).await.unwrap(), Value::Null);
    }

    #[tokio::test]
    async fn test_call_dispatch() {
        let v = vars(&[]);
        let d = Doubler;
        let eval = Evaluator::with_functions(&v, &d);
        let expr = json(serde_json::json!({
            "$call": {"function": "double", "params": {"n": 21}}
        }));
        assert_eq!(eval.evaluate(&expr).await.unwrap(), Value::from(42i64));
    }

    #[tokio::test]
    async fn test_call_without_dispatcher() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        let expr = json(serde_json::json!({"$call": {"function": "double"}}));
        assert!(matches!(
            eval.evaluate(&expr).await,
            Err(EvalError::NoDispatcher)
        ));
    }

    #[tokio::test]
    async fn test_unknown_operator() {
        let v = vars(&[]);
        let eval = Evaluator::new(&v);
        assert!(matches!(
            eval.evaluate(&json(serde_json::json!({"$pow": [2, 3]}))).await,
            Err(EvalError::UnknownOperator { .. })
        ));
    }

    #[tokio::test]
    async fn test_structural_evaluation() {
        let v = vars(&[("x", Value::from(2i64))]);
        let eval = Evaluator::new(&v);
        let expr = json(serde_json::json!({"a": "$x", "b": [{"$add": ["$x", 1]}]}));
        let out = eval.evaluate(&expr).await.unwrap();
        let obj = out.as_object().unwrap();
        assert_eq!(obj.get("a").unwrap().as_i64(), Some(2));
        assert_eq!(obj.get("b").unwrap().as_array().unwrap()[0].as_i64(), Some(3));
    }
}
