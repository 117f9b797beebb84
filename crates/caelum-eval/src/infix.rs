//! Infix string expressions.
//!
//! Tokens are whitespace-separated: integer literals, variable names,
//! parentheses, and single-character binary operators. Evaluation uses two
//! stacks (operators, values) shunting-yard style.
//!
//! Precedence ranks, rank 1 binding tightest:
//! `+ -` (1), `* / %` (2), `^` (3), `< > = !` (4), `&` (5), `|` (6).

use crate::VariableResolver;
use caelum_core::{EvalError, Value};

const OPERATORS: &str = "+-*/%^&|<>=!";

/// Whether a character can appear in an operator position.
pub(crate) fn is_operator_char(c: char) -> bool {
    OPERATORS.contains(c) || c == '(' || c == ')'
}

fn precedence(op: char) -> u8 {
    match op {
        '+' | '-' => 1,
        '*' | '/' | '%' => 2,
        '^' => 3,
        '<' | '>' | '=' | '!' => 4,
        '&' => 5,
        '|' => 6,
        _ => u8::MAX,
    }
}

fn apply(op: char, lhs: i64, rhs: i64) -> Result<i64, EvalError> {
    let out = match op {
        '+' => lhs.wrapping_add(rhs),
        '-' => lhs.wrapping_sub(rhs),
        '*' => lhs.wrapping_mul(rhs),
        '/' => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            lhs / rhs
        }
        '%' => {
            if rhs == 0 {
                return Err(EvalError::DivisionByZero);
            }
            lhs % rhs
        }
        '^' => lhs ^ rhs,
        '&' => lhs & rhs,
        '|' => lhs | rhs,
        '<' => (lhs < rhs) as i64,
        '>' => (lhs > rhs) as i64,
        '=' => (lhs == rhs) as i64,
        '!' => (lhs != rhs) as i64,
        other => {
            return Err(EvalError::InvalidToken {
                token: other.to_string(),
            })
        }
    };
    Ok(out)
}

fn reduce(operators: &mut Vec<char>, values: &mut Vec<i64>) -> Result<(), EvalError> {
    let op = operators.pop().ok_or(EvalError::Malformed {
        message: "operator stack underflow".to_string(),
    })?;
    let found = values.len();
    if found < 2 {
        return Err(EvalError::ArityMismatch {
            op: op.to_string(),
            expected: 2,
            found,
        });
    }
    let rhs = values.pop().unwrap();
    let lhs = values.pop().unwrap();
    values.push(apply(op, lhs, rhs)?);
    Ok(())
}

fn resolve_operand(token: &str, variables: &dyn VariableResolver) -> Result<i64, EvalError> {
    if let Ok(literal) = token.parse::<i64>() {
        return Ok(literal);
    }
    let value = variables
        .resolve(token)
        .ok_or_else(|| EvalError::InvalidToken {
            token: token.to_string(),
        })?;
    match value {
        Value::Number(n) => n.as_i64().ok_or(EvalError::OperandType {
            op: "expression".to_string(),
            expected: "integer",
        }),
        Value::Bool(b) => Ok(b as i64),
        _ => Err(EvalError::OperandType {
            op: "expression".to_string(),
            expected: "integer",
        }),
    }
}

/// Evaluates a whitespace-tokenized infix expression.
pub fn evaluate(text: &str, variables: &dyn VariableResolver) -> Result<Value, EvalError> {
    let mut operators: Vec<char> = Vec::new();
    let mut values: Vec<i64> = Vec::new();

    for token in text.split_whitespace() {
        match token {
            "(" => operators.push('('),
            ")" => {
                loop {
                    match operators.last() {
                        Some('(') => {
                            operators.pop();
                            break;
                        }
                        Some(_) => reduce(&mut operators, &mut values)?,
                        None => return Err(EvalError::UnbalancedParens),
                    }
                }
            }
            _ if token.len() == 1 && precedence(token.chars().next().unwrap()) != u8::MAX => {
                let op = token.chars().next().unwrap();
                while let Some(&top) = operators.last() {
                    if top != '(' && precedence(top) <= precedence(op) {
                        reduce(&mut operators, &mut values)?;
                    } else {
                        break;
                    }
                }
                operators.push(op);
            }
            _ => values.push(resolve_operand(token, variables)?),
        }
    }

    while let Some(&top) = operators.last() {
        if top == '(' {
            return Err(EvalError::UnbalancedParens);
        }
        reduce(&mut operators, &mut values)?;
    }

    match (values.pop(), values.is_empty()) {
        (Some(result), true) => Ok(Value::from(result)),
        _ => Err(EvalError::Malformed {
            message: "expression did not reduce to a single value".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caelum_core::Value;
    use std::collections::HashMap;

    struct Vars(HashMap<String, Value>);

    impl VariableResolver for Vars {
        fn resolve(&self, name: &str) -> Option<Value> {
            self.0.get(name).cloned()
        }
    }

    fn vars(pairs: &[(&str, i64)]) -> Vars {
        Vars(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), Value::from(*v)))
                .collect(),
        )
    }

    fn eval(text: &str, v: &Vars) -> i64 {
        evaluate(text, v).unwrap().as_i64().unwrap()
    }

    #[test]
    fn test_simple_arithmetic() {
        let v = vars(&[]);
        assert_eq!(eval("2 + 3", &v), 5);
        assert_eq!(eval("10 - 4", &v), 6);
        assert_eq!(eval("6 / 2", &v), 3);
        assert_eq!(eval("7 % 4", &v), 3);
    }

    #[test]
    fn test_rank_order_addition_binds_tighter() {
        // Rank 1 (+ -) binds tighter than rank 2 (* / %).
        let v = vars(&[]);
        assert_eq!(eval("2 * 3 + 4", &v), 14);
        assert_eq!(eval("1 + 2 * 3", &v), 9);
    }

    #[test]
    fn test_parentheses_override() {
        let v = vars(&[]);
        assert_eq!(eval("( 2 * 3 ) + 4", &v), 10);
        assert_eq!(eval("( 1 + 2 ) * ( 3 + 4 )", &v), 21);
    }

    #[test]
    fn test_relational_and_bitwise() {
        let v = vars(&[]);
        assert_eq!(eval("4 > 2", &v), 1);
        assert_eq!(eval("4 < 2", &v), 0);
        assert_eq!(eval("3 = 3", &v), 1);
        assert_eq!(eval("3 ! 3", &v), 0);
        assert_eq!(eval("4 > 2 | 1 > 5", &v), 1);
        assert_eq!(eval("1 & 3", &v), 1);
        assert_eq!(eval("1 ^ 3", &v), 2);
    }

    #[test]
    fn test_variables_resolve() {
        let v = vars(&[("counter", 4)]);
        assert_eq!(eval("counter + 1", &v), 5);
    }

    #[test]
    fn test_unknown_token() {
        let v = vars(&[]);
        assert!(matches!(
            evaluate("nope + 1", &v),
            Err(EvalError::InvalidToken { .. })
        ));
    }

    #[test]
    fn test_unbalanced_parens() {
        let v = vars(&[]);
        assert!(matches!(
            evaluate("( 1 + 2", &v),
            Err(EvalError::UnbalancedParens)
        ));
        assert!(matches!(
            evaluate("1 + 2 )", &v),
            Err(EvalError::UnbalancedParens)
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let v = vars(&[]);
        assert!(matches!(
            evaluate("1 / 0", &v),
            Err(EvalError::DivisionByZero)
        ));
        assert!(matches!(
            evaluate("1 % 0", &v),
            Err(EvalError::DivisionByZero)
        ));
    }

    #[test]
    fn test_arity_mismatch() {
        let v = vars(&[]);
        assert!(matches!(
            evaluate("1 +", &v),
            Err(EvalError::ArityMismatch { .. })
        ));
    }
}
