//! Expression evaluation errors.

use thiserror::Error;

/// Errors raised while evaluating tagged trees or infix expressions.
#[derive(Debug, Error)]
pub enum EvalError {
    /// Unknown tagged operator key.
    #[error("Unknown operator '{op}'")]
    UnknownOperator {
        /// The operator key, including its `$` prefix.
        op: String,
    },

    /// Wrong operand count for an operator.
    #[error("Operator '{op}' expects {expected} operands, got {found}")]
    ArityMismatch {
        op: String,
        expected: usize,
        found: usize,
    },

    /// Equality comparison across different kinds.
    #[error("Operator '{op}' requires operands of the same kind")]
    KindMismatch { op: String },

    /// Operand is not the numeric/boolean type the operator needs.
    #[error("Operator '{op}' requires {expected} operands")]
    OperandType {
        op: String,
        expected: &'static str,
    },

    /// Integer division or modulo by zero.
    #[error("Division by zero")]
    DivisionByZero,

    /// Unrecognized token in an infix expression.
    #[error("Invalid token '{token}' in expression")]
    InvalidToken { token: String },

    /// Parenthesis mismatch in an infix expression.
    #[error("Mismatched parentheses in expression")]
    UnbalancedParens,

    /// Infix expression ended with leftover or missing operands.
    #[error("Malformed expression: {message}")]
    Malformed { message: String },

    /// A `$if` condition did not evaluate to a boolean.
    #[error("Conditional expression requires a boolean condition")]
    NonBooleanCondition,

    /// A required field of a structured operator is missing.
    #[error("Operator '{op}' is missing field '{field}'")]
    MissingField { op: String, field: String },

    /// A `$call` failed inside the host dispatcher.
    #[error("Function '{name}' failed: {message}")]
    Function { name: String, message: String },

    /// A `$call` was used without a function dispatcher installed.
    #[error("No function dispatcher available for '$call'")]
    NoDispatcher,
}

impl EvalError {
    /// Stable kind name used by `try/catch` matching.
    pub fn kind(&self) -> &str {
        match self {
            EvalError::UnknownOperator { .. }
            | EvalError::ArityMismatch { .. }
            | EvalError::KindMismatch { .. }
            | EvalError::OperandType { .. }
            | EvalError::InvalidToken { .. }
            | EvalError::UnbalancedParens
            | EvalError::Malformed { .. }
            | EvalError::NonBooleanCondition
            | EvalError::MissingField { .. } => "invalid_argument",
            EvalError::DivisionByZero
            | EvalError::Function { .. }
            | EvalError::NoDispatcher => "runtime_error",
        }
    }
}
