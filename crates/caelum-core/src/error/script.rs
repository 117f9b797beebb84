//! Script loading and execution errors.

use crate::error::EvalError;
use crate::types::VariableKind;
use thiserror::Error;

/// Errors raised while loading, validating, or executing a script.
#[derive(Debug, Error)]
pub enum ScriptError {
    /// Script JSON did not parse into the expected shape.
    #[error("Script parse error: {message}")]
    Parse { message: String },

    /// A step is missing a field or carries an ill-typed one.
    #[error("Invalid step: {message}")]
    InvalidStep { message: String },

    /// Thrown by scripts (`throw` with `invalid_argument`) or validation.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Thrown by scripts (`throw` with `runtime_error`) or generic failures.
    #[error("Runtime error: {0}")]
    Runtime(String),

    /// Thrown by scripts (`throw` with `out_of_range`).
    #[error("Out of range: {0}")]
    OutOfRange(String),

    /// `call` named a function not present in the function table.
    #[error("Unknown function '{name}'")]
    FunctionNotFound { name: String },

    /// `goto` named a label the script does not declare.
    #[error("Unknown label '{label}'")]
    LabelNotFound { label: String },

    /// A label was declared more than once in one script.
    #[error("Duplicate label '{label}'")]
    DuplicateLabel { label: String },

    /// The named script is not loaded.
    #[error("Script '{name}' is not loaded")]
    ScriptNotFound { name: String },

    /// The named variable is not in the store.
    #[error("Unknown variable '{name}'")]
    VariableNotFound { name: String },

    /// Assignment attempted to change a variable's kind.
    #[error("Variable '{name}' is {expected}, refusing to assign {actual}")]
    TypeMismatch {
        name: String,
        expected: VariableKind,
        actual: VariableKind,
    },

    /// A label's jump counter passed the per-label limit.
    #[error("Goto limit exceeded for label '{label}' after {jumps} jumps")]
    GotoLimitExceeded { label: String, jumps: u32 },

    /// The variable-store lock could not be taken within the retry budget.
    #[error("Variable store lock exhausted after {attempts} attempts")]
    LockExhausted { attempts: u32 },

    /// `listen_event` timed out.
    #[error("Timed out after {timeout_ms}ms waiting for events")]
    EventTimeout { timeout_ms: u64 },

    /// The cooperative stop flag halted execution at a step boundary.
    #[error("Execution stopped")]
    Stopped,

    /// A parallel child failed; the child error is attached.
    #[error("Parallel step failed: {source}")]
    Nested {
        #[source]
        source: Box<ScriptError>,
    },

    /// A host-registered named error raised by `throw_custom`.
    #[error("{name}: {message}")]
    Custom { name: String, message: String },

    /// Expression evaluation failure.
    #[error(transparent)]
    Eval(#[from] EvalError),

    /// Filesystem failure during `import` or script loading.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScriptError {
    /// Stable kind name used by `try/catch` matching, `retry` narrowing, and
    /// exception reporting. `Nested` is transparent to its child.
    pub fn kind(&self) -> &str {
        match self {
            ScriptError::Parse { .. }
            | ScriptError::InvalidStep { .. }
            | ScriptError::InvalidArgument(_)
            | ScriptError::TypeMismatch { .. } => "invalid_argument",
            ScriptError::OutOfRange(_) => "out_of_range",
            ScriptError::FunctionNotFound { .. }
            | ScriptError::LabelNotFound { .. }
            | ScriptError::DuplicateLabel { .. }
            | ScriptError::ScriptNotFound { .. }
            | ScriptError::VariableNotFound { .. } => "object_not_found",
            ScriptError::EventTimeout { .. } => "timeout",
            ScriptError::Stopped => "stopped",
            ScriptError::Runtime(_)
            | ScriptError::GotoLimitExceeded { .. }
            | ScriptError::LockExhausted { .. }
            | ScriptError::Io(_) => "runtime_error",
            ScriptError::Nested { source } => source.kind(),
            ScriptError::Custom { name, .. } => name,
            ScriptError::Eval(e) => e.kind(),
        }
    }

    /// Builds the error for a `throw` step's `exception_type`.
    pub fn thrown(exception_type: &str, message: String) -> ScriptError {
        match exception_type {
            "invalid_argument" => ScriptError::InvalidArgument(message),
            "out_of_range" => ScriptError::OutOfRange(message),
            _ => ScriptError::Runtime(message),
        }
    }
}
