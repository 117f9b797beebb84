//! Task interpreter for Caelum JSON scripts.
//!
//! Scripts are sequences of typed steps with control flow, error handling,
//! events, and concurrency primitives. The interpreter owns the process-wide
//! variable store, event queue, and function table; components and hosts
//! register native functions, scripts define closures, and each executing
//! script gets a dedicated worker with cooperative stop/pause control.

pub mod context;
pub mod control;
pub mod events;
pub mod executor;
pub mod functions;
pub mod interpreter;
pub mod macros;
pub mod scripts;
pub mod variables;

pub use context::{ExecutionContext, InterpreterOptions};
pub use control::{ActivityGate, ExecutionControl};
pub use events::EventBus;
pub use functions::{
    FnFunction, FunctionEntry, FunctionMetadata, FunctionTable, NativeFunction, ScriptFunction,
};
pub use interpreter::TaskInterpreter;
pub use macros::{MacroDef, MacroGenerator};
pub use scripts::LoadedScript;
pub use variables::VariableStore;

pub use caelum_core::{ScriptError, Value};
