//! Core types shared across the Caelum instrument-control platform.
//!
//! This crate defines the value model used by the task interpreter and every
//! component operation (`Value`, `Number`, `VariableKind`), the script model
//! (`Script`, `Step`, `StepType`), and the error taxonomy for all subsystems.

pub mod error;
pub mod logging;
pub mod types;

pub use error::{DriverError, EvalError, RegistryError, ScriptError};
pub use types::{Number, Script, ScriptHeader, Step, StepType, Value, VariableKind};
