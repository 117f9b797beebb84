//! Error taxonomy for the Caelum core.
//!
//! One enum per failure domain: expression evaluation, script execution,
//! component registry, and driver supervision. Every script-facing error
//! carries a stable kind name used by `try/catch` matching, `retry`
//! narrowing, and the `throw` step.

/// Errors produced by the driver supervisor.
pub mod driver;
/// Errors produced by the expression evaluator.
pub mod eval;
/// Errors produced by the component registry.
pub mod registry;
/// Errors produced while loading or executing scripts.
pub mod script;

pub use driver::DriverError;
pub use eval::EvalError;
pub use registry::RegistryError;
pub use script::ScriptError;
