//! Execution context passed to every step handler.
//!
//! Holds the Arc'd subsystems a running script needs: the variable store,
//! event bus, function table, loaded-script table, macro generator, and the
//! cooperative control flags. Contexts are cheap to clone; `parallel`,
//! `async`, and `schedule` hand clones to pooled tasks.

use crate::control::{ActivityGate, ExecutionControl};
use crate::events::EventBus;
use crate::executor;
use crate::functions::{FunctionEntry, FunctionTable};
use crate::macros::MacroGenerator;
use crate::scripts::LoadedScript;
use crate::variables::VariableStore;
use async_trait::async_trait;
use caelum_core::{EvalError, ScriptError, Value};
use caelum_eval::{Evaluator, FunctionDispatcher};
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Interpreter tuning, copied into every context.
#[derive(Clone, Debug)]
pub struct InterpreterOptions {
    /// Per-label jump budget for `goto`.
    pub goto_limit: u32,
    /// Variable-store write lock retry attempts.
    pub lock_retries: u32,
    /// Delay per lock attempt.
    pub lock_retry_delay: Duration,
    /// Folder `import` resolves `<script>.json` files against.
    pub task_folder: PathBuf,
}

impl Default for InterpreterOptions {
    fn default() -> Self {
        Self {
            goto_limit: 100,
            lock_retries: 3,
            lock_retry_delay: Duration::from_millis(50),
            task_folder: PathBuf::from("./tasks"),
        }
    }
}

/// Execution context shared by the worker and all step handlers.
#[derive(Clone)]
pub struct ExecutionContext {
    /// Unique execution id for tracing.
    pub execution_id: String,
    /// Name of the script this worker is running, when any.
    pub script: Option<String>,
    pub variables: Arc<VariableStore>,
    pub events: Arc<EventBus>,
    pub functions: Arc<FunctionTable>,
    pub scripts: Arc<DashMap<String, Arc<LoadedScript>>>,
    pub macros: Arc<MacroGenerator>,
    pub control: Arc<ExecutionControl>,
    pub gate: Arc<ActivityGate>,
    /// Host-registered named errors for `throw_custom`.
    pub custom_errors: Arc<DashMap<String, String>>,
    pub options: InterpreterOptions,
}

impl ExecutionContext {
    /// Creates a child context for a different script name.
    pub fn for_script(&self, name: &str) -> Self {
        let mut child = self.clone();
        child.script = Some(name.to_string());
        child.execution_id = uuid::Uuid::now_v7().to_string();
        child
    }

    /// Evaluates an expression against the variable store, with `$call`
    /// dispatching through the function table.
    pub async fn evaluate(&self, expr: &Value) -> Result<Value, ScriptError> {
        let dispatcher = ContextDispatcher { ctx: self };
        let evaluator = Evaluator::with_functions(&*self.variables, &dispatcher);
        Ok(evaluator.evaluate(expr).await?)
    }

    /// Invokes a function-table entry: native operation or script closure.
    pub async fn call_function(&self, name: &str, params: Value) -> Result<Value, ScriptError> {
        let entry = self
            .functions
            .get(name)
            .ok_or_else(|| ScriptError::FunctionNotFound {
                name: name.to_string(),
            })?;
        match entry {
            FunctionEntry::Native { function, .. } => {
                tracing::debug!(target: "caelum::script", function = %name, "Invoking native function");
                function.call(params).await
            }
            FunctionEntry::Script { function, .. } => {
                tracing::debug!(target: "caelum::script", function = %name, "Invoking script function");
                let args = function.merged_args(&params)?;

                // Call frame: snapshot, overlay closure then args, run, read
                // the conventional return variable, restore.
                let snapshot = self.variables.snapshot();
                for (k, v) in &function.closure {
                    self.variables.insert_raw(k, v.clone());
                }
                for (k, v) in &args {
                    self.variables.insert_raw(k, v.clone());
                }
                self.variables.remove("__return_value__");

                let result = executor::run_steps(self, &function.steps).await;
                let returned = self
                    .variables
                    .get("__return_value__")
                    .unwrap_or(Value::Null);
                self.variables.replace_all(snapshot);
                result?;
                Ok(returned)
            }
        }
    }

    /// Builds the error registered under a custom name.
    pub fn custom_error(&self, name: &str) -> ScriptError {
        let message = self
            .custom_errors
            .get(name)
            .map(|m| m.value().clone())
            .unwrap_or_else(|| "unregistered error".to_string());
        ScriptError::Custom {
            name: name.to_string(),
            message,
        }
    }
}

struct ContextDispatcher<'a> {
    ctx: &'a ExecutionContext,
}

#[async_trait]
impl FunctionDispatcher for ContextDispatcher<'_> {
    async fn dispatch(&self, name: &str, params: Value) -> Result<Value, EvalError> {
        self.ctx
            .call_function(name, params)
            .await
            .map_err(|e| EvalError::Function {
                name: name.to_string(),
                message: e.to_string(),
            })
    }
}
