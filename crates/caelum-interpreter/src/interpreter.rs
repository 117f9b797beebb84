//! The task interpreter facade.
//!
//! Owns the process-wide stores and the per-script execution workers. Hosts
//! load scripts, register native functions and exception handlers, and
//! inspect variables between steps through the quiescent accessors.

use crate::context::{ExecutionContext, InterpreterOptions};
use crate::control::{ActivityGate, ExecutionControl};
use crate::events::EventBus;
use crate::executor::worker;
use crate::functions::{FnFunction, FunctionMetadata, FunctionTable, NativeFunction};
use crate::macros::MacroGenerator;
use crate::scripts::LoadedScript;
use crate::variables::VariableStore;
use caelum_core::{Script, ScriptError, Value};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

type ExceptionHandler = Arc<dyn Fn(&ScriptError) + Send + Sync>;

/// The scripted task interpreter.
pub struct TaskInterpreter {
    variables: Arc<VariableStore>,
    events: Arc<EventBus>,
    functions: Arc<FunctionTable>,
    scripts: Arc<DashMap<String, Arc<LoadedScript>>>,
    macros: Arc<MacroGenerator>,
    control: Arc<ExecutionControl>,
    gate: Arc<ActivityGate>,
    custom_errors: Arc<DashMap<String, String>>,
    error_handlers: Arc<DashMap<String, ExceptionHandler>>,
    executions: Mutex<HashMap<String, JoinHandle<Result<(), ScriptError>>>>,
    options: InterpreterOptions,
}

impl TaskInterpreter {
    /// Creates an interpreter sharing the given function table.
    ///
    /// The table is shared so the component registry can populate it.
    pub fn new(functions: Arc<FunctionTable>, options: InterpreterOptions) -> Self {
        Self {
            variables: Arc::new(VariableStore::new(
                options.lock_retries,
                options.lock_retry_delay,
            )),
            events: Arc::new(EventBus::new()),
            functions,
            scripts: Arc::new(DashMap::new()),
            macros: Arc::new(MacroGenerator::new()),
            control: Arc::new(ExecutionControl::new()),
            gate: Arc::new(ActivityGate::new()),
            custom_errors: Arc::new(DashMap::new()),
            error_handlers: Arc::new(DashMap::new()),
            executions: Mutex::new(HashMap::new()),
            options,
        }
    }

    /// Creates a standalone interpreter with its own function table.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(FunctionTable::new()), InterpreterOptions::default())
    }

    fn context_for(&self, script: Option<&str>) -> ExecutionContext {
        ExecutionContext {
            execution_id: uuid::Uuid::now_v7().to_string(),
            script: script.map(str::to_string),
            variables: Arc::clone(&self.variables),
            events: Arc::clone(&self.events),
            functions: Arc::clone(&self.functions),
            scripts: Arc::clone(&self.scripts),
            macros: Arc::clone(&self.macros),
            control: Arc::clone(&self.control),
            gate: Arc::clone(&self.gate),
            custom_errors: Arc::clone(&self.custom_errors),
            options: self.options.clone(),
        }
    }

    /// Loads a script: macro expansion, validation, label parsing.
    ///
    /// A header with `auto_execute: true` starts execution immediately.
    pub async fn load(&self, name: &str, json: serde_json::Value) -> Result<(), ScriptError> {
        let expanded = self.macros.expand(&Value::from(json))?;
        let script = Script::parse(&expanded)?;
        let auto = script.auto_execute();
        let loaded = Arc::new(LoadedScript::build(name.to_string(), script, expanded)?);
        self.scripts.insert(name.to_string(), loaded);
        tracing::info!(target: "caelum::script", script = %name, "Loaded script");
        if auto {
            self.execute(name).await?;
        }
        Ok(())
    }

    /// Unloads a script and any closures it defined.
    pub fn unload(&self, name: &str) -> bool {
        let removed = self.scripts.remove(name).is_some();
        if removed {
            self.functions.remove_owned_by(name);
            self.error_handlers.remove(name);
            tracing::info!(target: "caelum::script", script = %name, "Unloaded script");
        }
        removed
    }

    pub fn has(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }

    /// Returns the expanded source of a loaded script.
    pub fn get(&self, name: &str) -> Option<Value> {
        self.scripts.get(name).map(|s| s.raw.clone())
    }

    /// Starts a dedicated worker for the named script.
    ///
    /// Clears stop/pause flags and joins any prior worker for the same name,
    /// so concurrent `execute` calls serialize.
    pub async fn execute(&self, name: &str) -> Result<(), ScriptError> {
        let script = self
            .scripts
            .get(name)
            .map(|s| s.value().clone())
            .ok_or_else(|| ScriptError::ScriptNotFound {
                name: name.to_string(),
            })?;

        let mut executions = self.executions.lock().await;
        if let Some(previous) = executions.remove(name) {
            let _ = previous.await;
        }
        self.control.clear();

        let ctx = self.context_for(Some(name));
        let handlers = Arc::clone(&self.error_handlers);
        let guard = self.gate.enter();
        let handle = tokio::spawn(async move {
            let _guard = guard;
            let result = worker::run_body(&ctx, &script).await;
            if let Err(e) = &result {
                if matches!(e, ScriptError::Stopped) {
                    tracing::info!(
                        target: "caelum::script",
                        script = %script.name,
                        "Script stopped"
                    );
                } else if let Some(handler) = handlers.get(&script.name) {
                    handler.value()(e);
                } else {
                    tracing::error!(
                        target: "caelum::script",
                        script = %script.name,
                        error = %e,
                        "Script failed"
                    );
                }
            }
            result
        });
        executions.insert(name.to_string(), handle);
        Ok(())
    }

    /// Waits for the named script's worker and returns its outcome.
    pub async fn wait(&self, name: &str) -> Result<(), ScriptError> {
        let handle = self.executions.lock().await.remove(name);
        match handle {
            Some(handle) => handle
                .await
                .map_err(|e| ScriptError::Runtime(format!("worker join failed: {e}")))?,
            None => Ok(()),
        }
    }

    /// Convenience: `execute` then `wait`.
    pub async fn execute_and_wait(&self, name: &str) -> Result<(), ScriptError> {
        self.execute(name).await?;
        self.wait(name).await
    }

    /// Requests a cooperative stop and joins every worker.
    pub async fn stop(&self) {
        self.control.request_stop();
        let handles: Vec<_> = {
            let mut executions = self.executions.lock().await;
            executions.drain().map(|(_, h)| h).collect()
        };
        for handle in handles {
            let _ = handle.await;
        }
    }

    /// Pauses workers at their next step boundary.
    pub fn pause(&self) {
        self.control.pause();
    }

    /// Resumes paused workers.
    pub fn resume(&self) {
        self.control.resume();
    }

    /// Registers a native function.
    pub fn register_function(&self, function: Arc<dyn NativeFunction>) -> Result<(), ScriptError> {
        self.functions.register_native(function, None)
    }

    /// Registers a native function from a plain closure.
    pub fn register_fn<F>(
        &self,
        name: &str,
        tag: &str,
        description: &str,
        body: F,
    ) -> Result<(), ScriptError>
    where
        F: Fn(Value) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        self.functions.register_native(
            Arc::new(FnFunction::new(
                FunctionMetadata::new(name, tag, description),
                body,
            )),
            None,
        )
    }

    /// Routes uncaught errors of the named script to `handler`.
    pub fn register_exception_handler<F>(&self, script: &str, handler: F)
    where
        F: Fn(&ScriptError) + Send + Sync + 'static,
    {
        self.error_handlers
            .insert(script.to_string(), Arc::new(handler));
    }

    /// Registers a named error code for `throw_custom` and `throw` steps.
    pub fn register_error(&self, name: &str, message: &str) {
        self.custom_errors
            .insert(name.to_string(), message.to_string());
    }

    /// Builds the error registered under `name`.
    pub fn throw_custom(&self, name: &str) -> ScriptError {
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

    /// Reads a variable once every worker is idle (quiescent snapshot).
    pub async fn get_variable(&self, name: &str) -> Result<Value, ScriptError> {
        self.gate.wait_idle().await;
        self.variables
            .get(name)
            .ok_or_else(|| ScriptError::VariableNotFound {
                name: name.to_string(),
            })
    }

    /// Writes a variable once every worker is idle.
    pub async fn set_variable(&self, name: &str, value: Value) -> Result<(), ScriptError> {
        self.gate.wait_idle().await;
        self.variables.set(name, value)
    }

    /// Host-side event broadcast.
    pub fn broadcast_event(&self, name: &str, channel: Option<&str>, payload: Value) {
        self.events
            .broadcast(&EventBus::qualified(name, channel), payload);
    }

    /// The shared function table (populated by the component registry).
    pub fn functions(&self) -> Arc<FunctionTable> {
        Arc::clone(&self.functions)
    }

    /// The macro generator used for script pre-processing.
    pub fn macros(&self) -> Arc<MacroGenerator> {
        Arc::clone(&self.macros)
    }

    /// The shared event bus.
    pub fn events(&self) -> Arc<EventBus> {
        Arc::clone(&self.events)
    }
}
