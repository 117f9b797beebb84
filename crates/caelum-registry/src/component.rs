//! Host-side component handles.
//!
//! `ComponentHandle` is the registry's view of a component regardless of
//! flavor: `SharedComponent` wraps an FFI trait object from an addon
//! library, `StandaloneComponent` maps the lifecycle onto a supervised
//! external process.

use async_trait::async_trait;
use caelum_core::{RegistryError, Value};
use caelum_plugin_api::ComponentFfiBox;
use caelum_supervisor::{DriverSupervisor, SupervisorOptions};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// One operation a component exposes to the function table.
#[derive(Clone, Debug)]
pub struct OperationInfo {
    pub name: String,
    pub tag: String,
    pub description: String,
}

/// The registry's uniform view of a component instance.
#[async_trait]
pub trait ComponentHandle: Send + Sync {
    /// Short component name (the manifest `modules[].name`).
    fn component_name(&self) -> &str;

    /// Records a dependency's qualified name for use-time lookup.
    fn inject_dependency(&self, qualified_name: &str);

    /// Runs after all dependencies are initialized and registered.
    async fn initialize(&self) -> Result<(), RegistryError>;

    /// Runs before unload.
    async fn shutdown(&self) -> Result<(), RegistryError>;

    /// Operations to expose through the function table.
    fn operations(&self) -> Vec<OperationInfo>;

    /// Invokes a named operation with structured parameters.
    async fn invoke(&self, operation: &str, params: Value) -> Result<Value, RegistryError>;
}

/// A component loaded from an addon dynamic library.
pub struct SharedComponent {
    name: String,
    inner: Mutex<ComponentFfiBox>,
}

impl SharedComponent {
    pub fn new(name: String, inner: ComponentFfiBox) -> Self {
        Self {
            name,
            inner: Mutex::new(inner),
        }
    }

    fn operation_error(&self, operation: &str, message: impl ToString) -> RegistryError {
        RegistryError::Operation {
            component: self.name.clone(),
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ComponentHandle for SharedComponent {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn inject_dependency(&self, qualified_name: &str) {
        self.inner
            .lock()
            .inject_dependency(qualified_name.to_string().into());
    }

    async fn initialize(&self) -> Result<(), RegistryError> {
        self.inner
            .lock()
            .initialize()
            .into_result()
            .map_err(|e| RegistryError::InitializeFailed {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), RegistryError> {
        self.inner
            .lock()
            .shutdown()
            .into_result()
            .map_err(|e| self.operation_error("shutdown", e))
    }

    fn operations(&self) -> Vec<OperationInfo> {
        self.inner
            .lock()
            .operations()
            .into_iter()
            .map(|op| OperationInfo {
                name: op.name.to_string(),
                tag: op.tag.to_string(),
                description: op.description.to_string(),
            })
            .collect()
    }

    async fn invoke(&self, operation: &str, params: Value) -> Result<Value, RegistryError> {
        let params_json = serde_json::to_string(&params.to_json())
            .map_err(|e| self.operation_error(operation, e))?;
        let result = self
            .inner
            .lock()
            .invoke(operation.to_string().into(), params_json.into())
            .into_result()
            .map_err(|e| self.operation_error(operation, e))?;
        let json: serde_json::Value = serde_json::from_str(result.as_str())
            .map_err(|e| self.operation_error(operation, e))?;
        Ok(Value::from(json))
    }
}

/// A component backed by a supervised external process.
///
/// `initialize` starts the executable, `shutdown` terminates it, and the
/// exposed operations command the process over its pipes.
pub struct StandaloneComponent {
    name: String,
    command: String,
    supervisor: Arc<DriverSupervisor>,
}

impl StandaloneComponent {
    pub fn new(name: String, command: String, options: SupervisorOptions) -> Self {
        Self {
            name,
            command,
            supervisor: Arc::new(DriverSupervisor::new(options)),
        }
    }

    /// The supervisor owning the driver process.
    pub fn supervisor(&self) -> Arc<DriverSupervisor> {
        Arc::clone(&self.supervisor)
    }

    fn operation_error(&self, operation: &str, message: impl ToString) -> RegistryError {
        RegistryError::Operation {
            component: self.name.clone(),
            operation: operation.to_string(),
            message: message.to_string(),
        }
    }
}

#[async_trait]
impl ComponentHandle for StandaloneComponent {
    fn component_name(&self) -> &str {
        &self.name
    }

    fn inject_dependency(&self, qualified_name: &str) {
        tracing::debug!(
            target: "caelum::addon",
            component = %self.name,
            dependency = qualified_name,
            "Standalone component dependency recorded"
        );
    }

    async fn initialize(&self) -> Result<(), RegistryError> {
        self.supervisor
            .start(&self.command)
            .await
            .map_err(|e| RegistryError::InitializeFailed {
                name: self.name.clone(),
                message: e.to_string(),
            })
    }

    async fn shutdown(&self) -> Result<(), RegistryError> {
        self.supervisor.stop().await;
        Ok(())
    }

    fn operations(&self) -> Vec<OperationInfo> {
        let describe = |name: &str, description: &str| OperationInfo {
            name: name.to_string(),
            tag: "driver".to_string(),
            description: description.to_string(),
        };
        vec![
            describe("start", "Start the driver process"),
            describe("stop", "Terminate the driver process"),
            describe("send", "Write a message to the driver's stdin"),
            describe("listen", "Toggle reading of the driver's stdout"),
            describe("status", "Log and return the driver state"),
        ]
    }

    async fn invoke(&self, operation: &str, params: Value) -> Result<Value, RegistryError> {
        match operation {
            "start" => {
                self.supervisor
                    .start(&self.command)
                    .await
                    .map_err(|e| self.operation_error(operation, e))?;
                Ok(Value::Null)
            }
            "stop" => {
                self.supervisor.stop().await;
                Ok(Value::Null)
            }
            "send" => {
                let message = params
                    .as_object()
                    .and_then(|o| o.get("message"))
                    .and_then(Value::as_str)
                    .ok_or_else(|| {
                        self.operation_error(operation, "missing string field 'message'")
                    })?;
                self.supervisor
                    .send(message.as_bytes())
                    .await
                    .map_err(|e| self.operation_error(operation, e))?;
                Ok(Value::Null)
            }
            "listen" => {
                let enabled = params
                    .as_object()
                    .and_then(|o| o.get("enabled"))
                    .and_then(Value::as_bool)
                    .unwrap_or(true);
                self.supervisor.listen(enabled);
                Ok(Value::Bool(enabled))
            }
            "status" => {
                let status = self.supervisor.status().await;
                let mut out = HashMap::new();
                if let Some(status) = status {
                    out.insert("name".to_string(), Value::from(status.name));
                    out.insert(
                        "pid".to_string(),
                        status
                            .pid
                            .map(|p| Value::from(p as i64))
                            .unwrap_or(Value::Null),
                    );
                    out.insert("listening".to_string(), Value::Bool(status.listening));
                    out.insert(
                        "restarts".to_string(),
                        Value::from(status.restarts as i64),
                    );
                }
                Ok(Value::Object(out))
            }
            other => Err(self.operation_error(other, "unknown operation")),
        }
    }
}
