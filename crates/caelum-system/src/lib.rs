//! The Caelum system facade.
//!
//! Wires the task interpreter, component registry, and driver supervisor
//! from one configuration, with no global singletons: every subsystem gets
//! its context explicitly, and hosts reach them through this facade.

pub mod logging;

use caelum_config::CaelumConfig;
use caelum_core::RegistryError;
use caelum_interpreter::{FunctionTable, InterpreterOptions, TaskInterpreter};
use caelum_registry::{ComponentLoader, ComponentRegistry, DylibLoader};
use caelum_supervisor::{DriverSupervisor, SupervisorOptions};
use std::sync::Arc;
use std::time::Duration;

/// The assembled core: interpreter + registry + supervisor.
pub struct System {
    interpreter: Arc<TaskInterpreter>,
    registry: Arc<ComponentRegistry>,
    supervisor: Arc<DriverSupervisor>,
}

impl System {
    /// Builds the system with the default dynamic-library loader.
    pub fn new(config: CaelumConfig) -> Self {
        Self::with_loader(config, Arc::new(DylibLoader))
    }

    /// Builds the system with a custom component loader.
    pub fn with_loader(config: CaelumConfig, loader: Arc<dyn ComponentLoader>) -> Self {
        let functions = Arc::new(FunctionTable::new());

        let interpreter_options = InterpreterOptions {
            goto_limit: config.interpreter.goto_limit,
            lock_retries: config.interpreter.lock_retries,
            lock_retry_delay: Duration::from_millis(config.interpreter.lock_retry_delay_ms),
            task_folder: config.modules.task_folder.clone(),
        };
        let supervisor_options = SupervisorOptions {
            poll_interval: Duration::from_millis(config.supervisor.poll_interval_ms),
            read_chunk: config.supervisor.read_chunk,
            auto_restart: config.supervisor.auto_restart,
        };

        let interpreter = Arc::new(TaskInterpreter::new(
            Arc::clone(&functions),
            interpreter_options,
        ));
        let registry = Arc::new(
            ComponentRegistry::new(config.modules.module_root.clone(), functions, loader)
                .with_supervisor_options(supervisor_options.clone()),
        );
        let supervisor = Arc::new(DriverSupervisor::new(supervisor_options));

        Self {
            interpreter,
            registry,
            supervisor,
        }
    }

    /// Loads every addon. A failure here is fatal: the caller should report
    /// it and terminate.
    pub async fn start(&self) -> Result<(), RegistryError> {
        tracing::info!(target: "caelum::system", "Starting component registry");
        self.registry.initialize().await?;
        tracing::info!(
            target: "caelum::system",
            components = self.registry.len(),
            "Caelum core started"
        );
        Ok(())
    }

    /// Stops running scripts and the supervised driver.
    pub async fn shutdown(&self) {
        self.interpreter.stop().await;
        self.supervisor.stop().await;
        tracing::info!(target: "caelum::system", "Caelum core shut down");
    }

    pub fn interpreter(&self) -> Arc<TaskInterpreter> {
        Arc::clone(&self.interpreter)
    }

    pub fn registry(&self) -> Arc<ComponentRegistry> {
        Arc::clone(&self.registry)
    }

    pub fn supervisor(&self) -> Arc<DriverSupervisor> {
        Arc::clone(&self.supervisor)
    }
}
