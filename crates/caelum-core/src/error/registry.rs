//! Component registry errors.

use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while discovering, loading, or managing components.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// The configured module root does not exist or is unreadable.
    #[error("Module root {path} is not readable: {message}")]
    ModuleRoot { path: PathBuf, message: String },

    /// An addon manifest could not be read.
    #[error("Failed to read manifest {path}: {source}")]
    ManifestRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An addon manifest is not valid JSON of the expected shape.
    #[error("Failed to parse manifest {path}: {source}")]
    ManifestParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The declared component dependencies form a cycle.
    #[error("Dependency cycle involving component '{name}'")]
    DependencyCycle { name: String },

    /// A component with the same qualified name is already registered.
    #[error("Component '{name}' is already registered")]
    DuplicateComponent { name: String },

    /// The named component is not registered.
    #[error("Component '{name}' not found")]
    ComponentNotFound { name: String },

    /// A declared dependency is not registered.
    #[error("Component '{name}' depends on unknown component '{dependency}'")]
    DependencyNotFound { name: String, dependency: String },

    /// The shared library could not be loaded.
    #[error("Failed to load library for '{name}': {message}")]
    LibraryLoad { name: String, message: String },

    /// The addon's ABI version is incompatible with the host.
    #[error("Addon '{addon}' has incompatible ABI {found} (host {expected})")]
    AbiMismatch {
        addon: String,
        expected: String,
        found: String,
    },

    /// The root module factory rejected the manifest's entry key.
    #[error("Factory for '{name}' failed: {message}")]
    FactoryFailed { name: String, message: String },

    /// `initialize()` failed; during startup this is fatal.
    #[error("Component '{name}' failed to initialize: {message}")]
    InitializeFailed { name: String, message: String },

    /// An operation invocation failed inside the component.
    #[error("Component '{component}' operation '{operation}' failed: {message}")]
    Operation {
        component: String,
        operation: String,
        message: String,
    },
}
