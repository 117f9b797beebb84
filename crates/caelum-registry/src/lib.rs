//! Dynamic component registry.
//!
//! Scans an addon directory, loads component libraries in dependency order,
//! injects peer references by name, and exposes each component's operations
//! through the interpreter's function table. The registry owns every
//! component exclusively; external holders get `Weak` handles that dangle
//! once a component is unloaded.

pub mod component;
pub mod loader;
pub mod manifest;
pub mod registry;
pub mod resolve;

pub use component::{ComponentHandle, OperationInfo, SharedComponent, StandaloneComponent};
pub use loader::{ComponentLoader, DylibLoader};
pub use manifest::{
    discover, AddonManifest, ComponentFlavor, DiscoveredAddon, ModuleEntry, LIBRARY_EXTENSION,
    MANIFEST_FILE,
};
pub use registry::{ComponentInfo, ComponentRegistry};

pub use caelum_core::RegistryError;
