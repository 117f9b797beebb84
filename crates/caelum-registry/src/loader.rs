//! Loading component instances from addon libraries.
//!
//! The dylib path is behind a trait so tests can substitute an in-process
//! loader and exercise the registry without building plugin libraries.

use crate::component::{ComponentHandle, SharedComponent};
use crate::manifest::{DiscoveredAddon, ModuleEntry};
use abi_stable::library::RootModule;
use caelum_core::RegistryError;
use caelum_plugin_api::{AddonModRef, PluginAbi};
use std::sync::Arc;

/// Produces a component instance for a manifest entry.
pub trait ComponentLoader: Send + Sync {
    fn load(
        &self,
        addon: &DiscoveredAddon,
        entry: &ModuleEntry,
    ) -> Result<Arc<dyn ComponentHandle>, RegistryError>;
}

/// Loads components from addon dynamic libraries via `abi_stable`.
///
/// The library is loaded once per addon (abi_stable caches root modules by
/// path) and stays mapped for the process lifetime.
pub struct DylibLoader;

impl ComponentLoader for DylibLoader {
    fn load(
        &self,
        addon: &DiscoveredAddon,
        entry: &ModuleEntry,
    ) -> Result<Arc<dyn ComponentHandle>, RegistryError> {
        let qualified = format!("{}.{}", addon.manifest.name, entry.name);

        let module =
            AddonModRef::load_from_file(&addon.library).map_err(|e| RegistryError::LibraryLoad {
                name: qualified.clone(),
                message: e.to_string(),
            })?;

        let found = module.plugin_abi()();
        if !PluginAbi::HOST.supports(found) {
            return Err(RegistryError::AbiMismatch {
                addon: addon.manifest.name.clone(),
                expected: PluginAbi::HOST.to_string(),
                found: found.to_string(),
            });
        }

        let component = module.create_component()(entry.entry.clone().into())
            .into_result()
            .map_err(|e| RegistryError::FactoryFailed {
                name: qualified.clone(),
                message: e.to_string(),
            })?;

        tracing::info!(
            target: "caelum::addon",
            component = %qualified,
            library = %addon.library.display(),
            "Loaded shared component"
        );
        Ok(Arc::new(SharedComponent::new(entry.name.clone(), component)))
    }
}
