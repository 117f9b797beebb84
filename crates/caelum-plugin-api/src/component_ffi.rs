//! FFI-safe component interface using abi_stable's sabi_trait.

use abi_stable::sabi_trait;
use abi_stable::std_types::{RBox, RResult, RString, RVec};
use abi_stable::StableAbi;
use std::fmt;

/// The plugin ABI generation an addon library was built against.
///
/// This is the first thing checked after a library is mapped, before any
/// component is created. The rule: `major` must match the host exactly, and
/// the host's `minor` must be at least the library's — an older addon loads
/// into a newer host, never the reverse. There is no patch field; revisions
/// that would not change this interface do not gate loading.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, StableAbi)]
pub struct PluginAbi {
    pub major: u16,
    pub minor: u16,
}

impl PluginAbi {
    /// The generation this host build speaks.
    pub const HOST: Self = Self { major: 0, minor: 1 };

    /// Whether a library built against `plugin` can be driven by this host.
    pub fn supports(self, plugin: Self) -> bool {
        self.major == plugin.major && self.minor >= plugin.minor
    }
}

impl fmt::Display for PluginAbi {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// Describes one operation a component exposes to the interpreter's
/// function table.
#[repr(C)]
#[derive(Debug, Clone, StableAbi)]
pub struct FfiOperationInfo {
    /// Operation name; registered as `addon.component.name`.
    pub name: RString,
    /// Short tag for grouping in listings.
    pub tag: RString,
    /// Human-readable description.
    pub description: RString,
}

/// The FFI-safe component trait addon libraries implement.
///
/// # Lifecycle
///
/// 1. The root module factory creates an instance for a manifest entry.
/// 2. The host injects each declared dependency's qualified name.
/// 3. `initialize()` runs after all dependencies are initialized.
/// 4. Operations are invoked with JSON parameters until `shutdown()`.
///
/// Back-references between components are name lookups at use-time: a
/// component keeps the injected names and routes calls through the host, it
/// never holds a pointer to a peer.
#[sabi_trait]
pub trait ComponentFfi: Send + Sync + 'static {
    /// The component's short name (the manifest `modules[].name`).
    fn name(&self) -> RString;

    /// Called once all declared dependencies are registered.
    fn initialize(&mut self) -> RResult<(), RString>;

    /// Called before the component is dropped or its library unloaded.
    fn shutdown(&mut self) -> RResult<(), RString>;

    /// Records a dependency's qualified name for use-time lookup.
    fn inject_dependency(&mut self, qualified_name: RString);

    /// The operations this component exposes.
    fn operations(&self) -> RVec<FfiOperationInfo>;

    /// Invokes an operation with a JSON-encoded parameter object, returning
    /// a JSON-encoded result.
    fn invoke(&self, operation: RString, params_json: RString) -> RResult<RString, RString>;
}

/// Owned, boxed FFI component (like `Box<dyn ComponentFfi>`).
pub type ComponentFfiBox = ComponentFfi_TO<RBox<()>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_drives_older_plugins_only() {
        let host = PluginAbi { major: 3, minor: 4 };
        assert!(host.supports(host));
        assert!(host.supports(PluginAbi { major: 3, minor: 1 }));
        // A plugin newer than the host may call entry points it lacks.
        assert!(!host.supports(PluginAbi { major: 3, minor: 5 }));
        // Major generations never mix.
        assert!(!host.supports(PluginAbi { major: 2, minor: 4 }));
    }

    #[test]
    fn test_generation_display() {
        assert_eq!(PluginAbi::HOST.to_string(), "0.1");
    }
}
