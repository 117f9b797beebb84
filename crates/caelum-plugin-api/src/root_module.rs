//! The addon root module: the single entry point of an addon library.

use crate::component_ffi::{ComponentFfiBox, PluginAbi};
use abi_stable::{
    declare_root_module_statics,
    library::RootModule,
    package_version_strings,
    sabi_types::VersionStrings,
    std_types::{RResult, RString},
    StableAbi,
};

/// The root module every addon library exports.
///
/// `create_component` is the factory keyed by the manifest's `entry` field;
/// an addon with several components dispatches on the key.
#[repr(C)]
#[derive(StableAbi)]
#[sabi(kind(Prefix(prefix_ref = AddonModRef)))]
#[sabi(missing_field(panic))]
pub struct AddonMod {
    /// ABI generation gate checked before anything else is called.
    pub plugin_abi: extern "C" fn() -> PluginAbi,

    /// The addon's name (must match the manifest's `name`).
    pub addon_name: extern "C" fn() -> RString,

    /// Creates the component registered under `entry` in the manifest.
    #[sabi(last_prefix_field)]
    pub create_component: extern "C" fn(entry: RString) -> RResult<ComponentFfiBox, RString>,
}

impl RootModule for AddonModRef {
    declare_root_module_statics! {AddonModRef}
    const BASE_NAME: &'static str = "caelum_addon";
    const NAME: &'static str = "caelum_addon";
    const VERSION_STRINGS: VersionStrings = package_version_strings!();
}
