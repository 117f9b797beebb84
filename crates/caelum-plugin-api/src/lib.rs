//! ABI-stable plugin interface for Caelum addons.
//!
//! Addon dynamic libraries implement [`ComponentFfi`] for each component they
//! provide and export one [`AddonMod`] root module whose factory creates
//! components by the manifest's `entry` key. The host loads the library with
//! `AddonModRef::load_from_file`, checks the [`PluginAbi`] generation, and
//! wraps the returned trait objects.
//!
//! Payloads cross the boundary as JSON text in `RString`s; the host does the
//! (de)serialization so plugins stay free of the host's value types.

#![allow(non_local_definitions)] // abi_stable's sabi_trait generates these

mod component_ffi;
mod root_module;

pub use component_ffi::{
    ComponentFfi, ComponentFfiBox, ComponentFfi_TO, FfiOperationInfo, PluginAbi,
};
pub use root_module::{AddonMod, AddonModRef};

/// Common imports for plugin authors.
pub mod prelude {
    pub use crate::{
        AddonMod, AddonModRef, ComponentFfi, ComponentFfiBox, ComponentFfi_TO, FfiOperationInfo,
        PluginAbi,
    };
    pub use abi_stable::std_types::{RResult, RString, RVec};
}
