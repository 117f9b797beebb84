//! Addon manifests and directory discovery.
//!
//! An addon is a subdirectory of the module root holding a `package.json`
//! manifest and at least one shared library. The manifest declares the addon
//! name and the components each library provides.

use caelum_core::RegistryError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Canonical manifest file name.
pub const MANIFEST_FILE: &str = "package.json";

/// Shared-library extension for the current target.
#[cfg(target_os = "windows")]
pub const LIBRARY_EXTENSION: &str = "dll";
#[cfg(target_os = "macos")]
pub const LIBRARY_EXTENSION: &str = "dylib";
#[cfg(not(any(target_os = "windows", target_os = "macos")))]
pub const LIBRARY_EXTENSION: &str = "so";

/// How a component is hosted.
#[derive(Clone, Copy, Debug, Default, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ComponentFlavor {
    /// Loaded from the addon's dynamic library.
    #[default]
    Shared,
    /// A long-running external executable run under the driver supervisor.
    Standalone,
}

/// One component declared by an addon manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct ModuleEntry {
    /// Component name; registered as `addon.name`.
    pub name: String,
    /// Factory key passed to the addon's root module.
    pub entry: String,
    /// Qualified names of components that must initialize first.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Hosting flavor; shared when omitted.
    #[serde(rename = "type", default)]
    pub flavor: ComponentFlavor,
    /// Executable for standalone components; defaults to `entry`.
    #[serde(default)]
    pub command: Option<String>,
}

/// A parsed addon manifest.
#[derive(Clone, Debug, Deserialize)]
pub struct AddonManifest {
    /// Addon name, the first half of every qualified component name.
    pub name: String,
    /// Declared components.
    pub modules: Vec<ModuleEntry>,
}

/// An addon directory that qualified during discovery.
#[derive(Clone, Debug)]
pub struct DiscoveredAddon {
    pub directory: PathBuf,
    pub manifest: AddonManifest,
    /// The addon's shared library.
    pub library: PathBuf,
}

/// Scans the module root for qualifying addon directories.
///
/// A subdirectory qualifies when it contains both `package.json` and at
/// least one shared library; anything else is skipped. A malformed manifest
/// in a qualifying directory is an error.
pub fn discover(module_root: &Path) -> Result<Vec<DiscoveredAddon>, RegistryError> {
    let entries = std::fs::read_dir(module_root).map_err(|e| RegistryError::ModuleRoot {
        path: module_root.to_path_buf(),
        message: e.to_string(),
    })?;

    let mut addons = Vec::new();
    for entry in entries.flatten() {
        let directory = entry.path();
        if !directory.is_dir() {
            continue;
        }
        let manifest_path = directory.join(MANIFEST_FILE);
        if !manifest_path.exists() {
            tracing::debug!(
                target: "caelum::addon",
                directory = %directory.display(),
                "Skipping directory without manifest"
            );
            continue;
        }
        let Some(library) = find_library(&directory) else {
            tracing::debug!(
                target: "caelum::addon",
                directory = %directory.display(),
                "Skipping directory without a shared library"
            );
            continue;
        };

        let text = std::fs::read_to_string(&manifest_path).map_err(|source| {
            RegistryError::ManifestRead {
                path: manifest_path.clone(),
                source,
            }
        })?;
        let manifest: AddonManifest =
            serde_json::from_str(&text).map_err(|source| RegistryError::ManifestParse {
                path: manifest_path.clone(),
                source,
            })?;

        tracing::info!(
            target: "caelum::addon",
            addon = %manifest.name,
            components = manifest.modules.len(),
            "Discovered addon"
        );
        addons.push(DiscoveredAddon {
            directory,
            manifest,
            library,
        });
    }
    // Deterministic order before dependency sorting.
    addons.sort_by(|a, b| a.manifest.name.cmp(&b.manifest.name));
    Ok(addons)
}

fn find_library(directory: &Path) -> Option<PathBuf> {
    let mut libraries: Vec<PathBuf> = std::fs::read_dir(directory)
        .ok()?
        .flatten()
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.extension()
                    .and_then(|e| e.to_str())
                    .is_some_and(|e| e == LIBRARY_EXTENSION)
        })
        .collect();
    libraries.sort();
    libraries.into_iter().next()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_addon(root: &Path, name: &str, manifest: &str) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join(MANIFEST_FILE), manifest).unwrap();
        std::fs::write(dir.join(format!("lib{name}.{LIBRARY_EXTENSION}")), b"").unwrap();
    }

    #[test]
    fn test_manifest_parsing() {
        let manifest: AddonManifest = serde_json::from_str(
            r#"{
                "name": "camera",
                "modules": [
                    {"name": "main", "entry": "create_camera",
                     "dependencies": ["focuser.main"]},
                    {"name": "guider", "entry": "indi_guider", "type": "standalone",
                     "command": "indi_guider_bin"}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(manifest.name, "camera");
        assert_eq!(manifest.modules.len(), 2);
        assert_eq!(manifest.modules[0].dependencies, vec!["focuser.main"]);
        assert_eq!(manifest.modules[0].flavor, ComponentFlavor::Shared);
        assert_eq!(manifest.modules[1].flavor, ComponentFlavor::Standalone);
    }

    #[test]
    fn test_manifest_requires_both_keys() {
        assert!(serde_json::from_str::<AddonManifest>(r#"{"name": "x"}"#).is_err());
        assert!(serde_json::from_str::<AddonManifest>(r#"{"modules": []}"#).is_err());
    }

    #[test]
    fn test_discovery_qualification() {
        let root = tempfile::tempdir().unwrap();
        write_addon(
            root.path(),
            "camera",
            r#"{"name": "camera", "modules": [{"name": "main", "entry": "create"}]}"#,
        );
        // Manifest but no library: disqualified.
        let bare = root.path().join("incomplete");
        std::fs::create_dir_all(&bare).unwrap();
        std::fs::write(
            bare.join(MANIFEST_FILE),
            r#"{"name": "incomplete", "modules": []}"#,
        )
        .unwrap();
        // Library but no manifest: disqualified.
        let silent = root.path().join("silent");
        std::fs::create_dir_all(&silent).unwrap();
        std::fs::write(silent.join(format!("libsilent.{LIBRARY_EXTENSION}")), b"").unwrap();

        let addons = discover(root.path()).unwrap();
        assert_eq!(addons.len(), 1);
        assert_eq!(addons[0].manifest.name, "camera");
    }

    #[test]
    fn test_missing_module_root() {
        let err = discover(Path::new("/definitely/not/here")).unwrap_err();
        assert!(matches!(err, RegistryError::ModuleRoot { .. }));
    }

    #[test]
    fn test_malformed_manifest_is_error() {
        let root = tempfile::tempdir().unwrap();
        write_addon(root.path(), "broken", "{not json");
        assert!(matches!(
            discover(root.path()).unwrap_err(),
            RegistryError::ManifestParse { .. }
        ));
    }
}
