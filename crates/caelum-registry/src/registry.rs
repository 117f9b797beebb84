//! The component registry coordinator.

use crate::component::{ComponentHandle, OperationInfo, StandaloneComponent};
use crate::loader::ComponentLoader;
use crate::manifest::{discover, ComponentFlavor, DiscoveredAddon, ModuleEntry};
use crate::resolve::sort_components;
use async_trait::async_trait;
use caelum_core::{addon_log, RegistryError, ScriptError, Value};
use caelum_interpreter::{FunctionMetadata, FunctionTable, NativeFunction};
use caelum_supervisor::SupervisorOptions;
use dashmap::DashMap;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Weak};

/// Introspection data for one registered component.
#[derive(Clone, Debug)]
pub struct ComponentInfo {
    pub qualified_name: String,
    pub addon: String,
    pub component: String,
    pub dependencies: Vec<String>,
    pub operations: Vec<OperationInfo>,
}

struct Registered {
    handle: Arc<dyn ComponentHandle>,
    addon: DiscoveredAddon,
    entry: ModuleEntry,
}

/// Owns every loaded component and wires their operations into the
/// interpreter's function table.
pub struct ComponentRegistry {
    module_root: PathBuf,
    loader: Arc<dyn ComponentLoader>,
    functions: Arc<FunctionTable>,
    supervisor_options: SupervisorOptions,
    components: DashMap<String, Registered>,
}

impl ComponentRegistry {
    pub fn new(
        module_root: PathBuf,
        functions: Arc<FunctionTable>,
        loader: Arc<dyn ComponentLoader>,
    ) -> Self {
        Self {
            module_root,
            loader,
            functions,
            supervisor_options: SupervisorOptions::default(),
            components: DashMap::new(),
        }
    }

    /// Overrides supervisor tuning for standalone components.
    pub fn with_supervisor_options(mut self, options: SupervisorOptions) -> Self {
        self.supervisor_options = options;
        self
    }

    /// Discovers addons and loads every declared component in dependency
    /// order. Any failure here is fatal to startup.
    pub async fn initialize(&self) -> Result<(), RegistryError> {
        let addons = discover(&self.module_root)?;

        let mut catalog: HashMap<String, (DiscoveredAddon, ModuleEntry)> = HashMap::new();
        let mut graph: Vec<(String, Vec<String>)> = Vec::new();
        for addon in &addons {
            for entry in &addon.manifest.modules {
                let qualified = format!("{}.{}", addon.manifest.name, entry.name);
                graph.push((qualified.clone(), entry.dependencies.clone()));
                catalog.insert(qualified, (addon.clone(), entry.clone()));
            }
        }

        let order = sort_components(&graph)?;
        tracing::info!(
            target: "caelum::addon",
            components = order.len(),
            "Loading components in dependency order"
        );
        for qualified in order {
            let (addon, entry) =
                catalog
                    .get(&qualified)
                    .ok_or_else(|| RegistryError::ComponentNotFound {
                        name: qualified.clone(),
                    })?;
            self.load_component(addon, entry).await?;
        }
        Ok(())
    }

    async fn load_component(
        &self,
        addon: &DiscoveredAddon,
        entry: &ModuleEntry,
    ) -> Result<(), RegistryError> {
        let qualified = format!("{}.{}", addon.manifest.name, entry.name);
        if self.components.contains_key(&qualified) {
            return Err(RegistryError::DuplicateComponent { name: qualified });
        }
        for dependency in &entry.dependencies {
            if !self.components.contains_key(dependency) {
                return Err(RegistryError::DependencyNotFound {
                    name: qualified,
                    dependency: dependency.clone(),
                });
            }
        }

        let handle: Arc<dyn ComponentHandle> = match entry.flavor {
            ComponentFlavor::Shared => self.loader.load(addon, entry)?,
            ComponentFlavor::Standalone => Arc::new(StandaloneComponent::new(
                entry.name.clone(),
                entry.command.clone().unwrap_or_else(|| entry.entry.clone()),
                self.supervisor_options.clone(),
            )),
        };

        for dependency in &entry.dependencies {
            handle.inject_dependency(dependency);
        }
        handle.initialize().await?;

        // Expose operations as `addon.component.operation`.
        for operation in handle.operations() {
            let function_name = format!("{qualified}.{}", operation.name);
            let adapter = Arc::new(ComponentOperation {
                metadata: FunctionMetadata::new(
                    function_name.clone(),
                    operation.tag.clone(),
                    operation.description.clone(),
                ),
                component: Arc::downgrade(&handle),
                operation: operation.name.clone(),
            });
            self.functions
                .register_native(adapter, Some(qualified.clone()))
                .map_err(|e| RegistryError::Operation {
                    component: qualified.clone(),
                    operation: operation.name.clone(),
                    message: e.to_string(),
                })?;
        }

        addon_log!(
            info,
            component = %qualified,
            "Component initialized and registered"
        );
        self.components.insert(
            qualified,
            Registered {
                handle,
                addon: addon.clone(),
                entry: entry.clone(),
            },
        );
        Ok(())
    }

    /// Loads a single component by qualified name after startup.
    ///
    /// Failure leaves the registry unchanged.
    pub async fn load(&self, qualified_name: &str) -> Result<(), RegistryError> {
        let addons = discover(&self.module_root)?;
        for addon in &addons {
            for entry in &addon.manifest.modules {
                if format!("{}.{}", addon.manifest.name, entry.name) == qualified_name {
                    return self.load_component(addon, entry).await;
                }
            }
        }
        Err(RegistryError::ComponentNotFound {
            name: qualified_name.to_string(),
        })
    }

    /// Unloads a component and removes its function-table entries.
    ///
    /// Without `forced`, a component that others depend on stays loaded.
    pub async fn unload(&self, qualified_name: &str, forced: bool) -> Result<(), RegistryError> {
        if !forced {
            if let Some(dependent) = self.components.iter().find(|r| {
                r.value()
                    .entry
                    .dependencies
                    .iter()
                    .any(|d| d == qualified_name)
            }) {
                return Err(RegistryError::Operation {
                    component: qualified_name.to_string(),
                    operation: "unload".to_string(),
                    message: format!("'{}' depends on it", dependent.key()),
                });
            }
        }

        let (_, registered) =
            self.components
                .remove(qualified_name)
                .ok_or_else(|| RegistryError::ComponentNotFound {
                    name: qualified_name.to_string(),
                })?;
        if let Err(e) = registered.handle.shutdown().await {
            if forced {
                tracing::warn!(
                    target: "caelum::addon",
                    component = %qualified_name,
                    error = %e,
                    "Forced unload despite shutdown failure"
                );
            } else {
                self.components
                    .insert(qualified_name.to_string(), registered);
                return Err(e);
            }
        }
        let removed = self.functions.remove_owned_by(qualified_name);
        addon_log!(
            info,
            component = %qualified_name,
            operations = removed,
            "Component unloaded"
        );
        Ok(())
    }

    /// Unload then load with the last-seen manifest entry.
    pub async fn reload(&self, qualified_name: &str) -> Result<(), RegistryError> {
        let (addon, entry) = {
            let registered = self.components.get(qualified_name).ok_or_else(|| {
                RegistryError::ComponentNotFound {
                    name: qualified_name.to_string(),
                }
            })?;
            (registered.addon.clone(), registered.entry.clone())
        };
        self.unload(qualified_name, true).await?;
        self.load_component(&addon, &entry).await
    }

    /// Reloads every registered component.
    pub async fn reload_all(&self) -> Result<(), RegistryError> {
        let names = self.component_list();
        for name in names {
            self.reload(&name).await?;
        }
        Ok(())
    }

    /// A weak handle, valid only while the component stays registered.
    pub fn get_component(&self, qualified_name: &str) -> Option<Weak<dyn ComponentHandle>> {
        self.components
            .get(qualified_name)
            .map(|r| Arc::downgrade(&r.value().handle))
    }

    /// Introspection data for one component.
    pub fn get_component_info(&self, qualified_name: &str) -> Option<ComponentInfo> {
        self.components.get(qualified_name).map(|r| {
            let registered = r.value();
            ComponentInfo {
                qualified_name: qualified_name.to_string(),
                addon: registered.addon.manifest.name.clone(),
                component: registered.entry.name.clone(),
                dependencies: registered.entry.dependencies.clone(),
                operations: registered.handle.operations(),
            }
        })
    }

    /// Qualified names of all registered components, sorted.
    pub fn component_list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.components.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

/// Function-table adapter for one component operation.
///
/// Holds the component weakly: the entry is removed on unload anyway, and a
/// dangling call must fail rather than keep the component alive.
struct ComponentOperation {
    metadata: FunctionMetadata,
    component: Weak<dyn ComponentHandle>,
    operation: String,
}

#[async_trait]
impl NativeFunction for ComponentOperation {
    async fn call(&self, params: Value) -> Result<Value, ScriptError> {
        let component = self
            .component
            .upgrade()
            .ok_or_else(|| ScriptError::Runtime("component is unloaded".to_string()))?;
        component
            .invoke(&self.operation, params)
            .await
            .map_err(|e| ScriptError::Runtime(e.to_string()))
    }

    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{LIBRARY_EXTENSION, MANIFEST_FILE};
    use parking_lot::Mutex;
    use std::path::Path;

    struct TestComponent {
        name: String,
        qualified: String,
        init_log: Arc<Mutex<Vec<String>>>,
        injected: Mutex<Vec<String>>,
        fail_init: bool,
    }

    #[async_trait]
    impl ComponentHandle for TestComponent {
        fn component_name(&self) -> &str {
            &self.name
        }

        fn inject_dependency(&self, qualified_name: &str) {
            self.injected.lock().push(qualified_name.to_string());
        }

        async fn initialize(&self) -> Result<(), RegistryError> {
            if self.fail_init {
                return Err(RegistryError::InitializeFailed {
                    name: self.qualified.clone(),
                    message: "refused".to_string(),
                });
            }
            self.init_log.lock().push(self.qualified.clone());
            Ok(())
        }

        async fn shutdown(&self) -> Result<(), RegistryError> {
            Ok(())
        }

        fn operations(&self) -> Vec<OperationInfo> {
            vec![OperationInfo {
                name: "status".to_string(),
                tag: "test".to_string(),
                description: "echo parameters".to_string(),
            }]
        }

        async fn invoke(&self, _operation: &str, params: Value) -> Result<Value, RegistryError> {
            Ok(params)
        }
    }

    struct StubLoader {
        init_log: Arc<Mutex<Vec<String>>>,
        fail_init_for: Option<String>,
    }

    impl ComponentLoader for StubLoader {
        fn load(
            &self,
            addon: &DiscoveredAddon,
            entry: &ModuleEntry,
        ) -> Result<Arc<dyn ComponentHandle>, RegistryError> {
            let qualified = format!("{}.{}", addon.manifest.name, entry.name);
            Ok(Arc::new(TestComponent {
                name: entry.name.clone(),
                fail_init: self.fail_init_for.as_deref() == Some(qualified.as_str()),
                qualified,
                init_log: Arc::clone(&self.init_log),
                injected: Mutex::new(Vec::new()),
            }))
        }
    }

    fn write_addon(root: &Path, name: &str, manifest: serde_json::Value) {
        let dir = root.join(name);
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join(MANIFEST_FILE),
            serde_json::to_string_pretty(&manifest).unwrap(),
        )
        .unwrap();
        std::fs::write(dir.join(format!("lib{name}.{LIBRARY_EXTENSION}")), b"").unwrap();
    }

    fn registry_with(
        root: &Path,
        fail_init_for: Option<&str>,
    ) -> (ComponentRegistry, Arc<Mutex<Vec<String>>>, Arc<FunctionTable>) {
        let init_log = Arc::new(Mutex::new(Vec::new()));
        let functions = Arc::new(FunctionTable::new());
        let registry = ComponentRegistry::new(
            root.to_path_buf(),
            Arc::clone(&functions),
            Arc::new(StubLoader {
                init_log: Arc::clone(&init_log),
                fail_init_for: fail_init_for.map(str::to_string),
            }),
        );
        (registry, init_log, functions)
    }

    fn two_addons(root: &Path) {
        write_addon(
            root,
            "camera",
            serde_json::json!({
                "name": "camera",
                "modules": [
                    {"name": "main", "entry": "create_camera",
                     "dependencies": ["focuser.main"]}
                ]
            }),
        );
        write_addon(
            root,
            "focuser",
            serde_json::json!({
                "name": "focuser",
                "modules": [{"name": "main", "entry": "create_focuser"}]
            }),
        );
    }

    #[tokio::test]
    async fn test_initialize_respects_dependency_order() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, init_log, functions) = registry_with(root.path(), None);

        registry.initialize().await.unwrap();

        let order = init_log.lock().clone();
        assert_eq!(order, vec!["focuser.main", "camera.main"]);
        assert_eq!(
            registry.component_list(),
            vec!["camera.main", "focuser.main"]
        );
        // Operations are reachable from the function table.
        assert!(functions.contains("camera.main.status"));
        assert!(functions.contains("focuser.main.status"));
    }

    #[tokio::test]
    async fn test_operations_invoke_through_function_table() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, functions) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();

        let entry = functions.get("camera.main.status").unwrap();
        let caelum_interpreter::FunctionEntry::Native { function, .. } = entry else {
            panic!("expected a native entry");
        };
        let out = function.call(Value::from(42i64)).await.unwrap();
        assert_eq!(out, Value::from(42i64));
    }

    #[tokio::test]
    async fn test_unload_removes_operations_and_weak_handles() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, functions) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();

        let weak = registry.get_component("camera.main").unwrap();
        assert!(weak.upgrade().is_some());

        registry.unload("camera.main", false).await.unwrap();
        assert!(!functions.contains("camera.main.status"));
        assert!(weak.upgrade().is_none());
        assert!(registry.get_component("camera.main").is_none());
    }

    #[tokio::test]
    async fn test_unload_refuses_while_depended_on() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, _) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();

        // camera.main depends on focuser.main.
        assert!(registry.unload("focuser.main", false).await.is_err());
        registry.unload("focuser.main", true).await.unwrap();
        assert!(registry.get_component("focuser.main").is_none());
    }

    #[tokio::test]
    async fn test_initialize_failure_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, _) = registry_with(root.path(), Some("focuser.main"));
        let err = registry.initialize().await.unwrap_err();
        assert!(matches!(err, RegistryError::InitializeFailed { .. }));
    }

    #[tokio::test]
    async fn test_dependency_cycle_is_fatal() {
        let root = tempfile::tempdir().unwrap();
        write_addon(
            root.path(),
            "a",
            serde_json::json!({
                "name": "a",
                "modules": [{"name": "x", "entry": "e", "dependencies": ["b.y"]}]
            }),
        );
        write_addon(
            root.path(),
            "b",
            serde_json::json!({
                "name": "b",
                "modules": [{"name": "y", "entry": "e", "dependencies": ["a.x"]}]
            }),
        );
        let (registry, _, _) = registry_with(root.path(), None);
        assert!(matches!(
            registry.initialize().await.unwrap_err(),
            RegistryError::DependencyCycle { .. }
        ));
    }

    #[tokio::test]
    async fn test_reload_reinitializes() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, init_log, functions) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();

        registry.reload("camera.main").await.unwrap();
        assert_eq!(
            init_log.lock().iter().filter(|n| *n == "camera.main").count(),
            2
        );
        assert!(functions.contains("camera.main.status"));
    }

    #[tokio::test]
    async fn test_post_startup_load_failure_leaves_registry_unchanged() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, _) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();
        let before = registry.len();

        assert!(matches!(
            registry.load("ghost.widget").await.unwrap_err(),
            RegistryError::ComponentNotFound { .. }
        ));
        assert_eq!(registry.len(), before);
    }

    #[tokio::test]
    async fn test_component_info() {
        let root = tempfile::tempdir().unwrap();
        two_addons(root.path());
        let (registry, _, _) = registry_with(root.path(), None);
        registry.initialize().await.unwrap();

        let info = registry.get_component_info("camera.main").unwrap();
        assert_eq!(info.addon, "camera");
        assert_eq!(info.component, "main");
        assert_eq!(info.dependencies, vec!["focuser.main"]);
        assert_eq!(info.operations.len(), 1);
    }
}
