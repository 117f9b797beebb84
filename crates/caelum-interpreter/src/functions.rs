//! The interpreter's function table.
//!
//! A single name → callable map populated from two sides: components register
//! native operations, scripts define closures via `function_def`. Every entry
//! records its owner so unloading a component or script removes exactly its
//! entries.

use async_trait::async_trait;
use caelum_core::{ScriptError, Step, Value};
use dashmap::DashMap;
use std::collections::HashMap;
use std::sync::Arc;

/// Metadata attached to a native function.
#[derive(Clone, Debug)]
pub struct FunctionMetadata {
    /// Name the function is reachable under.
    pub name: String,
    /// Short tag for grouping in listings.
    pub tag: String,
    /// Human-readable description.
    pub description: String,
}

impl FunctionMetadata {
    pub fn new(
        name: impl Into<String>,
        tag: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            tag: tag.into(),
            description: description.into(),
        }
    }
}

/// A host-provided operation of shape structured → structured.
#[async_trait]
pub trait NativeFunction: Send + Sync {
    /// Executes the function with structured parameters.
    async fn call(&self, params: Value) -> Result<Value, ScriptError>;

    /// Metadata used for listings and diagnostics.
    fn metadata(&self) -> &FunctionMetadata;
}

/// A parameter of a script-defined function.
#[derive(Clone, Debug)]
pub struct FunctionParam {
    pub name: String,
    pub default: Option<Value>,
}

/// A script-defined closure: parameters with defaults, a captured snapshot of
/// the variable store, and a step body.
#[derive(Clone)]
pub struct ScriptFunction {
    pub name: String,
    pub params: Vec<FunctionParam>,
    pub steps: Vec<Step>,
    pub closure: HashMap<String, Value>,
}

impl ScriptFunction {
    /// Merges call parameters over the declared defaults.
    pub fn merged_args(&self, params: &Value) -> Result<HashMap<String, Value>, ScriptError> {
        let mut args = HashMap::new();
        for param in &self.params {
            if let Some(default) = &param.default {
                args.insert(param.name.clone(), default.clone());
            }
        }
        match params {
            Value::Null => {}
            Value::Object(map) => {
                for (k, v) in map {
                    args.insert(k.clone(), v.clone());
                }
            }
            other => {
                return Err(ScriptError::InvalidArgument(format!(
                    "function '{}' expects object parameters, got {}",
                    self.name,
                    other.kind()
                )))
            }
        }
        for param in &self.params {
            if !args.contains_key(&param.name) {
                return Err(ScriptError::InvalidArgument(format!(
                    "function '{}' is missing parameter '{}'",
                    self.name, param.name
                )));
            }
        }
        Ok(args)
    }
}

/// One function-table entry with its owner.
#[derive(Clone)]
pub enum FunctionEntry {
    Native {
        function: Arc<dyn NativeFunction>,
        owner: Option<String>,
    },
    Script {
        function: Arc<ScriptFunction>,
        owner: Option<String>,
    },
}

impl FunctionEntry {
    fn owner(&self) -> Option<&str> {
        match self {
            FunctionEntry::Native { owner, .. } | FunctionEntry::Script { owner, .. } => {
                owner.as_deref()
            }
        }
    }
}

/// Concurrent name → callable map.
pub struct FunctionTable {
    entries: DashMap<String, FunctionEntry>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Registers a native function; duplicate names are rejected.
    pub fn register_native(
        &self,
        function: Arc<dyn NativeFunction>,
        owner: Option<String>,
    ) -> Result<(), ScriptError> {
        let name = function.metadata().name.clone();
        if self.entries.contains_key(&name) {
            return Err(ScriptError::Runtime(format!(
                "function '{name}' is already registered"
            )));
        }
        tracing::debug!(target: "caelum::script", function = %name, "Registered native function");
        self.entries
            .insert(name, FunctionEntry::Native { function, owner });
        Ok(())
    }

    /// Defines or redefines a script closure.
    pub fn define_closure(&self, function: ScriptFunction, owner: Option<String>) {
        self.entries.insert(
            function.name.clone(),
            FunctionEntry::Script {
                function: Arc::new(function),
                owner,
            },
        );
    }

    /// Looks up an entry by name.
    pub fn get(&self, name: &str) -> Option<FunctionEntry> {
        self.entries.get(name).map(|e| e.value().clone())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Removes a single entry.
    pub fn remove(&self, name: &str) -> bool {
        self.entries.remove(name).is_some()
    }

    /// Removes every entry registered by `owner`, returning the count.
    pub fn remove_owned_by(&self, owner: &str) -> usize {
        let doomed: Vec<String> = self
            .entries
            .iter()
            .filter(|e| e.value().owner() == Some(owner))
            .map(|e| e.key().clone())
            .collect();
        for name in &doomed {
            self.entries.remove(name);
        }
        doomed.len()
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for FunctionTable {
    fn default() -> Self {
        Self::new()
    }
}

/// Adapter turning a plain closure into a [`NativeFunction`].
pub struct FnFunction<F> {
    metadata: FunctionMetadata,
    body: F,
}

impl<F> FnFunction<F>
where
    F: Fn(Value) -> Result<Value, ScriptError> + Send + Sync,
{
    pub fn new(metadata: FunctionMetadata, body: F) -> Self {
        Self { metadata, body }
    }
}

#[async_trait]
impl<F> NativeFunction for FnFunction<F>
where
    F: Fn(Value) -> Result<Value, ScriptError> + Send + Sync,
{
    async fn call(&self, params: Value) -> Result<Value, ScriptError> {
        (self.body)(params)
    }

    fn metadata(&self) -> &FunctionMetadata {
        &self.metadata
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn native(name: &str, owner: Option<&str>) -> (Arc<dyn NativeFunction>, Option<String>) {
        (
            Arc::new(FnFunction::new(
                FunctionMetadata::new(name, "test", "test fn"),
                |params| Ok(params),
            )),
            owner.map(str::to_string),
        )
    }

    #[tokio::test]
    async fn test_register_and_call() {
        let table = FunctionTable::new();
        let (f, owner) = native("echo", None);
        table.register_native(f, owner).unwrap();
        match table.get("echo").unwrap() {
            FunctionEntry::Native { function, .. } => {
                let out = function.call(Value::from(1i64)).await.unwrap();
                assert_eq!(out, Value::from(1i64));
            }
            _ => panic!("expected native entry"),
        }
    }

    #[test]
    fn test_duplicate_native_rejected() {
        let table = FunctionTable::new();
        let (f1, _) = native("dup", None);
        let (f2, _) = native("dup", None);
        table.register_native(f1, None).unwrap();
        assert!(table.register_native(f2, None).is_err());
    }

    #[test]
    fn test_closure_redefinition_allowed() {
        let table = FunctionTable::new();
        let func = ScriptFunction {
            name: "f".into(),
            params: vec![],
            steps: vec![],
            closure: HashMap::new(),
        };
        table.define_closure(func.clone(), Some("script_a".into()));
        table.define_closure(func, Some("script_a".into()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_remove_owned_by() {
        let table = FunctionTable::new();
        let (f1, o1) = native("cam.connect", Some("camera.main"));
        let (f2, o2) = native("cam.capture", Some("camera.main"));
        let (f3, o3) = native("mount.slew", Some("mount.main"));
        table.register_native(f1, o1).unwrap();
        table.register_native(f2, o2).unwrap();
        table.register_native(f3, o3).unwrap();

        assert_eq!(table.remove_owned_by("camera.main"), 2);
        assert!(!table.contains("cam.connect"));
        assert!(table.contains("mount.slew"));
    }

    #[test]
    fn test_merged_args() {
        let func = ScriptFunction {
            name: "add".into(),
            params: vec![
                FunctionParam {
                    name: "a".into(),
                    default: None,
                },
                FunctionParam {
                    name: "b".into(),
                    default: Some(Value::from(10i64)),
                },
            ],
            steps: vec![],
            closure: HashMap::new(),
        };
        let mut params = HashMap::new();
        params.insert("a".to_string(), Value::from(1i64));
        let args = func.merged_args(&Value::Object(params)).unwrap();
        assert_eq!(args.get("a"), Some(&Value::from(1i64)));
        assert_eq!(args.get("b"), Some(&Value::from(10i64)));

        // Missing required parameter fails.
        assert!(func.merged_args(&Value::Null).is_err());
    }
}
