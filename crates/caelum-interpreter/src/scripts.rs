//! Loaded scripts: parsed steps plus the label → index map.

use caelum_core::{Script, ScriptError, Value};
use std::collections::HashMap;

/// A script after validation, macro expansion, and label parsing.
#[derive(Debug)]
pub struct LoadedScript {
    pub name: String,
    pub script: Script,
    /// Label (namespaced when the script has a `context`) → step index.
    pub labels: HashMap<String, usize>,
    /// The expanded source, returned by `get`.
    pub raw: Value,
}

impl LoadedScript {
    /// Builds the label map; duplicate labels are rejected.
    pub fn build(name: String, script: Script, raw: Value) -> Result<Self, ScriptError> {
        let mut labels = HashMap::new();
        for (index, step) in script.steps.iter().enumerate() {
            if let Some(label) = &step.label {
                let key = match &script.context {
                    Some(context) => format!("{context}::{label}"),
                    None => label.clone(),
                };
                if labels.insert(key, index).is_some() {
                    return Err(ScriptError::DuplicateLabel {
                        label: label.clone(),
                    });
                }
            }
        }
        Ok(Self {
            name,
            script,
            labels,
            raw,
        })
    }

    /// Resolves a `goto` target to `(canonical label, step index)`.
    ///
    /// Bare labels also resolve through the script's context namespace.
    pub fn resolve_label(&self, label: &str) -> Option<(String, usize)> {
        if let Some(&index) = self.labels.get(label) {
            return Some((label.to_string(), index));
        }
        if let Some(context) = &self.script.context {
            let namespaced = format!("{context}::{label}");
            if let Some(&index) = self.labels.get(&namespaced) {
                return Some((namespaced, index));
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(json: serde_json::Value) -> Result<LoadedScript, ScriptError> {
        let raw = Value::from(json);
        let script = Script::parse(&raw)?;
        LoadedScript::build("test".into(), script, raw)
    }

    #[test]
    fn test_label_map() {
        let loaded = load(serde_json::json!([
            {"type": "print", "message": "a", "label": "start"},
            {"type": "print", "message": "b"},
            {"type": "print", "message": "c", "label": "end"}
        ]))
        .unwrap();
        assert_eq!(loaded.resolve_label("start"), Some(("start".into(), 0)));
        assert_eq!(loaded.resolve_label("end"), Some(("end".into(), 2)));
        assert_eq!(loaded.resolve_label("missing"), None);
    }

    #[test]
    fn test_duplicate_labels_rejected() {
        let err = load(serde_json::json!([
            {"type": "print", "message": "a", "label": "x"},
            {"type": "print", "message": "b", "label": "x"}
        ]))
        .unwrap_err();
        assert!(matches!(err, ScriptError::DuplicateLabel { .. }));
    }

    #[test]
    fn test_context_namespacing() {
        let loaded = load(serde_json::json!({
            "context": "startup",
            "steps": [{"type": "print", "message": "a", "label": "begin"}]
        }))
        .unwrap();
        // Both the bare and namespaced forms resolve to the same step.
        assert_eq!(
            loaded.resolve_label("begin"),
            Some(("startup::begin".into(), 0))
        );
        assert_eq!(
            loaded.resolve_label("startup::begin"),
            Some(("startup::begin".into(), 0))
        );
    }
}
