//! Macro pre-processing for scripts.
//!
//! Before label parsing, a script passes through the generator, which
//! substitutes `${name}` and `${name(args)}` tokens inside string values.
//! Macros are registered externally as text, structured trees, or callables;
//! unknown macros fail loudly.

use caelum_core::{ScriptError, Value};
use dashmap::DashMap;
use std::sync::Arc;

/// A registered macro.
#[derive(Clone)]
pub enum MacroDef {
    /// Substituted as text.
    Text(String),
    /// Substituted as a structured value.
    Tree(Value),
    /// Invoked with the raw argument string to produce a value.
    Callable(Arc<dyn Fn(&str) -> Result<Value, ScriptError> + Send + Sync>),
}

/// Registry and expander for `${...}` tokens.
pub struct MacroGenerator {
    macros: DashMap<String, MacroDef>,
}

impl MacroGenerator {
    pub fn new() -> Self {
        Self {
            macros: DashMap::new(),
        }
    }

    pub fn register_text(&self, name: impl Into<String>, text: impl Into<String>) {
        self.macros.insert(name.into(), MacroDef::Text(text.into()));
    }

    pub fn register_tree(&self, name: impl Into<String>, value: Value) {
        self.macros.insert(name.into(), MacroDef::Tree(value));
    }

    pub fn register_callable<F>(&self, name: impl Into<String>, callable: F)
    where
        F: Fn(&str) -> Result<Value, ScriptError> + Send + Sync + 'static,
    {
        self.macros
            .insert(name.into(), MacroDef::Callable(Arc::new(callable)));
    }

    pub fn is_empty(&self) -> bool {
        self.macros.is_empty()
    }

    /// Expands every macro token in the value tree.
    pub fn expand(&self, value: &Value) -> Result<Value, ScriptError> {
        match value {
            Value::String(s) => self.expand_string(s),
            Value::Array(items) => {
                let expanded: Result<Vec<Value>, ScriptError> =
                    items.iter().map(|v| self.expand(v)).collect();
                Ok(Value::Array(expanded?))
            }
            Value::Object(map) => {
                let mut out = std::collections::HashMap::with_capacity(map.len());
                for (k, v) in map {
                    out.insert(k.clone(), self.expand(v)?);
                }
                Ok(Value::Object(out))
            }
            other => Ok(other.clone()),
        }
    }

    fn expand_string(&self, text: &str) -> Result<Value, ScriptError> {
        if !text.contains("${") {
            return Ok(Value::String(text.to_string()));
        }

        // A string that is exactly one macro token substitutes verbatim, so
        // tree macros can produce structured values.
        if text.starts_with("${") && text.ends_with('}') && !text[2..].contains("${") {
            return self.invoke(&text[2..text.len() - 1]);
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;
        while let Some(start) = rest.find("${") {
            out.push_str(&rest[..start]);
            let tail = &rest[start + 2..];
            let end = tail.find('}').ok_or_else(|| {
                ScriptError::Parse {
                    message: format!("unterminated macro token in '{text}'"),
                }
            })?;
            let value = self.invoke(&tail[..end])?;
            out.push_str(&value.to_string());
            rest = &tail[end + 1..];
        }
        out.push_str(rest);
        Ok(Value::String(out))
    }

    fn invoke(&self, token: &str) -> Result<Value, ScriptError> {
        let (name, args) = match token.find('(') {
            Some(open) if token.ends_with(')') => {
                (&token[..open], &token[open + 1..token.len() - 1])
            }
            _ => (token, ""),
        };
        let def = self
            .macros
            .get(name)
            .ok_or_else(|| ScriptError::InvalidArgument(format!("unknown macro '{name}'")))?;
        match def.value() {
            MacroDef::Text(t) => Ok(Value::String(t.clone())),
            MacroDef::Tree(v) => Ok(v.clone()),
            MacroDef::Callable(f) => f(args),
        }
    }
}

impl Default for MacroGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_strings_untouched() {
        let gen = MacroGenerator::new();
        let v = Value::from("no macros here");
        assert_eq!(gen.expand(&v).unwrap(), v);
    }

    #[test]
    fn test_text_substitution_inside_string() {
        let gen = MacroGenerator::new();
        gen.register_text("site", "obs-west");
        let v = Value::from("log dir: ${site}/logs");
        assert_eq!(gen.expand(&v).unwrap(), Value::from("log dir: obs-west/logs"));
    }

    #[test]
    fn test_tree_substitution_whole_token() {
        let gen = MacroGenerator::new();
        gen.register_tree("default_exposure", Value::from(serde_json::json!({"seconds": 30})));
        let v = Value::from("${default_exposure}");
        let out = gen.expand(&v).unwrap();
        assert_eq!(out.as_object().unwrap().get("seconds").unwrap().as_i64(), Some(30));
    }

    #[test]
    fn test_callable_receives_args() {
        let gen = MacroGenerator::new();
        gen.register_callable("repeat", |args| {
            Ok(Value::from(args.to_uppercase()))
        });
        let v = Value::from("${repeat(dark)}");
        assert_eq!(gen.expand(&v).unwrap(), Value::from("DARK"));
    }

    #[test]
    fn test_unknown_macro_fails() {
        let gen = MacroGenerator::new();
        let v = Value::from("${missing}");
        assert!(gen.expand(&v).is_err());
    }

    #[test]
    fn test_expansion_recurses_into_structures() {
        let gen = MacroGenerator::new();
        gen.register_text("cam", "zwo-asi2600");
        let v = Value::from(serde_json::json!({
            "steps": [{"type": "print", "message": "using ${cam}"}]
        }));
        let out = gen.expand(&v).unwrap();
        let msg = out.as_object().unwrap()["steps"].as_array().unwrap()[0]
            .as_object()
            .unwrap()["message"]
            .clone();
        assert_eq!(msg, Value::from("using zwo-asi2600"));
    }
}
