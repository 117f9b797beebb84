//! Script model: a header plus a sequence of typed steps.
//!
//! A script arrives as JSON, either a bare array of steps or an object with
//! an optional `header`, an optional `context` (label namespace), and a
//! `steps` array. Every step carries a `type` tag, an optional `label`, and
//! free-form attributes that handlers read through the typed accessors here.

use crate::error::ScriptError;
use crate::types::Value;
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The set of step types understood by the interpreter.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StepType {
    Call,
    Condition,
    Loop,
    While,
    Goto,
    Switch,
    Delay,
    Parallel,
    NestedScript,
    Assign,
    Import,
    WaitEvent,
    ListenEvent,
    BroadcastEvent,
    Print,
    Message,
    Async,
    Try,
    Throw,
    FunctionDef,
    Return,
    Break,
    Continue,
    Retry,
    Schedule,
    Scope,
}

impl FromStr for StepType {
    type Err = ScriptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        // "function" is a legacy alias for "call"; both take the same path.
        let op = match s {
            "call" | "function" => StepType::Call,
            "condition" => StepType::Condition,
            "loop" => StepType::Loop,
            "while" => StepType::While,
            "goto" => StepType::Goto,
            "switch" => StepType::Switch,
            "delay" => StepType::Delay,
            "parallel" => StepType::Parallel,
            "nested_script" => StepType::NestedScript,
            "assign" => StepType::Assign,
            "import" => StepType::Import,
            "wait_event" => StepType::WaitEvent,
            "listen_event" => StepType::ListenEvent,
            "broadcast_event" => StepType::BroadcastEvent,
            "print" => StepType::Print,
            "message" => StepType::Message,
            "async" => StepType::Async,
            "try" => StepType::Try,
            "throw" => StepType::Throw,
            "function_def" => StepType::FunctionDef,
            "return" => StepType::Return,
            "break" => StepType::Break,
            "continue" => StepType::Continue,
            "retry" => StepType::Retry,
            "schedule" => StepType::Schedule,
            "scope" => StepType::Scope,
            other => {
                return Err(ScriptError::InvalidStep {
                    message: format!("unknown step type '{other}'"),
                })
            }
        };
        Ok(op)
    }
}

impl fmt::Display for StepType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StepType::Call => "call",
            StepType::Condition => "condition",
            StepType::Loop => "loop",
            StepType::While => "while",
            StepType::Goto => "goto",
            StepType::Switch => "switch",
            StepType::Delay => "delay",
            StepType::Parallel => "parallel",
            StepType::NestedScript => "nested_script",
            StepType::Assign => "assign",
            StepType::Import => "import",
            StepType::WaitEvent => "wait_event",
            StepType::ListenEvent => "listen_event",
            StepType::BroadcastEvent => "broadcast_event",
            StepType::Print => "print",
            StepType::Message => "message",
            StepType::Async => "async",
            StepType::Try => "try",
            StepType::Throw => "throw",
            StepType::FunctionDef => "function_def",
            StepType::Return => "return",
            StepType::Break => "break",
            StepType::Continue => "continue",
            StepType::Retry => "retry",
            StepType::Schedule => "schedule",
            StepType::Scope => "scope",
        };
        write!(f, "{name}")
    }
}

/// One entry in a script: a step type plus free-form attributes.
#[derive(Clone, Debug, PartialEq)]
pub struct Step {
    pub op: StepType,
    pub label: Option<String>,
    pub attrs: HashMap<String, Value>,
}

impl Step {
    /// Parses a step from a structured value.
    pub fn parse(value: &Value) -> Result<Self, ScriptError> {
        let obj = value.as_object().ok_or_else(|| ScriptError::InvalidStep {
            message: format!("step must be an object, got {}", value.kind()),
        })?;
        let type_tag = obj
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ScriptError::InvalidStep {
                message: "step is missing its 'type' tag".to_string(),
            })?;
        let op = type_tag.parse()?;
        let label = obj.get("label").and_then(Value::as_str).map(str::to_string);
        let attrs = obj
            .iter()
            .filter(|(k, _)| k.as_str() != "type")
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(Step { op, label, attrs })
    }

    /// Parses a sequence of steps from an array value.
    pub fn parse_sequence(value: &Value) -> Result<Vec<Step>, ScriptError> {
        let items = value.as_array().ok_or_else(|| ScriptError::InvalidStep {
            message: "expected an array of steps".to_string(),
        })?;
        items.iter().map(Step::parse).collect()
    }

    /// Returns a required attribute.
    pub fn attr(&self, key: &str) -> Result<&Value, ScriptError> {
        self.attrs.get(key).ok_or_else(|| ScriptError::InvalidStep {
            message: format!("{} step is missing required field '{key}'", self.op),
        })
    }

    /// Returns an optional attribute.
    pub fn opt_attr(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Returns a required string attribute.
    pub fn string_attr(&self, key: &str) -> Result<String, ScriptError> {
        self.attr(key)?
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ScriptError::InvalidStep {
                message: format!("{} step field '{key}' must be a string", self.op),
            })
    }

    /// Returns an optional string attribute, erroring if present but not a string.
    pub fn opt_string_attr(&self, key: &str) -> Result<Option<String>, ScriptError> {
        match self.attrs.get(key) {
            Some(v) => v
                .as_str()
                .map(|s| Some(s.to_string()))
                .ok_or_else(|| ScriptError::InvalidStep {
                    message: format!("{} step field '{key}' must be a string", self.op),
                }),
            None => Ok(None),
        }
    }

    /// Returns a required integer attribute.
    pub fn i64_attr(&self, key: &str) -> Result<i64, ScriptError> {
        self.attr(key)?
            .as_i64()
            .ok_or_else(|| ScriptError::InvalidStep {
                message: format!("{} step field '{key}' must be an integer", self.op),
            })
    }

    /// Returns an optional non-negative integer attribute.
    pub fn opt_u64_attr(&self, key: &str) -> Result<Option<u64>, ScriptError> {
        match self.attrs.get(key) {
            Some(v) => v
                .as_u64()
                .map(Some)
                .ok_or_else(|| ScriptError::InvalidStep {
                    message: format!(
                        "{} step field '{key}' must be a non-negative integer",
                        self.op
                    ),
                }),
            None => Ok(None),
        }
    }

    /// Returns an optional boolean attribute, defaulting when absent.
    pub fn bool_attr_or(&self, key: &str, default: bool) -> Result<bool, ScriptError> {
        match self.attrs.get(key) {
            Some(v) => v.as_bool().ok_or_else(|| ScriptError::InvalidStep {
                message: format!("{} step field '{key}' must be a boolean", self.op),
            }),
            None => Ok(default),
        }
    }

    /// Parses a required attribute as a sub-step sequence.
    pub fn steps_attr(&self, key: &str) -> Result<Vec<Step>, ScriptError> {
        Step::parse_sequence(self.attr(key)?)
    }

    /// Parses an optional attribute as a sub-step sequence.
    pub fn opt_steps_attr(&self, key: &str) -> Result<Option<Vec<Step>>, ScriptError> {
        match self.attrs.get(key) {
            Some(v) => Step::parse_sequence(v).map(Some),
            None => Ok(None),
        }
    }

    /// Parses a required attribute as a single sub-step.
    pub fn step_attr(&self, key: &str) -> Result<Step, ScriptError> {
        Step::parse(self.attr(key)?)
    }
}

/// Script header metadata.
///
/// Unknown header fields are preserved in `extra` rather than rejected.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ScriptHeader {
    pub name: Option<String>,
    pub version: Option<String>,
    pub author: Option<String>,
    #[serde(default)]
    pub auto_execute: bool,
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

/// A parsed script: header, label namespace, and step sequence.
#[derive(Clone, Debug, Default)]
pub struct Script {
    pub header: Option<ScriptHeader>,
    pub context: Option<String>,
    pub steps: Vec<Step>,
}

impl Script {
    /// Parses a script from its JSON shape: a bare step array, or an object
    /// with `header`/`context`/`steps`.
    pub fn parse(value: &Value) -> Result<Self, ScriptError> {
        match value {
            Value::Array(_) => Ok(Script {
                header: None,
                context: None,
                steps: Step::parse_sequence(value)?,
            }),
            Value::Object(obj) => {
                let header = match obj.get("header") {
                    Some(h) => Some(
                        serde_json::from_value(h.to_json()).map_err(|e| {
                            ScriptError::Parse {
                                message: format!("invalid script header: {e}"),
                            }
                        })?,
                    ),
                    None => None,
                };
                let context = obj
                    .get("context")
                    .and_then(Value::as_str)
                    .map(str::to_string);
                let steps_value = obj.get("steps").ok_or_else(|| ScriptError::Parse {
                    message: "script object is missing 'steps'".to_string(),
                })?;
                Ok(Script {
                    header,
                    context,
                    steps: Step::parse_sequence(steps_value)?,
                })
            }
            other => Err(ScriptError::Parse {
                message: format!("script must be an array or object, got {}", other.kind()),
            }),
        }
    }

    /// Whether the header asks for execution right after load.
    pub fn auto_execute(&self) -> bool {
        self.header.as_ref().map(|h| h.auto_execute).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(json: serde_json::Value) -> Value {
        Value::from(json)
    }

    #[test]
    fn test_parse_bare_array() {
        let script = Script::parse(&value(serde_json::json!([
            {"type": "assign", "variable": "x", "value": 1}
        ])))
        .unwrap();
        assert!(script.header.is_none());
        assert_eq!(script.steps.len(), 1);
        assert_eq!(script.steps[0].op, StepType::Assign);
    }

    #[test]
    fn test_parse_header_and_context() {
        let script = Script::parse(&value(serde_json::json!({
            "header": {
                "name": "Init",
                "version": "1.0.1",
                "author": "someone",
                "auto_execute": true,
                "description": "free-form metadata survives"
            },
            "context": "init",
            "steps": [{"type": "print", "message": "hello"}]
        })))
        .unwrap();
        let header = script.header.as_ref().unwrap();
        assert_eq!(header.name.as_deref(), Some("Init"));
        assert!(script.auto_execute());
        assert!(header.extra.contains_key("description"));
        assert_eq!(script.context.as_deref(), Some("init"));
    }

    #[test]
    fn test_function_alias_maps_to_call() {
        let step = Step::parse(&value(serde_json::json!(
            {"type": "function", "function": "f", "params": {}}
        )))
        .unwrap();
        assert_eq!(step.op, StepType::Call);
    }

    #[test]
    fn test_unknown_type_rejected() {
        let err = Step::parse(&value(serde_json::json!({"type": "warp"}))).unwrap_err();
        assert!(err.to_string().contains("warp"));
    }

    #[test]
    fn test_missing_type_rejected() {
        assert!(Step::parse(&value(serde_json::json!({"variable": "x"}))).is_err());
    }

    #[test]
    fn test_typed_accessors() {
        let step = Step::parse(&value(serde_json::json!({
            "type": "delay",
            "milliseconds": 250,
            "label": "pause"
        })))
        .unwrap();
        assert_eq!(step.i64_attr("milliseconds").unwrap(), 250);
        assert_eq!(step.label.as_deref(), Some("pause"));
        assert!(step.i64_attr("missing").is_err());
        assert!(step.string_attr("milliseconds").is_err());
    }

    #[test]
    fn test_sub_steps() {
        let step = Step::parse(&value(serde_json::json!({
            "type": "loop",
            "loop_iterations": 2,
            "steps": [{"type": "print", "message": "tick"}]
        })))
        .unwrap();
        let body = step.steps_attr("steps").unwrap();
        assert_eq!(body.len(), 1);
        assert_eq!(body[0].op, StepType::Print);
    }
}
