//! `import` — pull in scripts from the local cache or the task folder.
//!
//! A cached script executes inline. A file import reads
//! `<task_folder>/<name>.json`, macro-expands it, registers it (optionally
//! under `namespace::name`), and executes it when its header asks for
//! `auto_execute`. An `imports` array processes several names recursively.

use crate::context::ExecutionContext;
use crate::executor::{worker, Flow};
use crate::scripts::LoadedScript;
use caelum_core::{Script, ScriptError, Step, Value};
use std::sync::Arc;

pub(crate) async fn execute(ctx: &ExecutionContext, step: &Step) -> Result<Flow, ScriptError> {
    let namespace = step.opt_string_attr("namespace")?;

    if let Some(name) = step.opt_string_attr("script")? {
        import_one(ctx, &name, namespace.as_deref()).await?;
    }

    if let Some(list) = step.opt_attr("imports") {
        let names = list.as_array().ok_or_else(|| ScriptError::InvalidStep {
            message: "'imports' must be an array of script names".to_string(),
        })?;
        for entry in names {
            let name = entry.as_str().ok_or_else(|| ScriptError::InvalidStep {
                message: "'imports' entries must be strings".to_string(),
            })?;
            import_one(ctx, name, namespace.as_deref()).await?;
        }
    }

    Ok(Flow::Next)
}

async fn import_one(
    ctx: &ExecutionContext,
    name: &str,
    namespace: Option<&str>,
) -> Result<(), ScriptError> {
    // Cache hit: execute the already-loaded script inline.
    if let Some(script) = ctx.scripts.get(name).map(|s| s.value().clone()) {
        let child_ctx = ctx.for_script(name);
        return Box::pin(worker::run_body(&child_ctx, &script)).await;
    }

    let path = ctx.options.task_folder.join(format!("{name}.json"));
    tracing::debug!(target: "caelum::script", script = %name, path = %path.display(), "Importing script from file");
    let text = tokio::fs::read_to_string(&path).await?;
    let json: serde_json::Value = serde_json::from_str(&text).map_err(|e| ScriptError::Parse {
        message: format!("import '{name}': {e}"),
    })?;
    let expanded = ctx.macros.expand(&Value::from(json))?;

    let key = match namespace {
        Some(ns) => format!("{ns}::{name}"),
        None => name.to_string(),
    };
    let script = Script::parse(&expanded)?;
    let auto = script.auto_execute();
    let loaded = Arc::new(LoadedScript::build(key.clone(), script, expanded)?);
    ctx.scripts.insert(key.clone(), Arc::clone(&loaded));

    if auto {
        let child_ctx = ctx.for_script(&key);
        Box::pin(worker::run_body(&child_ctx, &loaded)).await?;
    }
    Ok(())
}
