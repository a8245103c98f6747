//! Template resolution for `{{ path.to.value }}` placeholders.
//!
//! Resolution is textual substitution against the run's
//! [`ExecutionContext`], optionally overlaid with per-recipient data (a
//! `contact` object injected for one personalized send). Placeholders whose
//! path does not resolve are left literally in the output; callers that
//! treat stray delimiters as configuration errors check with
//! [`has_unresolved_placeholders`]. Rendering is idempotent and
//! side-effect-free.

use serde_json::{Map as JsonMap, Value};

use crate::context::ExecutionContext;

/// Opening placeholder delimiter.
const OPEN: &str = "{{";
/// Closing placeholder delimiter.
const CLOSE: &str = "}}";

/// Lookup scope for one rendering pass: the run context plus an optional
/// per-recipient overlay consulted first.
#[derive(Debug, Clone, Copy)]
pub struct TemplateScope<'a> {
    context: &'a ExecutionContext,
    overlay: Option<&'a JsonMap<String, Value>>,
}

impl<'a> TemplateScope<'a> {
    /// Scope over the run context alone.
    pub fn new(context: &'a ExecutionContext) -> Self {
        Self { context, overlay: None }
    }

    /// Scope with a personalization overlay whose root keys shadow the
    /// context (e.g. `contact`).
    pub fn with_overlay(context: &'a ExecutionContext, overlay: &'a JsonMap<String, Value>) -> Self {
        Self {
            context,
            overlay: Some(overlay),
        }
    }

    /// Resolves a dot path to a JSON value, or `None` when any segment is
    /// missing.
    pub fn lookup(&self, path: &str) -> Option<Value> {
        let mut segments = path.split('.');
        let root = segments.next()?;
        let rest: Vec<&str> = segments.collect();

        if let Some(overlay) = self.overlay
            && let Some(value) = overlay.get(root)
        {
            return navigate(value, &rest).cloned();
        }

        match root {
            "run_id" if rest.is_empty() => Some(Value::String(self.context.run_id.clone())),
            "user" => lookup_user(self.context, &rest),
            "workflow" => lookup_workflow(self.context, &rest),
            "trigger" => {
                let data = self.context.trigger_data.as_ref()?;
                navigate(data, &rest).cloned()
            }
            "steps" => lookup_step(self.context, &rest),
            _ => None,
        }
    }
}

fn lookup_user(context: &ExecutionContext, rest: &[&str]) -> Option<Value> {
    match rest {
        ["id"] => Some(Value::String(context.user.id.clone())),
        ["email"] => Some(Value::String(context.user.email.clone())),
        ["name"] => context.user.name.clone().map(Value::String),
        _ => None,
    }
}

fn lookup_workflow(context: &ExecutionContext, rest: &[&str]) -> Option<Value> {
    match rest {
        ["id"] => Some(Value::String(context.workflow.id.clone())),
        ["name"] => Some(Value::String(context.workflow.name.clone())),
        ["owner_id"] => Some(Value::String(context.workflow.owner_id.clone())),
        ["trigger_step_id"] => context.workflow.trigger_step_id.clone().map(Value::String),
        _ => None,
    }
}

fn lookup_step(context: &ExecutionContext, rest: &[&str]) -> Option<Value> {
    let (step_id, path) = rest.split_first()?;
    let result = context.step_result(step_id)?;

    // `steps.<id>.status` reads the recorded status; anything else navigates
    // the result data, with an optional leading `data` segment tolerated.
    match path {
        ["status"] => serde_json::to_value(result.status).ok(),
        _ => {
            let data = result.data.as_ref()?;
            let trimmed = if path.first() == Some(&"data") { &path[1..] } else { path };
            navigate(data, trimmed).cloned()
        }
    }
}

fn navigate<'v>(value: &'v Value, segments: &[&str]) -> Option<&'v Value> {
    let mut current = value;
    for segment in segments {
        current = match current {
            Value::Object(map) => map.get(*segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Renders every resolvable `{{ ... }}` placeholder in `input`.
///
/// Unresolved placeholders (unknown path, or a path resolving to JSON null)
/// are preserved verbatim, delimiters included.
pub fn render_template(input: &str, scope: &TemplateScope<'_>) -> String {
    let mut output = String::with_capacity(input.len());
    let mut remainder = input;

    while let Some(start) = remainder.find(OPEN) {
        let after_open = &remainder[start + OPEN.len()..];
        let Some(end) = after_open.find(CLOSE) else {
            break;
        };

        output.push_str(&remainder[..start]);
        let raw_placeholder = &remainder[start..start + OPEN.len() + end + CLOSE.len()];
        let path = after_open[..end].trim();

        match scope.lookup(path) {
            Some(value) if !value.is_null() => output.push_str(&stringify(&value)),
            _ => output.push_str(raw_placeholder),
        }

        remainder = &after_open[end + CLOSE.len()..];
    }

    output.push_str(remainder);
    output
}

/// Recursively renders string leaves of a JSON value tree.
pub fn render_value(value: &Value, scope: &TemplateScope<'_>) -> Value {
    match value {
        Value::String(text) => Value::String(render_template(text, scope)),
        Value::Array(items) => Value::Array(items.iter().map(|item| render_value(item, scope)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, nested)| (key.clone(), render_value(nested, scope)))
                .collect(),
        ),
        _ => value.clone(),
    }
}

/// True when `text` still contains a complete placeholder after rendering.
pub fn has_unresolved_placeholders(text: &str) -> bool {
    match text.find(OPEN) {
        Some(start) => text[start..].contains(CLOSE),
        None => false,
    }
}

fn stringify(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}
