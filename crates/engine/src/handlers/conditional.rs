//! Conditional gate step handler.
//!
//! Renders the condition expression against the run context and evaluates
//! it. A condition that holds completes the step; one that does not fails
//! it, which stops the run at this gate under the executor's fail-fast
//! sequencing.

use anyhow::{Result, bail};
use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use courier_types::{Step, StepAction, StepKind};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};
use crate::template::{TemplateScope, render_template};

/// Handler for `conditional` steps.
#[derive(Debug, Default)]
pub struct ConditionalHandler;

impl ConditionalHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepHandler for ConditionalHandler {
    fn kind(&self) -> StepKind {
        StepKind::Conditional
    }

    async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<HandlerOutcome> {
        let StepAction::Conditional(config) = &step.action else {
            bail!("step '{}' routed to conditional handler with mismatched configuration", step.id);
        };

        if config.condition.trim().is_empty() {
            return Ok(HandlerOutcome::failed("conditional step is missing 'condition'"));
        }

        let scope = TemplateScope::new(context);
        let rendered = render_template(&config.condition, &scope);
        let passed = evaluate_condition(&rendered);
        debug!(step_id = %step.id, %rendered, passed, "evaluated conditional gate");

        if passed {
            Ok(HandlerOutcome::completed(json!({
                "passed": true,
                "condition": rendered,
            })))
        } else {
            Ok(HandlerOutcome::failed(format!(
                "condition '{}' evaluated to false",
                config.condition
            )))
        }
    }
}

/// Evaluates a rendered condition string.
///
/// Supports `==` and `!=` comparisons between trimmed operands (surrounding
/// quotes are stripped before comparing). Anything else is tested for
/// truthiness: empty strings, `false`, `0`, `null`, and strings still
/// containing unrendered `{{` placeholders are false.
fn evaluate_condition(rendered: &str) -> bool {
    if let Some((left, right)) = rendered.split_once("==") {
        return normalize_operand(left) == normalize_operand(right);
    }
    if let Some((left, right)) = rendered.split_once("!=") {
        return normalize_operand(left) != normalize_operand(right);
    }

    let value = rendered.trim();
    if value.is_empty() || value.contains("{{") {
        return false;
    }
    !matches!(value.to_ascii_lowercase().as_str(), "false" | "0" | "null")
}

fn normalize_operand(raw: &str) -> String {
    let trimmed = raw.trim();
    let trimmed = trimmed
        .strip_prefix('\'')
        .and_then(|rest| rest.strip_suffix('\''))
        .or_else(|| trimmed.strip_prefix('"').and_then(|rest| rest.strip_suffix('"')))
        .unwrap_or(trimmed);
    trimmed.to_string()
}
