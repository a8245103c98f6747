//! Delay step handler.
//!
//! A delay step does not sleep inside the engine: it suspends the run by
//! returning a `waiting` outcome carrying the computed resume timestamp, and
//! the caller decides when to resume (see `ExecutionOptions::resume_after`).

use std::time::Duration;

use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;
use tracing::info;

use courier_types::{Step, StepAction, StepKind};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};

/// Handler for `delay` steps.
#[derive(Debug, Default)]
pub struct DelayHandler;

impl DelayHandler {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl StepHandler for DelayHandler {
    fn kind(&self) -> StepKind {
        StepKind::Delay
    }

    async fn execute(&self, step: &Step, _context: &ExecutionContext) -> Result<HandlerOutcome> {
        let StepAction::Delay(config) = &step.action else {
            bail!("step '{}' routed to delay handler with mismatched configuration", step.id);
        };

        let Some(duration) = parse_duration(&config.duration) else {
            return Ok(HandlerOutcome::failed(format!(
                "invalid delay duration '{}'; expected forms like '30s', '5m', or a number of seconds",
                config.duration
            )));
        };

        let resume_at = Utc::now() + chrono::Duration::from_std(duration).unwrap_or(chrono::Duration::zero());
        info!(step_id = %step.id, duration_ms = duration.as_millis() as u64, "run suspended by delay step");

        Ok(HandlerOutcome::waiting(json!({
            "duration_ms": duration.as_millis() as u64,
            "resume_at": resume_at.to_rfc3339(),
        })))
    }
}

/// Accepts `"30s"`, `"5m"`, or a bare number of seconds.
fn parse_duration(raw: &str) -> Option<Duration> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let last_character = trimmed.chars().last()?;
    if last_character.is_ascii_alphabetic() {
        let value: u64 = trimmed[..trimmed.len() - 1].parse().ok()?;
        return match last_character {
            's' | 'S' => Some(Duration::from_secs(value)),
            'm' | 'M' => Some(Duration::from_secs(value * 60)),
            'h' | 'H' => Some(Duration::from_secs(value * 3_600)),
            _ => None,
        };
    }
    let value: u64 = trimmed.parse().ok()?;
    Some(Duration::from_secs(value))
}
