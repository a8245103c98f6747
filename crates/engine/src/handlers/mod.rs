//! Pluggable step handlers.
//!
//! Each handler implements one step type's behavior behind the
//! [`StepHandler`] capability trait. Handlers report *expected* failures
//! (missing configuration, unresolved placeholders, exhausted retries, no
//! matching recipients) as a failed [`HandlerOutcome`]; an `Err` is reserved
//! for genuinely unexpected conditions and is converted by the executor into
//! a run-level failure.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use courier_types::{Step, StepKind, StepStatus};

use crate::context::ExecutionContext;

mod chat;
mod conditional;
mod delay;
mod email;
mod http;

pub use chat::SendChatMessageHandler;
pub use conditional::ConditionalHandler;
pub use delay::DelayHandler;
pub use email::SendEmailHandler;
pub use http::HttpRequestHandler;

/// What a handler produced for one step; the executor stamps identity and
/// timing onto it to form the final `StepResult`.
#[derive(Debug, Clone, PartialEq)]
pub struct HandlerOutcome {
    pub status: StepStatus,
    pub data: Option<Value>,
    pub error: Option<String>,
}

impl HandlerOutcome {
    /// Successful completion with a data payload.
    pub fn completed(data: Value) -> Self {
        Self {
            status: StepStatus::Completed,
            data: Some(data),
            error: None,
        }
    }

    /// Expected failure with a human-readable cause.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            status: StepStatus::Failed,
            data: None,
            error: Some(error.into()),
        }
    }

    /// Run suspension; the caller decides when and how to resume.
    pub fn waiting(data: Value) -> Self {
        Self {
            status: StepStatus::Waiting,
            data: Some(data),
            error: None,
        }
    }
}

/// Capability interface for one step type's behavior.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Discriminator this handler is registered under.
    fn kind(&self) -> StepKind;

    /// Executes one step against the run context.
    async fn execute(&self, step: &Step, context: &ExecutionContext) -> Result<HandlerOutcome>;
}
