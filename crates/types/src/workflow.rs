//! Strongly typed workflow schema definitions shared across the engine, the
//! provider clients, and any host application persisting runs.
//!
//! Each step carries a typed configuration selected by its `type` tag, so a
//! malformed step surfaces as a deserialization error before execution rather
//! than as a missing-field failure mid-run. Step order is defined by the
//! `position` field, not by declaration order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;

use crate::recipient::RecipientConfig;
use crate::retry::RetryDirective;

/// Immutable input to one workflow run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowInput {
    /// Canonical workflow identifier.
    pub id: String,
    /// Human-readable workflow name, used in run-level error messages.
    pub name: String,
    /// Identifier of the user owning the workflow's contacts and integrations.
    pub owner_id: String,
    /// Steps to execute, ordered by their `position` field.
    #[serde(default)]
    pub steps: Vec<Step>,
    /// Identifier of the step that triggered this run, recorded as metadata.
    #[serde(default)]
    pub trigger_step_id: Option<String>,
}

/// A single unit of work within a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Step {
    /// Unique step identifier within the workflow.
    pub id: String,
    /// Display name surfaced in results and error messages.
    pub name: String,
    /// Optional descriptive copy.
    #[serde(default)]
    pub description: Option<String>,
    /// Execution order; steps run in ascending position.
    pub position: i64,
    /// Typed action configuration, tagged by step type.
    #[serde(flatten)]
    pub action: StepAction,
}

impl Step {
    /// Returns the discriminator used for handler registry lookups.
    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }
}

/// Typed step configuration, one variant per handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "config", rename_all = "snake_case")]
pub enum StepAction {
    /// Send an email to resolved recipients.
    SendEmail(SendEmailConfig),
    /// Post a chat message through an integration or webhook.
    SendChatMessage(SendChatConfig),
    /// Suspend the run until a later resumption.
    Delay(DelayConfig),
    /// Issue an arbitrary HTTP request.
    HttpRequest(HttpRequestConfig),
    /// Evaluate a single boolean condition against the run context.
    Conditional(ConditionalConfig),
}

impl StepAction {
    /// Maps the configuration variant to its registry discriminator.
    pub fn kind(&self) -> StepKind {
        match self {
            Self::SendEmail(_) => StepKind::SendEmail,
            Self::SendChatMessage(_) => StepKind::SendChatMessage,
            Self::Delay(_) => StepKind::Delay,
            Self::HttpRequest(_) => StepKind::HttpRequest,
            Self::Conditional(_) => StepKind::Conditional,
        }
    }
}

/// Discriminator for the executor's step-type → handler registry.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum StepKind {
    SendEmail,
    SendChatMessage,
    Delay,
    HttpRequest,
    Conditional,
}

impl fmt::Display for StepKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SendEmail => "send_email",
            Self::SendChatMessage => "send_chat_message",
            Self::Delay => "delay",
            Self::HttpRequest => "http_request",
            Self::Conditional => "conditional",
        };
        f.write_str(name)
    }
}

/// Configuration for the send-email handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SendEmailConfig {
    /// Structured recipient specification, resolved through the recipient
    /// resolver. Takes precedence over `to` when both are present.
    #[serde(default)]
    pub recipients: Option<RecipientConfig>,
    /// Legacy single free-text recipient field; template-resolved and then
    /// routed through free-text recipient resolution.
    #[serde(default)]
    pub to: Option<String>,
    /// Message subject; supports `{{ }}` placeholders.
    #[serde(default)]
    pub subject: String,
    /// Message body; supports `{{ }}` placeholders. Sent as HTML when it
    /// contains angle-bracket markup, as plain text otherwise.
    #[serde(default)]
    pub body: String,
    /// When false, multi-recipient sends are batched into a single message
    /// instead of one personalized message per recipient.
    #[serde(default)]
    pub personalize: Option<bool>,
    /// Retry directive applied to each provider send.
    #[serde(default)]
    pub retry: RetryDirective,
}

/// Configuration for the send-chat-message handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct SendChatConfig {
    /// Stored integration record to deliver through. When the integration has
    /// an access token the channel-post API is used; otherwise its stored
    /// webhook URL is the fallback.
    #[serde(default)]
    pub integration_id: Option<String>,
    /// Pre-shared webhook URL used standalone when no integration is set.
    #[serde(default)]
    pub webhook_url: Option<String>,
    /// Channel to post to; falls back to the integration's default channel.
    #[serde(default)]
    pub channel: Option<String>,
    /// Message text; supports `{{ }}` placeholders.
    #[serde(default)]
    pub message: String,
    /// Retry directive applied to each provider call.
    #[serde(default)]
    pub retry: RetryDirective,
}

/// Configuration for the delay handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DelayConfig {
    /// Wait duration, e.g. `"30s"`, `"5m"`, or a bare number of seconds.
    pub duration: String,
}

/// Configuration for the HTTP request handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HttpRequestConfig {
    /// Target URL; supports `{{ }}` placeholders.
    pub url: String,
    /// HTTP method, defaulting to GET.
    #[serde(default = "default_http_method")]
    pub method: String,
    /// Additional request headers in declaration order.
    #[serde(default)]
    pub headers: indexmap::IndexMap<String, String>,
    /// Optional JSON body; string leaves support `{{ }}` placeholders.
    #[serde(default)]
    pub body: Option<JsonValue>,
    /// Retry directive applied to the request.
    #[serde(default)]
    pub retry: RetryDirective,
}

fn default_http_method() -> String {
    "GET".to_string()
}

/// Configuration for the conditional handler.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConditionalConfig {
    /// Boolean expression evaluated after template resolution. Supports
    /// `left == right`, `left != right`, and bare truthiness checks.
    pub condition: String,
}

/// Status of a single executed step.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has been dispatched and has not yet produced a result.
    Running,
    /// Step finished successfully.
    Completed,
    /// Step attempted but reported an error.
    Failed,
    /// Step suspended the run; the caller decides when to resume.
    Waiting,
    /// Step did not run.
    Skipped,
}

/// Terminal (or in-flight) status of a whole run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    Completed,
    Failed,
    Waiting,
    Cancelled,
}

/// Result of one step execution, created and finalized exactly once per run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    /// Identifier of the executed step.
    pub step_id: String,
    /// Final status of this step.
    pub status: StepStatus,
    /// Arbitrary JSON payload produced by the handler.
    #[serde(default)]
    pub data: Option<JsonValue>,
    /// Human-readable failure description when `status` is `failed`.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock time the step was dispatched.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the step produced its result.
    pub completed_at: DateTime<Utc>,
    /// Step duration in milliseconds.
    pub duration_ms: u64,
}

/// Aggregated result of one call to the executor; immutable after return.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExecutionResult {
    /// The run identifier supplied by the caller.
    pub execution_id: String,
    /// Terminal run status.
    pub status: RunStatus,
    /// One result per executed step, in execution order. Steps after the
    /// first failed or waiting step do not appear.
    pub steps: Vec<StepResult>,
    /// Run-level error naming the failing step and its cause.
    #[serde(default)]
    pub error: Option<String>,
    /// Wall-clock time the run started.
    pub started_at: DateTime<Utc>,
    /// Wall-clock time the run finished.
    pub completed_at: DateTime<Utc>,
    /// Run duration in milliseconds.
    pub duration_ms: u64,
}

/// Minimal identity of the user a run executes on behalf of.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct RunUser {
    pub id: String,
    pub email: String,
    #[serde(default)]
    pub name: Option<String>,
}
