//! Shared type definitions for the Courier workflow automation engine.
//!
//! This crate carries the data model exchanged between the execution engine,
//! the provider clients, and host applications: workflow and step schema,
//! run/step results, recipient specifications, and retry policy.

pub mod recipient;
pub mod retry;
pub mod workflow;

pub use recipient::{ContactFilter, ContactInfo, RecipientConfig, ResolvedRecipients};
pub use retry::{RetryConfig, RetryDirective};
pub use workflow::{
    ConditionalConfig, DelayConfig, ExecutionResult, HttpRequestConfig, RunStatus, RunUser, SendChatConfig,
    SendEmailConfig, Step, StepAction, StepKind, StepResult, StepStatus, WorkflowInput,
};
