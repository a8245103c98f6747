//! Workflow execution engine.
//!
//! Runs multi-step workflows sequentially with fail-fast semantics. The
//! moving parts:
//!
//! - [`executor::Executor`] orders steps by position and drives the run loop,
//!   with cooperative cancellation and lifecycle observers.
//! - [`handlers`] implement the step types (email, chat, delay, HTTP request,
//!   conditional gate) behind the [`handlers::StepHandler`] trait.
//! - [`template`] resolves `{{ }}` placeholders against the run context,
//!   including upstream step results.
//! - [`recipients::RecipientResolver`] turns structured or free-text
//!   recipient specifications into concrete email addresses.
//! - [`retry::with_retry`] wraps provider calls in classified exponential
//!   backoff with jitter.
//!
//! Provider transport lives in the `courier-providers` crate; the schema
//! types live in `courier-types`.

pub mod context;
pub mod executor;
pub mod handlers;
pub mod recipients;
pub mod retry;
pub mod store;
pub mod template;

pub use context::{ExecutionContext, WorkflowMeta};
pub use executor::{ExecutionOptions, Executor, RunObserver};
pub use handlers::{
    ConditionalHandler, DelayHandler, HandlerOutcome, HttpRequestHandler, SendChatMessageHandler, SendEmailHandler,
    StepHandler,
};
pub use recipients::RecipientResolver;
pub use retry::{RetryOutcome, with_retry};
pub use store::{
    ChatIntegration, ContactStore, IntegrationStore, MemoryContactStore, MemoryIntegrationStore,
};
