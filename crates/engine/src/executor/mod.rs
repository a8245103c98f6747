//! Sequential workflow executor.
//!
//! Runs a workflow's steps in ascending `position` order with fail-fast
//! semantics: the first failed step stops the run and stamps a run-level
//! error naming the step and its cause. A `waiting` step suspends the run;
//! callers resume by re-executing with [`ExecutionOptions::resume_after`].
//!
//! The executor never returns `Err`. Every failure mode, including a handler
//! panicking an `anyhow` error upward, is contained into the returned
//! [`ExecutionResult`] so a host can always persist the run outcome.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use courier_types::{ExecutionResult, RunStatus, RunUser, Step, StepKind, StepResult, StepStatus, WorkflowInput};

use crate::context::ExecutionContext;
use crate::handlers::{HandlerOutcome, StepHandler};

/// Lifecycle hooks invoked around each step.
///
/// Observers are how hosts persist run progress; an observer error therefore
/// fails the run rather than being swallowed.
#[async_trait]
pub trait RunObserver: Send + Sync {
    /// Called before a step is dispatched to its handler.
    async fn on_step_start(&self, _step: &Step, _context: &ExecutionContext) -> Result<()> {
        Ok(())
    }

    /// Called after a step's result is finalized, for every terminal status.
    async fn on_step_complete(&self, _result: &StepResult, _context: &ExecutionContext) -> Result<()> {
        Ok(())
    }
}

/// Per-run knobs supplied by the caller.
#[derive(Default)]
pub struct ExecutionOptions {
    /// Cooperative cancellation, checked at each step boundary.
    pub cancellation: Option<CancellationToken>,
    /// Lifecycle hooks; observer errors fail the run.
    pub observer: Option<Arc<dyn RunObserver>>,
    /// Payload made available to templates under the `trigger.` root.
    pub trigger_data: Option<Value>,
    /// Resume a previously suspended run: steps at or before this step's
    /// position are skipped.
    pub resume_after: Option<String>,
}

/// Step-type → handler registry plus the run loop.
pub struct Executor {
    handlers: HashMap<StepKind, Arc<dyn StepHandler>>,
}

impl Executor {
    /// An executor with no handlers registered.
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Builder-style handler registration.
    pub fn with_handler(mut self, handler: Arc<dyn StepHandler>) -> Self {
        self.register(handler);
        self
    }

    /// Registers a handler under its declared step kind, replacing any
    /// previous registration for that kind.
    pub fn register(&mut self, handler: Arc<dyn StepHandler>) {
        self.handlers.insert(handler.kind(), handler);
    }

    /// Executes one run of `workflow` and returns its aggregated result.
    pub async fn execute(
        &self,
        workflow: &WorkflowInput,
        user: &RunUser,
        run_id: &str,
        options: ExecutionOptions,
    ) -> ExecutionResult {
        let run_started_at = Utc::now();
        let run_clock = Instant::now();
        info!(run_id, workflow_id = %workflow.id, step_count = workflow.steps.len(), "starting workflow run");

        let mut context = ExecutionContext::new(workflow, user, run_id, options.trigger_data.clone());
        let mut step_results: Vec<StepResult> = Vec::new();

        let finish = |status: RunStatus, steps: Vec<StepResult>, error: Option<String>| {
            let completed_at = Utc::now();
            ExecutionResult {
                execution_id: run_id.to_string(),
                status,
                steps,
                error,
                started_at: run_started_at,
                completed_at,
                duration_ms: run_clock.elapsed().as_millis() as u64,
            }
        };

        if workflow.steps.is_empty() {
            return finish(
                RunStatus::Failed,
                step_results,
                Some(format!("workflow '{}' has no steps to execute", workflow.name)),
            );
        }

        let mut ordered_steps: Vec<&Step> = workflow.steps.iter().collect();
        ordered_steps.sort_by_key(|step| step.position);

        if let Some(resume_step_id) = &options.resume_after {
            let Some(resume_position) = ordered_steps
                .iter()
                .find(|step| &step.id == resume_step_id)
                .map(|step| step.position)
            else {
                return finish(
                    RunStatus::Failed,
                    step_results,
                    Some(format!("cannot resume: step '{resume_step_id}' is not in the workflow")),
                );
            };
            ordered_steps.retain(|step| step.position > resume_position);
            info!(run_id, resume_after = %resume_step_id, remaining = ordered_steps.len(), "resuming suspended run");
        }

        for step in ordered_steps {
            if options
                .cancellation
                .as_ref()
                .is_some_and(CancellationToken::is_cancelled)
            {
                warn!(run_id, step_id = %step.id, "run cancelled before step");
                return finish(RunStatus::Failed, step_results, Some("Execution cancelled".to_string()));
            }

            if let Some(observer) = &options.observer {
                if let Err(error) = observer.on_step_start(step, &context).await {
                    return finish(
                        RunStatus::Failed,
                        step_results,
                        Some(format!("observer rejected step '{}': {error:#}", step.name)),
                    );
                }
            }

            let step_started_at = Utc::now();
            let step_clock = Instant::now();
            info!(run_id, step_id = %step.id, step_type = %step.kind(), "executing step");

            let outcome = match self.handlers.get(&step.kind()) {
                Some(handler) => match handler.execute(step, &context).await {
                    Ok(outcome) => outcome,
                    Err(error) => {
                        HandlerOutcome::failed(format!("step '{}' hit an unexpected error: {error:#}", step.id))
                    }
                },
                None => HandlerOutcome::failed(format!("No handler registered for step type: {}", step.kind())),
            };

            let result = StepResult {
                step_id: step.id.clone(),
                status: outcome.status,
                data: outcome.data,
                error: outcome.error,
                started_at: step_started_at,
                completed_at: Utc::now(),
                duration_ms: step_clock.elapsed().as_millis() as u64,
            };

            context.record_step_result(result.clone());
            step_results.push(result.clone());

            if let Some(observer) = &options.observer {
                if let Err(error) = observer.on_step_complete(&result, &context).await {
                    return finish(
                        RunStatus::Failed,
                        step_results,
                        Some(format!("observer failed after step '{}': {error:#}", step.name)),
                    );
                }
            }

            match result.status {
                StepStatus::Failed => {
                    let cause = result.error.as_deref().unwrap_or("unknown error");
                    let run_error = format!("Step '{}' failed: {cause}", step.name);
                    warn!(run_id, step_id = %step.id, error = %run_error, "run failed");
                    return finish(RunStatus::Failed, step_results, Some(run_error));
                }
                StepStatus::Waiting => {
                    info!(run_id, step_id = %step.id, "run suspended");
                    return finish(RunStatus::Waiting, step_results, None);
                }
                _ => {}
            }
        }

        info!(run_id, steps_completed = step_results.len(), "run completed");
        finish(RunStatus::Completed, step_results, None)
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::bail;
    use courier_types::{ConditionalConfig, DelayConfig, StepAction};
    use serde_json::json;
    use std::sync::Mutex;

    /// Test handler that completes every conditional step with its own name.
    struct EchoHandler;

    #[async_trait]
    impl StepHandler for EchoHandler {
        fn kind(&self) -> StepKind {
            StepKind::Conditional
        }

        async fn execute(&self, step: &Step, _context: &ExecutionContext) -> Result<HandlerOutcome> {
            Ok(HandlerOutcome::completed(json!({"echo": step.name})))
        }
    }

    /// Test handler that fails every delay step.
    struct FailHandler;

    #[async_trait]
    impl StepHandler for FailHandler {
        fn kind(&self) -> StepKind {
            StepKind::Delay
        }

        async fn execute(&self, _step: &Step, _context: &ExecutionContext) -> Result<HandlerOutcome> {
            Ok(HandlerOutcome::failed("provider unavailable"))
        }
    }

    /// Test handler that suspends every delay step.
    struct SuspendHandler;

    #[async_trait]
    impl StepHandler for SuspendHandler {
        fn kind(&self) -> StepKind {
            StepKind::Delay
        }

        async fn execute(&self, _step: &Step, _context: &ExecutionContext) -> Result<HandlerOutcome> {
            Ok(HandlerOutcome::waiting(json!({"duration_ms": 1000})))
        }
    }

    /// Test handler that returns an unexpected `Err`.
    struct PanickyHandler;

    #[async_trait]
    impl StepHandler for PanickyHandler {
        fn kind(&self) -> StepKind {
            StepKind::Delay
        }

        async fn execute(&self, _step: &Step, _context: &ExecutionContext) -> Result<HandlerOutcome> {
            bail!("store connection dropped")
        }
    }

    fn conditional_step(id: &str, position: i64) -> Step {
        Step {
            id: id.into(),
            name: format!("Step {id}"),
            description: None,
            position,
            action: StepAction::Conditional(ConditionalConfig {
                condition: "true".into(),
            }),
        }
    }

    fn delay_step(id: &str, position: i64) -> Step {
        Step {
            id: id.into(),
            name: format!("Step {id}"),
            description: None,
            position,
            action: StepAction::Delay(DelayConfig { duration: "1s".into() }),
        }
    }

    fn workflow(steps: Vec<Step>) -> WorkflowInput {
        WorkflowInput {
            id: "wf".into(),
            name: "Demo workflow".into(),
            owner_id: "owner".into(),
            steps,
            trigger_step_id: None,
        }
    }

    fn user() -> RunUser {
        RunUser {
            id: "u1".into(),
            email: "u@example.com".into(),
            name: None,
        }
    }

    #[tokio::test]
    async fn empty_workflow_fails_immediately() {
        let executor = Executor::new();
        let result = executor
            .execute(&workflow(vec![]), &user(), "run-1", ExecutionOptions::default())
            .await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.as_deref().expect("error").contains("has no steps"));
        assert!(result.steps.is_empty());
    }

    #[tokio::test]
    async fn steps_run_in_position_order_regardless_of_declaration_order() {
        let executor = Executor::new().with_handler(Arc::new(EchoHandler));
        let wf = workflow(vec![
            conditional_step("third", 30),
            conditional_step("first", 10),
            conditional_step("second", 20),
        ]);

        let result = executor.execute(&wf, &user(), "run-1", ExecutionOptions::default()).await;

        assert_eq!(result.status, RunStatus::Completed);
        let order: Vec<&str> = result.steps.iter().map(|step| step.step_id.as_str()).collect();
        assert_eq!(order, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn missing_handler_fails_the_step_and_the_run() {
        let executor = Executor::new();
        let wf = workflow(vec![conditional_step("only", 1)]);

        let result = executor.execute(&wf, &user(), "run-1", ExecutionOptions::default()).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps.len(), 1);
        assert!(
            result.steps[0]
                .error
                .as_deref()
                .expect("step error")
                .contains("No handler registered for step type: conditional")
        );
    }

    #[tokio::test]
    async fn first_failure_stops_the_run_and_names_the_step() {
        let executor = Executor::new()
            .with_handler(Arc::new(EchoHandler))
            .with_handler(Arc::new(FailHandler));
        let wf = workflow(vec![
            conditional_step("ok", 1),
            delay_step("broken", 2),
            conditional_step("never", 3),
        ]);

        let result = executor.execute(&wf, &user(), "run-1", ExecutionOptions::default()).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.steps.len(), 2);
        assert_eq!(
            result.error.as_deref(),
            Some("Step 'Step broken' failed: provider unavailable")
        );
    }

    #[tokio::test]
    async fn handler_error_is_contained_as_a_step_failure() {
        let executor = Executor::new().with_handler(Arc::new(PanickyHandler));
        let wf = workflow(vec![delay_step("flaky", 1)]);

        let result = executor.execute(&wf, &user(), "run-1", ExecutionOptions::default()).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(
            result.steps[0]
                .error
                .as_deref()
                .expect("step error")
                .contains("store connection dropped")
        );
    }

    #[tokio::test]
    async fn waiting_step_suspends_the_run() {
        let executor = Executor::new()
            .with_handler(Arc::new(EchoHandler))
            .with_handler(Arc::new(SuspendHandler));
        let wf = workflow(vec![
            conditional_step("ok", 1),
            delay_step("wait", 2),
            conditional_step("later", 3),
        ]);

        let result = executor.execute(&wf, &user(), "run-1", ExecutionOptions::default()).await;

        assert_eq!(result.status, RunStatus::Waiting);
        assert_eq!(result.steps.len(), 2);
        assert!(result.error.is_none());
        assert_eq!(result.steps[1].status, StepStatus::Waiting);
    }

    #[tokio::test]
    async fn resume_after_skips_already_executed_steps() {
        let executor = Executor::new()
            .with_handler(Arc::new(EchoHandler))
            .with_handler(Arc::new(SuspendHandler));
        let wf = workflow(vec![
            conditional_step("before", 1),
            delay_step("wait", 2),
            conditional_step("after", 3),
        ]);

        let options = ExecutionOptions {
            resume_after: Some("wait".into()),
            ..Default::default()
        };
        let result = executor.execute(&wf, &user(), "run-1", options).await;

        assert_eq!(result.status, RunStatus::Completed);
        let order: Vec<&str> = result.steps.iter().map(|step| step.step_id.as_str()).collect();
        assert_eq!(order, vec!["after"]);
    }

    #[tokio::test]
    async fn resume_after_unknown_step_fails() {
        let executor = Executor::new().with_handler(Arc::new(EchoHandler));
        let wf = workflow(vec![conditional_step("only", 1)]);

        let options = ExecutionOptions {
            resume_after: Some("ghost".into()),
            ..Default::default()
        };
        let result = executor.execute(&wf, &user(), "run-1", options).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.as_deref().expect("error").contains("'ghost'"));
    }

    /// Observer that cancels the shared token once the named step completes.
    struct CancellingObserver {
        after_step: String,
        token: CancellationToken,
    }

    #[async_trait]
    impl RunObserver for CancellingObserver {
        async fn on_step_complete(&self, result: &StepResult, _context: &ExecutionContext) -> Result<()> {
            if result.step_id == self.after_step {
                self.token.cancel();
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn cancellation_stops_the_run_at_the_next_step_boundary() {
        let token = CancellationToken::new();
        let executor = Executor::new().with_handler(Arc::new(EchoHandler));
        let wf = workflow(vec![conditional_step("one", 1), conditional_step("two", 2)]);

        let options = ExecutionOptions {
            cancellation: Some(token.clone()),
            observer: Some(Arc::new(CancellingObserver {
                after_step: "one".into(),
                token,
            })),
            ..Default::default()
        };
        let result = executor.execute(&wf, &user(), "run-1", options).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert_eq!(result.error.as_deref(), Some("Execution cancelled"));
        assert_eq!(result.steps.len(), 1);
    }

    /// Observer that records lifecycle calls and optionally rejects a step.
    #[derive(Default)]
    struct RecordingObserver {
        events: Mutex<Vec<String>>,
        reject_step: Option<String>,
    }

    #[async_trait]
    impl RunObserver for RecordingObserver {
        async fn on_step_start(&self, step: &Step, _context: &ExecutionContext) -> Result<()> {
            if self.reject_step.as_deref() == Some(step.id.as_str()) {
                bail!("persistence unavailable")
            }
            self.events.lock().expect("lock").push(format!("start:{}", step.id));
            Ok(())
        }

        async fn on_step_complete(&self, result: &StepResult, _context: &ExecutionContext) -> Result<()> {
            self.events.lock().expect("lock").push(format!("complete:{}", result.step_id));
            Ok(())
        }
    }

    #[tokio::test]
    async fn observer_sees_start_and_complete_in_order() {
        let observer = Arc::new(RecordingObserver::default());
        let executor = Executor::new().with_handler(Arc::new(EchoHandler));
        let wf = workflow(vec![conditional_step("one", 1), conditional_step("two", 2)]);

        let options = ExecutionOptions {
            observer: Some(observer.clone()),
            ..Default::default()
        };
        let result = executor.execute(&wf, &user(), "run-1", options).await;

        assert_eq!(result.status, RunStatus::Completed);
        let events = observer.events.lock().expect("lock").clone();
        assert_eq!(events, vec!["start:one", "complete:one", "start:two", "complete:two"]);
    }

    #[tokio::test]
    async fn observer_error_fails_the_run() {
        let observer = Arc::new(RecordingObserver {
            reject_step: Some("two".into()),
            ..Default::default()
        });
        let executor = Executor::new().with_handler(Arc::new(EchoHandler));
        let wf = workflow(vec![conditional_step("one", 1), conditional_step("two", 2)]);

        let options = ExecutionOptions {
            observer: Some(observer),
            ..Default::default()
        };
        let result = executor.execute(&wf, &user(), "run-1", options).await;

        assert_eq!(result.status, RunStatus::Failed);
        assert!(result.error.as_deref().expect("error").contains("persistence unavailable"));
        assert_eq!(result.steps.len(), 1);
    }
}
