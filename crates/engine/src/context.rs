//! Per-run execution context.
//!
//! One [`ExecutionContext`] is created per run and shared by reference with
//! every step handler. Handlers read it; only the executor appends completed
//! step results, which keeps the ownership boundary in the type system
//! rather than in convention.

use indexmap::IndexMap;
use serde_json::Value;

use courier_types::{RunUser, StepResult, WorkflowInput};

/// Trigger metadata of the workflow a run belongs to.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowMeta {
    pub id: String,
    pub name: String,
    pub owner_id: String,
    pub trigger_step_id: Option<String>,
}

/// Shared read/accumulate structure carrying user, trigger, and prior-step
/// data for one run.
#[derive(Debug, Clone)]
pub struct ExecutionContext {
    /// Caller-supplied run identifier.
    pub run_id: String,
    /// User the run executes on behalf of.
    pub user: RunUser,
    /// Trigger metadata only; the full step list stays with the executor.
    pub workflow: WorkflowMeta,
    /// Payload delivered by whatever triggered the run.
    pub trigger_data: Option<Value>,
    /// Completed step results in execution order, appended by the executor.
    step_results: IndexMap<String, StepResult>,
}

impl ExecutionContext {
    /// Builds the context for a fresh run.
    pub fn new(workflow: &WorkflowInput, user: &RunUser, run_id: &str, trigger_data: Option<Value>) -> Self {
        Self {
            run_id: run_id.to_string(),
            user: user.clone(),
            workflow: WorkflowMeta {
                id: workflow.id.clone(),
                name: workflow.name.clone(),
                owner_id: workflow.owner_id.clone(),
                trigger_step_id: workflow.trigger_step_id.clone(),
            },
            trigger_data,
            step_results: IndexMap::new(),
        }
    }

    /// Result of a previously executed step, if any.
    pub fn step_result(&self, step_id: &str) -> Option<&StepResult> {
        self.step_results.get(step_id)
    }

    /// Completed results in execution order.
    pub fn step_results(&self) -> impl Iterator<Item = &StepResult> {
        self.step_results.values()
    }

    /// Appends a finalized step result. Executor-only; each step produces
    /// exactly one result per run.
    pub(crate) fn record_step_result(&mut self, result: StepResult) {
        self.step_results.insert(result.step_id.clone(), result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use courier_types::{StepStatus, WorkflowInput};

    fn workflow() -> WorkflowInput {
        WorkflowInput {
            id: "wf-1".into(),
            name: "Demo".into(),
            owner_id: "owner-1".into(),
            steps: vec![],
            trigger_step_id: Some("trigger".into()),
        }
    }

    #[test]
    fn records_results_in_execution_order() {
        let user = RunUser {
            id: "u1".into(),
            email: "u@example.com".into(),
            name: None,
        };
        let mut context = ExecutionContext::new(&workflow(), &user, "run-1", None);

        for step_id in ["first", "second"] {
            let now = Utc::now();
            context.record_step_result(StepResult {
                step_id: step_id.into(),
                status: StepStatus::Completed,
                data: None,
                error: None,
                started_at: now,
                completed_at: now,
                duration_ms: 0,
            });
        }

        let ordered: Vec<&str> = context.step_results().map(|result| result.step_id.as_str()).collect();
        assert_eq!(ordered, vec!["first", "second"]);
        assert!(context.step_result("second").is_some());
    }
}
