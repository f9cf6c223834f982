//! Execution records: one durable row per run of a workflow.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type ExecutionId = i64;
pub type WorkflowId = i64;

/// Reason recorded when a step fails.
pub const REASON_NODE_FAILED: &str = "Node execution failed";
pub const REASON_NO_START_NODE: &str = "No start node found";
pub const REASON_NODE_NOT_FOUND: &str = "Node not found";
pub const REASON_INVALID_GRAPH: &str = "Invalid graph JSON";
pub const REASON_WORKFLOW_NOT_FOUND: &str = "Workflow not found";
/// Reason recorded when the next node's delay cannot be scheduled.
pub const REASON_INVALID_DELAY: &str = "Invalid delay";

/// Lifecycle state of an execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExecutionStatus {
    /// Waiting for the poller, between steps.
    Pending,
    /// Declared for compatibility; executions stay pending between steps.
    Running,
    Completed,
    Failed,
}

impl ExecutionStatus {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Completed => "COMPLETED",
            Self::Failed => "FAILED",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Self {
        match s {
            "RUNNING" => Self::Running,
            "COMPLETED" => Self::Completed,
            "FAILED" => Self::Failed,
            _ => Self::Pending,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Outcome of a single node evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Success,
    Failed,
    /// Accepted in stored step logs; the engine itself never skips a node.
    Skipped,
}

/// One entry in an execution's step log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepResult {
    pub node_id: String,
    pub status: StepStatus,
    pub output: String,
}

impl StepResult {
    pub fn success(node_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: StepStatus::Success,
            output: output.into(),
        }
    }

    pub fn failed(node_id: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            status: StepStatus::Failed,
            output: output.into(),
        }
    }

    pub fn is_failed(&self) -> bool {
        self.status == StepStatus::Failed
    }
}

/// A persisted run of a workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub id: ExecutionId,
    pub workflow_id: WorkflowId,
    /// `None` until the run has resolved its start node.
    pub current_node_id: Option<String>,
    pub status: ExecutionStatus,
    pub step_results: Vec<StepResult>,
    /// Set once any step fails and never cleared.
    pub has_failed: bool,
    /// Data threaded through the run, seeded by the trigger.
    pub context: Value,
    pub next_run_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    /// Terminal reason, if any.
    pub result: Option<String>,
    /// Bumped by every committed transition.
    pub revision: i64,
}

impl ExecutionRecord {
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == ExecutionStatus::Pending && self.next_run_at <= now
    }

    /// Apply a transition computed by the step executor.
    ///
    /// Terminal executions are immutable; applying to one is a no-op.
    pub fn apply(&mut self, transition: &Transition, now: DateTime<Utc>) {
        if self.status.is_terminal() {
            return;
        }

        if let Some(step) = transition.step() {
            if step.is_failed() {
                self.has_failed = true;
            }
            self.step_results.push(step.clone());
        }

        match transition {
            Transition::Failed { reason, .. } => {
                self.status = ExecutionStatus::Failed;
                self.result = Some(reason.clone());
                self.finished_at = Some(now);
            }
            Transition::Completed { .. } => {
                self.status = ExecutionStatus::Completed;
                self.finished_at = Some(now);
            }
            Transition::Scheduled {
                next_node_id,
                next_run_at,
                ..
            } => {
                self.current_node_id = Some(next_node_id.clone());
                self.next_run_at = *next_run_at;
            }
        }

        self.revision += 1;
    }
}

/// Values for inserting a new execution.
#[derive(Debug, Clone, PartialEq)]
pub struct NewExecution {
    pub workflow_id: WorkflowId,
    pub current_node_id: Option<String>,
    pub context: Value,
    pub next_run_at: DateTime<Utc>,
}

impl NewExecution {
    /// A run that starts at `node_id` on the next poll.
    pub fn at_node(
        workflow_id: WorkflowId,
        node_id: impl Into<String>,
        context: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            workflow_id,
            current_node_id: Some(node_id.into()),
            context,
            next_run_at: now,
        }
    }
}

/// The effect of advancing an execution by one node.
#[derive(Debug, Clone, PartialEq)]
pub enum Transition {
    /// Finalize as FAILED. `step` is absent when the run failed before a node ran.
    Failed {
        step: Option<StepResult>,
        reason: String,
    },
    /// Finalize as COMPLETED.
    Completed { step: StepResult },
    /// Stay PENDING and revisit at `next_run_at`.
    Scheduled {
        step: StepResult,
        next_node_id: String,
        next_run_at: DateTime<Utc>,
    },
}

impl Transition {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            step: None,
            reason: reason.into(),
        }
    }

    pub fn step(&self) -> Option<&StepResult> {
        match self {
            Self::Failed { step, .. } => step.as_ref(),
            Self::Completed { step } | Self::Scheduled { step, .. } => Some(step),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            Self::Failed { .. } => ExecutionStatus::Failed,
            Self::Completed { .. } => ExecutionStatus::Completed,
            Self::Scheduled { .. } => ExecutionStatus::Pending,
        }
    }
}
