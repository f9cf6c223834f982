use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::timeout;

use drip_core::component::{ComponentRegistry, StepContext, StepServices};
use drip_core::error::{DripError, Result};
use drip_core::execution::{
    ExecutionRecord, StepResult, Transition, REASON_INVALID_DELAY, REASON_INVALID_GRAPH,
    REASON_NODE_FAILED,
    REASON_NODE_NOT_FOUND, REASON_NO_START_NODE, REASON_WORKFLOW_NOT_FOUND,
};
use drip_core::graph::{
    Graph, Node, NodeType, DEFAULT_HANDLE, DEFAULT_LOGIC, FALSE_HANDLE, TRUE_HANDLE,
};
use drip_core::store::{ExecutionStore, WorkflowStore};

/// Advances executions one node at a time.
pub struct StepExecutor {
    registry: Arc<ComponentRegistry>,
    services: StepServices,
    step_timeout: Duration,
}

impl StepExecutor {
    /// Create a new step executor.
    pub fn new(
        registry: Arc<ComponentRegistry>,
        services: StepServices,
        step_timeout: Duration,
    ) -> Self {
        Self {
            registry,
            services,
            step_timeout,
        }
    }

    pub fn registry(&self) -> &ComponentRegistry {
        &self.registry
    }

    /// Load the workflow graph, advance a claimed execution by one node and
    /// commit the result.
    ///
    /// Returns `None` when the execution was already terminal or another
    /// worker committed first. Store errors propagate and leave the row as
    /// it was.
    pub async fn run<S>(&self, store: &S, mut execution: ExecutionRecord) -> Result<Option<Transition>>
    where
        S: ExecutionStore + WorkflowStore + ?Sized,
    {
        if execution.status.is_terminal() {
            return Ok(None);
        }

        let now = Utc::now();
        let transition = match store.workflow_graph(execution.workflow_id).await? {
            None => Transition::failed(REASON_WORKFLOW_NOT_FOUND),
            Some(raw) => match Graph::from_json(&raw) {
                Ok(graph) => self.advance(&execution, &graph, now).await,
                Err(e) => {
                    tracing::warn!(
                        execution_id = execution.id,
                        workflow_id = execution.workflow_id,
                        error = %e,
                        "Workflow graph does not parse"
                    );
                    Transition::failed(REASON_INVALID_GRAPH)
                }
            },
        };

        let expected_revision = execution.revision;
        execution.apply(&transition, now);

        if !store.commit_execution(&execution, expected_revision).await? {
            tracing::debug!(
                execution_id = execution.id,
                "Execution changed concurrently, discarding step"
            );
            return Ok(None);
        }

        match &transition {
            Transition::Scheduled {
                next_node_id,
                next_run_at,
                ..
            } => tracing::debug!(
                execution_id = execution.id,
                next_node = %next_node_id,
                next_run_at = %next_run_at,
                "Execution advanced"
            ),
            Transition::Completed { .. } => {
                tracing::info!(execution_id = execution.id, "Execution completed")
            }
            Transition::Failed { reason, step } => tracing::warn!(
                execution_id = execution.id,
                reason = %reason,
                output = step.as_ref().map(|s| s.output.as_str()).unwrap_or_default(),
                "Execution failed"
            ),
        }

        Ok(Some(transition))
    }

    /// Evaluate the execution's current node and decide what happens next.
    ///
    /// Pure with respect to storage: the caller applies and persists the
    /// transition.
    pub async fn advance(
        &self,
        execution: &ExecutionRecord,
        graph: &Graph,
        now: DateTime<Utc>,
    ) -> Transition {
        let node = match &execution.current_node_id {
            Some(id) => match graph.find_node(id) {
                Ok(node) => node,
                Err(_) => return Transition::failed(REASON_NODE_NOT_FOUND),
            },
            None => match graph.find_start_node() {
                Ok(node) => node,
                Err(_) => return Transition::failed(REASON_NO_START_NODE),
            },
        };

        let (step, handle) = self.evaluate(execution, node).await;
        if step.is_failed() {
            return Transition::Failed {
                step: Some(step),
                reason: REASON_NODE_FAILED.to_string(),
            };
        }

        let Some(edge) = graph.find_next_edge(&node.id, handle) else {
            return Transition::Completed { step };
        };

        let next_run_at = match graph.find_node(&edge.target) {
            Ok(target) => target.delay().and_then(|delay| now.checked_add_signed(delay)),
            // A dangling target fails on the next advance.
            Err(_) => Some(now),
        };

        let Some(next_run_at) = next_run_at else {
            return Transition::Failed {
                step: Some(step),
                reason: REASON_INVALID_DELAY.to_string(),
            };
        };

        Transition::Scheduled {
            step,
            next_node_id: edge.target.clone(),
            next_run_at,
        }
    }

    async fn evaluate(&self, execution: &ExecutionRecord, node: &Node) -> (StepResult, &'static str) {
        let ctx = StepContext::new(
            execution.id,
            execution.workflow_id,
            node.id.clone(),
            self.services.clone(),
        );

        match node.node_type {
            NodeType::Trigger => (StepResult::success(&node.id, "Triggered"), DEFAULT_HANDLE),
            NodeType::Action => {
                let step = match self.run_action(&ctx, node, execution).await {
                    Ok(output) => StepResult::success(&node.id, output),
                    Err(e) => StepResult::failed(&node.id, e.to_string()),
                };
                (step, DEFAULT_HANDLE)
            }
            NodeType::Condition => match self.run_logic(&ctx, node, execution).await {
                Ok((true, output)) => (StepResult::success(&node.id, output), TRUE_HANDLE),
                Ok((false, output)) => (StepResult::success(&node.id, output), FALSE_HANDLE),
                Err(e) => (StepResult::failed(&node.id, e.to_string()), FALSE_HANDLE),
            },
        }
    }

    async fn run_action(
        &self,
        ctx: &StepContext,
        node: &Node,
        execution: &ExecutionRecord,
    ) -> Result<String> {
        let entry = node
            .property_str("action")
            .and_then(|name| self.registry.action(name))
            .ok_or_else(|| DripError::Handler("Unknown action type".to_string()))?;

        let action = entry.build(&node.properties_value())?;
        self.with_timeout(action.execute(ctx, &execution.context))
            .await
    }

    async fn run_logic(
        &self,
        ctx: &StepContext,
        node: &Node,
        execution: &ExecutionRecord,
    ) -> Result<(bool, String)> {
        let name = node.property_str("logic").unwrap_or(DEFAULT_LOGIC);
        let entry = self
            .registry
            .logic(name)
            .ok_or_else(|| DripError::UnknownComponent {
                kind: "logic",
                name: name.to_string(),
            })?;

        let logic = entry.build(&node.properties_value())?;
        self.with_timeout(logic.evaluate(ctx, &execution.context))
            .await
    }

    async fn with_timeout<T>(&self, step: impl Future<Output = Result<T>>) -> Result<T> {
        timeout(self.step_timeout, step)
            .await
            .map_err(|_| DripError::Timeout(self.step_timeout))?
    }
}
