use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use uuid::Uuid;

use drip_core::config::SchedulerConfig;
use drip_core::store::{ExecutionStore, WorkflowStore};
use drip_core::Result;

use super::Poller;
use crate::engine::StepExecutor;

/// Claims due executions and advances each by one node.
pub struct ExecutionPoller<S: ?Sized> {
    worker_id: Uuid,
    store: Arc<S>,
    executor: Arc<StepExecutor>,
    config: SchedulerConfig,
}

impl<S> ExecutionPoller<S>
where
    S: ExecutionStore + WorkflowStore + ?Sized,
{
    pub fn new(store: Arc<S>, executor: Arc<StepExecutor>, config: SchedulerConfig) -> Self {
        Self {
            worker_id: Uuid::new_v4(),
            store,
            executor,
            config,
        }
    }

    /// Identity recorded on claimed rows.
    pub fn worker_id(&self) -> Uuid {
        self.worker_id
    }
}

#[async_trait]
impl<S> Poller for ExecutionPoller<S>
where
    S: ExecutionStore + WorkflowStore + ?Sized,
{
    fn name(&self) -> &'static str {
        "executions"
    }

    async fn tick(&self) -> Result<usize> {
        let batch = self
            .store
            .claim_due_executions(
                Utc::now(),
                self.config.batch_size,
                self.worker_id,
                self.config.claim_lease(),
            )
            .await?;

        let claimed = batch.len();
        if claimed > 0 {
            tracing::debug!(worker_id = %self.worker_id, claimed, "Advancing due executions");
        }

        stream::iter(batch)
            .for_each_concurrent(self.config.max_concurrent.max(1), |execution| async move {
                let execution_id = execution.id;
                // The claim lapses on its own, so the row is retried after the lease.
                match self.executor.run(self.store.as_ref(), execution).await {
                    Ok(_) => {}
                    Err(e) if e.is_infrastructure() => tracing::warn!(
                        execution_id,
                        error = %e,
                        "Store unavailable, execution retried once its claim lapses"
                    ),
                    Err(e) => {
                        tracing::error!(execution_id, error = %e, "Failed to advance execution")
                    }
                }
            })
            .await;

        Ok(claimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use drip_core::execution::{ExecutionStatus, NewExecution};
    use drip_core::testing::{test_services, InMemoryStore, RecordingMailSender};
    use serde_json::json;

    use crate::components::builtin_registry;

    const GRAPH: &str = r#"{
        "nodes": [
            {"id": "t", "type": "TRIGGER", "properties": {"trigger_event": "signup"}},
            {"id": "d", "type": "ACTION", "properties": {"action": "Delay", "delay_minutes": 5}}
        ],
        "edges": [{"id": "e1", "source": "t", "target": "d", "handle": "default"}]
    }"#;

    fn poller(store: &Arc<InMemoryStore>, config: SchedulerConfig) -> ExecutionPoller<InMemoryStore> {
        let services = test_services(store.clone(), Arc::new(RecordingMailSender::new()));
        let executor = StepExecutor::new(
            Arc::new(builtin_registry()),
            services,
            Duration::from_secs(5),
        );
        ExecutionPoller::new(store.clone(), Arc::new(executor), config)
    }

    #[tokio::test]
    async fn test_ticks_run_executions_to_completion() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(1, GRAPH, "ACTIVE");
        let mut ids = Vec::new();
        for _ in 0..5 {
            ids.push(
                store
                    .insert_execution(NewExecution::at_node(1, "t", json!({}), Utc::now()))
                    .await
                    .unwrap(),
            );
        }
        let poller = poller(&store, SchedulerConfig::default());

        assert_eq!(poller.tick().await.unwrap(), 5);
        assert_eq!(poller.tick().await.unwrap(), 5);
        assert_eq!(poller.tick().await.unwrap(), 0);

        for id in ids {
            store.assert_execution_status(id, ExecutionStatus::Completed);
            let record = store.execution(id).unwrap();
            assert_eq!(record.step_results[1].output, "Simulated delay of 5 minutes");
        }
    }

    #[tokio::test]
    async fn test_batch_size_limits_claims() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(1, GRAPH, "ACTIVE");
        for _ in 0..3 {
            store
                .insert_execution(NewExecution::at_node(1, "t", json!({}), Utc::now()))
                .await
                .unwrap();
        }
        let poller = poller(
            &store,
            SchedulerConfig {
                batch_size: 2,
                max_concurrent: 1,
                ..Default::default()
            },
        );

        assert_eq!(poller.tick().await.unwrap(), 2);
        let pending = store
            .executions()
            .into_iter()
            .filter(|r| r.step_results.is_empty())
            .count();
        assert_eq!(pending, 1);
    }

    #[tokio::test]
    async fn test_future_executions_wait() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(1, GRAPH, "ACTIVE");
        store
            .insert_execution(NewExecution::at_node(
                1,
                "t",
                json!({}),
                Utc::now() + chrono::Duration::hours(1),
            ))
            .await
            .unwrap();

        let poller = poller(&store, SchedulerConfig::default());
        assert_eq!(poller.tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_store_outage_fails_tick() {
        let store = Arc::new(InMemoryStore::new());
        store.fail_next(1);
        let poller = poller(&store, SchedulerConfig::default());

        assert!(poller.tick().await.is_err());
        assert_eq!(poller.tick().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_pollers_never_double_advance() {
        let store = Arc::new(InMemoryStore::new());
        store.add_workflow(1, GRAPH, "ACTIVE");
        let id = store
            .insert_execution(NewExecution::at_node(1, "t", json!({}), Utc::now()))
            .await
            .unwrap();

        let a = poller(&store, SchedulerConfig::default());
        let b = poller(&store, SchedulerConfig::default());
        let (ra, rb) = tokio::join!(a.tick(), b.tick());
        assert_eq!(ra.unwrap() + rb.unwrap(), 1);

        let record = store.execution(id).unwrap();
        assert_eq!(record.step_results.len(), 1);
        assert_eq!(record.revision, 1);
    }
}
