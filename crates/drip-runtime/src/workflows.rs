use chrono::Utc;

use drip_core::component::ComponentRegistry;
use drip_core::execution::WorkflowId;
use drip_core::graph::Graph;
use drip_core::store::WorkflowStore;
use drip_core::trigger::triggers_for_graph;
use drip_core::Result;

/// Validate a graph, store it and replace the workflow's trigger rows.
///
/// Returns the number of trigger rows written. Nothing is stored when
/// validation fails.
pub async fn save_workflow_graph<S>(
    store: &S,
    registry: &ComponentRegistry,
    workflow_id: WorkflowId,
    graph: &Graph,
) -> Result<usize>
where
    S: WorkflowStore + ?Sized,
{
    graph.validate(registry)?;

    let triggers = triggers_for_graph(workflow_id, graph, Utc::now());
    let count = triggers.len();
    store
        .save_workflow_graph(workflow_id, &graph.to_json()?, triggers)
        .await?;

    tracing::info!(workflow_id, triggers = count, "Workflow graph saved");
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use drip_core::testing::InMemoryStore;
    use drip_core::trigger::TriggerKind;
    use drip_core::DripError;

    use crate::components::builtin_registry;

    const GRAPH: &str = r#"{
        "nodes": [
            {"id": "t1", "type": "TRIGGER", "properties": {"trigger_event": "signup"}},
            {"id": "t2", "type": "TRIGGER", "properties": {"cron": "0 9 * * *"}},
            {"id": "a", "type": "ACTION", "properties": {"action": "Delay", "delay_minutes": 1}}
        ],
        "edges": [
            {"id": "e1", "source": "t1", "target": "a", "handle": "default"},
            {"id": "e2", "source": "t2", "target": "a", "handle": "default"}
        ]
    }"#;

    #[tokio::test]
    async fn test_save_reconciles_triggers() {
        let store = InMemoryStore::new();
        store.add_workflow(3, "{}", "ACTIVE");
        store.add_trigger(3, "old", TriggerKind::Event, serde_json::json!({}), None);
        let graph = Graph::from_json(GRAPH).unwrap();

        let count = save_workflow_graph(&store, &builtin_registry(), 3, &graph)
            .await
            .unwrap();
        assert_eq!(count, 2);

        let mut triggers: Vec<_> = store
            .triggers()
            .into_iter()
            .map(|t| (t.node_id, t.kind, t.next_run_at.is_some()))
            .collect();
        triggers.sort_by(|a, b| a.0.cmp(&b.0));
        assert_eq!(
            triggers,
            vec![
                ("t1".to_string(), TriggerKind::Event, false),
                ("t2".to_string(), TriggerKind::Schedule, true),
            ]
        );

        let stored = store.workflow_graph(3).await.unwrap().unwrap();
        assert_eq!(Graph::from_json(&stored).unwrap(), graph);
    }

    #[tokio::test]
    async fn test_invalid_graph_is_not_stored() {
        let store = InMemoryStore::new();
        store.add_workflow(3, "{}", "ACTIVE");
        let graph = Graph::from_json(
            r#"{"nodes": [{"id": "a", "type": "ACTION", "properties": {"action": "Delay"}}]}"#,
        )
        .unwrap();

        let err = save_workflow_graph(&store, &builtin_registry(), 3, &graph)
            .await
            .unwrap_err();
        assert!(matches!(err, DripError::Validation(_)));
        assert_eq!(store.workflow_graph(3).await.unwrap().as_deref(), Some("{}"));
    }

    #[tokio::test]
    async fn test_missing_workflow() {
        let store = InMemoryStore::new();
        let graph = Graph::from_json(GRAPH).unwrap();
        let err = save_workflow_graph(&store, &builtin_registry(), 99, &graph)
            .await
            .unwrap_err();
        assert!(matches!(err, DripError::NotFound(_)));
    }
}
