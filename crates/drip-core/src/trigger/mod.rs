//! Persisted trigger rows and their reconciliation from a workflow graph.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::execution::WorkflowId;
use crate::graph::{Graph, Node};

pub type TriggerId = i64;

/// Fixed offset between runs of a scheduled trigger.
pub fn schedule_interval() -> Duration {
    Duration::hours(24)
}

/// How a trigger starts its workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TriggerKind {
    Event,
    Schedule,
    Webhook,
}

impl TriggerKind {
    /// Convert to string for database storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Event => "EVENT",
            Self::Schedule => "SCHEDULE",
            Self::Webhook => "WEBHOOK",
        }
    }

    /// Parse from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "EVENT" => Some(Self::Event),
            "SCHEDULE" => Some(Self::Schedule),
            "WEBHOOK" => Some(Self::Webhook),
            _ => None,
        }
    }

    /// The trigger type a graph node declares: its `trigger_type` property,
    /// else SCHEDULE when it carries a `cron` property, else EVENT.
    pub fn type_name_of(node: &Node) -> &str {
        match node.property_str("trigger_type") {
            Some(name) => name,
            None if node.properties.contains_key("cron") => Self::Schedule.as_str(),
            None => Self::Event.as_str(),
        }
    }
}

impl std::fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A trigger row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerRecord {
    pub id: TriggerId,
    pub workflow_id: WorkflowId,
    /// Graph node the execution starts at.
    pub node_id: String,
    pub kind: TriggerKind,
    /// The trigger node's properties.
    pub config: Value,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// A due scheduled trigger together with its workflow's legacy audience.
#[derive(Debug, Clone, PartialEq)]
pub struct ScheduledTrigger {
    pub trigger: TriggerRecord,
    pub workflow_audience_id: Option<i64>,
}

impl ScheduledTrigger {
    /// Context seeded into executions started by this trigger.
    pub fn seed_context(&self) -> Value {
        let mut context = Map::new();

        if let Some(audience_id) = self.workflow_audience_id.filter(|id| *id != 0) {
            context.insert("audience_id".into(), Value::from(audience_id));
        }

        let audience_ids: Vec<i64> = self
            .trigger
            .config
            .get("audience_ids")
            .and_then(|v| serde_json::from_value(v.clone()).ok())
            .unwrap_or_default();
        if !audience_ids.is_empty() {
            context.insert("audience_ids".into(), Value::from(audience_ids));
        }

        Value::Object(context)
    }
}

/// Values for inserting a trigger row.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTrigger {
    pub workflow_id: WorkflowId,
    pub node_id: String,
    pub kind: TriggerKind,
    pub config: Value,
    pub next_run_at: Option<DateTime<Utc>>,
}

/// Trigger rows for every trigger node of a graph.
///
/// Nodes declaring an unrecognized trigger type are skipped; graph
/// validation rejects them before a save gets here.
pub fn triggers_for_graph(
    workflow_id: WorkflowId,
    graph: &Graph,
    now: DateTime<Utc>,
) -> Vec<NewTrigger> {
    graph
        .trigger_nodes()
        .filter_map(|node| {
            let kind = TriggerKind::parse(TriggerKind::type_name_of(node))?;
            Some(NewTrigger {
                workflow_id,
                node_id: node.id.clone(),
                kind,
                config: node.properties_value(),
                next_run_at: (kind == TriggerKind::Schedule).then_some(now),
            })
        })
        .collect()
}
