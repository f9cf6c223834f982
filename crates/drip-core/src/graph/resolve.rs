use chrono::Duration;
use serde_json::Value;

use super::{Edge, Graph, Node, NodeType, DEFAULT_HANDLE};
use crate::error::{DripError, Result};

impl Graph {
    /// The node a fresh execution starts from: the first trigger, or failing
    /// that the first node in document order.
    pub fn find_start_node(&self) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.node_type == NodeType::Trigger)
            .or_else(|| self.nodes.first())
            .ok_or(DripError::NoStartNode)
    }

    pub fn find_node(&self, id: &str) -> Result<&Node> {
        self.nodes
            .iter()
            .find(|n| n.id == id)
            .ok_or_else(|| DripError::NodeNotFound(id.to_string()))
    }

    /// The edge to follow when leaving `from` through `handle`.
    ///
    /// Only the default handle falls back to an arbitrary outgoing edge, so
    /// graphs drawn without explicit handles still run linearly. A condition
    /// branch without a matching edge ends the run. When several edges share
    /// a source and handle the first in document order wins.
    pub fn find_next_edge(&self, from: &str, handle: &str) -> Option<&Edge> {
        let exact = self
            .edges
            .iter()
            .find(|e| e.source == from && e.handle == handle);

        if exact.is_some() || handle != DEFAULT_HANDLE {
            return exact;
        }

        self.edges.iter().find(|e| e.source == from)
    }
}

impl Node {
    /// Wait before this node runs, from its `delay_days` and `delay_hours`
    /// properties. Missing, unparseable or non-positive values count as zero.
    ///
    /// `None` when the total does not fit in a [`Duration`].
    pub fn delay(&self) -> Option<Duration> {
        let days = numeric_property(self.properties.get("delay_days"));
        let hours = numeric_property(self.properties.get("delay_hours"));

        let millis = days * 86_400_000.0 + hours * 3_600_000.0;
        if !millis.is_finite() || millis >= i64::MAX as f64 {
            return None;
        }
        Duration::try_milliseconds(millis as i64)
    }
}

fn numeric_property(value: Option<&Value>) -> f64 {
    let parsed = match value {
        Some(Value::Number(n)) => n.as_f64(),
        Some(Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    };

    match parsed {
        Some(v) if v.is_finite() && v > 0.0 => v,
        _ => 0.0,
    }
}
