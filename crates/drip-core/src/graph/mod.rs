//! Workflow graph model.
//!
//! A workflow is persisted as a single JSON document of nodes and edges. The
//! types here deserialize that document exactly and provide the lookups the
//! step executor needs to walk it.

mod resolve;
mod validate;

pub use validate::DEFAULT_LOGIC;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{DripError, Result};

/// Handle followed after triggers and actions.
pub const DEFAULT_HANDLE: &str = "default";
/// Handle followed when a condition evaluates to true.
pub const TRUE_HANDLE: &str = "true";
/// Handle followed when a condition evaluates to false.
pub const FALSE_HANDLE: &str = "false";

/// A workflow definition: nodes connected by handle-tagged edges.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Graph {
    #[serde(default)]
    pub nodes: Vec<Node>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Graph {
    /// Parse a graph from its stored JSON document.
    pub fn from_json(raw: &str) -> Result<Self> {
        serde_json::from_str(raw).map_err(|e| DripError::InvalidGraph(e.to_string()))
    }

    /// Serialize the graph back into its stored form.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// All trigger nodes in document order.
    pub fn trigger_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Trigger)
    }
}

/// Kind of work a node performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Trigger,
    Action,
    Condition,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trigger => "TRIGGER",
            Self::Action => "ACTION",
            Self::Condition => "CONDITION",
        }
    }
}

impl std::fmt::Display for NodeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single step in the graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: NodeType,
    #[serde(default)]
    pub label: String,
    /// Component configuration plus any UI metadata the builder stores.
    #[serde(default)]
    pub properties: Map<String, Value>,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    /// A string-valued property, if present.
    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(Value::as_str)
    }

    /// The node's properties as a JSON object value.
    pub fn properties_value(&self) -> Value {
        Value::Object(self.properties.clone())
    }
}

/// Canvas coordinates. Ignored by the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
}

/// A directed connection leaving `source` through `handle`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub handle: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"{
        "nodes": [
            {"id": "trigger-1", "type": "TRIGGER", "label": "Signup", "properties": {"trigger_event": "signup"}, "position": {"x": 10, "y": 20}},
            {"id": "cond-1", "type": "CONDITION", "label": "Coin", "properties": {"force": "true"}, "position": {"x": 10, "y": 120}},
            {"id": "action-1", "type": "ACTION", "label": "Mail", "properties": {"action": "Send Email", "template_id": 3, "delay_days": 1}, "position": {"x": 0, "y": 240}}
        ],
        "edges": [
            {"id": "e1", "source": "trigger-1", "target": "cond-1", "handle": "default"},
            {"id": "e2", "source": "cond-1", "target": "action-1", "handle": "true"}
        ]
    }"#;

    #[test]
    fn test_parse_stored_document() {
        let graph = Graph::from_json(DOCUMENT).unwrap();
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.nodes[1].node_type, NodeType::Condition);
        assert_eq!(graph.nodes[2].property_str("action"), Some("Send Email"));
        assert_eq!(graph.edges[1].handle, TRUE_HANDLE);
        assert_eq!(graph.nodes[0].position, Position { x: 10.0, y: 20.0 });
    }

    #[test]
    fn test_round_trip_preserves_resolution() {
        let graph = Graph::from_json(DOCUMENT).unwrap();
        let reparsed = Graph::from_json(&graph.to_json().unwrap()).unwrap();

        assert_eq!(graph, reparsed);
        assert_eq!(
            graph.find_start_node().unwrap().id,
            reparsed.find_start_node().unwrap().id
        );
        assert_eq!(
            graph.find_next_edge("cond-1", TRUE_HANDLE).map(|e| &e.target),
            reparsed.find_next_edge("cond-1", TRUE_HANDLE).map(|e| &e.target)
        );
    }

    #[test]
    fn test_optional_fields_default() {
        let graph = Graph::from_json(
            r#"{"nodes": [{"id": "a", "type": "ACTION"}], "edges": [{"id": "e", "source": "a", "target": "b"}]}"#,
        )
        .unwrap();
        assert!(graph.nodes[0].properties.is_empty());
        assert_eq!(graph.nodes[0].label, "");
        assert_eq!(graph.edges[0].handle, "");
    }

    #[test]
    fn test_malformed_document() {
        let err = Graph::from_json("{not json").unwrap_err();
        assert!(matches!(err, DripError::InvalidGraph(_)));

        let err = Graph::from_json(r#"{"nodes": [{"id": "x", "type": "LOOP"}]}"#).unwrap_err();
        assert!(matches!(err, DripError::InvalidGraph(_)));
    }

    #[test]
    fn test_trigger_nodes() {
        let graph = Graph::from_json(DOCUMENT).unwrap();
        let ids: Vec<_> = graph.trigger_nodes().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, vec!["trigger-1"]);
    }
}
