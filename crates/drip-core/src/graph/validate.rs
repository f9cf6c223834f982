use std::collections::HashSet;

use super::{Graph, NodeType};
use crate::component::{ComponentKind, ComponentRegistry};
use crate::error::{DripError, Result};
use crate::trigger::TriggerKind;

/// Logic used by condition nodes that don't name one.
pub const DEFAULT_LOGIC: &str = "Condition";

impl Graph {
    /// Every problem that would stop this graph from running as drawn.
    pub fn violations(&self, registry: &ComponentRegistry) -> Vec<String> {
        let mut violations = Vec::new();
        let mut node_ids = HashSet::new();

        for node in &self.nodes {
            if !node_ids.insert(node.id.as_str()) {
                violations.push(format!("node {}: duplicate node id", node.id));
            }

            let properties = node.properties_value();
            let checked = match node.node_type {
                NodeType::Action => match node.property_str("action") {
                    Some(name) => registry
                        .validate(ComponentKind::Action, name, &properties)
                        .map_err(|e| format!("node {} ({}): {}", node.id, name, e)),
                    None => Err(format!("node {}: missing 'action' property", node.id)),
                },
                NodeType::Condition => {
                    let name = node.property_str("logic").unwrap_or(DEFAULT_LOGIC);
                    registry
                        .validate(ComponentKind::Logic, name, &properties)
                        .map_err(|e| format!("node {} ({}): {}", node.id, name, e))
                }
                NodeType::Trigger => {
                    let name = TriggerKind::type_name_of(node);
                    registry
                        .validate(ComponentKind::Trigger, name, &properties)
                        .map_err(|e| format!("node {} ({}): {}", node.id, name, e))
                }
            };

            if let Err(message) = checked {
                violations.push(message);
            }

            if node.delay().is_none() {
                violations.push(format!("node {}: delay is out of range", node.id));
            }
        }

        let mut routes = HashSet::new();
        for edge in &self.edges {
            for end in [&edge.source, &edge.target] {
                if !node_ids.contains(end.as_str()) {
                    violations.push(format!("edge {}: unknown node {}", edge.id, end));
                }
            }
            if !routes.insert((edge.source.as_str(), edge.handle.as_str())) {
                violations.push(format!(
                    "edge {}: node {} already has an edge for handle '{}'",
                    edge.id, edge.source, edge.handle
                ));
            }
        }

        violations
    }

    /// Validate the graph before it is saved.
    pub fn validate(&self, registry: &ComponentRegistry) -> Result<()> {
        let violations = self.violations(registry);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(DripError::Validation(violations.join("; ")))
        }
    }
}
