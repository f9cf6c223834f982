//! Pluggable workflow components: actions, logic and triggers.

mod context;
mod registry;
mod schema;
mod validate;

pub use context::{StepContext, StepServices};
pub use registry::ComponentRegistry;
pub use schema::{ComponentKind, ComponentSchema, FieldSchema};
pub use validate::validate_fields;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;
use crate::trigger::TriggerKind;

/// Schema metadata for a component's configuration struct.
///
/// Implemented with `#[derive(Component)]`.
pub trait Component {
    /// Human-readable summary of what the component does.
    fn description() -> &'static str;

    /// Configuration fields in declaration order.
    fn fields() -> Vec<FieldSchema>;
}

/// A side-effecting step.
///
/// A fresh instance is bound from the node's properties for every
/// evaluation, so implementations hold only their configuration.
#[async_trait]
pub trait Action: Send + Sync {
    /// Run the action against the execution's context data and return a
    /// human-readable output line.
    async fn execute(&self, ctx: &StepContext, data: &Value) -> Result<String>;
}

/// A branching decision.
#[async_trait]
pub trait Logic: Send + Sync {
    /// Decide which branch to follow. The returned text is recorded as the
    /// step output.
    async fn evaluate(&self, ctx: &StepContext, data: &Value) -> Result<(bool, String)>;
}

/// Entry-point configuration for a workflow.
pub trait Trigger: Send + Sync {
    fn kind(&self) -> TriggerKind;
}
