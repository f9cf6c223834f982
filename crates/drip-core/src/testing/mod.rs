//! Testing utilities for drip.
//!
//! In-memory implementations of every store seam so the executor, pollers
//! and HTTP routes can be exercised without a database.
//!
//! # Example
//!
//! ```ignore
//! let store = Arc::new(InMemoryStore::new());
//! store.add_workflow(1, GRAPH, "ACTIVE");
//! store.add_trigger(1, "trigger-1", TriggerKind::Event, json!({"trigger_event": "signup"}));
//!
//! let id = store.insert_execution(NewExecution::at_node(1, "trigger-1", json!({}), Utc::now())).await?;
//! store.assert_execution_status(id, ExecutionStatus::Pending);
//! ```

mod mail;
mod store;

pub use mail::RecordingMailSender;
pub use store::InMemoryStore;

use std::sync::Arc;

use crate::component::StepServices;

/// Step services backed by test doubles.
pub fn test_services(store: Arc<InMemoryStore>, mail: Arc<RecordingMailSender>) -> StepServices {
    StepServices {
        templates: store,
        mail,
        sender: "notifications@helpnow.ai".to_string(),
    }
}
