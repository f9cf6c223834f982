use std::sync::Arc;

use chrono::Utc;
use serde_json::Value;

use drip_core::execution::{ExecutionId, NewExecution};
use drip_core::store::{AudienceDirectory, ExecutionStore, TriggerStore};
use drip_core::trigger::TriggerRecord;
use drip_core::Result;

use crate::components::EventTrigger;

/// Starts workflows whose event triggers match a tracked event.
pub struct EventDispatcher<S: ?Sized> {
    store: Arc<S>,
}

impl<S> EventDispatcher<S>
where
    S: TriggerStore + AudienceDirectory + ExecutionStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Create a PENDING execution for every EVENT trigger of an ACTIVE
    /// workflow that matches `event` on `site_id`.
    ///
    /// Triggers restricted to audiences fire only when the person named by
    /// the context's `email` (or `user_email`) belongs to one of them.
    /// Matching triggers fire independently: one that fails is logged and
    /// skipped. Returns the created execution ids.
    pub async fn dispatch_event(
        &self,
        site_id: i64,
        event: &str,
        context: &Value,
    ) -> Result<Vec<ExecutionId>> {
        let mut created = Vec::new();

        for record in self.store.active_event_triggers().await? {
            let trigger: EventTrigger = match serde_json::from_value(record.config.clone()) {
                Ok(trigger) => trigger,
                Err(e) => {
                    tracing::warn!(
                        trigger_id = record.id,
                        workflow_id = record.workflow_id,
                        error = %e,
                        "Skipping trigger with unreadable config"
                    );
                    continue;
                }
            };

            if !trigger.matches(site_id, event) {
                continue;
            }

            match self.fire(&record, &trigger, context).await {
                Ok(Some(execution_id)) => {
                    tracing::info!(
                        execution_id,
                        workflow_id = record.workflow_id,
                        site_id,
                        event,
                        "Workflow triggered by event"
                    );
                    created.push(execution_id);
                }
                Ok(None) => {}
                Err(e) => tracing::warn!(
                    trigger_id = record.id,
                    workflow_id = record.workflow_id,
                    error = %e,
                    "Failed to fire trigger"
                ),
            }
        }

        Ok(created)
    }

    async fn fire(
        &self,
        record: &TriggerRecord,
        trigger: &EventTrigger,
        context: &Value,
    ) -> Result<Option<ExecutionId>> {
        if !trigger.audience_ids.is_empty() {
            let Some(email) = person_email(context) else {
                tracing::debug!(
                    trigger_id = record.id,
                    "Audience-restricted trigger skipped, no email in event"
                );
                return Ok(None);
            };
            if !self.store.is_member(email, &trigger.audience_ids).await? {
                return Ok(None);
            }
        }

        let execution_id = self
            .store
            .insert_execution(NewExecution::at_node(
                record.workflow_id,
                record.node_id.clone(),
                context.clone(),
                Utc::now(),
            ))
            .await?;

        Ok(Some(execution_id))
    }
}

fn person_email(context: &Value) -> Option<&str> {
    ["email", "user_email"].into_iter().find_map(|key| {
        context
            .get(key)
            .and_then(Value::as_str)
            .filter(|email| !email.is_empty())
    })
}
