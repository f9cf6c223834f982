use serde::{Deserialize, Serialize};

use drip_core::component::Trigger;
use drip_core::trigger::TriggerKind;
use drip_core::Component;

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Starts the workflow when a matching event is tracked")]
pub struct EventTrigger {
    #[component(
        validate = "required",
        description = "Name of the event that starts this workflow (e.g. 'user_signup')."
    )]
    pub trigger_event: String,
    #[component(
        validate = "min=1",
        description = "Optional: only events from these sites start the workflow."
    )]
    pub site_ids: Vec<i64>,
    #[component(
        validate = "min=1",
        description = "Optional: only people in one of these audiences start the workflow."
    )]
    pub audience_ids: Vec<i64>,
}

impl EventTrigger {
    /// Event name and site filter. Audience membership is checked separately.
    pub fn matches(&self, site_id: i64, event: &str) -> bool {
        self.trigger_event == event && (self.site_ids.is_empty() || self.site_ids.contains(&site_id))
    }
}

impl Trigger for EventTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Event
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Starts the workflow on a schedule")]
pub struct ScheduleTrigger {
    #[component(
        validate = "required",
        description = "Cron expression for when the workflow runs (e.g. '0 9 * * *')."
    )]
    pub cron: String,
    #[component(
        validate = "min=1",
        description = "Optional: audiences passed to every run."
    )]
    pub audience_ids: Vec<i64>,
}

impl Trigger for ScheduleTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Schedule
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Starts the workflow from an incoming webhook")]
pub struct WebhookTrigger {
    #[component(
        validate = "required,url",
        description = "Webhook URL that receives POST requests when the workflow is triggered."
    )]
    pub url: String,
    #[component(
        validate = "min=8",
        description = "Optional: secret for webhook signature verification, at least 8 characters."
    )]
    pub secret: String,
}

impl Trigger for WebhookTrigger {
    fn kind(&self) -> TriggerKind {
        TriggerKind::Webhook
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_matching() {
        let trigger: EventTrigger =
            serde_json::from_value(json!({"trigger_event": "signup", "site_ids": [5, 6]})).unwrap();

        assert!(trigger.matches(5, "signup"));
        assert!(!trigger.matches(7, "signup"));
        assert!(!trigger.matches(5, "purchase"));
        assert_eq!(trigger.kind(), TriggerKind::Event);

        let any_site = EventTrigger {
            trigger_event: "signup".into(),
            ..Default::default()
        };
        assert!(any_site.matches(99, "signup"));
    }
}
