//! Built-in actions, logic and triggers.

mod actions;
mod logic;
mod triggers;

pub use actions::{DelayAction, FailAction, HttpRequestAction, SendEmailAction, UpdateDbAction};
pub use logic::ConditionLogic;
pub use triggers::{EventTrigger, ScheduleTrigger, WebhookTrigger};

use drip_core::component::ComponentRegistry;
use drip_core::graph::DEFAULT_LOGIC;

/// A registry holding every built-in component under its graph name.
pub fn builtin_registry() -> ComponentRegistry {
    let mut registry = ComponentRegistry::new();

    registry.register_action::<SendEmailAction>("Send Email");
    registry.register_action::<HttpRequestAction>("HTTP Request");
    registry.register_action::<DelayAction>("Delay");
    registry.register_action::<UpdateDbAction>("Update DB");
    registry.register_action::<FailAction>("FAIL");

    registry.register_logic::<ConditionLogic>(DEFAULT_LOGIC);

    registry.register_trigger::<EventTrigger>("EVENT");
    registry.register_trigger::<ScheduleTrigger>("SCHEDULE");
    registry.register_trigger::<WebhookTrigger>("WEBHOOK");

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use drip_core::component::ComponentKind;
    use drip_core::graph::Graph;

    #[test]
    fn test_builtin_names() {
        let registry = builtin_registry();
        assert_eq!(registry.len(), 9);

        let actions: Vec<_> = registry
            .schemas(ComponentKind::Action)
            .iter()
            .map(|s| s.name.as_str())
            .collect();
        assert_eq!(
            actions,
            vec!["Delay", "FAIL", "HTTP Request", "Send Email", "Update DB"]
        );
        assert!(registry.logic("Condition").is_some());
        assert!(registry.trigger("WEBHOOK").is_some());
    }

    #[test]
    fn test_send_email_schema() {
        let registry = builtin_registry();
        let schema = registry
            .schema(ComponentKind::Action, "Send Email")
            .unwrap();
        let field = schema.field("template_id").unwrap();
        assert_eq!(field.field_type, "integer");
        assert!(field.required);
        assert_eq!(field.validations, vec!["required", "min=1"]);
    }

    #[test]
    fn test_valid_graph() {
        let graph = Graph::from_json(
            r#"{
                "nodes": [
                    {"id": "t", "type": "TRIGGER", "properties": {"trigger_event": "signup", "site_ids": [5]}},
                    {"id": "c", "type": "CONDITION", "properties": {"force": "true"}},
                    {"id": "a", "type": "ACTION", "properties": {"action": "Send Email", "template_id": 3}},
                    {"id": "d", "type": "ACTION", "properties": {"action": "Delay", "delay_minutes": 10}}
                ],
                "edges": [
                    {"id": "e1", "source": "t", "target": "c", "handle": "default"},
                    {"id": "e2", "source": "c", "target": "a", "handle": "true"},
                    {"id": "e3", "source": "c", "target": "d", "handle": "false"}
                ]
            }"#,
        )
        .unwrap();

        assert!(graph.validate(&builtin_registry()).is_ok());
    }

    #[test]
    fn test_out_of_range_delay_rejected() {
        let graph = Graph::from_json(
            r#"{
                "nodes": [
                    {"id": "t", "type": "TRIGGER", "properties": {"trigger_event": "signup"}},
                    {"id": "d", "type": "ACTION", "properties": {"action": "Delay", "delay_minutes": 10, "delay_days": "1e12"}}
                ],
                "edges": [{"id": "e1", "source": "t", "target": "d", "handle": "default"}]
            }"#,
        )
        .unwrap();

        assert_eq!(
            graph.violations(&builtin_registry()),
            vec!["node d: delay is out of range".to_string()]
        );
    }

    #[test]
    fn test_graph_violations() {
        let graph = Graph::from_json(
            r#"{
                "nodes": [
                    {"id": "t", "type": "TRIGGER", "properties": {"trigger_type": "WEBHOOK", "url": "not a url", "secret": "abc"}},
                    {"id": "a", "type": "ACTION", "properties": {}},
                    {"id": "b", "type": "ACTION", "properties": {"action": "Bogus"}},
                    {"id": "m", "type": "ACTION", "properties": {"action": "HTTP Request", "method": "FETCH", "url": "https://x.io"}},
                    {"id": "m", "type": "CONDITION", "properties": {}}
                ],
                "edges": [
                    {"id": "e1", "source": "t", "target": "a", "handle": "default"},
                    {"id": "e2", "source": "t", "target": "b", "handle": "default"},
                    {"id": "e3", "source": "a", "target": "ghost", "handle": "default"}
                ]
            }"#,
        )
        .unwrap();

        let violations = graph.violations(&builtin_registry());
        assert_eq!(
            violations,
            vec![
                "node t (WEBHOOK): Validation error: validation failed for WEBHOOK: url must be a valid URL; secret must be at least 8".to_string(),
                "node a: missing 'action' property".to_string(),
                "node b (Bogus): Unknown action: Bogus".to_string(),
                "node m (HTTP Request): Validation error: validation failed for HTTP Request: method must be one of [GET, POST, PUT, DELETE, PATCH]".to_string(),
                "node m: duplicate node id".to_string(),
                "edge e2: node t already has an edge for handle 'default'".to_string(),
                "edge e3: unknown node ghost".to_string(),
            ]
        );
    }

    #[test]
    fn test_trigger_type_defaults_to_event() {
        let graph = Graph::from_json(
            r#"{"nodes": [{"id": "t", "type": "TRIGGER", "properties": {}}], "edges": []}"#,
        )
        .unwrap();

        let err = graph.validate(&builtin_registry()).unwrap_err();
        assert!(err.to_string().contains("trigger_event is required"));
    }
}
