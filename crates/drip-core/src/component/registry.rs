use std::collections::HashMap;
use std::sync::Arc;

use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;

use super::schema::{ComponentKind, ComponentSchema};
use super::validate::validate_fields;
use super::{Action, Component, Logic, Trigger};
use crate::error::{DripError, Result};

/// Builds a fresh handler from node properties.
pub type BoxedFactory<H> = Arc<dyn Fn(&Value) -> Result<Box<H>> + Send + Sync>;

/// Binds node properties and re-serializes them with defaults applied.
type BoxedNormalizer = Arc<dyn Fn(&Value) -> Result<Value> + Send + Sync>;

/// Entry in the component registry.
pub struct ComponentEntry<H: ?Sized> {
    /// Introspected schema.
    pub schema: ComponentSchema,
    factory: BoxedFactory<H>,
    normalize: BoxedNormalizer,
}

impl<H: ?Sized + 'static> ComponentEntry<H> {
    fn new<T>(name: &str, kind: ComponentKind, wrap: fn(T) -> Box<H>) -> Self
    where
        T: Component + Serialize + DeserializeOwned + 'static,
    {
        let schema = ComponentSchema {
            name: name.to_string(),
            kind,
            description: T::description().to_string(),
            fields: T::fields(),
        };

        let factory: BoxedFactory<H> = Arc::new(move |props| Ok(wrap(bind::<T>(props)?)));
        let normalize: BoxedNormalizer = Arc::new(|props| {
            let bound = bind::<T>(props)?;
            serde_json::to_value(bound).map_err(|e| DripError::Internal(e.to_string()))
        });

        Self {
            schema,
            factory,
            normalize,
        }
    }

    /// Bind a fresh instance from node properties. Unknown properties are ignored.
    pub fn build(&self, properties: &Value) -> Result<Box<H>> {
        (self.factory)(properties)
    }

    /// Check node properties against this component's schema.
    pub fn validate(&self, properties: &Value) -> Result<()> {
        let normalized = (self.normalize)(properties)?;
        let violations = validate_fields(&self.schema.fields, &normalized);

        if violations.is_empty() {
            Ok(())
        } else {
            Err(DripError::Validation(format!(
                "validation failed for {}: {}",
                self.schema.name,
                violations.join("; ")
            )))
        }
    }
}

fn bind<T: DeserializeOwned>(properties: &Value) -> Result<T> {
    serde_json::from_value(properties.clone())
        .map_err(|e| DripError::Validation(format!("failed to bind properties: {}", e)))
}

/// Registry of every action, logic and trigger a graph may reference.
///
/// Filled once at startup and then shared behind an `Arc`.
#[derive(Clone, Default)]
pub struct ComponentRegistry {
    actions: HashMap<String, Arc<ComponentEntry<dyn Action>>>,
    logic: HashMap<String, Arc<ComponentEntry<dyn Logic>>>,
    triggers: HashMap<String, Arc<ComponentEntry<dyn Trigger>>>,
}

impl ComponentRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action under `name`, replacing any previous registration.
    pub fn register_action<A>(&mut self, name: &str)
    where
        A: Action + Component + Serialize + DeserializeOwned + 'static,
    {
        let entry =
            ComponentEntry::<dyn Action>::new::<A>(name, ComponentKind::Action, |a| Box::new(a));
        self.actions.insert(name.to_string(), Arc::new(entry));
    }

    /// Register a logic handler under `name`, replacing any previous registration.
    pub fn register_logic<L>(&mut self, name: &str)
    where
        L: Logic + Component + Serialize + DeserializeOwned + 'static,
    {
        let entry =
            ComponentEntry::<dyn Logic>::new::<L>(name, ComponentKind::Logic, |l| Box::new(l));
        self.logic.insert(name.to_string(), Arc::new(entry));
    }

    /// Register a trigger under `name`, replacing any previous registration.
    pub fn register_trigger<T>(&mut self, name: &str)
    where
        T: Trigger + Component + Serialize + DeserializeOwned + 'static,
    {
        let entry =
            ComponentEntry::<dyn Trigger>::new::<T>(name, ComponentKind::Trigger, |t| Box::new(t));
        self.triggers.insert(name.to_string(), Arc::new(entry));
    }

    pub fn action(&self, name: &str) -> Option<Arc<ComponentEntry<dyn Action>>> {
        self.actions.get(name).cloned()
    }

    pub fn logic(&self, name: &str) -> Option<Arc<ComponentEntry<dyn Logic>>> {
        self.logic.get(name).cloned()
    }

    pub fn trigger(&self, name: &str) -> Option<Arc<ComponentEntry<dyn Trigger>>> {
        self.triggers.get(name).cloned()
    }

    /// Schema for one registered component.
    pub fn schema(&self, kind: ComponentKind, name: &str) -> Option<&ComponentSchema> {
        match kind {
            ComponentKind::Action => self.actions.get(name).map(|e| &e.schema),
            ComponentKind::Logic => self.logic.get(name).map(|e| &e.schema),
            ComponentKind::Trigger => self.triggers.get(name).map(|e| &e.schema),
        }
    }

    /// Schemas for every component of a kind, sorted by name.
    pub fn schemas(&self, kind: ComponentKind) -> Vec<&ComponentSchema> {
        let mut schemas: Vec<&ComponentSchema> = match kind {
            ComponentKind::Action => self.actions.values().map(|e| &e.schema).collect(),
            ComponentKind::Logic => self.logic.values().map(|e| &e.schema).collect(),
            ComponentKind::Trigger => self.triggers.values().map(|e| &e.schema).collect(),
        };
        schemas.sort_by(|a, b| a.name.cmp(&b.name));
        schemas
    }

    /// Validate node properties against a registered component.
    pub fn validate(&self, kind: ComponentKind, name: &str, properties: &Value) -> Result<()> {
        let unknown = || DripError::UnknownComponent {
            kind: kind.as_str(),
            name: name.to_string(),
        };

        match kind {
            ComponentKind::Action => self.action(name).ok_or_else(unknown)?.validate(properties),
            ComponentKind::Logic => self.logic(name).ok_or_else(unknown)?.validate(properties),
            ComponentKind::Trigger => self.trigger(name).ok_or_else(unknown)?.validate(properties),
        }
    }

    /// Total number of registered components.
    pub fn len(&self) -> usize {
        self.actions.len() + self.logic.len() + self.triggers.len()
    }

    /// Check if registry is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{FieldSchema, StepContext};
    use crate::trigger::TriggerKind;
    use async_trait::async_trait;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Default, Serialize, Deserialize)]
    struct Greet {
        #[serde(default)]
        name: String,
    }

    impl Component for Greet {
        fn description() -> &'static str {
            "Says hello"
        }

        fn fields() -> Vec<FieldSchema> {
            vec![FieldSchema::new("name", "string").with_validations(&["required", "min=2"])]
        }
    }

    #[async_trait]
    impl Action for Greet {
        async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
            Ok(format!("Hello {}", self.name))
        }
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Manual {}

    impl Component for Manual {
        fn description() -> &'static str {
            ""
        }

        fn fields() -> Vec<FieldSchema> {
            vec![]
        }
    }

    impl Trigger for Manual {
        fn kind(&self) -> TriggerKind {
            TriggerKind::Event
        }
    }

    #[test]
    fn test_empty_registry() {
        let registry = ComponentRegistry::new();
        assert!(registry.is_empty());
        assert_eq!(registry.len(), 0);
        assert!(registry.action("nonexistent").is_none());
        assert!(registry.schemas(ComponentKind::Logic).is_empty());
    }

    #[test]
    fn test_register_and_introspect() {
        let mut registry = ComponentRegistry::new();
        registry.register_action::<Greet>("Greet");
        registry.register_trigger::<Manual>("MANUAL");

        let schema = registry.schema(ComponentKind::Action, "Greet").unwrap();
        assert_eq!(schema.kind, ComponentKind::Action);
        assert_eq!(schema.description, "Says hello");
        assert!(schema.field("name").unwrap().required);

        assert!(registry.schema(ComponentKind::Logic, "Greet").is_none());
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_last_registration_wins() {
        let mut registry = ComponentRegistry::new();
        registry.register_action::<Greet>("Step");
        registry.register_action::<Manual2>("Step");

        let schema = registry.schema(ComponentKind::Action, "Step").unwrap();
        assert_eq!(schema.description, "Second");
        assert_eq!(registry.len(), 1);
    }

    #[derive(Default, Serialize, Deserialize)]
    struct Manual2 {}

    impl Component for Manual2 {
        fn description() -> &'static str {
            "Second"
        }

        fn fields() -> Vec<FieldSchema> {
            vec![]
        }
    }

    #[async_trait]
    impl Action for Manual2 {
        async fn execute(&self, _ctx: &StepContext, _data: &Value) -> Result<String> {
            Ok(String::new())
        }
    }

    #[test]
    fn test_validate_properties() {
        let mut registry = ComponentRegistry::new();
        registry.register_action::<Greet>("Greet");

        registry
            .validate(ComponentKind::Action, "Greet", &json!({"action": "Greet", "name": "Ada"}))
            .unwrap();

        let err = registry
            .validate(ComponentKind::Action, "Greet", &json!({"name": "A"}))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Validation error: validation failed for Greet: name must be at least 2"
        );

        let err = registry
            .validate(ComponentKind::Action, "Bogus", &json!({}))
            .unwrap_err();
        assert!(matches!(err, DripError::UnknownComponent { name, .. } if name == "Bogus"));
    }

    #[test]
    fn test_bind_type_mismatch() {
        let mut registry = ComponentRegistry::new();
        registry.register_action::<Greet>("Greet");

        let err = registry
            .action("Greet")
            .unwrap()
            .build(&json!({"name": 12}))
            .err()
            .unwrap();
        assert!(matches!(err, DripError::Validation(_)));
    }
}
