use serde::{Deserialize, Serialize};

/// Describes one configuration field of a component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    pub required: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validations: Vec<String>,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required: false,
            description: String::new(),
            validations: Vec::new(),
        }
    }

    /// Attach validation rules such as `required`, `min=1` or `oneof=a b`.
    pub fn with_validations(mut self, rules: &[&str]) -> Self {
        self.validations = rules.iter().map(|r| r.to_string()).collect();
        self.required = self.validations.iter().any(|r| r == "required");
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

/// The role a component plays in a graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Action,
    Logic,
    Trigger,
}

impl ComponentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Action => "action",
            Self::Logic => "logic",
            Self::Trigger => "trigger",
        }
    }

    /// Capitalized label used in error messages.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Action => "Action",
            Self::Logic => "Logic",
            Self::Trigger => "Trigger",
        }
    }
}

/// Introspected description of a registered component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ComponentKind,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub description: String,
    pub fields: Vec<FieldSchema>,
}

impl ComponentSchema {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}
