use anyhow::Result;
use clap::{Parser, ValueEnum};
use serde_json::{json, Value};

use drip_core::component::{ComponentKind, ComponentRegistry};
use drip_runtime::builtin_registry;

/// Print the schemas of the registered components as JSON.
#[derive(Parser)]
pub struct ComponentsCommand {
    /// Only print components of this kind.
    #[arg(short, long, value_enum)]
    pub kind: Option<KindArg>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindArg {
    Action,
    Logic,
    Trigger,
}

impl From<KindArg> for ComponentKind {
    fn from(kind: KindArg) -> Self {
        match kind {
            KindArg::Action => ComponentKind::Action,
            KindArg::Logic => ComponentKind::Logic,
            KindArg::Trigger => ComponentKind::Trigger,
        }
    }
}

impl ComponentsCommand {
    pub fn execute(self) -> Result<()> {
        let registry = builtin_registry();
        println!("{}", serde_json::to_string_pretty(&self.render(&registry))?);
        Ok(())
    }

    fn render(&self, registry: &ComponentRegistry) -> Value {
        match self.kind {
            Some(kind) => json!(registry.schemas(kind.into())),
            None => json!({
                "actions": registry.schemas(ComponentKind::Action),
                "logic": registry.schemas(ComponentKind::Logic),
                "triggers": registry.schemas(ComponentKind::Trigger),
            }),
        }
    }
}
