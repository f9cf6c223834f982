use async_trait::async_trait;
use rand::Rng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use drip_core::component::{Logic, StepContext};
use drip_core::error::Result;
use drip_core::Component;

/// Two-way branch. Random unless forced.
#[derive(Debug, Clone, Default, Serialize, Deserialize, Component)]
#[serde(default)]
#[component(description = "Splits the workflow into a true and a false branch")]
pub struct ConditionLogic {
    #[component(
        validate = "oneof=true false",
        description = "Optional: set to 'true' or 'false' to force a result. Otherwise the branch is picked at random (50/50)."
    )]
    pub force: String,
}

impl ConditionLogic {
    fn decide(&self) -> bool {
        match self.force.as_str() {
            "true" => true,
            "false" => false,
            _ => rand::rng().random_bool(0.5),
        }
    }
}

#[async_trait]
impl Logic for ConditionLogic {
    async fn evaluate(&self, _ctx: &StepContext, _data: &Value) -> Result<(bool, String)> {
        let result = self.decide();
        let output = if result {
            "Condition: True"
        } else {
            "Condition: False"
        };
        Ok((result, output.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn forced(value: &str) -> ConditionLogic {
        ConditionLogic {
            force: value.to_string(),
        }
    }

    #[test]
    fn test_forced() {
        for _ in 0..50 {
            assert!(forced("true").decide());
            assert!(!forced("false").decide());
        }
    }

    #[test]
    fn test_unforced_split() {
        let logic = ConditionLogic::default();
        let trues = (0..2000).filter(|_| logic.decide()).count();
        assert!((800..=1200).contains(&trues), "got {} trues", trues);
    }
}
