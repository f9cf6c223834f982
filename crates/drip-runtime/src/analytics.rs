use async_trait::async_trait;
use serde_json::Value;

use drip_core::store::AnalyticsSink;
use drip_core::Result;

/// Records tracked events as structured log lines.
#[derive(Debug, Default, Clone)]
pub struct TracingAnalyticsSink;

#[async_trait]
impl AnalyticsSink for TracingAnalyticsSink {
    async fn record(&self, site_id: i64, event: &str, properties: &Value) -> Result<()> {
        tracing::info!(site_id, event, properties = %properties, "Tracked event");
        Ok(())
    }
}
