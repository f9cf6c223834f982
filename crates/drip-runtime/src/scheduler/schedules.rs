use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;

use drip_core::campaign::{Campaign, CampaignRun};
use drip_core::execution::NewExecution;
use drip_core::store::{CampaignStore, TriggerStore};
use drip_core::trigger::schedule_interval;
use drip_core::Result;

use super::Poller;

/// Runs due campaigns and fires due scheduled triggers.
pub struct SchedulePoller<S: ?Sized> {
    store: Arc<S>,
}

impl<S> SchedulePoller<S>
where
    S: CampaignStore + TriggerStore + ?Sized,
{
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    async fn run_campaigns(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut executed = 0;

        for campaign in self.store.due_campaigns(now).await? {
            let run = simulate_run(&campaign);
            let (sent_count, success_rate) = (run.sent_count, run.success_rate);
            let next_run_at = now + campaign.reschedule_offset();

            match self
                .store
                .record_campaign_run(&campaign, run, next_run_at)
                .await
            {
                Ok(true) => {
                    tracing::info!(
                        campaign_id = campaign.id,
                        name = %campaign.name,
                        sent_count,
                        success_rate,
                        next_run_at = %next_run_at,
                        "Campaign executed"
                    );
                    executed += 1;
                }
                Ok(false) => {
                    tracing::debug!(campaign_id = campaign.id, "Campaign already handled elsewhere");
                }
                Err(e) => {
                    tracing::error!(campaign_id = campaign.id, error = %e, "Failed to record campaign run");
                }
            }
        }

        Ok(executed)
    }

    async fn fire_triggers(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut fired = 0;

        for due in self.store.due_schedule_triggers(now).await? {
            let trigger = &due.trigger;
            let execution = NewExecution::at_node(
                trigger.workflow_id,
                trigger.node_id.clone(),
                due.seed_context(),
                now,
            );

            match self
                .store
                .fire_schedule_trigger(trigger, execution, now + schedule_interval())
                .await
            {
                Ok(Some(execution_id)) => {
                    tracing::info!(
                        trigger_id = trigger.id,
                        workflow_id = trigger.workflow_id,
                        node_id = %trigger.node_id,
                        execution_id,
                        "Scheduled workflow triggered"
                    );
                    fired += 1;
                }
                Ok(None) => {
                    tracing::debug!(trigger_id = trigger.id, "Trigger already fired elsewhere");
                }
                Err(e) => {
                    tracing::error!(trigger_id = trigger.id, error = %e, "Failed to fire scheduled trigger");
                }
            }
        }

        Ok(fired)
    }
}

/// Simulated send statistics.
fn simulate_run(campaign: &Campaign) -> CampaignRun {
    let mut rng = rand::rng();
    CampaignRun {
        campaign_id: campaign.id,
        sent_count: rng.random_range(100..1100),
        success_rate: rng.random_range(0.8..1.0),
    }
}

#[async_trait]
impl<S> Poller for SchedulePoller<S>
where
    S: CampaignStore + TriggerStore + ?Sized,
{
    fn name(&self) -> &'static str {
        "schedules"
    }

    async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let campaigns = self.run_campaigns(now).await?;
        let triggers = self.fire_triggers(now).await?;
        Ok(campaigns + triggers)
    }
}
