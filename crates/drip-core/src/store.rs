//! Seams between the engine and its collaborators.
//!
//! The runtime implements these over Postgres; the `testing` feature
//! provides in-memory versions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::campaign::{Campaign, CampaignRun};
use crate::error::Result;
use crate::execution::{ExecutionId, ExecutionRecord, NewExecution, WorkflowId};
use crate::mail::{Email, EmailTemplate};
use crate::trigger::{NewTrigger, ScheduledTrigger, TriggerRecord};

/// Durable execution rows.
#[async_trait]
pub trait ExecutionStore: Send + Sync {
    async fn insert_execution(&self, execution: NewExecution) -> Result<ExecutionId>;

    /// Claim up to `limit` due PENDING executions for `worker`.
    ///
    /// A claimed row is invisible to other workers until it is committed or
    /// the lease expires.
    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        worker: Uuid,
        lease: Duration,
    ) -> Result<Vec<ExecutionRecord>>;

    /// Persist a transition applied to `execution`.
    ///
    /// Writes only if the stored row is still PENDING at `expected_revision`
    /// and releases the claim. Returns whether the write happened.
    async fn commit_execution(
        &self,
        execution: &ExecutionRecord,
        expected_revision: i64,
    ) -> Result<bool>;

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>>;

    /// Most recent executions of a workflow first.
    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>>;
}

/// Workflow definitions.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    /// The stored graph document, if the workflow exists.
    async fn workflow_graph(&self, workflow_id: WorkflowId) -> Result<Option<String>>;

    /// Replace a workflow's graph and its trigger rows in one transaction.
    async fn save_workflow_graph(
        &self,
        workflow_id: WorkflowId,
        graph: &str,
        triggers: Vec<NewTrigger>,
    ) -> Result<()>;
}

/// Trigger rows.
#[async_trait]
pub trait TriggerStore: Send + Sync {
    /// EVENT triggers of ACTIVE workflows.
    async fn active_event_triggers(&self) -> Result<Vec<TriggerRecord>>;

    /// SCHEDULE triggers of ACTIVE workflows whose `next_run_at` has passed.
    async fn due_schedule_triggers(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTrigger>>;

    /// Start an execution for a due trigger and move its `next_run_at`.
    ///
    /// Both happen in one transaction, and only if the trigger still has the
    /// `next_run_at` it was read with. Returns the new execution, if any.
    async fn fire_schedule_trigger(
        &self,
        trigger: &TriggerRecord,
        execution: NewExecution,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ExecutionId>>;
}

/// Campaign rows.
#[async_trait]
pub trait CampaignStore: Send + Sync {
    /// ACTIVE campaigns whose `next_run_at` has passed.
    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>>;

    /// Record a run and reschedule, only if the campaign still has the
    /// `next_run_at` it was read with.
    async fn record_campaign_run(
        &self,
        campaign: &Campaign,
        run: CampaignRun,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool>;
}

/// Audience membership lookups.
#[async_trait]
pub trait AudienceDirectory: Send + Sync {
    /// Whether the person with `email` belongs to any of `audience_ids`.
    async fn is_member(&self, email: &str, audience_ids: &[i64]) -> Result<bool>;
}

#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn email_template(&self, id: i64) -> Result<Option<EmailTemplate>>;
}

/// Sender domains verified by their owners.
#[async_trait]
pub trait DomainRegistry: Send + Sync {
    async fn is_domain_verified(&self, domain: &str) -> Result<bool>;
}

#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send_email(&self, email: &Email) -> Result<()>;
}

/// Every relational seam the engine needs, for holding one store as a
/// single trait object.
pub trait EngineStore:
    ExecutionStore
    + WorkflowStore
    + TriggerStore
    + CampaignStore
    + AudienceDirectory
    + TemplateStore
    + DomainRegistry
{
}

impl<T> EngineStore for T where
    T: ExecutionStore
        + WorkflowStore
        + TriggerStore
        + CampaignStore
        + AudienceDirectory
        + TemplateStore
        + DomainRegistry
{
}

/// Storage for sensitive configuration, addressed by path.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn write(&self, path: &str, data: Map<String, Value>) -> Result<()>;

    /// `None` when nothing is stored at `path`.
    async fn read(&self, path: &str) -> Result<Option<Map<String, Value>>>;

    async fn delete(&self, path: &str) -> Result<()>;
}

/// Destination for tracked events.
#[async_trait]
pub trait AnalyticsSink: Send + Sync {
    async fn record(&self, site_id: i64, event: &str, properties: &Value) -> Result<()>;
}
