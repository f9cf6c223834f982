use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use uuid::Uuid;

use crate::campaign::{Campaign, CampaignId, CampaignRun};
use crate::error::{DripError, Result};
use crate::execution::{
    ExecutionId, ExecutionRecord, ExecutionStatus, NewExecution, WorkflowId,
};
use crate::mail::EmailTemplate;
use crate::store::{
    AudienceDirectory, CampaignStore, DomainRegistry, ExecutionStore, TemplateStore,
    TriggerStore, WorkflowStore,
};
use crate::trigger::{NewTrigger, ScheduledTrigger, TriggerId, TriggerKind, TriggerRecord};

struct MemoryWorkflow {
    steps: String,
    status: String,
    audience_id: Option<i64>,
}

struct Claim {
    until: DateTime<Utc>,
}

#[derive(Default)]
struct State {
    next_id: i64,
    workflows: BTreeMap<WorkflowId, MemoryWorkflow>,
    executions: BTreeMap<ExecutionId, (ExecutionRecord, Option<Claim>)>,
    triggers: BTreeMap<TriggerId, TriggerRecord>,
    campaigns: BTreeMap<CampaignId, Campaign>,
    campaign_runs: Vec<CampaignRun>,
    audiences: HashMap<String, HashSet<i64>>,
    templates: HashMap<i64, EmailTemplate>,
    verified_domains: HashSet<String>,
    pending_failures: usize,
    failing_members: HashSet<String>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn injected_failure(&mut self) -> Result<()> {
        if self.pending_failures > 0 {
            self.pending_failures -= 1;
            return Err(DripError::Database("injected failure".to_string()));
        }
        Ok(())
    }

    fn insert_execution(&mut self, new: NewExecution, now: DateTime<Utc>) -> ExecutionId {
        let id = self.next_id();
        let record = ExecutionRecord {
            id,
            workflow_id: new.workflow_id,
            current_node_id: new.current_node_id,
            status: ExecutionStatus::Pending,
            step_results: Vec::new(),
            has_failed: false,
            context: new.context,
            next_run_at: new.next_run_at,
            created_at: now,
            finished_at: None,
            result: None,
            revision: 0,
        };
        self.executions.insert(id, (record, None));
        id
    }

    fn workflow_is_active(&self, workflow_id: WorkflowId) -> bool {
        self.workflows
            .get(&workflow_id)
            .is_some_and(|w| w.status == "ACTIVE")
    }
}

/// In-memory implementation of every store seam.
#[derive(Default)]
pub struct InMemoryStore {
    state: Mutex<State>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Add a workflow with a graph document and status.
    pub fn add_workflow(&self, id: WorkflowId, steps: &str, status: &str) {
        self.add_workflow_with_audience(id, steps, status, None);
    }

    /// Add a workflow carrying a legacy audience id.
    pub fn add_workflow_with_audience(
        &self,
        id: WorkflowId,
        steps: &str,
        status: &str,
        audience_id: Option<i64>,
    ) {
        self.state().workflows.insert(
            id,
            MemoryWorkflow {
                steps: steps.to_string(),
                status: status.to_string(),
                audience_id,
            },
        );
    }

    /// Add a trigger row and return its id.
    pub fn add_trigger(
        &self,
        workflow_id: WorkflowId,
        node_id: &str,
        kind: TriggerKind,
        config: Value,
        next_run_at: Option<DateTime<Utc>>,
    ) -> TriggerId {
        let mut state = self.state();
        let id = state.next_id();
        state.triggers.insert(
            id,
            TriggerRecord {
                id,
                workflow_id,
                node_id: node_id.to_string(),
                kind,
                config,
                next_run_at,
            },
        );
        id
    }

    pub fn add_campaign(&self, campaign: Campaign) {
        self.state().campaigns.insert(campaign.id, campaign);
    }

    /// Make the person with `email` a member of `audience_id`.
    pub fn add_member(&self, email: &str, audience_id: i64) {
        self.state()
            .audiences
            .entry(email.to_lowercase())
            .or_default()
            .insert(audience_id);
    }

    pub fn add_template(&self, template: EmailTemplate) {
        self.state().templates.insert(template.id, template);
    }

    pub fn verify_domain(&self, domain: &str) {
        self.state().verified_domains.insert(domain.to_lowercase());
    }

    /// Make the next `count` polling queries fail as if the database were down.
    pub fn fail_next(&self, count: usize) {
        self.state().pending_failures = count;
    }

    /// Make audience lookups for `email` fail as if the database were down.
    pub fn fail_member_lookups(&self, email: &str) {
        self.state().failing_members.insert(email.to_lowercase());
    }

    /// Overwrite an execution's state, bypassing claims and revisions.
    pub fn put_execution(&self, record: ExecutionRecord) {
        self.state().executions.insert(record.id, (record, None));
    }

    pub fn execution(&self, id: ExecutionId) -> Option<ExecutionRecord> {
        self.state().executions.get(&id).map(|(r, _)| r.clone())
    }

    pub fn executions(&self) -> Vec<ExecutionRecord> {
        self.state()
            .executions
            .values()
            .map(|(r, _)| r.clone())
            .collect()
    }

    pub fn trigger(&self, id: TriggerId) -> Option<TriggerRecord> {
        self.state().triggers.get(&id).cloned()
    }

    pub fn triggers(&self) -> Vec<TriggerRecord> {
        self.state().triggers.values().cloned().collect()
    }

    pub fn campaign(&self, id: CampaignId) -> Option<Campaign> {
        self.state().campaigns.get(&id).cloned()
    }

    pub fn campaign_runs(&self) -> Vec<CampaignRun> {
        self.state().campaign_runs.clone()
    }

    pub fn assert_execution_status(&self, id: ExecutionId, status: ExecutionStatus) {
        let actual = self.execution(id).map(|r| r.status);
        assert_eq!(actual, Some(status), "execution {} status", id);
    }
}

#[async_trait]
impl ExecutionStore for InMemoryStore {
    async fn insert_execution(&self, execution: NewExecution) -> Result<ExecutionId> {
        Ok(self.state().insert_execution(execution, Utc::now()))
    }

    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        _worker: Uuid,
        lease: Duration,
    ) -> Result<Vec<ExecutionRecord>> {
        let mut state = self.state();
        state.injected_failure()?;

        let until = now + chrono::Duration::from_std(lease).unwrap_or(chrono::Duration::zero());
        let mut claimed = Vec::new();

        for (record, claim) in state.executions.values_mut() {
            if claimed.len() as i64 >= limit {
                break;
            }
            let held = claim.as_ref().is_some_and(|c| c.until > now);
            if record.is_due(now) && !held {
                *claim = Some(Claim { until });
                claimed.push(record.clone());
            }
        }

        Ok(claimed)
    }

    async fn commit_execution(
        &self,
        execution: &ExecutionRecord,
        expected_revision: i64,
    ) -> Result<bool> {
        let mut state = self.state();
        let Some((stored, claim)) = state.executions.get_mut(&execution.id) else {
            return Ok(false);
        };

        if stored.status != ExecutionStatus::Pending || stored.revision != expected_revision {
            return Ok(false);
        }

        *stored = execution.clone();
        *claim = None;
        Ok(true)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>> {
        Ok(self.execution(id))
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>> {
        Ok(self
            .state()
            .executions
            .values()
            .rev()
            .map(|(r, _)| r)
            .filter(|r| r.workflow_id == workflow_id)
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl WorkflowStore for InMemoryStore {
    async fn workflow_graph(&self, workflow_id: WorkflowId) -> Result<Option<String>> {
        Ok(self
            .state()
            .workflows
            .get(&workflow_id)
            .map(|w| w.steps.clone()))
    }

    async fn save_workflow_graph(
        &self,
        workflow_id: WorkflowId,
        graph: &str,
        triggers: Vec<NewTrigger>,
    ) -> Result<()> {
        let mut state = self.state();
        let workflow = state
            .workflows
            .get_mut(&workflow_id)
            .ok_or_else(|| DripError::NotFound(format!("workflow {}", workflow_id)))?;
        workflow.steps = graph.to_string();

        state.triggers.retain(|_, t| t.workflow_id != workflow_id);
        for trigger in triggers {
            let id = state.next_id();
            state.triggers.insert(
                id,
                TriggerRecord {
                    id,
                    workflow_id: trigger.workflow_id,
                    node_id: trigger.node_id,
                    kind: trigger.kind,
                    config: trigger.config,
                    next_run_at: trigger.next_run_at,
                },
            );
        }
        Ok(())
    }
}

#[async_trait]
impl TriggerStore for InMemoryStore {
    async fn active_event_triggers(&self) -> Result<Vec<TriggerRecord>> {
        let state = self.state();
        Ok(state
            .triggers
            .values()
            .filter(|t| t.kind == TriggerKind::Event && state.workflow_is_active(t.workflow_id))
            .cloned()
            .collect())
    }

    async fn due_schedule_triggers(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTrigger>> {
        let mut state = self.state();
        state.injected_failure()?;

        Ok(state
            .triggers
            .values()
            .filter(|t| {
                t.kind == TriggerKind::Schedule
                    && t.next_run_at.is_some_and(|at| at <= now)
                    && state.workflow_is_active(t.workflow_id)
            })
            .map(|t| ScheduledTrigger {
                trigger: t.clone(),
                workflow_audience_id: state
                    .workflows
                    .get(&t.workflow_id)
                    .and_then(|w| w.audience_id),
            })
            .collect())
    }

    async fn fire_schedule_trigger(
        &self,
        trigger: &TriggerRecord,
        execution: NewExecution,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ExecutionId>> {
        let mut state = self.state();
        match state.triggers.get_mut(&trigger.id) {
            Some(stored) if stored.next_run_at == trigger.next_run_at => {
                stored.next_run_at = Some(next_run_at);
            }
            _ => return Ok(None),
        }
        Ok(Some(state.insert_execution(execution, Utc::now())))
    }
}

#[async_trait]
impl CampaignStore for InMemoryStore {
    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let mut state = self.state();
        state.injected_failure()?;

        Ok(state
            .campaigns
            .values()
            .filter(|c| c.status == "ACTIVE" && c.next_run_at.is_some_and(|at| at <= now))
            .cloned()
            .collect())
    }

    async fn record_campaign_run(
        &self,
        campaign: &Campaign,
        run: CampaignRun,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut state = self.state();
        match state.campaigns.get_mut(&campaign.id) {
            Some(stored) if stored.next_run_at == campaign.next_run_at => {
                stored.next_run_at = Some(next_run_at);
            }
            _ => return Ok(false),
        }
        state.campaign_runs.push(run);
        Ok(true)
    }
}

#[async_trait]
impl AudienceDirectory for InMemoryStore {
    async fn is_member(&self, email: &str, audience_ids: &[i64]) -> Result<bool> {
        let email = email.to_lowercase();
        let state = self.state();
        if state.failing_members.contains(&email) {
            return Err(DripError::Database(format!("audience lookup failed for {}", email)));
        }

        Ok(state
            .audiences
            .get(&email)
            .is_some_and(|member_of| audience_ids.iter().any(|id| member_of.contains(id))))
    }
}

#[async_trait]
impl TemplateStore for InMemoryStore {
    async fn email_template(&self, id: i64) -> Result<Option<EmailTemplate>> {
        Ok(self.state().templates.get(&id).cloned())
    }
}

#[async_trait]
impl DomainRegistry for InMemoryStore {
    async fn is_domain_verified(&self, domain: &str) -> Result<bool> {
        Ok(self
            .state()
            .verified_domains
            .contains(&domain.to_lowercase()))
    }
}
