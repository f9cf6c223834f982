use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use uuid::Uuid;

use drip_core::campaign::{Campaign, CampaignRun};
use drip_core::error::{DripError, Result};
use drip_core::execution::{
    ExecutionId, ExecutionRecord, ExecutionStatus, NewExecution, StepResult, WorkflowId,
};
use drip_core::mail::EmailTemplate;
use drip_core::store::{
    AudienceDirectory, CampaignStore, DomainRegistry, ExecutionStore, TemplateStore,
    TriggerStore, WorkflowStore,
};
use drip_core::trigger::{NewTrigger, ScheduledTrigger, TriggerKind, TriggerRecord};

const EXECUTION_COLUMNS: &str = r#"
    id, workflow_id, current_node_id, status, step_results, has_failed,
    context, next_run_at, created_at, finished_at, result, revision
"#;

/// Postgres implementation of every store seam.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn execution_from_row(row: &PgRow) -> Result<ExecutionRecord> {
    let status: String = row.try_get("status")?;
    let step_results: Json<Vec<StepResult>> = row.try_get("step_results")?;

    Ok(ExecutionRecord {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        current_node_id: row.try_get("current_node_id")?,
        status: ExecutionStatus::from_str(&status),
        step_results: step_results.0,
        has_failed: row.try_get("has_failed")?,
        context: row.try_get("context")?,
        next_run_at: row.try_get("next_run_at")?,
        created_at: row.try_get("created_at")?,
        finished_at: row.try_get("finished_at")?,
        result: row.try_get("result")?,
        revision: row.try_get("revision")?,
    })
}

fn trigger_from_row(row: &PgRow) -> Result<Option<TriggerRecord>> {
    let kind: String = row.try_get("type")?;
    let Some(kind) = TriggerKind::parse(&kind) else {
        return Ok(None);
    };

    Ok(Some(TriggerRecord {
        id: row.try_get("id")?,
        workflow_id: row.try_get("workflow_id")?,
        node_id: row.try_get("node_id")?,
        kind,
        config: row.try_get("config")?,
        next_run_at: row.try_get("next_run_at")?,
    }))
}

fn lease_until(now: DateTime<Utc>, lease: Duration) -> DateTime<Utc> {
    now + chrono::Duration::from_std(lease).unwrap_or_else(|_| chrono::Duration::minutes(5))
}

#[async_trait]
impl ExecutionStore for PgStore {
    async fn insert_execution(&self, execution: NewExecution) -> Result<ExecutionId> {
        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO workflow_executions (workflow_id, current_node_id, status, context, next_run_at)
            VALUES ($1, $2, 'PENDING', $3, $4)
            RETURNING id
            "#,
        )
        .bind(execution.workflow_id)
        .bind(&execution.current_node_id)
        .bind(&execution.context)
        .bind(execution.next_run_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn claim_due_executions(
        &self,
        now: DateTime<Utc>,
        limit: i64,
        worker: Uuid,
        lease: Duration,
    ) -> Result<Vec<ExecutionRecord>> {
        let sql = format!(
            r#"
            WITH due AS (
                SELECT id
                FROM workflow_executions
                WHERE status = 'PENDING'
                  AND next_run_at <= $1
                  AND (claimed_until IS NULL OR claimed_until <= $1)
                ORDER BY next_run_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            UPDATE workflow_executions
            SET claimed_by = $3, claimed_until = $4
            WHERE id IN (SELECT id FROM due)
            RETURNING {}
            "#,
            EXECUTION_COLUMNS
        );

        let rows = sqlx::query(&sql)
            .bind(now)
            .bind(limit)
            .bind(worker)
            .bind(lease_until(now, lease))
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(execution_from_row).collect()
    }

    async fn commit_execution(
        &self,
        execution: &ExecutionRecord,
        expected_revision: i64,
    ) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE workflow_executions
            SET current_node_id = $2,
                status = $3,
                step_results = $4,
                has_failed = $5,
                next_run_at = $6,
                finished_at = $7,
                result = $8,
                revision = $9,
                claimed_by = NULL,
                claimed_until = NULL
            WHERE id = $1 AND status = 'PENDING' AND revision = $10
            "#,
        )
        .bind(execution.id)
        .bind(&execution.current_node_id)
        .bind(execution.status.as_str())
        .bind(Json(&execution.step_results))
        .bind(execution.has_failed)
        .bind(execution.next_run_at)
        .bind(execution.finished_at)
        .bind(&execution.result)
        .bind(execution.revision)
        .bind(expected_revision)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn get_execution(&self, id: ExecutionId) -> Result<Option<ExecutionRecord>> {
        let sql = format!(
            "SELECT {} FROM workflow_executions WHERE id = $1",
            EXECUTION_COLUMNS
        );
        let row = sqlx::query(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.as_ref().map(execution_from_row).transpose()
    }

    async fn list_executions(
        &self,
        workflow_id: WorkflowId,
        limit: i64,
    ) -> Result<Vec<ExecutionRecord>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM workflow_executions
            WHERE workflow_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2
            "#,
            EXECUTION_COLUMNS
        );
        let rows = sqlx::query(&sql)
            .bind(workflow_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        rows.iter().map(execution_from_row).collect()
    }
}

#[async_trait]
impl WorkflowStore for PgStore {
    async fn workflow_graph(&self, workflow_id: WorkflowId) -> Result<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT steps FROM workflows WHERE id = $1")
            .bind(workflow_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(steps,)| steps))
    }

    async fn save_workflow_graph(
        &self,
        workflow_id: WorkflowId,
        graph: &str,
        triggers: Vec<NewTrigger>,
    ) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let updated = sqlx::query("UPDATE workflows SET steps = $2 WHERE id = $1")
            .bind(workflow_id)
            .bind(graph)
            .execute(&mut *tx)
            .await?;
        if updated.rows_affected() == 0 {
            return Err(DripError::NotFound(format!("workflow {}", workflow_id)));
        }

        sqlx::query("DELETE FROM workflow_triggers WHERE workflow_id = $1")
            .bind(workflow_id)
            .execute(&mut *tx)
            .await?;

        for trigger in triggers {
            sqlx::query(
                r#"
                INSERT INTO workflow_triggers (workflow_id, node_id, type, config, next_run_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(trigger.workflow_id)
            .bind(&trigger.node_id)
            .bind(trigger.kind.as_str())
            .bind(&trigger.config)
            .bind(trigger.next_run_at)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl TriggerStore for PgStore {
    async fn active_event_triggers(&self) -> Result<Vec<TriggerRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.workflow_id, t.node_id, t.type, t.config, t.next_run_at
            FROM workflow_triggers t
            JOIN workflows w ON w.id = t.workflow_id
            WHERE t.type = 'EVENT' AND w.status = 'ACTIVE'
            ORDER BY t.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let mut triggers = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(trigger) = trigger_from_row(row)? {
                triggers.push(trigger);
            }
        }
        Ok(triggers)
    }

    async fn due_schedule_triggers(&self, now: DateTime<Utc>) -> Result<Vec<ScheduledTrigger>> {
        let rows = sqlx::query(
            r#"
            SELECT t.id, t.workflow_id, t.node_id, t.type, t.config, t.next_run_at,
                   w.audience_id
            FROM workflow_triggers t
            JOIN workflows w ON w.id = t.workflow_id
            WHERE t.type = 'SCHEDULE'
              AND t.next_run_at <= $1
              AND w.status = 'ACTIVE'
            ORDER BY t.next_run_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        let mut due = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(trigger) = trigger_from_row(row)? {
                due.push(ScheduledTrigger {
                    trigger,
                    workflow_audience_id: row.try_get("audience_id")?,
                });
            }
        }
        Ok(due)
    }

    async fn fire_schedule_trigger(
        &self,
        trigger: &TriggerRecord,
        execution: NewExecution,
        next_run_at: DateTime<Utc>,
    ) -> Result<Option<ExecutionId>> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE workflow_triggers
            SET next_run_at = $2
            WHERE id = $1 AND next_run_at IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(trigger.id)
        .bind(next_run_at)
        .bind(trigger.next_run_at)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Ok(None);
        }

        let (id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO workflow_executions (workflow_id, current_node_id, status, context, next_run_at)
            VALUES ($1, $2, 'PENDING', $3, $4)
            RETURNING id
            "#,
        )
        .bind(execution.workflow_id)
        .bind(&execution.current_node_id)
        .bind(&execution.context)
        .bind(execution.next_run_at)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(Some(id))
    }
}

#[async_trait]
impl CampaignStore for PgStore {
    async fn due_campaigns(&self, now: DateTime<Utc>) -> Result<Vec<Campaign>> {
        let rows = sqlx::query(
            r#"
            SELECT id, name, status, schedule_interval, next_run_at
            FROM email_campaigns
            WHERE status = 'ACTIVE' AND next_run_at <= $1
            ORDER BY next_run_at
            "#,
        )
        .bind(now)
        .fetch_all(&self.pool)
        .await?;

        rows.iter()
            .map(|row| {
                Ok(Campaign {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    status: row.try_get("status")?,
                    interval: row.try_get("schedule_interval")?,
                    next_run_at: row.try_get("next_run_at")?,
                })
            })
            .collect()
    }

    async fn record_campaign_run(
        &self,
        campaign: &Campaign,
        run: CampaignRun,
        next_run_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        let moved = sqlx::query(
            r#"
            UPDATE email_campaigns
            SET next_run_at = $2
            WHERE id = $1 AND next_run_at IS NOT DISTINCT FROM $3
            "#,
        )
        .bind(campaign.id)
        .bind(next_run_at)
        .bind(campaign.next_run_at)
        .execute(&mut *tx)
        .await?;

        if moved.rows_affected() == 0 {
            return Ok(false);
        }

        sqlx::query(
            r#"
            INSERT INTO campaign_runs (campaign_id, sent_count, success_rate, executed_at)
            VALUES ($1, $2, $3, NOW())
            "#,
        )
        .bind(run.campaign_id)
        .bind(run.sent_count)
        .bind(run.success_rate)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(true)
    }
}

#[async_trait]
impl AudienceDirectory for PgStore {
    async fn is_member(&self, email: &str, audience_ids: &[i64]) -> Result<bool> {
        let (member,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1
                FROM audience_memberships am
                JOIN people p ON p.id = am.person_id
                WHERE LOWER(p.email) = LOWER($1)
                  AND am.audience_id = ANY($2)
            )
            "#,
        )
        .bind(email)
        .bind(audience_ids)
        .fetch_one(&self.pool)
        .await?;

        Ok(member)
    }
}

#[async_trait]
impl TemplateStore for PgStore {
    async fn email_template(&self, id: i64) -> Result<Option<EmailTemplate>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, subject, body FROM email_templates WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(id, subject, body)| EmailTemplate { id, subject, body }))
    }
}

#[async_trait]
impl DomainRegistry for PgStore {
    async fn is_domain_verified(&self, domain: &str) -> Result<bool> {
        let (verified,): (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM email_domains
                WHERE LOWER(domain) = LOWER($1) AND is_verified = TRUE
            )
            "#,
        )
        .bind(domain)
        .fetch_one(&self.pool)
        .await?;

        Ok(verified)
    }
}
