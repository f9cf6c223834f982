//! Migration runner guarded by a Postgres advisory lock so concurrent
//! processes never apply the same migration twice.

use std::collections::HashSet;

use drip_core::error::{DripError, Result};
use sqlx::{PgConnection, PgPool};
use tracing::{debug, info, warn};

/// Advisory lock key ("DRIP" in hex).
const MIGRATION_LOCK_ID: i64 = 0x44524950;

/// A single migration.
#[derive(Debug, Clone)]
pub struct Migration {
    /// Unique name, applied in order.
    pub name: String,
    /// SQL to execute.
    pub sql: String,
}

impl Migration {
    pub fn new(name: impl Into<String>, sql: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql: sql.into(),
        }
    }
}

/// Applies built-in migrations that have not run yet.
pub struct MigrationRunner {
    pool: PgPool,
}

impl MigrationRunner {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run all pending migrations.
    ///
    /// The advisory lock is session scoped, so the lock, the migrations and
    /// the unlock all share one connection.
    pub async fn run(&self) -> Result<()> {
        let mut conn = self
            .pool
            .acquire()
            .await
            .map_err(|e| DripError::Database(format!("Failed to acquire connection: {}", e)))?;

        debug!("Acquiring migration lock...");
        sqlx::query("SELECT pg_advisory_lock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&mut *conn)
            .await
            .map_err(|e| DripError::Database(format!("Failed to acquire migration lock: {}", e)))?;

        let result = run_pending(&mut conn).await;

        if let Err(e) = sqlx::query("SELECT pg_advisory_unlock($1)")
            .bind(MIGRATION_LOCK_ID)
            .execute(&mut *conn)
            .await
        {
            warn!("Failed to release migration lock: {}", e);
        }

        result
    }
}

async fn run_pending(conn: &mut PgConnection) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS drip_migrations (
            id SERIAL PRIMARY KEY,
            name VARCHAR(255) UNIQUE NOT NULL,
            applied_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    )
    .execute(&mut *conn)
    .await
    .map_err(|e| DripError::Database(format!("Failed to create migrations table: {}", e)))?;

    let rows: Vec<(String,)> = sqlx::query_as("SELECT name FROM drip_migrations")
        .fetch_all(&mut *conn)
        .await
        .map_err(|e| DripError::Database(format!("Failed to get applied migrations: {}", e)))?;
    let applied: HashSet<String> = rows.into_iter().map(|(name,)| name).collect();
    debug!("Already applied migrations: {:?}", applied);

    for migration in super::builtin::get_builtin_migrations() {
        if !applied.contains(&migration.name) {
            apply(conn, &migration).await?;
        }
    }

    Ok(())
}

async fn apply(conn: &mut PgConnection, migration: &Migration) -> Result<()> {
    info!("Applying migration: {}", migration.name);

    let failed = |e: sqlx::Error| {
        DripError::Database(format!(
            "Failed to apply migration '{}': {}",
            migration.name, e
        ))
    };

    let mut tx = sqlx::Connection::begin(&mut *conn).await.map_err(failed)?;
    sqlx::raw_sql(&migration.sql)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;
    sqlx::query("INSERT INTO drip_migrations (name) VALUES ($1)")
        .bind(&migration.name)
        .execute(&mut *tx)
        .await
        .map_err(failed)?;
    tx.commit().await.map_err(failed)?;

    info!("Migration applied: {}", migration.name);
    Ok(())
}
