//! drip runtime.
//!
//! Single process that provides:
//! - HTTP gateway for component schemas, graph saves and event intake
//! - Execution poller that advances workflow runs step by step
//! - Schedule poller for campaigns and scheduled triggers

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use drip_core::component::{ComponentRegistry, StepServices};
use drip_core::config::{DripConfig, ObservabilityConfig};
use drip_core::error::{DripError, Result};
use drip_core::store::{AnalyticsSink, DomainRegistry, EngineStore, MailSender, SecretStore};
use drip_runtime::{
    builtin_registry, run_poller, AppState, Database, ExecutionPoller, GatewayServer,
    LogMailSender, MigrationRunner, PgStore, SchedulePoller, StepExecutor, TracingAnalyticsSink,
    VaultSecretStore,
};

/// Prelude module for common imports.
pub mod prelude {
    pub use chrono::{DateTime, Utc};
    pub use serde_json::{json, Value};

    pub use drip_core::component::{
        Action, Component, ComponentKind, ComponentRegistry, Logic, StepContext, Trigger,
    };
    pub use drip_core::config::DripConfig;
    pub use drip_core::error::{DripError, Result};
    pub use drip_core::graph::{Edge, Graph, Node, NodeType};

    pub use crate::{Drip, DripBuilder};
}

/// Install the global tracing subscriber.
///
/// `RUST_LOG` wins over the configured level. Calling this twice is a no-op.
pub fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str()));

    let installed = if config.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .try_init()
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).try_init()
    };

    if installed.is_err() {
        tracing::debug!("Tracing subscriber already installed");
    }
}

/// The drip runtime.
pub struct Drip {
    config: DripConfig,
    registry: Arc<ComponentRegistry>,
    secrets: Arc<dyn SecretStore>,
    shutdown: CancellationToken,
}

impl Drip {
    /// Create a new builder for configuring drip.
    pub fn builder() -> DripBuilder {
        DripBuilder::new()
    }

    pub fn config(&self) -> &DripConfig {
        &self.config
    }

    /// Registry of every action, logic and trigger component.
    pub fn registry(&self) -> Arc<ComponentRegistry> {
        self.registry.clone()
    }

    /// Secret store for integration credentials.
    pub fn secrets(&self) -> Arc<dyn SecretStore> {
        self.secrets.clone()
    }

    /// Token cancelled when the runtime shuts down.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Request shutdown.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    /// Connect, migrate, then serve until ctrl-c or [`Drip::shutdown`].
    pub async fn run(self) -> Result<()> {
        tracing::info!("drip runtime starting");

        let db = Database::from_config(&self.config.database).await?;
        let pool = db.pool().clone();
        tracing::info!("Connected to database");

        MigrationRunner::new(pool.clone()).run().await?;
        tracing::info!("Migrations completed");

        let store = Arc::new(PgStore::new(pool));
        let domains: Arc<dyn DomainRegistry> = store.clone();
        let mail: Arc<dyn MailSender> = Arc::new(LogMailSender::new(domains, &self.config.mail));
        let services = StepServices {
            templates: store.clone(),
            mail,
            sender: self.config.mail.sender.clone(),
        };

        let scheduler = self.config.scheduler.clone();
        let executor = Arc::new(StepExecutor::new(
            self.registry.clone(),
            services,
            scheduler.step_timeout(),
        ));

        let mut handles = Vec::new();

        {
            let poller = ExecutionPoller::new(store.clone(), executor, scheduler.clone());
            let shutdown = self.shutdown.clone();
            let period = scheduler.execution_poll_interval();
            let max_backoff = scheduler.max_backoff();
            tracing::info!(worker_id = %poller.worker_id(), "Execution poller started");
            handles.push(tokio::spawn(async move {
                run_poller(&poller, period, max_backoff, shutdown).await;
            }));
        }

        {
            let poller = SchedulePoller::new(store.clone());
            let shutdown = self.shutdown.clone();
            let period = scheduler.schedule_poll_interval();
            let max_backoff = scheduler.max_backoff();
            handles.push(tokio::spawn(async move {
                run_poller(&poller, period, max_backoff, shutdown).await;
            }));
        }

        {
            let engine_store: Arc<dyn EngineStore> = store;
            let analytics: Arc<dyn AnalyticsSink> = Arc::new(TracingAnalyticsSink);
            let state = AppState::new(self.registry.clone(), engine_store, analytics);
            let gateway = GatewayServer::new(self.config.server.clone(), state);
            let shutdown = self.shutdown.clone();
            handles.push(tokio::spawn(async move {
                if let Err(e) = gateway.run(shutdown.clone()).await {
                    tracing::error!(error = %e, "Gateway server error");
                    shutdown.cancel();
                }
            }));
        }

        tracing::info!(
            host = %self.config.server.host,
            port = self.config.server.port,
            components = self.registry.len(),
            "drip runtime started"
        );

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received shutdown signal");
                self.shutdown.cancel();
            }
            _ = self.shutdown.cancelled() => {
                tracing::info!("Received shutdown notification");
            }
        }

        tracing::info!("Starting graceful shutdown...");
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Background task ended abnormally");
            }
        }

        db.close().await;
        tracing::info!("drip runtime stopped");

        Ok(())
    }
}

/// Builder for configuring the drip runtime.
pub struct DripBuilder {
    config: Option<DripConfig>,
    registry: ComponentRegistry,
    secrets: Option<Arc<dyn SecretStore>>,
}

impl DripBuilder {
    /// Create a builder preloaded with the built-in components.
    pub fn new() -> Self {
        Self {
            config: None,
            registry: builtin_registry(),
            secrets: None,
        }
    }

    pub fn config(mut self, config: DripConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Replace the component registry.
    pub fn registry(mut self, registry: ComponentRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Get mutable access to the component registry, for registering
    /// custom handlers next to the built-ins.
    pub fn registry_mut(&mut self) -> &mut ComponentRegistry {
        &mut self.registry
    }

    /// Use a secret store other than Vault.
    pub fn secrets(mut self, secrets: Arc<dyn SecretStore>) -> Self {
        self.secrets = Some(secrets);
        self
    }

    /// Build the drip runtime.
    pub fn build(self) -> Result<Drip> {
        let config = self
            .config
            .ok_or_else(|| DripError::Config("Configuration is required".to_string()))?;

        if config.database.url.is_empty() {
            return Err(DripError::Config("database.url is required".to_string()));
        }

        let secrets = match self.secrets {
            Some(secrets) => secrets,
            None => Arc::new(VaultSecretStore::new(&config.secrets)),
        };

        Ok(Drip {
            config,
            registry: Arc::new(self.registry),
            secrets,
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for DripBuilder {
    fn default() -> Self {
        Self::new()
    }
}
