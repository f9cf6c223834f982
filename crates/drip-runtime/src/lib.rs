pub mod analytics;
pub mod components;
pub mod db;
pub mod dispatch;
pub mod engine;
pub mod gateway;
pub mod mail;
pub mod migrations;
pub mod scheduler;
pub mod secrets;
pub mod workflows;

pub use analytics::TracingAnalyticsSink;
pub use components::builtin_registry;
pub use db::{Database, PgStore};
pub use dispatch::EventDispatcher;
pub use engine::StepExecutor;
pub use gateway::{ApiError, AppState, GatewayServer};
pub use mail::LogMailSender;
pub use migrations::{get_builtin_migrations, Migration, MigrationRunner};
pub use scheduler::{run_poller, ExecutionPoller, Poller, SchedulePoller};
pub use secrets::{MemorySecretStore, VaultSecretStore};
pub use workflows::save_workflow_graph;
