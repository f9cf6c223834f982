use anyhow::Result;
use clap::Parser;
use console::style;

use drip::init_tracing;
use drip_runtime::{get_builtin_migrations, Database, MigrationRunner};

use super::load_config;

/// Apply pending database migrations.
#[derive(Parser)]
pub struct MigrateCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "drip.toml")]
    pub config: String,

    /// List the bundled migrations without connecting.
    #[arg(long)]
    pub list: bool,
}

impl MigrateCommand {
    pub async fn execute(self) -> Result<()> {
        if self.list {
            for migration in get_builtin_migrations() {
                println!("  {} {}", style("→").dim(), style(&migration.name).cyan());
            }
            return Ok(());
        }

        let config = load_config(&self.config)?;
        init_tracing(&config.observability);

        let db = Database::from_config(&config.database).await?;
        let runner = MigrationRunner::new(db.pool().clone());

        println!("  {} Running pending migrations...", style("→").dim());
        runner.run().await?;
        println!("  {} Migrations complete", style("✓").green());

        db.close().await;
        Ok(())
    }
}
