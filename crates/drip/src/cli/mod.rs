mod components;
mod migrate;
mod run;

pub use components::ComponentsCommand;
pub use migrate::MigrateCommand;
pub use run::RunCommand;

use std::path::Path;

use anyhow::Result;
use clap::{Parser, Subcommand};
use drip_core::config::DripConfig;

/// drip - workflow execution engine
#[derive(Parser)]
#[command(name = "drip")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// CLI commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the engine: pollers plus the HTTP gateway.
    Run(RunCommand),

    /// Apply pending database migrations.
    Migrate(MigrateCommand),

    /// Print the schemas of the registered components.
    Components(ComponentsCommand),
}

impl Cli {
    /// Execute the CLI command.
    pub async fn execute(self) -> Result<()> {
        match self.command {
            Commands::Run(cmd) => cmd.execute().await,
            Commands::Migrate(cmd) => cmd.execute().await,
            Commands::Components(cmd) => cmd.execute(),
        }
    }
}

/// Load `.env`, then the TOML config at `path`.
pub(crate) fn load_config(path: &str) -> Result<DripConfig> {
    dotenvy::dotenv().ok();

    if !Path::new(path).exists() {
        anyhow::bail!("Configuration file not found: {}", path);
    }

    Ok(DripConfig::from_file(path)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_cli_parse() {
        assert!(Cli::try_parse_from(["drip", "run"]).is_ok());
        assert!(Cli::try_parse_from(["drip", "migrate", "-c", "prod.toml"]).is_ok());
        assert!(Cli::try_parse_from(["drip", "components", "--kind", "trigger"]).is_ok());
        assert!(Cli::try_parse_from(["drip", "deploy"]).is_err());
    }

    #[test]
    fn test_load_config_missing_file() {
        let err = load_config("/nonexistent/drip.toml").unwrap_err();
        assert!(err.to_string().contains("Configuration file not found"));
    }

    #[test]
    fn test_load_config_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[database]\nurl = \"postgres://localhost/drip\"\n\n[server]\nport = 9090"
        )
        .unwrap();

        let config = load_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.database.url, "postgres://localhost/drip");
        assert_eq!(config.server.port, 9090);
    }
}
