use anyhow::Result;
use clap::Parser;
use console::style;

use drip::{init_tracing, Drip};

use super::load_config;

/// Run the drip engine.
#[derive(Parser)]
pub struct RunCommand {
    /// Configuration file path.
    #[arg(short, long, default_value = "drip.toml")]
    pub config: String,

    /// Port to listen on (overrides config).
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host to bind to (overrides config).
    #[arg(long)]
    pub host: Option<String>,

    /// Log at debug level regardless of config.
    #[arg(long)]
    pub verbose: bool,
}

impl RunCommand {
    /// Execute the run command.
    pub async fn execute(self) -> Result<()> {
        let mut config = load_config(&self.config)?;
        self.apply_overrides(&mut config);

        init_tracing(&config.observability);
        tracing::info!("Loaded configuration from {}", self.config);

        println!();
        println!(
            "  {} v{}",
            style("drip").bold().cyan(),
            env!("CARGO_PKG_VERSION")
        );
        println!(
            "  Listening on {}",
            style(format!(
                "http://{}:{}",
                config.server.host, config.server.port
            ))
            .cyan()
        );
        println!();

        let drip = Drip::builder().config(config).build()?;
        drip.run().await?;

        Ok(())
    }

    fn apply_overrides(&self, config: &mut drip_core::config::DripConfig) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if self.verbose {
            config.observability.log_level = "debug".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use drip_core::config::DripConfig;

    #[test]
    fn test_run_command_defaults() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        assert_eq!(cmd.config, "drip.toml");
        assert_eq!(cmd.port, None);
        assert!(!cmd.verbose);
    }

    #[test]
    fn test_overrides_applied() {
        let cmd = RunCommand::try_parse_from([
            "run", "--port", "3000", "--host", "127.0.0.1", "--verbose",
        ])
        .unwrap();
        let mut config = DripConfig::default_with_database_url("postgres://localhost/drip");
        cmd.apply_overrides(&mut config);

        assert_eq!(config.server.port, 3000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.observability.log_level, "debug");
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let cmd = RunCommand::try_parse_from(["run"]).unwrap();
        let mut config = DripConfig::default_with_database_url("postgres://localhost/drip");
        cmd.apply_overrides(&mut config);

        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.observability.log_level, "info");
    }
}
