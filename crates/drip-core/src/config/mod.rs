mod database;
mod observability;
mod scheduler;

pub use database::DatabaseConfig;
pub use observability::ObservabilityConfig;
pub use scheduler::SchedulerConfig;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{DripError, Result};

/// Root configuration for drip.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DripConfig {
    /// Database configuration.
    pub database: DatabaseConfig,

    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,

    /// Polling loop configuration.
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Outbound mail configuration.
    #[serde(default)]
    pub mail: MailConfig,

    /// Secret store configuration.
    #[serde(default)]
    pub secrets: SecretsConfig,

    /// Logging configuration.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl DripConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| DripError::Config(format!("Failed to read config file: {}", e)))?;

        Self::parse_toml(&content)
    }

    /// Parse configuration from a TOML string.
    pub fn parse_toml(content: &str) -> Result<Self> {
        let content = substitute_env_vars(content);

        toml::from_str(&content)
            .map_err(|e| DripError::Config(format!("Failed to parse config: {}", e)))
    }

    /// Configuration with defaults everywhere except the database URL.
    pub fn default_with_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            server: ServerConfig::default(),
            scheduler: SchedulerConfig::default(),
            mail: MailConfig::default(),
            secrets: SecretsConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_http_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_http_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_http_port() -> u16 {
    8080
}

/// Outbound mail configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MailConfig {
    /// Domain that is always allowed to send, regardless of verification.
    #[serde(default = "default_system_domain")]
    pub system_domain: String,

    /// Sender address used by the built-in email action.
    #[serde(default = "default_sender")]
    pub sender: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            system_domain: default_system_domain(),
            sender: default_sender(),
        }
    }
}

fn default_system_domain() -> String {
    "helpnow.ai".to_string()
}

fn default_sender() -> String {
    "notifications@helpnow.ai".to_string()
}

/// Vault KV v2 configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    #[serde(default = "default_vault_addr")]
    pub vault_addr: String,

    #[serde(default = "default_vault_token")]
    pub vault_token: String,

    /// KV v2 mount path.
    #[serde(default = "default_mount")]
    pub mount: String,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            vault_addr: default_vault_addr(),
            vault_token: default_vault_token(),
            mount: default_mount(),
        }
    }
}

fn default_vault_addr() -> String {
    "http://127.0.0.1:8200".to_string()
}

fn default_vault_token() -> String {
    "root".to_string()
}

fn default_mount() -> String {
    "secret".to_string()
}

/// Substitute environment variables in the format ${VAR_NAME}.
fn substitute_env_vars(content: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([A-Z_][A-Z0-9_]*)\}") {
        Ok(re) => re,
        Err(_) => return content.to_string(),
    };

    let mut result = content.to_string();
    for cap in re.captures_iter(content) {
        let var_name = &cap[1];
        if let Ok(value) = std::env::var(var_name) {
            result = result.replace(&cap[0], &value);
        }
    }

    result
}
