use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Polling loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// How often due executions are advanced, in milliseconds.
    #[serde(default = "default_execution_poll_interval")]
    pub execution_poll_interval_ms: u64,

    /// How often campaigns and scheduled triggers are checked, in milliseconds.
    #[serde(default = "default_schedule_poll_interval")]
    pub schedule_poll_interval_ms: u64,

    /// Maximum executions claimed per tick.
    #[serde(default = "default_batch_size")]
    pub batch_size: i64,

    /// Maximum executions advanced concurrently within a tick.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,

    /// Upper bound on a single action or condition call, in seconds.
    #[serde(default = "default_step_timeout")]
    pub step_timeout_secs: u64,

    /// How long a claim on an execution is held before another worker may take it.
    #[serde(default = "default_claim_lease")]
    pub claim_lease_secs: u64,

    /// Ceiling for the backoff applied after repeated tick failures, in seconds.
    #[serde(default = "default_max_backoff")]
    pub max_backoff_secs: u64,
}

impl SchedulerConfig {
    pub fn execution_poll_interval(&self) -> Duration {
        Duration::from_millis(self.execution_poll_interval_ms)
    }

    pub fn schedule_poll_interval(&self) -> Duration {
        Duration::from_millis(self.schedule_poll_interval_ms)
    }

    pub fn step_timeout(&self) -> Duration {
        Duration::from_secs(self.step_timeout_secs)
    }

    pub fn claim_lease(&self) -> Duration {
        Duration::from_secs(self.claim_lease_secs)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_secs(self.max_backoff_secs)
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            execution_poll_interval_ms: default_execution_poll_interval(),
            schedule_poll_interval_ms: default_schedule_poll_interval(),
            batch_size: default_batch_size(),
            max_concurrent: default_max_concurrent(),
            step_timeout_secs: default_step_timeout(),
            claim_lease_secs: default_claim_lease(),
            max_backoff_secs: default_max_backoff(),
        }
    }
}

fn default_execution_poll_interval() -> u64 {
    5_000
}

fn default_schedule_poll_interval() -> u64 {
    60_000
}

fn default_batch_size() -> i64 {
    100
}

fn default_max_concurrent() -> usize {
    8
}

fn default_step_timeout() -> u64 {
    30
}

fn default_claim_lease() -> u64 {
    300
}

fn default_max_backoff() -> u64 {
    300
}
