//! Polling loops that move executions, campaigns and scheduled triggers
//! forward.

mod backoff;
mod executions;
mod schedules;

pub use backoff::Backoff;
pub use executions::ExecutionPoller;
pub use schedules::SchedulePoller;

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use drip_core::Result;

/// One unit of periodic work.
#[async_trait]
pub trait Poller: Send + Sync {
    /// Name used in log lines.
    fn name(&self) -> &'static str;

    /// Process everything currently due. Returns the number of rows handled.
    async fn tick(&self) -> Result<usize>;
}

/// Drive a poller every `period` until `shutdown` is cancelled.
///
/// Ticks never overlap. After a failed tick the loop waits out a jittered
/// exponential backoff on top of the period; the first successful tick
/// resets it.
pub async fn run_poller(
    poller: &dyn Poller,
    period: Duration,
    max_backoff: Duration,
    shutdown: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut backoff = Backoff::new(period, max_backoff);

    tracing::info!(poller = poller.name(), period = ?period, "Poller started");

    loop {
        tokio::select! {
            _ = interval.tick() => {
                match poller.tick().await {
                    Ok(handled) => {
                        if handled > 0 {
                            tracing::debug!(poller = poller.name(), handled, "Tick finished");
                        }
                        backoff.reset();
                    }
                    Err(e) => {
                        let delay = backoff.next_delay();
                        tracing::error!(
                            poller = poller.name(),
                            error = %e,
                            failures = backoff.failures(),
                            retry_in = ?delay,
                            "Tick failed"
                        );
                        tokio::select! {
                            _ = tokio::time::sleep(delay) => {}
                            _ = shutdown.cancelled() => break,
                        }
                        interval.reset();
                    }
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }

    tracing::info!(poller = poller.name(), "Poller shutting down");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use drip_core::DripError;

    struct Flaky {
        calls: AtomicUsize,
        failures: usize,
    }

    #[async_trait]
    impl Poller for Flaky {
        fn name(&self) -> &'static str {
            "flaky"
        }

        async fn tick(&self) -> Result<usize> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            if call < self.failures {
                Err(DripError::Database("connection refused".into()))
            } else {
                Ok(0)
            }
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_loop_survives_failures_and_stops() {
        let poller = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
            failures: 3,
        });
        let shutdown = CancellationToken::new();

        let handle = {
            let poller = poller.clone();
            let shutdown = shutdown.clone();
            tokio::spawn(async move {
                run_poller(
                    poller.as_ref(),
                    Duration::from_secs(5),
                    Duration::from_secs(60),
                    shutdown,
                )
                .await
            })
        };

        tokio::time::sleep(Duration::from_secs(600)).await;
        assert!(poller.calls.load(Ordering::SeqCst) > 3);

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_before_first_tick() {
        let poller = Flaky {
            calls: AtomicUsize::new(0),
            failures: 0,
        };
        let shutdown = CancellationToken::new();
        shutdown.cancel();

        run_poller(&poller, Duration::from_secs(5), Duration::from_secs(5), shutdown).await;
        assert!(poller.calls.load(Ordering::SeqCst) <= 1);
    }
}
