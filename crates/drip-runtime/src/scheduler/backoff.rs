use std::time::Duration;

/// Jittered exponential backoff for repeated tick failures.
#[derive(Debug, Clone)]
pub struct Backoff {
    base: Duration,
    max: Duration,
    failures: u32,
}

impl Backoff {
    pub fn new(base: Duration, max: Duration) -> Self {
        Self {
            base,
            max,
            failures: 0,
        }
    }

    /// Record a failure and return how long to wait before the next attempt.
    pub fn next_delay(&mut self) -> Duration {
        self.failures = self.failures.saturating_add(1);

        let exponent = self.failures.min(16) as i32 - 1;
        let multiplied = self.base.as_secs_f64() * 2f64.powi(exponent);
        let jitter = rand::random::<f64>() * multiplied * 0.1;

        Duration::from_secs_f64((multiplied + jitter).min(self.max.as_secs_f64()))
    }

    pub fn reset(&mut self) {
        self.failures = 0;
    }

    /// Consecutive failures since the last reset.
    pub fn failures(&self) -> u32 {
        self.failures
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grows_with_jitter() {
        let mut backoff = Backoff::new(Duration::from_secs(5), Duration::from_secs(300));

        let first = backoff.next_delay();
        assert!(first >= Duration::from_secs(5) && first <= Duration::from_millis(5_500));

        let second = backoff.next_delay();
        assert!(second >= Duration::from_secs(10) && second <= Duration::from_secs(11));

        let third = backoff.next_delay();
        assert!(third >= Duration::from_secs(20) && third <= Duration::from_secs(22));
        assert_eq!(backoff.failures(), 3);
    }

    #[test]
    fn test_capped_and_reset() {
        let mut backoff = Backoff::new(Duration::from_secs(60), Duration::from_secs(300));
        for _ in 0..40 {
            assert!(backoff.next_delay() <= Duration::from_secs(300));
        }
        assert_eq!(backoff.next_delay(), Duration::from_secs(300));

        backoff.reset();
        assert_eq!(backoff.failures(), 0);
        assert!(backoff.next_delay() < Duration::from_secs(67));
    }
}
