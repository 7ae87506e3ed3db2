use std::time::Duration;

/// Exponential backoff for remote calls: base 250 ms doubling per attempt,
/// capped at 8 s, five attempts total. Shared by the embedder and the
/// vector-store client.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(250),
            factor: 2,
            max_delay: Duration::from_secs(8),
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay before the given retry. Attempts are 0-based; attempt 0 is
    /// the first try and has no delay.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = self.factor.saturating_pow(attempt - 1);
        self.base_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }

    #[must_use]
    pub const fn attempts_exhausted(&self, attempt: u32) -> bool {
        attempt + 1 >= self.max_attempts
    }
}

/// Whether an HTTP status should be retried (429 plus the 5xx family).
#[must_use]
pub fn status_is_transient(status: u16) -> bool {
    status == 429 || (500..600).contains(&status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn backoff_schedule_doubles_and_caps() {
        let policy = RetryPolicy::default();
        let delays: Vec<u64> = (0..7)
            .map(|a| policy.delay_for_attempt(a).as_millis() as u64)
            .collect();
        assert_eq!(delays, vec![0, 250, 500, 1000, 2000, 4000, 8000]);
        assert_eq!(policy.delay_for_attempt(10), Duration::from_secs(8));
    }

    #[test]
    fn five_attempts_total() {
        let policy = RetryPolicy::default();
        assert!(!policy.attempts_exhausted(3));
        assert!(policy.attempts_exhausted(4));
    }

    #[test]
    fn transient_statuses() {
        assert!(status_is_transient(429));
        assert!(status_is_transient(500));
        assert!(status_is_transient(503));
        assert!(!status_is_transient(400));
        assert!(!status_is_transient(401));
        assert!(!status_is_transient(404));
    }
}
