use std::time::Duration;

/// Deterministic exponential backoff with a retry ceiling
///
/// `delay(attempt) = min(base * 2^attempt, max)`. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackoffPolicy {
    base_delay_ms: u64,
    max_delay_ms: u64,
    max_attempts: u32,
}

impl BackoffPolicy {
    pub fn new(base_delay_ms: u64, max_delay_ms: u64, max_attempts: u32) -> Self {
        Self {
            base_delay_ms,
            max_delay_ms,
            max_attempts,
        }
    }

    /// Wait before the connect attempt following failure number `attempt + 1`
    pub fn delay(&self, attempt: u32) -> Duration {
        let shift = attempt.min(20);
        let calculated = self.base_delay_ms.saturating_mul(1_u64 << shift);
        Duration::from_millis(calculated.min(self.max_delay_ms))
    }

    /// Whether `failures` consecutive failures exhaust the retry budget
    pub fn should_give_up(&self, failures: u32) -> bool {
        failures >= self.max_attempts
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::new(1_000, 10_000, 5)
    }
}
