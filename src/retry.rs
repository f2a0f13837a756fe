use std::time::Duration;

/// Delay schedule for a loop that retries forever: doubling from `initial`
/// up to `max`. The policy only shapes delays; callers decide when to reset
/// the attempt counter (typically after a stable run).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    initial: Duration,
    max: Duration,
}

impl RetryPolicy {
    pub const fn new(initial: Duration, max: Duration) -> Self {
        Self { initial, max }
    }

    /// A fixed delay on every attempt.
    pub const fn constant(delay: Duration) -> Self {
        Self::new(delay, delay)
    }

    /// Delay before retry number `attempt` (zero-based). The exponent is
    /// clamped so the multiplication cannot overflow.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.pow(attempt.min(16));
        self.initial.saturating_mul(factor).min(self.max)
    }
}
