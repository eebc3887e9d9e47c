//! Retry bookkeeping for per-file transfers.
//!
//! The state machine is pure: transitions depend only on the attempt counter.
//! Waiting is delegated to a [`Sleeper`] so tests can observe backoff without
//! real elapsed time.

use std::time::Duration;

use async_trait::async_trait;

/// Upper bound on a single backoff wait.
pub const MAX_BACKOFF_SECS: u64 = 60;

/// Wait after failed attempt `attempt` (1-based): `min(60, 2^attempt)` seconds.
pub fn backoff_delay(attempt: u32) -> Duration {
    let secs = 2u64.saturating_pow(attempt).min(MAX_BACKOFF_SECS);
    Duration::from_secs(secs)
}

/// What to do after a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Wait this long, then make another attempt.
    RetryAfter(Duration),
    /// Attempts are exhausted or the error is permanent.
    GiveUp,
}

/// Attempt counter for one file.
#[derive(Debug, Clone)]
pub struct RetryState {
    pub attempt: u32,
    pub max_attempts: u32,
    pub last_error: Option<String>,
    pub next_delay: Option<Duration>,
}

impl RetryState {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            attempt: 1,
            max_attempts,
            last_error: None,
            next_delay: None,
        }
    }

    /// Record a failure of the current attempt and decide what comes next.
    pub fn record_failure(&mut self, message: String, retryable: bool) -> RetryDecision {
        self.last_error = Some(message);
        if !retryable || self.attempt >= self.max_attempts {
            self.next_delay = None;
            return RetryDecision::GiveUp;
        }
        let delay = backoff_delay(self.attempt);
        self.next_delay = Some(delay);
        RetryDecision::RetryAfter(delay)
    }

    /// Move on to the next attempt once the wait is over.
    pub fn advance(&mut self) {
        self.attempt += 1;
        self.next_delay = None;
    }
}

/// Blocks the download pipeline between attempts.
#[async_trait]
pub trait Sleeper: Send + Sync {
    async fn sleep(&self, duration: Duration);
}

/// Real wall-clock sleeping on the tokio timer.
pub struct TokioSleeper;

#[async_trait]
impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_values() {
        let secs: Vec<u64> = (1..=5).map(|a| backoff_delay(a).as_secs()).collect();
        assert_eq!(secs, vec![2, 4, 8, 16, 32]);
    }

    #[test]
    fn test_backoff_capped_at_60s() {
        assert_eq!(backoff_delay(6), Duration::from_secs(60));
        assert_eq!(backoff_delay(40), Duration::from_secs(60));
        assert_eq!(backoff_delay(u32::MAX), Duration::from_secs(60));
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let mut previous = Duration::ZERO;
        for attempt in 1..=10 {
            let delay = backoff_delay(attempt);
            assert!(delay >= previous);
            previous = delay;
        }
    }

    #[test]
    fn test_retry_state_gives_up_after_max_attempts() {
        let mut state = RetryState::new(3);
        assert_eq!(
            state.record_failure("reset".into(), true),
            RetryDecision::RetryAfter(Duration::from_secs(2))
        );
        state.advance();
        assert_eq!(
            state.record_failure("reset".into(), true),
            RetryDecision::RetryAfter(Duration::from_secs(4))
        );
        state.advance();
        assert_eq!(
            state.record_failure("reset".into(), true),
            RetryDecision::GiveUp
        );
        assert_eq!(state.attempt, 3);
        assert_eq!(state.last_error.as_deref(), Some("reset"));
    }

    #[test]
    fn test_permanent_error_gives_up_immediately() {
        let mut state = RetryState::new(5);
        assert_eq!(
            state.record_failure("HTTP 403".into(), false),
            RetryDecision::GiveUp
        );
        assert_eq!(state.attempt, 1);
    }
}
