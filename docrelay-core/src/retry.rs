use serde::{Deserialize, Serialize};
use std::time::Duration;

/// When, and after how long, the HTTP transport resends a failed request.
///
/// Delays grow exponentially from `initial_backoff_ms` by
/// `backoff_multiplier` per resend and never exceed `max_backoff_ms`.
/// A request that failed before a connection was made is always safe to
/// resend. Failures after that point (timeouts, resets) are only resent for
/// idempotent methods, and only while `resend_idempotent` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Resends after the first attempt; 0 disables retrying
    pub max_retries: u32,

    /// Delay before the first resend, in milliseconds
    pub initial_backoff_ms: u64,

    /// Upper bound for a single delay, in milliseconds
    pub max_backoff_ms: u64,

    /// Growth factor between consecutive delays
    pub backoff_multiplier: f64,

    /// Resend idempotent requests that may already have reached the server
    pub resend_idempotent: bool,
}

impl RetryPolicy {
    /// Never resend.
    pub fn disabled() -> Self {
        Self {
            max_retries: 0,
            initial_backoff_ms: 0,
            max_backoff_ms: 0,
            backoff_multiplier: 1.0,
            resend_idempotent: false,
        }
    }

    /// A few quick resends, for servers on the local network.
    pub fn fast() -> Self {
        Self {
            max_retries: 3,
            initial_backoff_ms: 10,
            max_backoff_ms: 100,
            backoff_multiplier: 2.0,
            resend_idempotent: true,
        }
    }

    /// More resends spread over several seconds, to ride out a server restart.
    pub fn patient() -> Self {
        Self {
            max_retries: 5,
            initial_backoff_ms: 100,
            max_backoff_ms: 5000,
            backoff_multiplier: 2.0,
            resend_idempotent: true,
        }
    }

    /// Only resend requests the server cannot have seen.
    pub fn connect_failures_only(mut self) -> Self {
        self.resend_idempotent = false;
        self
    }

    /// Delay before resend number `retry` (0-indexed), or `None` once the
    /// policy is exhausted.
    pub fn next_backoff(&self, retry: u32) -> Option<Duration> {
        if retry >= self.max_retries {
            return None;
        }
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let delay_ms = (self.initial_backoff_ms as f64 * self.backoff_multiplier.powi(exponent))
            .min(self.max_backoff_ms as f64);
        Some(Duration::from_millis(delay_ms as u64))
    }

    /// Validate policy values
    pub fn validate(&self) -> Result<(), String> {
        if !self.backoff_multiplier.is_finite() || self.backoff_multiplier < 1.0 {
            return Err("retry backoff_multiplier must be at least 1.0".to_string());
        }
        if self.initial_backoff_ms > self.max_backoff_ms {
            return Err(format!(
                "retry initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                self.initial_backoff_ms, self.max_backoff_ms
            ));
        }
        Ok(())
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fast()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_waits() {
        let policy = RetryPolicy::disabled();
        assert_eq!(policy.next_backoff(0), None);
        assert!(policy.validate().is_ok());
    }

    #[test]
    fn test_delays_grow_until_exhausted() {
        let policy = RetryPolicy::patient();
        let delays: Vec<u128> = (0..6)
            .map_while(|retry| policy.next_backoff(retry))
            .map(|d| d.as_millis())
            .collect();

        assert_eq!(delays, vec![100, 200, 400, 800, 1600]);
    }

    #[test]
    fn test_delay_is_capped() {
        let policy = RetryPolicy {
            max_retries: u32::MAX,
            ..RetryPolicy::fast()
        };
        assert_eq!(policy.next_backoff(20), Some(Duration::from_millis(100)));
        assert_eq!(policy.next_backoff(u32::MAX - 1), Some(Duration::from_millis(100)));
    }

    #[test]
    fn test_connect_failures_only() {
        let policy = RetryPolicy::fast().connect_failures_only();
        assert!(!policy.resend_idempotent);
        assert_eq!(policy.next_backoff(0), Some(Duration::from_millis(10)));
    }

    #[test]
    fn test_validate() {
        assert!(RetryPolicy::fast().validate().is_ok());

        let shrinking = RetryPolicy { backoff_multiplier: 0.5, ..RetryPolicy::fast() };
        assert!(shrinking.validate().is_err());

        let inverted = RetryPolicy { initial_backoff_ms: 500, ..RetryPolicy::fast() };
        assert!(inverted.validate().is_err());
    }

    #[test]
    fn test_partial_json_takes_defaults() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"max_retries": 7}"#).unwrap();
        assert_eq!(policy.max_retries, 7);
        assert_eq!(policy.initial_backoff_ms, RetryPolicy::fast().initial_backoff_ms);
        assert!(policy.resend_idempotent);
    }
}
