//! Retry policy for a probing session

use std::time::Duration;

use crate::error::{Error, Result};

/// Timing and termination policy for one probing session
///
/// Invariants: `timeout > 0` and `consecutive_successes >= 1`. An interval
/// of zero is allowed and means attempts run back to back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    timeout: Duration,
    interval: Duration,
    consecutive_successes: u32,
}

impl RetryPolicy {
    /// Create a validated policy
    pub fn new(timeout: Duration, interval: Duration, consecutive_successes: u32) -> Result<Self> {
        if timeout.is_zero() {
            return Err(Error::invalid_policy("timeout must be greater than zero"));
        }
        if consecutive_successes == 0 {
            return Err(Error::invalid_policy(
                "consecutive_successes must be at least 1",
            ));
        }

        Ok(Self {
            timeout,
            interval,
            consecutive_successes,
        })
    }

    /// Create a validated policy from millisecond values
    pub fn from_millis(timeout_ms: u64, interval_ms: u64, consecutive_successes: u32) -> Result<Self> {
        Self::new(
            Duration::from_millis(timeout_ms),
            Duration::from_millis(interval_ms),
            consecutive_successes,
        )
    }

    /// Overall deadline measured from session start
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Pause between the end of one attempt and the start of the next
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Number of back-to-back passing attempts required for success
    pub fn consecutive_successes(&self) -> u32 {
        self.consecutive_successes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_policy() {
        let policy = RetryPolicy::from_millis(5000, 200, 3).unwrap();
        assert_eq!(policy.timeout(), Duration::from_secs(5));
        assert_eq!(policy.interval(), Duration::from_millis(200));
        assert_eq!(policy.consecutive_successes(), 3);
    }

    #[test]
    fn test_zero_interval_allowed() {
        assert!(RetryPolicy::from_millis(1000, 0, 1).is_ok());
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let err = RetryPolicy::from_millis(0, 200, 1).unwrap_err();
        assert!(matches!(err, Error::InvalidPolicy { .. }));
        assert!(err.to_string().contains("timeout"));
    }

    #[test]
    fn test_zero_successes_rejected() {
        let err = RetryPolicy::from_millis(1000, 200, 0).unwrap_err();
        assert!(err.to_string().contains("consecutive_successes"));
    }
}
