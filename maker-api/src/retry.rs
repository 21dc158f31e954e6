//! Retry policy for Maker API requests.
//!
//! The policy is split into pure pieces so it can be tested without a
//! network: [`RetryPolicy::delay_for`] maps an attempt number to a delay, and
//! [`classify_status`] / [`classify_transport`] decide whether a failure is
//! worth another attempt.

use std::time::Duration;

/// What to do about a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again after the policy's delay
    Retry,
    /// Give up and surface the failure
    Fail,
}

/// Kinds of failure that happen before a usable response exists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportFailure {
    /// The connection could not be established or was dropped
    Connect,
    /// The request or response timed out
    Timeout,
    /// The response body could not be decoded as JSON
    Decode,
    /// Anything else (request construction, redirects)
    Other,
}

impl TransportFailure {
    /// Classify a reqwest error.
    pub fn of(error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            TransportFailure::Timeout
        } else if error.is_connect() || error.is_request() || error.is_body() {
            TransportFailure::Connect
        } else if error.is_decode() {
            TransportFailure::Decode
        } else {
            TransportFailure::Other
        }
    }
}

/// Retry on server errors and request timeouts, nothing else.
pub fn classify_status(status: u16) -> RetryDecision {
    if status >= 500 || status == 408 {
        RetryDecision::Retry
    } else {
        RetryDecision::Fail
    }
}

pub fn classify_transport(failure: TransportFailure) -> RetryDecision {
    match failure {
        TransportFailure::Connect | TransportFailure::Timeout | TransportFailure::Decode => {
            RetryDecision::Retry
        }
        TransportFailure::Other => RetryDecision::Fail,
    }
}

/// How many times a request is attempted and how long to wait in between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Delay unit; the wait after attempt `k` is `k * base_delay`
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay before the attempt that follows attempt number `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    /// Whether another attempt should follow attempt number `attempt`.
    pub fn should_retry(&self, attempt: u32, decision: RetryDecision) -> bool {
        decision == RetryDecision::Retry && attempt < self.max_attempts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rstest::rstest;

    #[rstest]
    #[case(500, RetryDecision::Retry)]
    #[case(502, RetryDecision::Retry)]
    #[case(503, RetryDecision::Retry)]
    #[case(408, RetryDecision::Retry)]
    #[case(400, RetryDecision::Fail)]
    #[case(401, RetryDecision::Fail)]
    #[case(404, RetryDecision::Fail)]
    #[case(429, RetryDecision::Fail)]
    fn test_classify_status(#[case] status: u16, #[case] expected: RetryDecision) {
        assert_eq!(classify_status(status), expected);
    }

    #[rstest]
    #[case(TransportFailure::Connect, RetryDecision::Retry)]
    #[case(TransportFailure::Timeout, RetryDecision::Retry)]
    #[case(TransportFailure::Decode, RetryDecision::Retry)]
    #[case(TransportFailure::Other, RetryDecision::Fail)]
    fn test_classify_transport(#[case] failure: TransportFailure, #[case] expected: RetryDecision) {
        assert_eq!(classify_transport(failure), expected);
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.delay_for(1), Duration::from_millis(500));
        assert_eq!(policy.delay_for(2), Duration::from_millis(1000));
    }

    #[test]
    fn test_should_retry_stops_at_ceiling() {
        let policy = RetryPolicy::default();
        assert!(policy.should_retry(1, RetryDecision::Retry));
        assert!(policy.should_retry(2, RetryDecision::Retry));
        assert!(!policy.should_retry(3, RetryDecision::Retry));
        assert!(!policy.should_retry(1, RetryDecision::Fail));
    }

    #[test]
    fn test_zero_attempts_is_clamped() {
        let policy = RetryPolicy::new(0, Duration::from_millis(10));
        assert_eq!(policy.max_attempts, 1);
        assert!(!policy.should_retry(1, RetryDecision::Retry));
    }

    proptest! {
        #[test]
        fn prop_delay_is_linear_in_attempt(base_ms in 0u64..10_000, attempt in 1u32..20) {
            let policy = RetryPolicy::new(3, Duration::from_millis(base_ms));
            prop_assert_eq!(
                policy.delay_for(attempt),
                Duration::from_millis(base_ms * attempt as u64)
            );
            prop_assert!(policy.delay_for(attempt + 1) >= policy.delay_for(attempt));
        }

        #[test]
        fn prop_attempts_never_exceed_ceiling(max in 1u32..10) {
            let policy = RetryPolicy::new(max, Duration::ZERO);
            let mut attempts = 1;
            while policy.should_retry(attempts, RetryDecision::Retry) {
                attempts += 1;
            }
            prop_assert_eq!(attempts, max);
        }
    }
}
