//! Backoff delay calculation.

use std::time::Duration;

/// Fixed delay used by the baseline failure policy.
pub const DEFAULT_BACKOFF: Duration = Duration::from_secs(10);

/// Default upper bound on random jitter added to exponential delays.
pub const BACKOFF_JITTER_MAX: Duration = Duration::from_secs(5);

/// Calculate an exponential backoff delay with jitter.
///
/// Uses exponential backoff with random jitter to avoid every client
/// hammering the server in lockstep after an outage.
///
/// Formula: min(max, base * 2^(attempt-1)) + random(0..=jitter_max)
///
/// `attempt` is 1-based; 0 is treated as 1.
pub fn exponential_backoff(
    attempt: u32,
    base: Duration,
    max: Duration,
    jitter_max: Duration,
) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let scaled = base.saturating_mul(1u32 << exponent).min(max);
    scaled + random_jitter(jitter_max)
}

/// Random duration in `0..=max` at millisecond granularity.
fn random_jitter(max: Duration) -> Duration {
    let max_ms = max.as_millis() as u64;
    if max_ms == 0 {
        return Duration::ZERO;
    }
    let mut bytes = [0u8; 8];
    if getrandom::getrandom(&mut bytes).is_err() {
        return Duration::ZERO;
    }
    let random = u64::from_le_bytes(bytes);
    Duration::from_millis(random % (max_ms + 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEC: Duration = Duration::from_secs(1);

    #[test]
    fn grows_exponentially_without_jitter() {
        let max = Duration::from_secs(300);
        assert_eq!(exponential_backoff(1, SEC, max, Duration::ZERO), SEC);
        assert_eq!(exponential_backoff(2, SEC, max, Duration::ZERO), 2 * SEC);
        assert_eq!(exponential_backoff(4, SEC, max, Duration::ZERO), 8 * SEC);
    }

    #[test]
    fn attempt_zero_behaves_like_first() {
        assert_eq!(
            exponential_backoff(0, SEC, 60 * SEC, Duration::ZERO),
            exponential_backoff(1, SEC, 60 * SEC, Duration::ZERO)
        );
    }

    #[test]
    fn capped_at_max_plus_jitter() {
        for attempt in [6, 10, 100, u32::MAX] {
            let delay = exponential_backoff(attempt, SEC, 30 * SEC, BACKOFF_JITTER_MAX);
            assert!(delay >= 30 * SEC);
            assert!(delay <= 30 * SEC + BACKOFF_JITTER_MAX);
        }
    }

    #[test]
    fn jitter_creates_variance() {
        let delays: Vec<Duration> = (0..20)
            .map(|_| exponential_backoff(1, SEC, 60 * SEC, BACKOFF_JITTER_MAX))
            .collect();
        let first = delays[0];
        assert!(
            delays.iter().any(|d| *d != first),
            "20 jittered delays should not all be identical"
        );
    }

    #[test]
    fn default_backoff_is_ten_seconds() {
        assert_eq!(DEFAULT_BACKOFF, Duration::from_secs(10));
    }
}
