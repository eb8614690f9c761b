//! Capped exponential backoff.

use std::time::Duration;

/// Smallest delay between two attempts; a lower `base` is raised to it.
pub const MIN_RETRY_DELAY: Duration = Duration::from_millis(10);

/// Delay before `attempt` (1-based).
///
/// Attempt 1 runs immediately; attempt 2 waits `base`, and every further
/// attempt doubles the previous delay until `max` is reached. No retry
/// waits less than [`MIN_RETRY_DELAY`].
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt <= 1 {
        return Duration::ZERO;
    }
    let base = base.max(MIN_RETRY_DELAY);

    let exponent = (attempt - 2).min(31);
    let delay = base.saturating_mul(2u32.saturating_pow(exponent));
    delay.min(max).max(base)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let max = Duration::from_millis(2000);

        assert_eq!(calculate_backoff(1, base, max), Duration::ZERO);
        assert_eq!(calculate_backoff(2, base, max), Duration::from_millis(100));
        assert_eq!(calculate_backoff(3, base, max), Duration::from_millis(200));
        assert_eq!(calculate_backoff(4, base, max), Duration::from_millis(400));
        assert_eq!(calculate_backoff(10, base, max), max);
        assert_eq!(calculate_backoff(u32::MAX, base, max), max);
    }

    #[test]
    fn test_backoff_non_decreasing() {
        let base = Duration::from_secs(1);
        let max = Duration::from_secs(30);
        let mut previous = Duration::ZERO;
        for attempt in 1..64 {
            let delay = calculate_backoff(attempt, base, max);
            assert!(delay >= previous);
            if attempt > 1 {
                assert!(delay >= base);
            }
            previous = delay;
        }
    }

    #[test]
    fn test_zero_base_is_raised_to_minimum() {
        assert_eq!(calculate_backoff(1, Duration::ZERO, Duration::ZERO), Duration::ZERO);
        assert_eq!(calculate_backoff(2, Duration::ZERO, Duration::ZERO), MIN_RETRY_DELAY);
        assert_eq!(calculate_backoff(50, Duration::ZERO, Duration::ZERO), MIN_RETRY_DELAY);
        assert_eq!(
            calculate_backoff(3, Duration::from_millis(1), Duration::from_secs(1)),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_cap_below_base_keeps_floor() {
        let delay = calculate_backoff(5, Duration::from_secs(2), Duration::from_secs(1));
        assert_eq!(delay, Duration::from_secs(2));
    }
}
