//! Exponential backoff with jitter.

use std::time::Duration;
use rand::Rng;

/// Delay before retry `attempt` (1-based): `base * 2^(attempt-1)`, capped at
/// `max`, plus up to 10% jitter. The jitter never pushes the delay past `max`.
pub fn calculate_backoff(attempt: u32, base: Duration, max: Duration) -> Duration {
    if attempt == 0 {
        return Duration::ZERO;
    }

    let base_ms = base.as_millis().min(u64::MAX as u128) as u64;
    let max_ms = max.as_millis().min(u64::MAX as u128) as u64;

    let exponential_base = 2u64.saturating_pow(attempt - 1);
    let delay_ms = base_ms.saturating_mul(exponential_base);
    let capped_delay = delay_ms.min(max_ms);

    let jitter_range = capped_delay / 10;
    let jitter = if jitter_range > 0 {
        rand::thread_rng().gen_range(0..jitter_range)
    } else {
        0
    };

    Duration::from_millis(capped_delay.saturating_add(jitter).min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        let base = Duration::from_millis(100);
        let max = Duration::from_secs(2);

        assert_eq!(calculate_backoff(0, base, max), Duration::ZERO);

        let b1 = calculate_backoff(1, base, max);
        assert!(b1 >= Duration::from_millis(100) && b1 < Duration::from_millis(110));

        let b2 = calculate_backoff(2, base, max);
        assert!(b2 >= Duration::from_millis(200));

        let capped = calculate_backoff(20, base, Duration::from_secs(1));
        assert_eq!(capped, Duration::from_secs(1));
    }

    #[test]
    fn test_backoff_huge_attempt_does_not_overflow() {
        let d = calculate_backoff(u32::MAX, Duration::from_secs(30), Duration::from_secs(86_400));
        assert_eq!(d, Duration::from_secs(86_400));
    }
}
