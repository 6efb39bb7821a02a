use std::time::Duration;

/// Delay before the next retry attempt, given how many retries have already
/// run.
///
/// The first retry is immediate; after that the delay doubles from `base`
/// and saturates at `cap`:
///
/// ```text
/// retry:  1    2       3        4        ...
/// delay:  0    base    base*2   base*4   ...  (<= cap)
/// ```
pub(crate) fn retry_delay(prior_retries: u32, base: Duration, cap: Duration) -> Duration {
    if prior_retries == 0 {
        return Duration::ZERO;
    }
    let multiplier = 2_u32.saturating_pow(prior_retries - 1);
    base.saturating_mul(multiplier).min(cap)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Duration = Duration::from_secs(2);
    const CAP: Duration = Duration::from_secs(60);

    #[test]
    fn test_first_retry_is_immediate() {
        assert_eq!(retry_delay(0, BASE, CAP), Duration::ZERO);
    }

    #[test]
    fn test_exponential_growth() {
        assert_eq!(retry_delay(1, BASE, CAP), Duration::from_secs(2));
        assert_eq!(retry_delay(2, BASE, CAP), Duration::from_secs(4));
        assert_eq!(retry_delay(3, BASE, CAP), Duration::from_secs(8));
        assert_eq!(retry_delay(4, BASE, CAP), Duration::from_secs(16));
    }

    #[test]
    fn test_cap() {
        assert_eq!(retry_delay(6, BASE, CAP), Duration::from_secs(60));
        assert_eq!(retry_delay(30, BASE, CAP), Duration::from_secs(60));
    }

    #[test]
    fn test_large_retry_counts_do_not_overflow() {
        assert_eq!(retry_delay(u32::MAX, BASE, CAP), CAP);
    }
}
