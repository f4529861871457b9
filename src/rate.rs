use std::time::Duration;

/// Smallest rate (bytes per second) a pool hands out.
///
/// Every pool allocation is a multiple of this unit. Tiny allocations cost
/// more to account for than they are worth.
///
/// Must be a power of 2.
pub const MIN_ALLOCATION: u64 = 1 << 10;

/// Round a requested rate up to the pool's allocation granularity.
///
/// - `0` becomes [`MIN_ALLOCATION`].
/// - Any other value becomes the smallest multiple of [`MIN_ALLOCATION`]
///   which is `>= requested`.
/// - Values too close to `u64::MAX` to round up saturate to the largest
///   multiple representable.
///
/// # Example
///
/// ```
/// use ratepool::{normalize_rate, MIN_ALLOCATION};
///
/// assert_eq!(normalize_rate(0), MIN_ALLOCATION);
/// assert_eq!(normalize_rate(3000), 4096);
/// assert_eq!(normalize_rate(8192), 8192);
/// ```
pub fn normalize_rate(requested: u64) -> u64 {
    if requested == 0 {
        return MIN_ALLOCATION;
    }

    requested
        .div_ceil(MIN_ALLOCATION)
        .checked_mul(MIN_ALLOCATION)
        .unwrap_or(u64::MAX & !(MIN_ALLOCATION - 1))
}

/// How long moving `len` bytes takes at `per_second` bytes per second.
pub(crate) fn transfer_time(len: usize, per_second: u64) -> Duration {
    Duration::from_secs_f64(len as f64 / per_second as f64)
}

/// How many bytes `per_second` allows over `elapsed`, truncated.
pub(crate) fn allowance(elapsed: Duration, per_second: u64) -> u64 {
    (elapsed.as_secs_f64() * per_second as f64) as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    #[test]
    fn zero_becomes_min_allocation() {
        assert_eq!(normalize_rate(0), MIN_ALLOCATION);
    }

    #[test]
    fn rounds_up_to_unit() {
        assert_eq!(normalize_rate(1), 1024);
        assert_eq!(normalize_rate(1023), 1024);
        assert_eq!(normalize_rate(1024), 1024);
        assert_eq!(normalize_rate(1025), 2048);
        assert_eq!(normalize_rate(3000), 4096);
        assert_eq!(normalize_rate(5000), 5120);
    }

    #[test]
    fn smallest_multiple_not_below_request() {
        let mut rng = rand::thread_rng();

        for _ in 0..10_000 {
            let requested: u64 = rng.gen_range(1..=1 << 40);
            let normalized = normalize_rate(requested);

            assert_eq!(normalized % MIN_ALLOCATION, 0);
            assert!(normalized >= requested);
            assert!(normalized - requested < MIN_ALLOCATION);
        }
    }

    #[test]
    fn saturates_near_max() {
        let top = u64::MAX & !(MIN_ALLOCATION - 1);

        assert_eq!(normalize_rate(top), top);
        assert_eq!(normalize_rate(u64::MAX), top);
    }

    #[test]
    fn allowance_truncates() {
        assert_eq!(allowance(Duration::from_millis(1500), 1000), 1500);
        assert_eq!(allowance(Duration::from_micros(999), 1000), 0);
        assert_eq!(allowance(Duration::default(), 1000), 0);
    }

    #[test]
    fn transfer_time_scales_with_len() {
        assert_eq!(transfer_time(512, 1024), Duration::from_millis(500));
        assert_eq!(transfer_time(0, 1024), Duration::default());
    }
}
