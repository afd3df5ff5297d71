//! Small arithmetic helpers shared by the file wrappers.

/// Larger of two unsigned 64-bit values.
#[inline]
pub const fn max_u64(a: u64, b: u64) -> u64 {
    if a > b { a } else { b }
}

/// Smaller of two unsigned 64-bit values.
#[inline]
pub const fn min_u64(a: u64, b: u64) -> u64 {
    if a > b { b } else { a }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_u64() {
        assert_eq!(max_u64(3, 7), 7);
        assert_eq!(max_u64(7, 3), 7);
        assert_eq!(max_u64(5, 5), 5);
        assert_eq!(max_u64(0, u64::MAX), u64::MAX);
    }

    #[test]
    fn test_min_u64() {
        assert_eq!(min_u64(3, 7), 3);
        assert_eq!(min_u64(7, 3), 3);
        assert_eq!(min_u64(5, 5), 5);
        assert_eq!(min_u64(0, u64::MAX), 0);
    }

    #[test]
    fn test_max_then_subtract_never_underflows() {
        // max(a, b) - b is the saturating form of a - b
        for (a, b) in [(0u64, 10u64), (16, 10), (32, 0), (0, 0)] {
            assert_eq!(max_u64(a, b) - b, a.saturating_sub(b));
        }
    }
}
