//! Alignment and overflow-checked size arithmetic.
//!
//! All helpers return `None` instead of wrapping, so callers can turn an
//! overflow into an ordinary allocation failure.

/// Whether `alignment` is a positive power of two.
#[inline]
pub fn is_power_of_two(alignment: usize) -> bool {
    alignment.is_power_of_two()
}

/// Round `value` up to the next multiple of `alignment`.
///
/// `alignment` must be a power of two. Returns `None` on overflow.
#[inline]
pub fn align_up(value: usize, alignment: usize) -> Option<usize> {
    debug_assert!(alignment.is_power_of_two());
    let mask = alignment - 1;
    value.checked_add(mask).map(|v| v & !mask)
}

/// Bytes needed to move `value` forward to the next multiple of `alignment`.
#[inline]
pub fn padding_for(value: usize, alignment: usize) -> Option<usize> {
    align_up(value, alignment).map(|aligned| aligned - value)
}

/// `count * size`, or `None` on overflow.
#[inline]
pub fn checked_size(count: usize, size: usize) -> Option<usize> {
    count.checked_mul(size)
}

/// Smallest power of two `>= value` (1 for 0), or `None` on overflow.
#[inline]
pub fn next_power_of_two(value: usize) -> Option<usize> {
    value.checked_next_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn align_up_rounds_to_multiple() {
        assert_eq!(align_up(0, 8), Some(0));
        assert_eq!(align_up(1, 8), Some(8));
        assert_eq!(align_up(8, 8), Some(8));
        assert_eq!(align_up(9, 16), Some(16));
        assert_eq!(align_up(17, 1), Some(17));
    }

    #[test]
    fn align_up_overflow_is_none() {
        assert_eq!(align_up(usize::MAX, 2), None);
        assert_eq!(align_up(usize::MAX - 3, 8), None);
    }

    #[test]
    fn padding_is_distance_to_boundary() {
        assert_eq!(padding_for(10, 16), Some(6));
        assert_eq!(padding_for(32, 16), Some(0));
    }

    #[test]
    fn zero_and_non_powers_rejected() {
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(3));
        assert!(!is_power_of_two(24));
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(4096));
    }

    #[test]
    fn checked_size_detects_overflow() {
        assert_eq!(checked_size(4, 8), Some(32));
        assert_eq!(checked_size(usize::MAX, 2), None);
    }

    #[test]
    fn next_power_of_two_cases() {
        assert_eq!(next_power_of_two(0), Some(1));
        assert_eq!(next_power_of_two(5), Some(8));
        assert_eq!(next_power_of_two(64), Some(64));
        assert_eq!(next_power_of_two(usize::MAX), None);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn aligned_value_is_multiple_and_minimal(
                value in 0usize..1 << 40,
                shift in 0u32..13,
            ) {
                let alignment = 1usize << shift;
                let aligned = align_up(value, alignment).unwrap();
                prop_assert_eq!(aligned % alignment, 0);
                prop_assert!(aligned >= value);
                prop_assert!(aligned - value < alignment);
            }
        }
    }
}
