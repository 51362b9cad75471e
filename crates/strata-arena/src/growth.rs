//! Growth policies: how large the buffer becomes when a request overflows.

use crate::config::{MAX_CAPACITY, MIN_GROWTH_SEED};

/// Decides the new capacity of a growable arena.
///
/// `next_capacity(current, additional)` must return a capacity of at least
/// `current + additional`, or `None` to refuse. Results above
/// [`MAX_CAPACITY`] or below the requirement are treated as a refusal.
///
/// Implemented for any `Fn(usize, usize) -> Option<usize> + Send + Sync`.
pub trait GrowthPolicy: Send + Sync {
    /// New capacity for an arena of `current` bytes needing `additional` more.
    fn next_capacity(&self, current: usize, additional: usize) -> Option<usize>;
}

impl<F> GrowthPolicy for F
where
    F: Fn(usize, usize) -> Option<usize> + Send + Sync,
{
    fn next_capacity(&self, current: usize, additional: usize) -> Option<usize> {
        self(current, additional)
    }
}

/// Geometric doubling, the default policy.
///
/// Starts from `max(current, 64)` and doubles until the requirement is
/// met, clamping at [`MAX_CAPACITY`].
#[derive(Clone, Copy, Debug, Default)]
pub struct DoublingGrowth;

impl GrowthPolicy for DoublingGrowth {
    fn next_capacity(&self, current: usize, additional: usize) -> Option<usize> {
        let required = current.checked_add(additional)?;
        if required > MAX_CAPACITY {
            return None;
        }
        let mut capacity = current.max(MIN_GROWTH_SEED);
        while capacity < required {
            capacity = capacity.saturating_mul(2).min(MAX_CAPACITY);
        }
        Some(capacity.min(MAX_CAPACITY))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doubles_until_requirement_met() {
        assert_eq!(DoublingGrowth.next_capacity(64, 36), Some(128));
        assert_eq!(DoublingGrowth.next_capacity(100, 1000), Some(1600));
    }

    #[test]
    fn small_arenas_seed_at_64() {
        assert_eq!(DoublingGrowth.next_capacity(0, 1), Some(64));
        assert_eq!(DoublingGrowth.next_capacity(8, 60), Some(128));
    }

    #[test]
    fn refuses_beyond_max_capacity() {
        assert_eq!(DoublingGrowth.next_capacity(MAX_CAPACITY, 1), None);
        assert_eq!(DoublingGrowth.next_capacity(usize::MAX, 1), None);
    }

    #[test]
    fn clamps_to_max_capacity() {
        let current = MAX_CAPACITY / 2 + 1;
        assert_eq!(
            DoublingGrowth.next_capacity(current, MAX_CAPACITY - current),
            Some(MAX_CAPACITY)
        );
    }

    #[test]
    fn closures_are_policies() {
        let exact = |current: usize, additional: usize| current.checked_add(additional);
        assert_eq!(exact.next_capacity(10, 5), Some(15));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn result_covers_requirement(
                current in 0usize..1 << 24,
                additional in 0usize..1 << 24,
            ) {
                let capacity = DoublingGrowth.next_capacity(current, additional).unwrap();
                prop_assert!(capacity >= current + additional);
                prop_assert!(capacity >= current);
                prop_assert!(capacity <= MAX_CAPACITY);
            }
        }
    }
}
