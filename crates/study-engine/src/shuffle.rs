//! Seedable uniform permutation and sampling.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

/// Rng for reproducible orderings.
pub fn seeded(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Shuffle in place (Fisher-Yates).
pub fn shuffle<T, R: Rng + ?Sized>(items: &mut [T], rng: &mut R) {
    items.shuffle(rng);
}

/// Uniform random sample of up to `count` items, in random order.
pub fn sample<T: Clone, R: Rng + ?Sized>(items: &[T], count: usize, rng: &mut R) -> Vec<T> {
    items.choose_multiple(rng, count).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_same_seed_same_order() {
        let mut a: Vec<u32> = (0..20).collect();
        let mut b = a.clone();
        shuffle(&mut a, &mut seeded(7));
        shuffle(&mut b, &mut seeded(7));
        assert_eq!(a, b);
    }

    #[test]
    fn test_sample_caps_at_len() {
        let items = vec![1, 2, 3];
        assert_eq!(sample(&items, 10, &mut seeded(1)).len(), 3);
        assert_eq!(sample(&items, 2, &mut seeded(1)).len(), 2);
        assert!(sample::<u8, _>(&[], 5, &mut seeded(1)).is_empty());
    }

    proptest! {
        #[test]
        fn prop_shuffle_is_permutation(items in prop::collection::vec(any::<u16>(), 0..50), seed: u64) {
            let mut out = items.clone();
            shuffle(&mut out, &mut seeded(seed));
            let mut original = items.clone();
            out.sort_unstable();
            original.sort_unstable();
            prop_assert_eq!(out, original);
        }
    }
}
