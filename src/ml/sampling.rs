//! Seeded sampling helpers.
//!
//! All randomness in training goes through `seeded_rng` so that identical
//! seeds produce identical resamples, splits and bootstraps on every
//! platform. `ChaCha8Rng` is used rather than `StdRng` because its output
//! stream is stable across `rand` releases.

use rand::Rng;
use rand::SeedableRng;
use rand::seq::SliceRandom;
use rand_chacha::ChaCha8Rng;

/// Default seed for every stochastic training step.
pub const DEFAULT_SEED: u64 = 42;

/// Create a deterministic RNG from a `u64` seed.
pub fn seeded_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Draws `n_samples` items from `items` uniformly with replacement.
///
/// Returns an empty vector when `items` is empty.
pub fn resample_with_replacement<T: Clone, R: Rng>(items: &[T], n_samples: usize, rng: &mut R) -> Vec<T> {
    if items.is_empty() {
        return Vec::new();
    }
    (0..n_samples)
        .map(|_| items[rng.gen_range(0..items.len())].clone())
        .collect()
}

/// Number of rows held out for testing: `ceil(n * test_fraction)`, clamped so
/// that at least one training row remains whenever `n > 0`.
pub fn test_set_size(n: usize, test_fraction: f64) -> usize {
    let wanted = (n as f64 * test_fraction.clamp(0.0, 1.0)).ceil() as usize;
    wanted.min(n.saturating_sub(1))
}

/// Shuffles `items` and splits them into `(train, test)`.
///
/// The first `test_set_size` items of the shuffled order form the test set.
pub fn train_test_split<T, R: Rng>(mut items: Vec<T>, test_fraction: f64, rng: &mut R) -> (Vec<T>, Vec<T>) {
    let n_test = test_set_size(items.len(), test_fraction);
    items.shuffle(rng);
    let train = items.split_off(n_test);
    (train, items)
}
