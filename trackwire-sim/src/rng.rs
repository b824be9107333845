//! Seeded random number generation for the simulated sender.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Single owned RNG threaded through spawning, kinematics and faults.
///
/// The same seed always reproduces the same entity layout and fault timeline.
#[derive(Debug)]
pub struct SimRng {
    rng: ChaCha8Rng,
    seed: u64,
}

impl SimRng {
    /// Creates RNG from seed value.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            seed,
        }
    }

    /// Creates RNG from the configured seed, or a fresh random one.
    pub fn from_optional_seed(seed: Option<u64>) -> Self {
        Self::from_seed(seed.unwrap_or_else(rand::random::<u64>))
    }

    /// Returns the seed used for this RNG.
    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Uniform float in [min, max). Returns `min` for an empty or unbounded range.
    pub fn uniform(&mut self, min: f64, max: f64) -> f64 {
        if min >= max || !min.is_finite() || !max.is_finite() {
            return min;
        }
        self.rng.random_range(min..max)
    }

    /// Uniform integer in [min, max], both inclusive.
    pub fn uniform_inclusive(&mut self, min: u32, max: u32) -> u32 {
        if min >= max {
            return min;
        }
        self.rng.random_range(min..=max)
    }

    /// Returns true with the given probability, clamped to [0, 1].
    pub fn chance(&mut self, probability: f64) -> bool {
        if !probability.is_finite() || probability <= 0.0 {
            return false;
        }
        self.rng.random_bool(probability.min(1.0))
    }

    /// Uniform index into a collection of `len` elements.
    pub fn index(&mut self, len: usize) -> Option<usize> {
        (len > 0).then(|| self.rng.random_range(0..len))
    }

    /// Selects random element from slice.
    pub fn choose<'a, T>(&mut self, slice: &'a [T]) -> Option<&'a T> {
        self.index(slice.len()).map(|index| &slice[index])
    }
}
