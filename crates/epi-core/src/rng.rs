//! Deterministic simulation RNG wrapper.
//!
//! # Determinism strategy
//!
//! The engine owns one root `SimRng` seeded from `EngineConfig::seed`.  Every
//! worker thread receives its own child stream:
//!
//!   child_seed = root.next_u64() XOR (worker_index * MIXING_CONSTANT)
//!
//! The mixing constant is the 64-bit fractional part of the golden ratio,
//! which spreads consecutive worker indices uniformly across the seed space.
//! Workers never share RNG state, so no synchronisation is needed, and a run
//! is reproducible for a fixed seed and worker count.

use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// 64-bit fractional golden-ratio constant for seed mixing.
const MIXING_CONSTANT: u64 = 0x9e37_79b9_7f4a_7c15;

/// Simulation RNG used by the per-cell algorithms.
///
/// Used only from the owning thread.  If you need parallel randomness, give
/// each worker thread its own `SimRng` derived with [`child`][Self::child].
pub struct SimRng(SmallRng);

impl SimRng {
    pub fn new(seed: u64) -> Self {
        SimRng(SmallRng::seed_from_u64(seed))
    }

    /// Derive a child `SimRng` with a different seed offset, used to seed
    /// per-worker RNGs deterministically from the root seed.
    pub fn child(&mut self, offset: u64) -> SimRng {
        let child_seed: u64 = self.0.r#gen::<u64>() ^ offset.wrapping_mul(MIXING_CONSTANT);
        SimRng(SmallRng::seed_from_u64(child_seed))
    }

    /// Expose the inner `SmallRng` for use with `rand` / `rand_distr`
    /// distribution types (`dist.sample(rng.inner())`).
    #[inline]
    pub fn inner(&mut self) -> &mut SmallRng {
        &mut self.0
    }

    /// Uniform sample on the open interval `(0, 1)`.
    ///
    /// Both ends are excluded so the result is safe to pass to `ln` and to
    /// use as a strict fraction of a cumulative sum.
    #[inline]
    pub fn open01(&mut self) -> f64 {
        self.0.sample(rand::distributions::Open01)
    }

    /// Exponential waiting time with rate `lambda`; `f64::INFINITY` when the
    /// rate is not positive.
    #[inline]
    pub fn exp_time(&mut self, lambda: f64) -> f64 {
        if lambda > 0.0 {
            -self.open01().ln() / lambda
        } else {
            f64::INFINITY
        }
    }

    #[inline]
    pub fn gen_range<T, R>(&mut self, range: R) -> T
    where
        T: rand::distributions::uniform::SampleUniform,
        R: rand::distributions::uniform::SampleRange<T>,
    {
        self.0.gen_range(range)
    }
}
