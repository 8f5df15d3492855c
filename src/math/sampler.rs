//! Discrete Gaussian sampling for error generation.
//!
//! One sampler per worker: the sampler is not thread-safe by design, and
//! sharing one across workers serializes every error draw. Parallel phases
//! derive an independent seed per worker from a master seed.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha20Rng;

/// Centered discrete Gaussian sampler with a hard cut-off bound.
pub struct GaussianSampler {
    sigma: f64,
    bound: u64,
    rng: ChaCha20Rng,
}

impl GaussianSampler {
    /// Sampler seeded from OS entropy.
    pub fn new(sigma: f64, bound: u64) -> Self {
        Self {
            sigma,
            bound,
            rng: ChaCha20Rng::from_entropy(),
        }
    }

    /// Deterministic sampler for reproducible key generation and tests.
    pub fn with_seed(sigma: f64, bound: u64, seed: u64) -> Self {
        Self {
            sigma,
            bound,
            rng: ChaCha20Rng::seed_from_u64(seed),
        }
    }

    /// One sample via Box-Muller, rounded and rejected at the bound.
    pub fn sample(&mut self) -> i64 {
        loop {
            let u1: f64 = self.rng.gen_range(0.0001..1.0);
            let u2: f64 = self.rng.gen_range(0.0..1.0);
            let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
            let v = (z * self.sigma).round() as i64;
            if v.unsigned_abs() <= self.bound {
                return v;
            }
        }
    }

    /// `n` samples mapped into [0, q) with negative values wrapped.
    pub fn sample_vec_centered(&mut self, n: usize, q: u64) -> Vec<u64> {
        (0..n)
            .map(|_| {
                let s = self.sample();
                if s >= 0 {
                    (s as u64) % q
                } else {
                    q - ((-s) as u64 % q)
                }
            })
            .collect()
    }

    pub fn sigma(&self) -> f64 {
        self.sigma
    }

    pub fn bound(&self) -> u64 {
        self.bound
    }
}
