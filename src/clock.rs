//! Shared source of random draws.

use anyhow::Result;
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::StandardNormal;
use serde::{Deserialize, Serialize};

/// Random number source consumed by every probabilistic decision of a run.
///
/// The order in which draws are taken is part of the model: replaying a run
/// with the same seed reproduces it only if every decision consumes the same
/// number of draws in the same order.
#[derive(Clone, Serialize, Deserialize)]
pub struct RateClock {
    rng: ChaCha12Rng,
}

impl RateClock {
    /// Create a clock from a fixed seed.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: ChaCha12Rng::seed_from_u64(seed),
        }
    }

    /// Create a clock seeded by the operating system.
    pub fn from_os_rng() -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;
        Ok(Self { rng })
    }

    /// Uniform draw in `[0, 1)`.
    pub fn uniform(&mut self) -> f64 {
        self.rng.random::<f64>()
    }

    /// Decide whether an event of the given `rate` happens within `dt`.
    ///
    /// Always consumes exactly one draw.
    pub fn event_occurs(&mut self, rate: f64, dt: f64) -> bool {
        self.uniform() < event_probability(rate, dt)
    }

    /// Uniform index in `0..len`.
    pub fn index(&mut self, len: usize) -> usize {
        assert!(len > 0, "cannot sample an index from an empty range");
        self.rng.random_range(0..len)
    }

    /// Log-normal draw with the given log-mean and log-standard deviation.
    pub fn log_normal(&mut self, log_mean: f64, log_sd: f64) -> f64 {
        let z: f64 = self.rng.sample(StandardNormal);
        (log_mean + log_sd * z).exp()
    }

    /// Exponential draw with the given rate conditioned on lying below `max`.
    ///
    /// Samples by inversion, so it always consumes exactly one draw. A zero
    /// rate gives a uniform draw in `[0, max)`.
    pub fn truncated_exponential(&mut self, rate: f64, max: f64) -> f64 {
        let u = self.uniform();
        let val = if rate > 0.0 {
            let mass = -(-rate * max).exp_m1();
            -(-u * mass).ln_1p() / rate
        } else {
            u * max
        };
        // Rounding can land on the bound itself.
        val.min(max * (1.0 - f64::EPSILON))
    }
}

/// Probability that an event of constant `rate` occurs within `dt`.
pub fn event_probability(rate: f64, dt: f64) -> f64 {
    -(-rate * dt).exp_m1()
}
