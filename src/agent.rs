//! Individuals of the human population.

use crate::config::DemographyConfig;
use serde::{Deserialize, Serialize};

/// Demographic and exposure parameters shared by every disease model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Demography {
    /// Background death rate (inverse life expectancy).
    pub death_rate: f64,
    /// Agents at or above this age are replaced.
    pub max_age: f64,
    /// Age scale of the age-weight function.
    pub age_0: f64,
    /// Maximum reduction of exposure at birth.
    pub rho: f64,
    /// Agents in `[min_birth_age, max_birth_age]` contribute to the maternal pool.
    pub min_birth_age: f64,
    pub max_birth_age: f64,
    /// Fraction of the birthing agent's immunity passed to a newborn.
    pub proportion_maternal_immunity: f64,
    /// Log-normal parameters of the biting heterogeneity.
    pub biting_rate_log_mean: f64,
    pub biting_rate_log_sd: f64,
}

impl Demography {
    pub fn new(cfg: &DemographyConfig) -> Self {
        Self {
            death_rate: 1.0 / cfg.life_expectancy,
            max_age: cfg.max_age,
            age_0: cfg.age_0,
            rho: cfg.rho,
            min_birth_age: cfg.min_birth_age,
            max_birth_age: cfg.max_birth_age,
            proportion_maternal_immunity: cfg.proportion_maternal_immunity,
            biting_rate_log_mean: cfg.biting_rate_log_mean,
            biting_rate_log_sd: cfg.biting_rate_log_sd,
        }
    }

    /// Relative exposure of an agent of the given age.
    pub fn age_weight(&self, age: f64) -> f64 {
        1.0 - self.rho * (-age / self.age_0).exp()
    }

    pub fn is_birthing_capable(&self, age: f64) -> bool {
        (self.min_birth_age..=self.max_birth_age).contains(&age)
    }
}

/// Individual of the population.
///
/// `S` is the disease-specific status carried by the agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Agent<S> {
    age: f64,
    zeta: f64,
    omega: f64,
    status: S,
}

impl<S> Agent<S> {
    /// Create an agent of the given age, biting heterogeneity and status.
    pub fn new(age: f64, zeta: f64, status: S, demography: &Demography) -> Self {
        Self {
            age,
            zeta,
            omega: demography.age_weight(age),
            status,
        }
    }

    pub fn age(&self) -> f64 {
        self.age
    }

    /// Biting heterogeneity, fixed at birth.
    pub fn zeta(&self) -> f64 {
        self.zeta
    }

    /// Age weight at the current age.
    pub fn omega(&self) -> f64 {
        self.omega
    }

    /// Weighted exposure `omega * zeta`.
    pub fn exposure(&self) -> f64 {
        self.omega * self.zeta
    }

    pub fn status(&self) -> &S {
        &self.status
    }

    pub fn status_mut(&mut self) -> &mut S {
        &mut self.status
    }

    /// Advance the age by `dt` and refresh the age weight.
    pub fn grow_older(&mut self, dt: f64, demography: &Demography) {
        self.age += dt;
        self.omega = demography.age_weight(self.age);
    }
}
