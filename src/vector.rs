//! Mosquito population models.
//!
//! A vector step takes the infectivity of the human population towards
//! mosquitoes and returns the entomological inoculation rate of the next
//! step. Compartmental models are integrated per species with
//! [`forward_euler`] and their contributions summed.

use crate::config::{VectorConfig, check_num, check_pos};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Right-hand side of a mosquito ODE with `N` state variables.
pub trait MosquitoOde<const N: usize> {
    /// Time derivative of `state` under force of infection `lambda`.
    fn derivative(&self, t: f64, state: &[f64; N], lambda: f64) -> [f64; N];

    /// Human biting rate per mosquito.
    fn biting_rate(&self) -> f64;

    /// Number of infectious mosquitoes in `state`.
    fn infectious(&self, state: &[f64; N]) -> f64;
}

/// Susceptible, exposed and infectious adult mosquitoes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimpleMosquitoParams {
    pub life_expectancy: f64,
    /// Extrinsic incubation period.
    pub incubation_period: f64,
    pub biting_rate: f64,
}

impl SimpleMosquitoParams {
    pub(crate) fn validate(&self) -> Result<()> {
        check_pos(self.life_expectancy).context("invalid life expectancy")?;
        check_pos(self.incubation_period).context("invalid incubation period")?;
        check_num(self.biting_rate, 0.0..f64::INFINITY).context("invalid biting rate")?;
        Ok(())
    }
}

impl MosquitoOde<3> for SimpleMosquitoParams {
    fn derivative(&self, _t: f64, state: &[f64; 3], lambda: f64) -> [f64; 3] {
        let [s, e, i] = *state;
        let mu = 1.0 / self.life_expectancy;
        let gamma = 1.0 / self.incubation_period;
        let m = s + e + i;
        [
            mu * m - lambda * s - mu * s,
            lambda * s - (gamma + mu) * e,
            gamma * e - mu * i,
        ]
    }

    fn biting_rate(&self) -> f64 {
        self.biting_rate
    }

    fn infectious(&self, state: &[f64; 3]) -> f64 {
        state[2]
    }
}

/// Aquatic stages (early instars, late instars, pupae) followed by
/// susceptible, exposed and infectious adults.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LarvalMosquitoParams {
    pub eggs_laid_per_female: f64,
    pub death_rate_early_instars: f64,
    pub development_early_instars: f64,
    pub death_rate_late_instars: f64,
    /// Relative density dependence of late instar mortality.
    pub late_density_factor: f64,
    pub development_late_instars: f64,
    pub development_pupae: f64,
    pub pupae_life_expectancy: f64,
    pub life_expectancy: f64,
    pub sporogony_duration: f64,
    /// Larval carrying capacity.
    pub carrying_capacity: f64,
    pub biting_rate: f64,
}

impl LarvalMosquitoParams {
    pub(crate) fn validate(&self) -> Result<()> {
        check_num(self.eggs_laid_per_female, 0.0..f64::INFINITY)
            .context("invalid number of eggs laid")?;
        check_num(self.death_rate_early_instars, 0.0..f64::INFINITY)
            .context("invalid early instar death rate")?;
        check_pos(self.development_early_instars).context("invalid early instar development")?;
        check_num(self.death_rate_late_instars, 0.0..f64::INFINITY)
            .context("invalid late instar death rate")?;
        check_num(self.late_density_factor, 0.0..f64::INFINITY)
            .context("invalid late density factor")?;
        check_pos(self.development_late_instars).context("invalid late instar development")?;
        check_pos(self.development_pupae).context("invalid pupae development")?;
        check_pos(self.pupae_life_expectancy).context("invalid pupae life expectancy")?;
        check_pos(self.life_expectancy).context("invalid life expectancy")?;
        check_pos(self.sporogony_duration).context("invalid sporogony duration")?;
        check_pos(self.carrying_capacity).context("invalid carrying capacity")?;
        check_num(self.biting_rate, 0.0..f64::INFINITY).context("invalid biting rate")?;
        Ok(())
    }
}

impl MosquitoOde<6> for LarvalMosquitoParams {
    fn derivative(&self, _t: f64, state: &[f64; 6], lambda: f64) -> [f64; 6] {
        let [le, ll, lp, s, e, i] = *state;
        let mu_p = 1.0 / self.pupae_life_expectancy;
        let mu_m = 1.0 / self.life_expectancy;
        let mu_tau = 1.0 / self.sporogony_duration;
        let m = s + e + i;
        let crowding = (le + ll) / self.carrying_capacity;
        let matured = mu_tau * e;
        [
            self.eggs_laid_per_female * m
                - self.death_rate_early_instars * (1.0 + crowding) * le
                - le / self.development_early_instars,
            le / self.development_early_instars
                - self.death_rate_late_instars * (1.0 + self.late_density_factor * crowding) * ll
                - ll / self.development_late_instars,
            ll / self.development_late_instars - mu_p * lp - lp / self.development_pupae,
            // Half of the emerging adults are female.
            0.5 * lp / self.development_pupae - lambda * s - mu_m * s,
            lambda * s - mu_m * e - matured,
            matured - mu_m * i,
        ]
    }

    fn biting_rate(&self) -> f64 {
        self.biting_rate
    }

    fn infectious(&self, state: &[f64; 6]) -> f64 {
        state[5]
    }
}

/// One explicit Euler step of `dt` for the derivative `f`.
pub fn forward_euler<const N: usize>(
    f: impl Fn(&[f64; N]) -> [f64; N],
    state: &[f64; N],
    dt: f64,
) -> [f64; N] {
    let derivative = f(state);
    std::array::from_fn(|idx| state[idx] + dt * derivative[idx])
}

/// Parameters and state of one mosquito species.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
pub struct Species<P, const N: usize> {
    pub name: String,
    pub params: P,
    #[serde(with = "state_array")]
    pub state: [f64; N],
}

/// Advance one species by `dt` and return its new inoculation rate.
///
/// The force of infection on mosquitoes is the biting rate times the human
/// infectivity. Integration never leaves a compartment negative.
pub fn species_step<P: MosquitoOde<N>, const N: usize>(
    t: f64,
    dt: f64,
    infectivity: f64,
    state: &[f64; N],
    params: &P,
) -> ([f64; N], f64) {
    let lambda = params.biting_rate() * infectivity;
    let mut next = forward_euler(|x| params.derivative(t, x, lambda), state, dt);
    for x in &mut next {
        *x = x.max(0.0);
    }
    let eir = params.biting_rate() * params.infectious(&next);
    (next, eir)
}

/// Advance every species independently and sum their inoculation rates.
pub fn multi_species_step<P: MosquitoOde<N>, const N: usize>(
    t: f64,
    dt: f64,
    infectivity: f64,
    species: &mut BTreeMap<String, Species<P, N>>,
) -> f64 {
    let mut eir = 0.0;
    for sp in species.values_mut() {
        let (next, contribution) = species_step(t, dt, infectivity, &sp.state, &sp.params);
        sp.state = next;
        eir += contribution;
    }
    eir
}

/// Vector side of the coupled simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum VectorPopulation {
    Constant { eir: f64 },
    Simple(BTreeMap<String, Species<SimpleMosquitoParams, 3>>),
    Larval(BTreeMap<String, Species<LarvalMosquitoParams, 6>>),
}

impl VectorPopulation {
    pub fn new(cfg: &VectorConfig) -> Self {
        match cfg {
            VectorConfig::Constant { eir } => VectorPopulation::Constant { eir: *eir },
            VectorConfig::Simple { species } => VectorPopulation::Simple(by_name(species)),
            VectorConfig::Larval { species } => VectorPopulation::Larval(by_name(species)),
        }
    }

    /// Advance by `dt` given the human infectivity and return the next EIR.
    pub fn step(&mut self, t: f64, dt: f64, infectivity: f64) -> f64 {
        match self {
            VectorPopulation::Constant { eir } => *eir,
            VectorPopulation::Simple(species) => multi_species_step(t, dt, infectivity, species),
            VectorPopulation::Larval(species) => multi_species_step(t, dt, infectivity, species),
        }
    }

    /// Current state of every species, keyed by name.
    pub fn snapshot(&self) -> BTreeMap<String, Vec<f64>> {
        match self {
            VectorPopulation::Constant { .. } => BTreeMap::new(),
            VectorPopulation::Simple(species) => species
                .iter()
                .map(|(name, sp)| (name.clone(), sp.state.to_vec()))
                .collect(),
            VectorPopulation::Larval(species) => species
                .iter()
                .map(|(name, sp)| (name.clone(), sp.state.to_vec()))
                .collect(),
        }
    }
}

fn by_name<P: Clone, const N: usize>(
    species: &[Species<P, N>],
) -> BTreeMap<String, Species<P, N>> {
    species
        .iter()
        .map(|sp| (sp.name.clone(), sp.clone()))
        .collect()
}

/// Serde adapter for fixed-size state arrays.
mod state_array {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer, const N: usize>(
        state: &[f64; N],
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(state.iter())
    }

    pub fn deserialize<'de, D: Deserializer<'de>, const N: usize>(
        deserializer: D,
    ) -> Result<[f64; N], D::Error> {
        let vec = Vec::<f64>::deserialize(deserializer)?;
        let len = vec.len();
        vec.try_into()
            .map_err(|_| D::Error::custom(format!("state must have {N} elements, but has {len}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn simple() -> SimpleMosquitoParams {
        SimpleMosquitoParams {
            life_expectancy: 10.0,
            incubation_period: 10.0,
            biting_rate: 0.3,
        }
    }

    fn larval() -> LarvalMosquitoParams {
        LarvalMosquitoParams {
            eggs_laid_per_female: 21.19,
            death_rate_early_instars: 0.034,
            development_early_instars: 6.64,
            death_rate_late_instars: 0.035,
            late_density_factor: 13.25,
            development_late_instars: 3.72,
            development_pupae: 0.64,
            pupae_life_expectancy: 4.0,
            life_expectancy: 10.0,
            sporogony_duration: 10.0,
            carrying_capacity: 1e6,
            biting_rate: 0.3,
        }
    }

    #[test]
    fn euler_step_of_linear_decay() {
        let next = forward_euler(|x: &[f64; 1]| [-0.5 * x[0]], &[2.0], 0.1);
        assert!((next[0] - 1.9).abs() < 1e-15);
    }

    #[test]
    fn simple_model_conserves_adults() {
        let params = simple();
        let dx = params.derivative(0.0, &[800.0, 150.0, 50.0], 0.2);
        assert!(dx.iter().sum::<f64>().abs() < 1e-9);
    }

    #[test]
    fn uninfected_simple_model_stays_uninfected() {
        let params = simple();
        let mut state = [1000.0, 0.0, 0.0];
        for step in 0..100 {
            let (next, eir) = species_step(step as f64, 1.0, 0.0, &state, &params);
            assert_eq!(eir, 0.0);
            state = next;
        }
        assert!((state[0] - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn eir_is_biting_rate_times_infectious() {
        let params = simple();
        let (next, eir) = species_step(0.0, 1.0, 0.5, &[900.0, 50.0, 50.0], &params);
        assert!((eir - 0.3 * next[2]).abs() < 1e-12);
        assert!(next[2] > 0.0);
    }

    #[test]
    fn larval_model_without_adults_is_at_rest() {
        let params = larval();
        let dx = params.derivative(0.0, &[0.0; 6], 0.3);
        assert_eq!(dx, [0.0; 6]);
    }

    #[test]
    fn state_never_goes_negative() {
        let params = simple();
        let (next, _) = species_step(0.0, 100.0, 1.0, &[10.0, 0.0, 0.0], &params);
        assert!(next.iter().all(|&x| x >= 0.0));
    }

    #[test]
    fn species_contributions_are_summed() {
        let mut species = BTreeMap::new();
        for name in ["a", "b"] {
            species.insert(
                name.to_string(),
                Species {
                    name: name.to_string(),
                    params: simple(),
                    state: [900.0, 50.0, 50.0],
                },
            );
        }
        let mut vector = VectorPopulation::Simple(species);
        let (_, single) = species_step(0.0, 1.0, 0.1, &[900.0, 50.0, 50.0], &simple());
        let eir = vector.step(0.0, 1.0, 0.1);
        assert!((eir - 2.0 * single).abs() < 1e-12);
        assert_eq!(vector.snapshot().len(), 2);
    }

    #[test]
    fn constant_vector_ignores_infectivity() {
        let mut vector = VectorPopulation::Constant { eir: 7.5 };
        assert_eq!(vector.step(0.0, 1.0, 0.0), 7.5);
        assert_eq!(vector.step(1.0, 1.0, 1.0), 7.5);
        assert!(vector.snapshot().is_empty());
    }
}
