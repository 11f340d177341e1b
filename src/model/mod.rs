//! Disease state machines.
//!
//! A [`DiseaseModel`] maps the status of one agent, its force of infection,
//! the time and the step size to a new status, a death flag and the agent's
//! infectivity towards the vector population.

pub mod falciparum;
pub mod vivax;

use crate::agent::Demography;
use crate::clock::RateClock;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::fmt::Debug;

/// Number of compartments of every disease model.
pub const N_COMPARTMENTS: usize = 6;

/// Closed set of disease states.
pub trait Compartment: Copy + Eq + Debug {
    /// Every compartment, in tally order.
    const ALL: [Self; N_COMPARTMENTS];

    /// Position of the compartment in [`Compartment::ALL`].
    fn index(self) -> usize;

    /// Short name used in outputs.
    fn label(self) -> &'static str;
}

/// Immunity levels passed from a birthing agent to a newborn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MaternalImmunity {
    pub parasite: f64,
    pub clinical: f64,
}

impl MaternalImmunity {
    pub const ZERO: Self = Self {
        parasite: 0.0,
        clinical: 0.0,
    };
}

/// Outcome of one step of one agent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transition {
    pub dies: bool,
    /// Infectivity towards mosquitoes during this step.
    pub infectivity: f64,
}

/// Saturating function of immunity: `min + (max - min) / (1 + (x / mid)^steepness)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Hill {
    pub min: f64,
    pub max: f64,
    pub mid: f64,
    pub steepness: f64,
}

impl Hill {
    pub fn eval(&self, x: f64) -> f64 {
        let denom = 1.0 + (x / self.mid).powf(self.steepness);
        self.min + (self.max - self.min) / denom
    }
}

/// Pick among competing events of the given rates with a single draw.
///
/// Returns the index of the chosen rate. The caller must ensure the total
/// rate is positive.
pub(crate) fn choose_event(clock: &mut RateClock, rates: &[f64]) -> usize {
    let total: f64 = rates.iter().sum();
    select_event(clock.uniform() * total, rates)
}

/// Index of the rate whose cumulative interval contains `r`.
///
/// If rounding pushes `r` past the last boundary, the last positive rate wins.
fn select_event(r: f64, rates: &[f64]) -> usize {
    let mut cumulative = 0.0;
    for (idx, &rate) in rates.iter().enumerate() {
        cumulative += rate;
        if r < cumulative {
            return idx;
        }
    }
    rates
        .iter()
        .rposition(|&rate| rate > 0.0)
        .unwrap_or(rates.len() - 1)
}

/// Per-agent disease dynamics.
pub trait DiseaseModel {
    /// Disease data carried by each agent.
    type Status: Clone + Debug + Serialize + DeserializeOwned;
    type Compartment: Compartment;

    fn demography(&self) -> &Demography;

    fn compartment(status: &Self::Status) -> Self::Compartment;

    /// Total parasite and clinical immunity of the agent.
    fn immunity(status: &Self::Status) -> MaternalImmunity;

    fn hypnozoites(_status: &Self::Status) -> u32 {
        0
    }

    /// Advance the disease state by one step under force of infection `lambda`.
    fn transition(
        &self,
        status: &mut Self::Status,
        lambda: f64,
        t: f64,
        dt: f64,
        clock: &mut RateClock,
    ) -> Transition;

    /// Decay and boost immunity of a surviving agent that has just reached `age`.
    fn update_immunity(&self, status: &mut Self::Status, age: f64);

    /// Status of a newborn given a sampled entry of the maternal pool.
    fn newborn(&self, mother: MaternalImmunity) -> Self::Status;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hill_limits() {
        let hill = Hill {
            min: 0.1,
            max: 0.9,
            mid: 10.0,
            steepness: 3.0,
        };
        assert!((hill.eval(0.0) - 0.9).abs() < 1e-12);
        assert!((hill.eval(10.0) - 0.5).abs() < 1e-12);
        assert!((hill.eval(1e9) - 0.1).abs() < 1e-6);
    }

    #[test]
    fn overflowing_draw_skips_zero_rates() {
        let rates = [1.0, 2.0, 0.0];
        let total: f64 = rates.iter().sum();
        assert_eq!(select_event(total, &rates), 1);
        assert_eq!(select_event(total * (1.0 + f64::EPSILON), &rates), 1);
        assert_eq!(select_event(0.5, &rates), 0);
    }

    #[test]
    fn choose_event_respects_weights() {
        let mut clock = RateClock::from_seed(11);
        assert!((0..500).all(|_| choose_event(&mut clock, &[0.0, 1.0, 0.0]) == 1));

        let n = 20_000;
        let hits = (0..n)
            .filter(|_| choose_event(&mut clock, &[1.0, 3.0]) == 1)
            .count();
        let frac = hits as f64 / n as f64;
        assert!((frac - 0.75).abs() < 0.02, "fraction was {frac}");
    }
}
