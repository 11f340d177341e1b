//! One time step of the human population.

use crate::agent::Agent;
use crate::clock::RateClock;
use crate::model::{Compartment, DiseaseModel, N_COMPARTMENTS};
use crate::population::Population;
use serde::{Deserialize, Serialize};

/// Number of agents in each compartment, in [`Compartment::ALL`] order.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub counts: [usize; N_COMPARTMENTS],
}

impl Tally {
    pub fn add<C: Compartment>(&mut self, compartment: C) {
        self.counts[compartment.index()] += 1;
    }

    pub fn count<C: Compartment>(&self, compartment: C) -> usize {
        self.counts[compartment.index()]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().sum()
    }
}

/// Advance every agent by `dt` under the population-level `eir`.
///
/// The per-capita EIR `eir / n` is redistributed by relative exposure: an
/// agent's force of infection is `(eir / n) * omega * zeta / total`, where
/// `total` is the weighted exposure cached for time `t`. Dead agents are
/// replaced in place by newborns drawing their immunity from the pool of the
/// current step. The caches for `t + dt` are committed on return.
///
/// Returns the post-step tally and the exposure-weighted mean infectivity
/// of the population towards mosquitoes.
///
/// # Panics
/// Panics if `dt` is not positive.
pub fn step_population<M: DiseaseModel>(
    t: f64,
    dt: f64,
    eir: f64,
    population: &mut Population<M::Status>,
    model: &M,
    clock: &mut RateClock,
) -> (Tally, f64) {
    assert!(dt > 0.0, "time step must be positive, but is {dt}");

    let demography = model.demography();
    let total_exposure = population.total_exposure(t);
    let n_agents = population.len();
    let foi_scale = if n_agents > 0 && total_exposure > 0.0 {
        eir / n_agents as f64 / total_exposure
    } else {
        0.0
    };

    let mut tally = Tally::default();
    let mut weighted_infectivity = 0.0;
    let mut next_exposure = 0.0;
    let mut next_pool = Vec::new();

    let (agents, pool) = population.parts_mut();
    for agent in agents.iter_mut() {
        let dies = if agent.age() >= demography.max_age {
            true
        } else {
            let exposure = agent.exposure();
            let transition =
                model.transition(agent.status_mut(), foi_scale * exposure, t, dt, clock);
            weighted_infectivity += transition.infectivity * exposure;
            transition.dies
        };

        if dies {
            let mother = pool[clock.index(pool.len())];
            let zeta = clock.log_normal(
                demography.biting_rate_log_mean,
                demography.biting_rate_log_sd,
            );
            *agent = Agent::new(0.0, zeta, model.newborn(mother), demography);
        } else {
            agent.grow_older(dt, demography);
            let age = agent.age();
            model.update_immunity(agent.status_mut(), age);
        }

        if demography.is_birthing_capable(agent.age()) {
            next_pool.push(M::immunity(agent.status()));
        }

        next_exposure += agent.exposure();
        tally.add(M::compartment(agent.status()));
    }

    population.commit(next_exposure, next_pool, t + dt);

    let infectivity = if total_exposure > 0.0 {
        weighted_infectivity / total_exposure
    } else {
        0.0
    };
    (tally, infectivity)
}
